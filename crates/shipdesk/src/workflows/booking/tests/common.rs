use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::workflows::booking::domain::{
    CarrierId, CorrelationId, OrderId, OrderRef, RtoId, WarehouseId,
};
use crate::workflows::booking::upstream::{
    CarrierQuote, CreateSessionRequest, CreateSessionResponse, CreateShipmentsRequest,
    GetRatesRequest, OrderQuotes, RateGateway, RateSheet, RateTier, ShipmentAck, UpstreamError,
};
use crate::workflows::booking::{BookingBatch, BookingDesk, SubmitPolicy};

pub(super) fn order_id(id: &str) -> OrderId {
    OrderId(id.to_string())
}

pub(super) fn carrier_id(id: &str) -> CarrierId {
    CarrierId(id.to_string())
}

pub(super) fn warehouse() -> WarehouseId {
    WarehouseId("W1".to_string())
}

pub(super) fn rto() -> RtoId {
    RtoId("R1".to_string())
}

pub(super) fn order_ref(id: &str) -> OrderRef {
    OrderRef {
        id: order_id(id),
        channel_reference: format!("CH-{id}"),
        consignee: "Asha Traders".to_string(),
        destination_pincode: "560001".to_string(),
        payment_mode: "prepaid".to_string(),
        cod_amount: 0.0,
    }
}

pub(super) fn listing() -> Vec<OrderRef> {
    vec![order_ref("101"), order_ref("102"), order_ref("103")]
}

pub(super) fn tier(total: f64) -> RateTier {
    RateTier {
        freight_charges: Some(total),
        gst_amount: Some(total * 0.18),
        total_payable: Some(total * 1.18),
        ..RateTier::default()
    }
}

pub(super) fn quote(carrier: &str, tiers: Vec<RateTier>) -> CarrierQuote {
    CarrierQuote {
        courier_partner_id: Some(carrier_id(carrier)),
        name: Some(format!("{carrier} Logistics")),
        rate: tiers,
    }
}

pub(super) fn order_quotes(id: &str, quotes: Vec<CarrierQuote>) -> OrderQuotes {
    OrderQuotes {
        id: order_id(id),
        courier_partner_rates: quotes,
    }
}

pub(super) fn sheet(orders: Vec<OrderQuotes>) -> RateSheet {
    RateSheet { orders }
}

/// Sheet where CarrierX quotes 101 and 102 while CarrierY quotes 101 only;
/// 103 has no serviceable carrier.
pub(super) fn standard_sheet() -> RateSheet {
    sheet(vec![
        order_quotes(
            "101",
            vec![
                quote("CarrierX", vec![tier(50.0)]),
                quote("CarrierY", vec![tier(64.0)]),
            ],
        ),
        order_quotes("102", vec![quote("CarrierX", vec![tier(55.0)])]),
        order_quotes("103", Vec::new()),
    ])
}

/// Scripted upstream gateway. Responses pop from per-call queues; an empty
/// queue yields a deterministic success so happy paths need no scripting.
#[derive(Default)]
pub(super) struct StubGateway {
    pub(super) session_responses: Mutex<VecDeque<Result<CreateSessionResponse, UpstreamError>>>,
    pub(super) rate_responses: Mutex<VecDeque<Result<RateSheet, UpstreamError>>>,
    pub(super) shipment_responses: Mutex<VecDeque<Result<ShipmentAck, UpstreamError>>>,
    pub(super) session_requests: Mutex<Vec<CreateSessionRequest>>,
    pub(super) rate_requests: Mutex<Vec<GetRatesRequest>>,
    pub(super) shipment_requests: Mutex<Vec<CreateShipmentsRequest>>,
    pub(super) default_sheet: Mutex<RateSheet>,
    pub(super) session_gate: Option<Arc<Notify>>,
    pub(super) rate_gate: Option<Arc<Notify>>,
}

impl StubGateway {
    pub(super) fn with_sheet(sheet: RateSheet) -> Self {
        let gateway = Self::default();
        *gateway.default_sheet.lock().expect("sheet mutex poisoned") = sheet;
        gateway
    }

    pub(super) fn gated_sessions(sheet: RateSheet) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let mut gateway = Self::with_sheet(sheet);
        gateway.session_gate = Some(gate.clone());
        (gateway, gate)
    }

    pub(super) fn gated_rates(sheet: RateSheet) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let mut gateway = Self::with_sheet(sheet);
        gateway.rate_gate = Some(gate.clone());
        (gateway, gate)
    }

    pub(super) fn push_session(&self, response: Result<CreateSessionResponse, UpstreamError>) {
        self.session_responses
            .lock()
            .expect("session queue poisoned")
            .push_back(response);
    }

    pub(super) fn push_rates(&self, response: Result<RateSheet, UpstreamError>) {
        self.rate_responses
            .lock()
            .expect("rate queue poisoned")
            .push_back(response);
    }

    pub(super) fn push_shipments(&self, response: Result<ShipmentAck, UpstreamError>) {
        self.shipment_responses
            .lock()
            .expect("shipment queue poisoned")
            .push_back(response);
    }

    pub(super) fn session_calls(&self) -> usize {
        self.session_requests
            .lock()
            .expect("session log poisoned")
            .len()
    }

    pub(super) fn rate_calls(&self) -> usize {
        self.rate_requests.lock().expect("rate log poisoned").len()
    }

    pub(super) fn shipment_calls(&self) -> usize {
        self.shipment_requests
            .lock()
            .expect("shipment log poisoned")
            .len()
    }

    pub(super) fn last_shipment_request(&self) -> CreateShipmentsRequest {
        self.shipment_requests
            .lock()
            .expect("shipment log poisoned")
            .last()
            .cloned()
            .expect("a shipment request was recorded")
    }
}

#[async_trait]
impl RateGateway for StubGateway {
    async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<CreateSessionResponse, UpstreamError> {
        let call = {
            let mut log = self.session_requests.lock().expect("session log poisoned");
            log.push(request);
            log.len()
        };
        if let Some(gate) = &self.session_gate {
            gate.notified().await;
        }
        let scripted = self
            .session_responses
            .lock()
            .expect("session queue poisoned")
            .pop_front();
        scripted.unwrap_or_else(|| {
            Ok(CreateSessionResponse {
                uuid: CorrelationId(format!("sess-{call}")),
            })
        })
    }

    async fn fetch_rates(&self, request: GetRatesRequest) -> Result<RateSheet, UpstreamError> {
        self.rate_requests
            .lock()
            .expect("rate log poisoned")
            .push(request);
        if let Some(gate) = &self.rate_gate {
            gate.notified().await;
        }
        let scripted = self
            .rate_responses
            .lock()
            .expect("rate queue poisoned")
            .pop_front();
        scripted
            .unwrap_or_else(|| Ok(self.default_sheet.lock().expect("sheet mutex poisoned").clone()))
    }

    async fn create_shipments(
        &self,
        request: CreateShipmentsRequest,
    ) -> Result<ShipmentAck, UpstreamError> {
        self.shipment_requests
            .lock()
            .expect("shipment log poisoned")
            .push(request);
        let scripted = self
            .shipment_responses
            .lock()
            .expect("shipment queue poisoned")
            .pop_front();
        scripted.unwrap_or_else(|| {
            Ok(ShipmentAck {
                success: true,
                message: "shipments queued".to_string(),
            })
        })
    }
}

pub(super) fn fast_policy() -> SubmitPolicy {
    SubmitPolicy {
        max_attempts: 3,
        initial_backoff: std::time::Duration::from_millis(1),
    }
}

pub(super) fn desk_with(gateway: StubGateway) -> (Arc<BookingDesk<StubGateway>>, Arc<StubGateway>) {
    let gateway = Arc::new(gateway);
    let desk = Arc::new(BookingDesk::with_policy(gateway.clone(), fast_policy()));
    (desk, gateway)
}

/// Batch over the standard three-order listing with everything selected.
pub(super) fn ready_batch(
    gateway: StubGateway,
) -> (Arc<BookingBatch<StubGateway>>, Arc<StubGateway>) {
    let (desk, gateway) = desk_with(gateway);
    let batch = desk.open_batch(&listing());
    batch
        .select_all(&[order_id("101"), order_id("102"), order_id("103")])
        .expect("listed orders select");
    (batch, gateway)
}
