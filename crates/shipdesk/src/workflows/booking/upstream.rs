use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{CarrierId, CarrierOffer, CorrelationId, OrderId, RtoId, WarehouseId};

/// Failure modes of the upstream rate/booking service.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream request timed out")]
    Timeout,
    #[error("upstream transport failure: {0}")]
    Transport(String),
    #[error("upstream returned status {status}")]
    Status { status: u16 },
    #[error("upstream rejected the request: {0}")]
    Rejected(String),
    #[error("upstream payload could not be decoded: {0}")]
    Malformed(String),
}

impl UpstreamError {
    /// Timeouts, transport drops, and 5xx responses are worth retrying;
    /// rejections and decode failures are not.
    pub fn is_transient(&self) -> bool {
        match self {
            UpstreamError::Timeout | UpstreamError::Transport(_) => true,
            UpstreamError::Status { status } => *status >= 500,
            UpstreamError::Rejected(_) | UpstreamError::Malformed(_) => false,
        }
    }
}

/// Seam over the upstream rate/booking service so the orchestrator can be
/// exercised against stubs and scripted gateways.
#[async_trait]
pub trait RateGateway: Send + Sync {
    async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<CreateSessionResponse, UpstreamError>;

    async fn fetch_rates(&self, request: GetRatesRequest) -> Result<RateSheet, UpstreamError>;

    async fn create_shipments(
        &self,
        request: CreateShipmentsRequest,
    ) -> Result<ShipmentAck, UpstreamError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub warehouse_id: WarehouseId,
    pub rto_id: RtoId,
    pub order_ids: Vec<OrderId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub uuid: CorrelationId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetRatesRequest {
    pub uuid: CorrelationId,
}

/// Raw per-order carrier quotes as the upstream returns them.
///
/// Shapes here are deliberately loose: carriers that decline to quote show
/// up as partially empty records, and charge fields come and go.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateSheet {
    #[serde(default)]
    pub orders: Vec<OrderQuotes>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderQuotes {
    pub id: OrderId,
    #[serde(default)]
    pub courier_partner_rates: Vec<CarrierQuote>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarrierQuote {
    #[serde(default)]
    pub courier_partner_id: Option<CarrierId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rate: Vec<RateTier>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateTier {
    /// Tier-level service name; overrides the carrier-level name when set.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "freightCharges", default)]
    pub freight_charges: Option<f64>,
    #[serde(rename = "insuranceCharges", default)]
    pub insurance_charges: Option<f64>,
    #[serde(rename = "codCharges", default)]
    pub cod_charges: Option<f64>,
    #[serde(rename = "earlyCodCharges", default)]
    pub early_cod_charges: Option<f64>,
    #[serde(rename = "gstAmount", default)]
    pub gst_amount: Option<f64>,
    #[serde(rename = "grossAmount", default)]
    pub gross_amount: Option<f64>,
    #[serde(rename = "totalPayable", default)]
    pub total_payable: Option<f64>,
    #[serde(rename = "estimatedPickup", default)]
    pub estimated_pickup: Option<NaiveDate>,
    #[serde(rename = "estimatedDelivery", default)]
    pub estimated_delivery: Option<NaiveDate>,
    #[serde(rename = "serviceMode", default)]
    pub service_mode: Option<String>,
}

/// Aggregate booking request carrying the negotiated charges per order so
/// the upstream books at the quoted price instead of re-resolving it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateShipmentsRequest {
    pub warehouse_id: WarehouseId,
    pub rto_id: RtoId,
    pub order_ids: BTreeMap<OrderId, ShipmentBooking>,
    pub auto_pickup: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentBooking {
    pub rates: BookedRate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookedRate {
    pub order_id: OrderId,
    pub courier_partner_id: CarrierId,
    #[serde(rename = "shippingRateData")]
    pub shipping_rate_data: RateBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateBreakdown {
    #[serde(rename = "freightCharges")]
    pub freight_charges: f64,
    #[serde(rename = "insuranceCharges")]
    pub insurance_charges: f64,
    #[serde(rename = "codCharges")]
    pub cod_charges: f64,
    #[serde(rename = "earlyCodCharges")]
    pub early_cod_charges: f64,
    #[serde(rename = "gstAmount")]
    pub gst_amount: f64,
    #[serde(rename = "grossAmount")]
    pub gross_amount: f64,
    #[serde(rename = "totalPayable")]
    pub total_payable: f64,
}

impl From<&CarrierOffer> for RateBreakdown {
    fn from(offer: &CarrierOffer) -> Self {
        Self {
            freight_charges: offer.freight,
            insurance_charges: offer.insurance,
            cod_charges: offer.cod_charge,
            early_cod_charges: offer.early_cod_charge,
            gst_amount: offer.gst,
            gross_amount: offer.gross,
            total_payable: offer.total_payable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentAck {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}
