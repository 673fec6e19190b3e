use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for pending orders.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

/// Identifier wrapper for courier partners.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CarrierId(pub String);

/// Identifier wrapper for dispatch warehouses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseId(pub String);

/// Identifier for the return-to-origin warehouse attached to a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtoId(pub String);

/// Opaque token issued by the upstream rate service for one shopping session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(pub String);

/// Host-generated identifier for one booking batch (one workflow instance).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BatchId(pub String);

/// Immutable reference to a pending order as listed by the order source.
///
/// Display fields ride along for the console; this core never mutates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRef {
    pub id: OrderId,
    pub channel_reference: String,
    pub consignee: String,
    pub destination_pincode: String,
    pub payment_mode: String,
    pub cod_amount: f64,
}

/// Lifecycle of one upstream rate-shopping session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Created,
    RatesFetched,
    Expired,
}

/// One correlated rate-shopping session against the upstream service.
///
/// Discarded on selection change, re-create, or successful submission; the
/// correlation id is unique and immutable once issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingSession {
    pub correlation_id: CorrelationId,
    pub order_ids: BTreeSet<OrderId>,
    pub warehouse_id: WarehouseId,
    pub return_origin_id: RtoId,
    pub created_at: DateTime<Utc>,
    pub state: SessionState,
}

/// A priced, carrier-specific service option for one order.
///
/// Charge fields are always present; upstream omissions normalize to 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarrierOffer {
    pub carrier_id: CarrierId,
    pub carrier_name: String,
    pub freight: f64,
    pub insurance: f64,
    pub cod_charge: f64,
    pub early_cod_charge: f64,
    pub gst: f64,
    pub gross: f64,
    pub total_payable: f64,
    pub estimated_pickup: Option<NaiveDate>,
    pub estimated_delivery: Option<NaiveDate>,
    pub service_mode: Option<String>,
}

/// Per-order outcome once a batch submission has fully resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBookingStatus {
    Queued,
    Failed { reason: String },
}

impl OrderBookingStatus {
    pub fn label(&self) -> &'static str {
        match self {
            OrderBookingStatus::Queued => "queued",
            OrderBookingStatus::Failed { .. } => "failed",
        }
    }
}

/// Terminal record of one batch submission.
///
/// "Queued" means accepted for asynchronous processing; delivery progress is
/// the tracking subsystem's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingReceipt {
    pub accepted: bool,
    pub message: String,
    pub outcomes: BTreeMap<OrderId, OrderBookingStatus>,
}

/// Stage of one booking batch.
///
/// Failed calls leave the stage at the last good state so the operator can
/// re-invoke the same action; `Submitted` is terminal and a new batch starts
/// a fresh instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStage {
    Idle,
    Selected,
    SessionCreated,
    RatesReady,
    AssignmentComplete,
    Submitted,
}

impl Default for BatchStage {
    fn default() -> Self {
        BatchStage::Idle
    }
}

impl BatchStage {
    pub const fn label(self) -> &'static str {
        match self {
            BatchStage::Idle => "idle",
            BatchStage::Selected => "selected",
            BatchStage::SessionCreated => "session_created",
            BatchStage::RatesReady => "rates_ready",
            BatchStage::AssignmentComplete => "assignment_complete",
            BatchStage::Submitted => "submitted",
        }
    }
}
