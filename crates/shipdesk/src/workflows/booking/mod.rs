//! Bulk rate shopping and carrier booking.
//!
//! One batch moves through five stages: order selection, a correlated
//! rate-shopping session against the upstream service, normalization of the
//! raw quotes, carrier assignment (bulk or per order), and one aggregate
//! booking submission with bounded retry. Each stage's output is the next
//! stage's required input, and responses that outlive the state that
//! requested them are discarded rather than merged.

pub mod assignment;
pub mod batch;
pub mod domain;
pub mod normalize;
pub mod router;
pub mod selection;
pub mod upstream;

#[cfg(test)]
mod tests;

pub use assignment::{
    AssignmentBook, AssignmentError, BulkAssignmentReport, SkipReason, SkippedOrder,
};
pub use batch::{
    BatchStatusView, BookingBatch, BookingDesk, BookingError, RateFetchError, SessionError,
    SubmissionError, SubmitPolicy,
};
pub use domain::{
    BatchId, BatchStage, BookingReceipt, BookingSession, CarrierId, CarrierOffer, CorrelationId,
    OrderBookingStatus, OrderId, OrderRef, RtoId, SessionState, WarehouseId,
};
pub use normalize::normalize_rate_sheet;
pub use router::booking_router;
pub use selection::{SelectionError, SelectionManager};
pub use upstream::{
    BookedRate, CarrierQuote, CreateSessionRequest, CreateSessionResponse, CreateShipmentsRequest,
    GetRatesRequest, OrderQuotes, RateBreakdown, RateGateway, RateSheet, RateTier, ShipmentAck,
    ShipmentBooking, UpstreamError,
};
