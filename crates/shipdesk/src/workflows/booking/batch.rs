use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::assignment::{
    AssignmentBook, AssignmentError, BulkAssignmentReport, SkipReason, SkippedOrder,
};
use super::domain::{
    BatchId, BatchStage, BookingReceipt, BookingSession, CarrierId, CarrierOffer, CorrelationId,
    OrderBookingStatus, OrderId, OrderRef, RtoId, SessionState, WarehouseId,
};
use super::normalize::normalize_rate_sheet;
use super::selection::{SelectionError, SelectionManager};
use super::upstream::{
    BookedRate, CreateSessionRequest, CreateShipmentsRequest, GetRatesRequest, RateBreakdown,
    RateGateway, RateSheet, ShipmentAck, ShipmentBooking, UpstreamError,
};

/// Session lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("a rate request for this order set is already in flight")]
    AlreadyInFlight,
    #[error("no active rate-shopping session; create one first")]
    NoActiveSession,
    #[error("the rate-shopping session expired upstream; create a new one")]
    Expired,
    #[error("the selection changed while the request was in flight; the result was discarded")]
    Superseded,
    #[error("this batch has been submitted; start a new batch")]
    BatchClosed,
    #[error("session creation failed: {0}")]
    Upstream(UpstreamError),
}

/// Rate retrieval errors.
#[derive(Debug, thiserror::Error)]
pub enum RateFetchError {
    #[error("rate retrieval failed: {0}")]
    Upstream(UpstreamError),
    #[error("a stale rate response was discarded")]
    Superseded,
}

/// Booking submission errors. Transient upstream failures are retried
/// internally; everything surfacing here is final for the attempt.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("booking submission failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: UpstreamError },
    #[error("booking submission rejected: {0}")]
    Rejected(UpstreamError),
    #[error("a submission for this batch is already in flight")]
    AlreadyInFlight,
}

/// Umbrella error for every booking-workflow operation.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    RateFetch(#[from] RateFetchError),
    #[error(transparent)]
    Assignment(#[from] AssignmentError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

/// Bounded-retry policy for booking submission.
#[derive(Debug, Clone)]
pub struct SubmitPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for SubmitPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(400),
        }
    }
}

const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Snapshot of one batch for API responses and the console.
#[derive(Debug, Clone, Serialize)]
pub struct BatchStatusView {
    pub batch_id: BatchId,
    pub stage: &'static str,
    pub selected_orders: Vec<OrderId>,
    pub correlation_id: Option<CorrelationId>,
    pub assignments: BTreeMap<OrderId, CarrierId>,
    pub unassigned_orders: Vec<OrderId>,
}

#[derive(Default)]
struct BatchInner {
    selection: SelectionManager,
    stage: BatchStage,
    session: Option<BookingSession>,
    offers: BTreeMap<OrderId, Vec<CarrierOffer>>,
    assignments: AssignmentBook,
    inflight_sessions: BTreeSet<Vec<OrderId>>,
    submitting: bool,
}

impl BatchInner {
    /// Discard the session and everything derived from it. Offers and
    /// assignments from a stale session must never leak into a newer one.
    fn invalidate_session(&mut self) {
        self.session = None;
        self.offers.clear();
        self.assignments.clear();
        self.stage = if self.selection.is_empty() {
            BatchStage::Idle
        } else {
            BatchStage::Selected
        };
    }

    fn refresh_assignment_stage(&mut self) {
        if !matches!(
            self.stage,
            BatchStage::RatesReady | BatchStage::AssignmentComplete
        ) {
            return;
        }
        let unassigned = self
            .assignments
            .unassigned_among(self.selection.selected().iter());
        self.stage = if unassigned.is_empty() && !self.selection.is_empty() {
            BatchStage::AssignmentComplete
        } else {
            BatchStage::RatesReady
        };
    }

    fn guard_open(&self) -> Result<(), SessionError> {
        if self.stage == BatchStage::Submitted {
            return Err(SessionError::BatchClosed);
        }
        Ok(())
    }
}

/// One rate-shopping and booking workflow instance.
///
/// All mutable state sits behind a mutex that is never held across an
/// `.await`; every upstream response is re-checked against the state that
/// requested it before it is allowed to land.
pub struct BookingBatch<G> {
    id: BatchId,
    gateway: Arc<G>,
    policy: SubmitPolicy,
    inner: Mutex<BatchInner>,
}

impl<G> BookingBatch<G> {
    pub fn new(gateway: Arc<G>, policy: SubmitPolicy) -> Self {
        Self {
            id: BatchId(Uuid::new_v4().to_string()),
            gateway,
            policy,
            inner: Mutex::new(BatchInner::default()),
        }
    }

    pub fn id(&self) -> &BatchId {
        &self.id
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BatchInner> {
        self.inner.lock().expect("batch state mutex poisoned")
    }

    pub fn stage(&self) -> BatchStage {
        self.lock().stage
    }

    pub fn status(&self) -> BatchStatusView {
        let inner = self.lock();
        let assignments = inner
            .assignments
            .assignments()
            .iter()
            .map(|(order, offer)| (order.clone(), offer.carrier_id.clone()))
            .collect();
        BatchStatusView {
            batch_id: self.id.clone(),
            stage: inner.stage.label(),
            selected_orders: inner.selection.selected().iter().cloned().collect(),
            correlation_id: inner
                .session
                .as_ref()
                .map(|session| session.correlation_id.clone()),
            assignments,
            unassigned_orders: if inner.session.is_some() {
                inner
                    .assignments
                    .unassigned_among(inner.selection.selected().iter())
            } else {
                Vec::new()
            },
        }
    }

    /// Current normalized offers, one (possibly empty) entry per session order.
    pub fn offers(&self) -> BTreeMap<OrderId, Vec<CarrierOffer>> {
        self.lock().offers.clone()
    }

    /// Refresh the visible listing. Selected orders that vanished are
    /// dropped, and a changed selection discards the active session.
    pub fn sync_visible(&self, listing: &[OrderRef]) {
        let mut inner = self.lock();
        let changed = inner.selection.sync_visible(listing);
        if changed && inner.stage != BatchStage::Submitted {
            inner.invalidate_session();
        }
    }

    pub fn toggle_order(&self, order_id: &OrderId, included: bool) -> Result<(), BookingError> {
        let mut inner = self.lock();
        inner.guard_open()?;
        let changed = inner.selection.toggle_order(order_id, included)?;
        if changed {
            inner.invalidate_session();
        }
        Ok(())
    }

    pub fn select_all(&self, order_ids: &[OrderId]) -> Result<(), BookingError> {
        let mut inner = self.lock();
        inner.guard_open()?;
        let changed = inner.selection.select_all(order_ids)?;
        if changed {
            inner.invalidate_session();
        }
        Ok(())
    }

    pub fn selected_orders(&self) -> BTreeSet<OrderId> {
        self.lock().selection.selected().clone()
    }
}

impl<G: RateGateway> BookingBatch<G> {
    /// Open a correlated rate-shopping session for the current selection.
    ///
    /// Submits exactly once per call; repeated calls create fresh sessions.
    /// At most one create/fetch pair may be in flight for a given order set,
    /// while a different order set may start regardless of stale latches.
    pub async fn create_session(
        &self,
        warehouse_id: WarehouseId,
        rto_id: RtoId,
    ) -> Result<CorrelationId, BookingError> {
        let requested: Vec<OrderId> = {
            let mut inner = self.lock();
            inner.guard_open()?;
            if inner.selection.is_empty() {
                return Err(SelectionError::EmptySelection.into());
            }
            let requested: Vec<OrderId> = inner.selection.selected().iter().cloned().collect();
            if !inner.inflight_sessions.insert(requested.clone()) {
                return Err(SessionError::AlreadyInFlight.into());
            }
            requested
        };

        let request = CreateSessionRequest {
            warehouse_id: warehouse_id.clone(),
            rto_id: rto_id.clone(),
            order_ids: requested.clone(),
        };
        let result = self.gateway.create_session(request).await;

        let mut inner = self.lock();
        inner.inflight_sessions.remove(&requested);

        let current: Vec<OrderId> = inner.selection.selected().iter().cloned().collect();
        if current != requested {
            warn!(batch = %self.id.0, "selection changed during session creation; response discarded");
            return Err(SessionError::Superseded.into());
        }

        let response = result.map_err(SessionError::Upstream)?;
        let correlation_id = response.uuid.clone();
        inner.offers.clear();
        inner.assignments.clear();
        inner.session = Some(BookingSession {
            correlation_id: correlation_id.clone(),
            order_ids: requested.into_iter().collect(),
            warehouse_id,
            return_origin_id: rto_id,
            created_at: Utc::now(),
            state: SessionState::Created,
        });
        inner.stage = BatchStage::SessionCreated;
        info!(batch = %self.id.0, correlation = %correlation_id.0, "rate-shopping session created");
        Ok(correlation_id)
    }

    /// Retrieve and normalize carrier quotes for the active session.
    ///
    /// Idempotent: repeat calls re-fetch against the same correlation id. A
    /// response that no longer matches the active session is discarded, and
    /// a malformed payload degrades to zero offers instead of failing.
    pub async fn fetch_rates(&self) -> Result<BTreeMap<OrderId, Vec<CarrierOffer>>, BookingError> {
        let correlation_id = {
            let inner = self.lock();
            inner.guard_open()?;
            let session = inner.session.as_ref().ok_or(SessionError::NoActiveSession)?;
            if session.state == SessionState::Expired {
                return Err(SessionError::Expired.into());
            }
            session.correlation_id.clone()
        };

        let result = self
            .gateway
            .fetch_rates(GetRatesRequest {
                uuid: correlation_id.clone(),
            })
            .await;

        let mut inner = self.lock();
        let offers = {
            let session = match inner.session.as_mut() {
                Some(session) if session.correlation_id == correlation_id => session,
                _ => {
                    warn!(batch = %self.id.0, correlation = %correlation_id.0, "stale rate response discarded");
                    return Err(RateFetchError::Superseded.into());
                }
            };

            let sheet = match result {
                Ok(sheet) => sheet,
                Err(UpstreamError::Malformed(detail)) => {
                    warn!(batch = %self.id.0, %detail, "malformed rate payload; treating as zero offers");
                    RateSheet::default()
                }
                Err(err @ UpstreamError::Rejected(_)) => {
                    session.state = SessionState::Expired;
                    return Err(RateFetchError::Upstream(err).into());
                }
                Err(err) => return Err(RateFetchError::Upstream(err).into()),
            };

            let mut offers = normalize_rate_sheet(&sheet);
            offers.retain(|order_id, _| session.order_ids.contains(order_id));
            for order_id in &session.order_ids {
                offers.entry(order_id.clone()).or_default();
            }
            session.state = SessionState::RatesFetched;
            offers
        };

        inner.offers = offers.clone();
        if !matches!(
            inner.stage,
            BatchStage::RatesReady | BatchStage::AssignmentComplete
        ) {
            inner.stage = BatchStage::RatesReady;
        }
        inner.refresh_assignment_stage();
        info!(batch = %self.id.0, orders = offers.len(), "carrier rates normalized");
        Ok(offers)
    }

    /// Apply one carrier across many orders; orders the carrier did not
    /// quote, manually pinned orders, and orders outside the selection are
    /// reported as skipped, never silently reassigned.
    pub fn apply_bulk(
        &self,
        carrier_id: &CarrierId,
        order_ids: &[OrderId],
    ) -> Result<BulkAssignmentReport, BookingError> {
        let mut inner = self.lock();
        let inner = &mut *inner;
        inner.guard_open()?;
        Self::require_rates(inner)?;

        let mut not_selected = Vec::new();
        let mut eligible = Vec::new();
        for order_id in order_ids {
            if inner.selection.contains(order_id) {
                eligible.push(order_id.clone());
            } else {
                not_selected.push(SkippedOrder {
                    order_id: order_id.clone(),
                    reason: SkipReason::NotSelected,
                });
            }
        }

        let mut report = inner
            .assignments
            .apply_bulk(carrier_id, &eligible, &inner.offers);
        report.skipped.extend(not_selected);
        inner.refresh_assignment_stage();
        Ok(report)
    }

    /// Assign a single order by hand; the pick is pinned against later bulk
    /// passes until [`BookingBatch::release_order`] re-admits it.
    pub fn apply_individual(
        &self,
        order_id: &OrderId,
        carrier_id: &CarrierId,
    ) -> Result<CarrierOffer, BookingError> {
        let mut inner = self.lock();
        inner.guard_open()?;
        Self::require_rates(&inner)?;

        if !inner.selection.contains(order_id) {
            return Err(AssignmentError::NotSelected(order_id.clone()).into());
        }

        let offer = inner
            .offers
            .get(order_id)
            .and_then(|offers| {
                offers
                    .iter()
                    .find(|offer| &offer.carrier_id == carrier_id)
                    .cloned()
            })
            .ok_or_else(|| AssignmentError::OfferUnavailable {
                order: order_id.clone(),
                carrier: carrier_id.clone(),
            })?;

        inner.assignments.apply_individual(order_id, offer.clone());
        inner.refresh_assignment_stage();
        Ok(offer)
    }

    /// Re-admit a manually assigned order to bulk passes.
    pub fn release_order(&self, order_id: &OrderId) -> Result<(), BookingError> {
        let mut inner = self.lock();
        inner.guard_open()?;
        inner.assignments.release(order_id);
        Ok(())
    }

    /// Submit the finalized assignment map as one aggregate booking.
    ///
    /// Rejected client-side unless every selected order is assigned.
    /// Transient upstream failures retry with bounded backoff; a resolved
    /// ack is terminal either way, and on acceptance the session and
    /// assignment map are cleared and the batch closes.
    pub async fn submit(&self, auto_pickup: bool) -> Result<BookingReceipt, BookingError> {
        let (request, correlation_id) = {
            let mut inner = self.lock();
            inner.guard_open()?;
            let session = inner.session.as_ref().ok_or(SessionError::NoActiveSession)?;
            if session.state == SessionState::Expired {
                return Err(SessionError::Expired.into());
            }

            let unassigned = inner
                .assignments
                .unassigned_among(inner.selection.selected().iter());
            if !unassigned.is_empty() {
                return Err(AssignmentError::Unassigned(unassigned).into());
            }
            if inner.submitting {
                return Err(SubmissionError::AlreadyInFlight.into());
            }

            let mut bookings = BTreeMap::new();
            for order_id in inner.selection.selected() {
                // Readiness check above guarantees an offer per selected order.
                let Some(offer) = inner.assignments.get(order_id) else {
                    return Err(AssignmentError::Unassigned(vec![order_id.clone()]).into());
                };
                bookings.insert(
                    order_id.clone(),
                    ShipmentBooking {
                        rates: BookedRate {
                            order_id: order_id.clone(),
                            courier_partner_id: offer.carrier_id.clone(),
                            shipping_rate_data: RateBreakdown::from(offer),
                        },
                    },
                );
            }

            let request = CreateShipmentsRequest {
                warehouse_id: session.warehouse_id.clone(),
                rto_id: session.return_origin_id.clone(),
                order_ids: bookings,
                auto_pickup,
            };
            let correlation_id = session.correlation_id.clone();
            inner.submitting = true;
            (request, correlation_id)
        };

        let order_ids: Vec<OrderId> = request.order_ids.keys().cloned().collect();
        let result = self.submit_with_retry(request).await;

        let mut inner = self.lock();
        inner.submitting = false;

        let session_matches = inner
            .session
            .as_ref()
            .map(|session| session.correlation_id == correlation_id)
            .unwrap_or(false);
        if !session_matches {
            warn!(batch = %self.id.0, "session replaced during submission; result discarded");
            return Err(SessionError::Superseded.into());
        }

        let ack = result?;
        if ack.success {
            let outcomes = order_ids
                .into_iter()
                .map(|order_id| (order_id, OrderBookingStatus::Queued))
                .collect();
            inner.session = None;
            inner.offers.clear();
            inner.assignments.clear();
            inner.stage = BatchStage::Submitted;
            info!(batch = %self.id.0, "booking accepted for asynchronous processing");
            Ok(BookingReceipt {
                accepted: true,
                message: ack.message,
                outcomes,
            })
        } else {
            let reason = if ack.message.is_empty() {
                "rejected by upstream".to_string()
            } else {
                ack.message.clone()
            };
            let outcomes = order_ids
                .into_iter()
                .map(|order_id| {
                    (
                        order_id,
                        OrderBookingStatus::Failed {
                            reason: reason.clone(),
                        },
                    )
                })
                .collect();
            warn!(batch = %self.id.0, %reason, "booking rejected by upstream");
            Ok(BookingReceipt {
                accepted: false,
                message: ack.message,
                outcomes,
            })
        }
    }

    fn require_rates(inner: &BatchInner) -> Result<(), BookingError> {
        let session = inner.session.as_ref().ok_or(SessionError::NoActiveSession)?;
        match session.state {
            SessionState::RatesFetched => Ok(()),
            SessionState::Expired => Err(SessionError::Expired.into()),
            SessionState::Created => Err(AssignmentError::OffersNotReady.into()),
        }
    }

    async fn submit_with_retry(
        &self,
        request: CreateShipmentsRequest,
    ) -> Result<ShipmentAck, SubmissionError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut delay = self.policy.initial_backoff;

        for attempt in 1..=max_attempts {
            match self.gateway.create_shipments(request.clone()).await {
                Ok(ack) => return Ok(ack),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "transient booking submission failure, retrying: {err}"
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(MAX_BACKOFF);
                }
                Err(err) if err.is_transient() => {
                    return Err(SubmissionError::RetriesExhausted {
                        attempts: max_attempts,
                        last: err,
                    })
                }
                Err(err) => return Err(SubmissionError::Rejected(err)),
            }
        }

        unreachable!("retry loop returns before exhausting attempts")
    }
}

/// Registry of independent booking batches, keyed by generated batch id.
///
/// Each batch carries its own state, so concurrent batches never share
/// mutable coordinator state.
pub struct BookingDesk<G> {
    gateway: Arc<G>,
    policy: SubmitPolicy,
    batches: Mutex<HashMap<BatchId, Arc<BookingBatch<G>>>>,
}

impl<G> BookingDesk<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self::with_policy(gateway, SubmitPolicy::default())
    }

    pub fn with_policy(gateway: Arc<G>, policy: SubmitPolicy) -> Self {
        Self {
            gateway,
            policy,
            batches: Mutex::new(HashMap::new()),
        }
    }

    /// Start a fresh workflow instance over the given listing.
    pub fn open_batch(&self, listing: &[OrderRef]) -> Arc<BookingBatch<G>> {
        let batch = Arc::new(BookingBatch::new(
            self.gateway.clone(),
            self.policy.clone(),
        ));
        batch.sync_visible(listing);
        let mut batches = self.batches.lock().expect("batch registry mutex poisoned");
        batches.insert(batch.id().clone(), batch.clone());
        batch
    }

    pub fn batch(&self, id: &BatchId) -> Option<Arc<BookingBatch<G>>> {
        let batches = self.batches.lock().expect("batch registry mutex poisoned");
        batches.get(id).cloned()
    }

    pub fn close_batch(&self, id: &BatchId) -> bool {
        let mut batches = self.batches.lock().expect("batch registry mutex poisoned");
        batches.remove(id).is_some()
    }
}
