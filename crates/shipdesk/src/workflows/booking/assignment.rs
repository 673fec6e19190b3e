use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::domain::{CarrierId, CarrierOffer, OrderId};

/// Errors raised while resolving carrier assignments.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AssignmentError {
    #[error("carrier {carrier:?} has no offer for order {order:?}")]
    OfferUnavailable { order: OrderId, carrier: CarrierId },
    #[error("order {0:?} is not part of the active selection")]
    NotSelected(OrderId),
    #[error("orders awaiting a carrier assignment: {0:?}")]
    Unassigned(Vec<OrderId>),
    #[error("carrier rates have not been fetched for this batch")]
    OffersNotReady,
}

/// Why a bulk pass left an order untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The chosen carrier did not quote this order.
    CarrierUnavailable,
    /// The operator picked a carrier for this order by hand; bulk passes
    /// leave it alone until the order is released.
    ManuallyAssigned,
    /// The order is not in the active selection.
    NotSelected,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedOrder {
    pub order_id: OrderId,
    pub reason: SkipReason,
}

/// Outcome of one bulk assignment pass: which orders took the carrier and
/// which were skipped, with reasons. Skipped orders are never silently given
/// a different carrier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkAssignmentReport {
    pub carrier_id: CarrierId,
    pub assigned: Vec<OrderId>,
    pub skipped: Vec<SkippedOrder>,
}

/// The finalized order → offer map for one batch.
///
/// At most one active entry per order; reselecting replaces.
#[derive(Debug, Default, Clone)]
pub struct AssignmentBook {
    assignments: BTreeMap<OrderId, CarrierOffer>,
    pinned: BTreeSet<OrderId>,
}

impl AssignmentBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `carrier_id` to every order in `order_ids` that has an offer
    /// from that carrier. Manually pinned orders and orders the carrier did
    /// not quote are reported as skipped.
    pub fn apply_bulk(
        &mut self,
        carrier_id: &CarrierId,
        order_ids: &[OrderId],
        offers: &BTreeMap<OrderId, Vec<CarrierOffer>>,
    ) -> BulkAssignmentReport {
        let mut report = BulkAssignmentReport {
            carrier_id: carrier_id.clone(),
            assigned: Vec::new(),
            skipped: Vec::new(),
        };

        for order_id in order_ids {
            if self.pinned.contains(order_id) {
                report.skipped.push(SkippedOrder {
                    order_id: order_id.clone(),
                    reason: SkipReason::ManuallyAssigned,
                });
                continue;
            }

            let offer = offers
                .get(order_id)
                .and_then(|list| list.iter().find(|offer| &offer.carrier_id == carrier_id));

            match offer {
                Some(offer) => {
                    self.assignments.insert(order_id.clone(), offer.clone());
                    report.assigned.push(order_id.clone());
                }
                None => report.skipped.push(SkippedOrder {
                    order_id: order_id.clone(),
                    reason: SkipReason::CarrierUnavailable,
                }),
            }
        }

        report
    }

    /// Assign one order by hand and pin it against later bulk passes.
    pub fn apply_individual(&mut self, order_id: &OrderId, offer: CarrierOffer) {
        self.assignments.insert(order_id.clone(), offer);
        self.pinned.insert(order_id.clone());
    }

    /// Re-admit a manually assigned order to bulk passes. The current
    /// assignment stays until a bulk pass replaces it.
    pub fn release(&mut self, order_id: &OrderId) {
        self.pinned.remove(order_id);
    }

    pub fn is_pinned(&self, order_id: &OrderId) -> bool {
        self.pinned.contains(order_id)
    }

    /// Orders among `ids` that still lack an assignment.
    pub fn unassigned_among<'a>(&self, ids: impl IntoIterator<Item = &'a OrderId>) -> Vec<OrderId> {
        ids.into_iter()
            .filter(|id| !self.assignments.contains_key(*id))
            .cloned()
            .collect()
    }

    pub fn get(&self, order_id: &OrderId) -> Option<&CarrierOffer> {
        self.assignments.get(order_id)
    }

    pub fn assignments(&self) -> &BTreeMap<OrderId, CarrierOffer> {
        &self.assignments
    }

    pub fn clear(&mut self) {
        self.assignments.clear();
        self.pinned.clear();
    }
}
