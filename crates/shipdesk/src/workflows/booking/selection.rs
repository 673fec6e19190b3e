use std::collections::BTreeSet;

use super::domain::{OrderId, OrderRef};

/// Errors raised when the operator's selection disagrees with the listing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SelectionError {
    #[error("orders are not in the current listing: {0:?}")]
    UnknownOrders(Vec<OrderId>),
    #[error("no orders selected")]
    EmptySelection,
}

/// Tracks which listed orders are included in the current batch.
///
/// The selection is always a subset of the visible listing; pruning happens
/// whenever the listing is refreshed.
#[derive(Debug, Default, Clone)]
pub struct SelectionManager {
    visible: BTreeSet<OrderId>,
    selected: BTreeSet<OrderId>,
}

impl SelectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the visible listing, dropping selected orders that vanished.
    ///
    /// Returns true when the selection itself changed.
    pub fn sync_visible(&mut self, orders: &[OrderRef]) -> bool {
        self.visible = orders.iter().map(|order| order.id.clone()).collect();
        let before = self.selected.len();
        self.selected.retain(|id| self.visible.contains(id));
        self.selected.len() != before
    }

    /// Idempotent add/remove of a single order.
    ///
    /// Returns true when the selection actually changed; toggling an order
    /// to a state it is already in is a no-op.
    pub fn toggle_order(&mut self, id: &OrderId, included: bool) -> Result<bool, SelectionError> {
        if included {
            if !self.visible.contains(id) {
                return Err(SelectionError::UnknownOrders(vec![id.clone()]));
            }
            Ok(self.selected.insert(id.clone()))
        } else {
            Ok(self.selected.remove(id))
        }
    }

    /// Replace the active selection wholesale.
    pub fn select_all(&mut self, ids: &[OrderId]) -> Result<bool, SelectionError> {
        let unknown: Vec<OrderId> = ids
            .iter()
            .filter(|id| !self.visible.contains(*id))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(SelectionError::UnknownOrders(unknown));
        }

        let next: BTreeSet<OrderId> = ids.iter().cloned().collect();
        let changed = next != self.selected;
        self.selected = next;
        Ok(changed)
    }

    pub fn selected(&self) -> &BTreeSet<OrderId> {
        &self.selected
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn contains(&self, id: &OrderId) -> bool {
        self.selected.contains(id)
    }
}
