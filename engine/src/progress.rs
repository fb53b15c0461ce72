//! Progress reporting trait.
//!
//! This module defines the ProgressCallback trait, which decouples the
//! orchestrator from any specific front end (terminal, JSON bridge, GUI).

use crate::model::{BatchSummary, ProgressEvent, TransferItem, TransferResult};
use crate::session::TransferSession;

/// Trait for receiving updates while a batch runs.
///
/// All methods are called from the task driving the batch, in order.
pub trait ProgressCallback: Send + Sync {
    /// Called once before the first item, with the number of selected items.
    fn on_batch_started(&self, session: &TransferSession, selected: usize);

    /// Called when an item has moved to `moving`.
    fn on_item_started(&self, item: &TransferItem);

    /// Called for each progress tick applied to the item in flight.
    fn on_item_progress(&self, item: &TransferItem, event: &ProgressEvent);

    /// Called when an item reached `transferred` or `failed`.
    fn on_item_completed(&self, item: &TransferItem, result: &TransferResult);

    /// Called after the last selected item.
    fn on_batch_completed(&self, summary: &BatchSummary);
}
