//! Batch orchestration.
//!
//! Runs the selected items of a session strictly one after another. Each
//! item is moved to `moving`, handed to an [`ItemAction`], and settled as
//! `transferred` or `failed` from the returned [`TransferResult`]. A failed
//! item never aborts the batch and is not retried within the same run.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::model::{BatchSummary, ItemState, TransferItem, TransferResult};
use crate::poller::ProgressSender;
use crate::progress::ProgressCallback;
use crate::session::TransferSession;

/// Performs the transfer of a single item.
///
/// Implementations report progress by sending events on `progress`; events
/// are matched to items by path. The action must always resolve to a
/// result, failures included.
#[async_trait]
pub trait ItemAction: Send + Sync {
    async fn transfer(&self, item: &TransferItem, progress: ProgressSender) -> TransferResult;
}

/// Transfer every selected item in listing order.
///
/// Deselected items keep their state. Items already settled by an earlier
/// run are skipped. Progress ticks for the item in flight are applied to the
/// session as they arrive; ticks that race the completion are dropped.
pub async fn transfer_all(
    session: &mut TransferSession,
    action: &dyn ItemAction,
    progress_callback: Option<&dyn ProgressCallback>,
) -> BatchSummary {
    let batch_id = Uuid::new_v4();
    let started_at = Utc::now();
    let selected = session.selected_paths();

    info!(batch = %batch_id, direction = %session.direction(), items = selected.len(), "starting batch");

    if let Some(callback) = progress_callback {
        callback.on_batch_started(session, selected.len());
    }

    let mut succeeded = 0;
    let mut failed = 0;
    let mut failed_items = Vec::new();

    for path in selected {
        if let Err(e) = session.begin(&path) {
            warn!(item = %path, error = %e, "skipping item");
            continue;
        }
        let item = match session.get(&path) {
            Some(item) => item.clone(),
            None => continue,
        };

        if let Some(callback) = progress_callback {
            callback.on_item_started(&item);
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = {
            let transfer = action.transfer(&item, tx);
            tokio::pin!(transfer);
            loop {
                tokio::select! {
                    result = &mut transfer => break result,
                    Some(event) = rx.recv() => {
                        if session.apply_progress(&event) {
                            if let (Some(callback), Some(current)) = (progress_callback, session.get(&event.item)) {
                                callback.on_item_progress(current, &event);
                            }
                        } else {
                            debug!(item = %event.item, "ignoring progress for idle item");
                        }
                    }
                }
            }
        };

        match session.finish(&path, &result) {
            Ok(ItemState::Transferred) => succeeded += 1,
            Ok(_) => {
                failed += 1;
                let detail = session
                    .get(&path)
                    .and_then(|settled| settled.error_message.clone())
                    .unwrap_or_default();
                warn!(item = %path, error = %detail, "transfer failed");
                failed_items.push((item.display_name().to_string(), detail));
            }
            Err(e) => {
                warn!(item = %path, error = %e, "could not record transfer result");
                continue;
            }
        }

        if let (Some(callback), Some(settled)) = (progress_callback, session.get(&path)) {
            callback.on_item_completed(settled, &result);
        }
    }

    let summary = BatchSummary {
        batch_id,
        direction: session.direction(),
        succeeded,
        failed,
        failed_items,
        started_at,
        finished_at: Utc::now(),
    };

    info!(batch = %batch_id, succeeded, failed, "batch finished");

    if let Some(callback) = progress_callback {
        callback.on_batch_completed(&summary);
    }

    summary
}
