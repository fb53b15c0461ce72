//! Session context: the item list for one listing and its transfer runs.
//!
//! A session is owned by whoever drives the batch. The orchestrator is the
//! only writer while a batch runs; progress ticks are applied through it, so
//! no locking is needed. Items are always addressed by path, never by index.

use uuid::Uuid;

use crate::error::EngineError;
use crate::listing::clean_entries;
use crate::model::{Direction, ItemState, ProgressEvent, TransferItem, TransferResult};

#[derive(Debug, Clone)]
pub struct TransferSession {
    /// Unique identifier for this session
    pub id: Uuid,

    direction: Direction,
    items: Vec<TransferItem>,
    all_selected: bool,
}

impl TransferSession {
    pub fn new(direction: Direction) -> Self {
        TransferSession {
            id: Uuid::new_v4(),
            direction,
            items: Vec::new(),
            all_selected: true,
        }
    }

    /// Build a session straight from listing entries.
    pub fn from_listing<I, S>(direction: Direction, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut session = TransferSession::new(direction);
        session.load_listing(entries);
        session
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Replace the item list with a fresh listing. Empty names are dropped;
    /// every item starts pending and selected.
    pub fn load_listing<I, S>(&mut self, entries: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.items = clean_entries(entries).into_iter().map(TransferItem::new).collect();
        self.all_selected = true;
    }

    /// Drop every item (navigating away).
    pub fn clear(&mut self) {
        self.items.clear();
        self.all_selected = true;
    }

    pub fn items(&self) -> &[TransferItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&TransferItem> {
        self.items.iter().find(|item| item.path == path)
    }

    fn get_mut(&mut self, path: &str) -> Option<&mut TransferItem> {
        self.items.iter_mut().find(|item| item.path == path)
    }

    /// Paths of selected items, in listing order.
    pub fn selected_paths(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|item| item.selected)
            .map(|item| item.path.clone())
            .collect()
    }

    /// Flip one item's selection. Items in flight cannot be toggled.
    ///
    /// Returns false if the item is unknown or moving.
    pub fn toggle(&mut self, path: &str) -> bool {
        match self.get_mut(path) {
            Some(item) if item.state != ItemState::Moving => {
                item.selected = !item.selected;
                true
            }
            _ => false,
        }
    }

    /// Keep only the named items selected.
    pub fn select_only(&mut self, paths: &[String]) {
        for item in &mut self.items {
            if item.state != ItemState::Moving {
                item.selected = paths.contains(&item.path);
            }
        }
        self.all_selected = self.items.iter().all(|item| item.selected);
    }

    /// The "Select All" checkbox: flips between all and none.
    ///
    /// Returns the new select-all value.
    pub fn toggle_all(&mut self) -> bool {
        let next = !self.all_selected;
        for item in &mut self.items {
            if item.state != ItemState::Moving {
                item.selected = next;
            }
        }
        self.all_selected = next;
        next
    }

    /// Mark an item as in flight.
    pub fn begin(&mut self, path: &str) -> Result<(), EngineError> {
        self.transition(path, ItemState::Moving)
    }

    /// Record the outcome of an item's transfer.
    pub fn finish(&mut self, path: &str, result: &TransferResult) -> Result<ItemState, EngineError> {
        let next = if result.success {
            ItemState::Transferred
        } else {
            ItemState::Failed
        };
        self.transition(path, next)?;
        if let Some(item) = self.get_mut(path) {
            if result.success {
                item.progress = Some(100);
            } else {
                item.error_message = Some(
                    result
                        .detail
                        .clone()
                        .or_else(|| result.error.map(|kind| kind.to_string()))
                        .unwrap_or_else(|| "Unknown error".to_string()),
                );
            }
            item.rate_label = None;
        }
        Ok(next)
    }

    fn transition(&mut self, path: &str, next: ItemState) -> Result<(), EngineError> {
        let item = self.get_mut(path).ok_or_else(|| EngineError::InvalidPath {
            path: path.into(),
            reason: "not in the current listing".to_string(),
        })?;
        if !item.state.can_transition_to(next) {
            return Err(EngineError::InvalidTransition {
                path: path.to_string(),
                from: item.state,
                to: next,
            });
        }
        item.state = next;
        Ok(())
    }

    /// Apply a progress tick to the matching item.
    ///
    /// Ticks for unknown items, or items no longer moving, are ignored.
    pub fn apply_progress(&mut self, event: &ProgressEvent) -> bool {
        match self.get_mut(&event.item) {
            Some(item) if item.state == ItemState::Moving => {
                item.progress = Some(event.percent.min(100));
                item.rate_label = Some(event.rate_label.clone());
                true
            }
            _ => false,
        }
    }
}
