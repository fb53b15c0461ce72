//! Core data model for device transfers.
//!
//! This module defines the data structures shared by every layer:
//! - TransferItem: one file or folder name in the current listing
//! - TransferResult: the normalized outcome of one `adb` invocation
//! - DeviceStatus: the connectivity state shown to the user
//! - ProgressEvent: one progress tick for the item in flight
//! - BatchSummary: counts reported after a batch finishes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

/// Transfer direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Computer to device
    Push,
    /// Device to computer
    Pull,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Push => write!(f, "Push"),
            Direction::Pull => write!(f, "Pull"),
        }
    }
}

/// The state of an individual item within a session.
///
/// Transitions are strictly `Pending -> Moving -> {Transferred | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    /// Not yet processed
    Pending,
    /// Currently transferring
    Moving,
    /// Tool reported success
    Transferred,
    /// Tool reported failure, or the result could not be decoded
    Failed,
}

impl ItemState {
    /// Returns true if this state is terminal (no further changes expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemState::Transferred | ItemState::Failed)
    }

    /// Returns true if `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: ItemState) -> bool {
        matches!(
            (self, next),
            (ItemState::Pending, ItemState::Moving)
                | (ItemState::Moving, ItemState::Transferred)
                | (ItemState::Moving, ItemState::Failed)
        )
    }
}

/// A single entry of a directory or device listing.
///
/// Identity is the `path`; writers match on it rather than on list position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferItem {
    /// Entry name relative to the listed directory
    pub path: String,

    /// Current state of this item
    pub state: ItemState,

    /// Whether the item takes part in the next batch
    pub selected: bool,

    /// Last known completion percentage (0-100) while moving
    pub progress: Option<u8>,

    /// Last known transfer rate label while moving
    pub rate_label: Option<String>,

    /// Error detail recorded when the item fails
    pub error_message: Option<String>,
}

impl TransferItem {
    /// Create a pending, selected item.
    pub fn new(path: impl Into<String>) -> Self {
        TransferItem {
            path: path.into(),
            state: ItemState::Pending,
            selected: true,
            progress: None,
            rate_label: None,
            error_message: None,
        }
    }

    /// Last path segment, used in notifications.
    pub fn display_name(&self) -> &str {
        self.path
            .rsplit(['/', '\\'])
            .find(|segment| !segment.is_empty())
            .unwrap_or(&self.path)
    }
}

/// Failure taxonomy carried by [`TransferResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Device present but the computer is not trusted
    Unauthorized,
    /// Device known to adb but not responding
    Offline,
    /// No device reachable
    Timeout,
    /// Non-zero exit or error-bearing output
    ProcessFailure,
    /// A structured result could not be decoded
    ParseFailure,
    /// Size probe could not read its target
    ProbeFailure,
}

impl ErrorKind {
    /// Classify free-text tool output by substring.
    ///
    /// Order matters: `unauthorized` is checked before `offline` and
    /// `not found`, matching how adb phrases its messages.
    pub fn classify(message: &str) -> ErrorKind {
        let normalized = message.to_lowercase();
        if normalized.contains("unauthorized") {
            ErrorKind::Unauthorized
        } else if normalized.contains("offline") {
            ErrorKind::Offline
        } else if normalized.contains("not found") {
            ErrorKind::Timeout
        } else {
            ErrorKind::ProcessFailure
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::Offline => "OFFLINE",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::ProcessFailure => "PROCESS_FAILURE",
            ErrorKind::ParseFailure => "PARSE_FAILURE",
            ErrorKind::ProbeFailure => "PROBE_FAILURE",
        };
        write!(f, "{}", name)
    }
}

/// Normalized outcome of one external tool invocation.
///
/// Encoded on the wire as `{success, data, error}` with an optional
/// human-readable `detail`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    pub success: bool,

    #[serde(default)]
    pub data: Option<String>,

    #[serde(default)]
    pub error: Option<ErrorKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl TransferResult {
    /// Successful result carrying the tool's standard output.
    pub fn ok(data: impl Into<String>) -> Self {
        TransferResult {
            success: true,
            data: Some(data.into()),
            error: None,
            detail: None,
        }
    }

    /// Failed result with a kind and a detail message.
    pub fn failure(kind: ErrorKind, detail: impl Into<String>) -> Self {
        TransferResult {
            success: false,
            data: None,
            error: Some(kind),
            detail: Some(detail.into()),
        }
    }

    /// Standard output of a successful call, or an empty string.
    pub fn data_or_empty(&self) -> &str {
        self.data.as_deref().unwrap_or("")
    }

    /// Encode as a JSON string.
    pub fn to_json(&self) -> String {
        // Serializing plain strings and enums cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| {
            String::from(r#"{"success":false,"data":null,"error":"PARSE_FAILURE"}"#)
        })
    }

    /// Decode a JSON string.
    pub fn decode(raw: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Decode a JSON string; undecodable input becomes a `ParseFailure` result.
    pub fn from_json(raw: &str) -> Self {
        Self::decode(raw).unwrap_or_else(|e| TransferResult::failure(e.kind(), e.to_string()))
    }
}

/// Connectivity state of the attached device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    Pending,
    Connected,
    Offline,
    Unauthorized,
}

/// Result of a device query, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub state: DeviceState,
    pub label: String,
}

impl DeviceStatus {
    /// Status shown while the first query is in flight.
    pub fn pending() -> Self {
        DeviceStatus {
            state: DeviceState::Pending,
            label: "Searching for device...".to_string(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == DeviceState::Connected
    }
}

/// One progress tick for the item in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Item path this tick belongs to
    #[serde(rename = "fileName")]
    pub item: String,

    /// Completion percentage, clamped to 0-100
    #[serde(rename = "progress")]
    pub percent: u8,

    /// Rate such as `12.5 MB/s`
    #[serde(rename = "speed")]
    pub rate_label: String,
}

/// Outcome of a whole batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Identifier of the batch run
    pub batch_id: Uuid,

    pub direction: Direction,

    /// Number of items that transferred
    pub succeeded: usize,

    /// Number of items that failed
    pub failed: usize,

    /// (display name, error detail) for each failed item
    pub failed_items: Vec<(String, String)>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchSummary {
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Text of the final notification, or `None` when nothing was attempted.
    pub fn notification(&self) -> Option<String> {
        let (verb, capitalized) = match self.direction {
            Direction::Push => ("sent", "Sent"),
            Direction::Pull => ("downloaded", "Downloaded"),
        };
        match (self.succeeded, self.failed) {
            (0, 0) => None,
            (ok, 0) => Some(format!("Successfully {} {} items!", verb, ok)),
            (0, failed) => Some(format!("{} items failed.", failed)),
            (ok, failed) => Some(format!("{} {} items. {} failed.", capitalized, ok, failed)),
        }
    }
}

/// Per-item failure notice, e.g. `Upload failed: photo.jpg`.
pub fn failure_notice(direction: Direction, item: &TransferItem) -> String {
    match direction {
        Direction::Push => format!("Upload failed: {}", item.display_name()),
        Direction::Pull => format!("Download failed: {}", item.display_name()),
    }
}
