//! Error types for the sync engine.
//!
//! `EngineError` covers faults that prevent an invocation from producing
//! output at all (missing tool, spawn failure, unreadable config). Failures
//! reported *by* the tool are not errors here: they are folded into a failed
//! [`TransferResult`](crate::model::TransferResult) and recorded on the item.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::model::{ErrorKind, ItemState};

#[derive(Debug, Error)]
pub enum EngineError {
    /// The configured adb executable does not exist
    #[error("adb executable is missing: {}", path.display())]
    ToolNotFound { path: PathBuf },

    /// The OS refused to start the process
    #[error("failed to start {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading pipes or local files failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Path cannot be passed to the tool
    #[error("invalid path: {} ({reason})", path.display())]
    InvalidPath { path: PathBuf, reason: String },

    /// An item was asked to make an illegal state change
    #[error("illegal transition for {path}: {from:?} -> {to:?}")]
    InvalidTransition {
        path: String,
        from: ItemState,
        to: ItemState,
    },

    /// JSON could not be decoded
    #[error("malformed JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// A size probe could not read its target
    #[error("size probe failed: {reason}")]
    Probe { reason: String },

    /// Configuration file could not be read or decoded
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl EngineError {
    /// Map to the wire-level failure taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse(_) => ErrorKind::ParseFailure,
            Self::Probe { .. } => ErrorKind::ProbeFailure,
            _ => ErrorKind::ProcessFailure,
        }
    }
}
