//! # Rocket Sync Engine - adb Transfer Library
//!
//! A headless engine for moving files between a computer and an Android
//! device by driving the `adb` command-line tool.
//! Designed as the foundation for multiple front ends (CLI, JSON bridge, GUI).
//!
//! ## Overview
//!
//! The engine wraps adb invocations and turns their text output into
//! structured results. It features:
//! - Process invocation with captured or streamed output
//! - Progress estimation by polling the destination size
//! - Sequential batch transfers with per-item error isolation
//! - Device status classification
//! - Progress reporting via callbacks (decoupled from UI technology)
//!
//! ## Basic Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use engine::{transfer_all, AdbInvoker, AppConfig, Direction, PushAction, TransferSession};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load()?;
//! let adb = Arc::new(AdbInvoker::from_config(&config));
//!
//! // Build a session from a local listing
//! let local = std::path::Path::new("/home/me/Pictures");
//! let mut session = TransferSession::from_listing(Direction::Push, engine::list_local_dir(local));
//!
//! // Push every selected item, one after another
//! let action = PushAction::new(adb, local, config.remote_dir.clone());
//! let summary = transfer_all(&mut session, &action, None).await;
//!
//! if let Some(text) = summary.notification() {
//!     println!("{}", text);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (TransferItem, TransferResult, DeviceStatus)
//! - **error**: Error types and handling
//! - **config**: Persistent settings and adb path resolution
//! - **invoker**: Process Invoker seam and the real adb implementation
//! - **classify**: Success/failure detection on tool output
//! - **listing**: Directory listings and device shell commands
//! - **poller**: Progress Poller and size probes
//! - **session**: Item list and state transitions
//! - **orchestrator**: Sequential batch transfers
//! - **transfer**: Push and pull item actions
//! - **device**: Device/Status Reporter
//! - **progress**: Progress callback trait

pub mod model;
pub mod error;
pub mod config;
pub mod invoker;
pub mod classify;
pub mod listing;
pub mod poller;
pub mod session;
pub mod orchestrator;
pub mod transfer;
pub mod device;
pub mod progress;

// Re-export main types and functions
pub use model::{
    failure_notice, BatchSummary, DeviceState, DeviceStatus, Direction, ErrorKind, ItemState,
    ProgressEvent, TransferItem, TransferResult,
};
pub use error::EngineError;
pub use config::{resolve_adb_path, AppConfig, DetectionPolicy};
pub use invoker::{AdbInvoker, ProcessInvoker, StreamingInvocation, ToolOutput};
pub use classify::{classify, InvocationKind};
pub use listing::{list_local_dir, parse_listing};
pub use poller::{LocalFileProbe, ProgressPoller, ProgressSender, RemoteStatProbe, SizeProbe};
pub use session::TransferSession;
pub use orchestrator::{transfer_all, ItemAction};
pub use transfer::{run_transfer, PullAction, PushAction};
pub use device::query_status;
pub use progress::ProgressCallback;
