//! # Rocket Sync Bridge
//!
//! The boundary between the engine and a presentation layer.
//!
//! - **bridge**: typed async calls (device queries, listings, push, pull)
//! - **hub**: progress subscriptions that stop on drop
//! - **picker**: folder selection seam, backed by a native dialog
//! - **protocol** / **server**: the same calls as line-delimited JSON

pub mod bridge;
pub mod error;
pub mod hub;
pub mod picker;
pub mod protocol;
pub mod server;

pub use bridge::{split_args, Bridge};
pub use error::BridgeError;
pub use hub::{ProgressHub, Subscription};
pub use picker::{DirectoryPicker, FixedPicker, RfdPicker};
pub use protocol::{dispatch, handle_line, BridgeRequest, BridgeResponse, ProgressNotice, RequestEnvelope};
pub use server::{serve, serve_stdio};
