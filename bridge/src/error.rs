use thiserror::Error;

/// Errors raised by the bridge itself.
///
/// Failures of individual operations are answered with a failed
/// `TransferResult`; only transport problems end up here.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("malformed request: {0}")]
    MalformedRequest(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("output channel closed")]
    ChannelClosed,
}
