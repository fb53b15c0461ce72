//! Line-delimited JSON server.
//!
//! Requests are handled one at a time, in arrival order. Responses and
//! progress notices share a single writer task, so lines never interleave.

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bridge::Bridge;
use crate::error::BridgeError;
use crate::protocol::{handle_line, ProgressNotice};

/// Serve requests from stdin, answering on stdout.
pub async fn serve_stdio(bridge: &Bridge) -> Result<(), BridgeError> {
    serve(bridge, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Serve requests from `reader` until it closes.
pub async fn serve<R, W>(bridge: &Bridge, reader: R, writer: W) -> Result<(), BridgeError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (out_tx, out_rx) = mpsc::unbounded_channel::<String>();
    let writer_task = tokio::spawn(write_lines(writer, out_rx));

    let progress_tx = out_tx.clone();
    let subscription = bridge.on_progress(move |event| {
        if let Some(line) = encode(&ProgressNotice::from(event)) {
            let _ = progress_tx.send(line);
        }
    });

    info!("bridge server listening");
    let mut lines = BufReader::new(reader).lines();
    let mut handled = 0usize;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let response = handle_line(bridge, line).await;
        if let Some(encoded) = encode(&response) {
            out_tx.send(encoded).map_err(|_| BridgeError::ChannelClosed)?;
        }
        handled += 1;
    }

    debug!(handled, "input closed");
    drop(subscription);
    drop(out_tx);
    match writer_task.await {
        Ok(result) => result,
        Err(e) => {
            warn!(error = %e, "writer task failed");
            Err(BridgeError::ChannelClosed)
        }
    }
}

async fn write_lines<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<String>) -> Result<(), BridgeError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}

fn encode<T: Serialize>(value: &T) -> Option<String> {
    match serde_json::to_string(value) {
        Ok(line) => Some(line),
        Err(e) => {
            warn!(error = %e, "could not encode output line");
            None
        }
    }
}
