//! Turning raw tool output into a [`TransferResult`].
//!
//! adb reports most outcomes as free text, so the rules here are a
//! compatibility contract with its output format. See [`DetectionPolicy`]
//! for the two rule sets.

use tracing::warn;

use crate::config::DetectionPolicy;
use crate::invoker::ToolOutput;
use crate::model::{ErrorKind, TransferResult};

/// Marker adb prints in the summary line of a finished push or pull.
pub const TRANSFER_DONE_MARKER: &str = "0 skipped";

/// What kind of call produced the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationKind {
    /// Property query, listing, stat, raw command
    Query,
    /// `push` or `pull`
    Transfer,
}

/// Classify one finished invocation.
pub fn classify(output: &ToolOutput, kind: InvocationKind, policy: DetectionPolicy) -> TransferResult {
    let failed = match policy {
        DetectionPolicy::Legacy => legacy_failed(output, kind),
        DetectionPolicy::ExitCode => exit_code_failed(output, kind),
    };

    if failed {
        failure_from_output(output)
    } else {
        TransferResult::ok(output.stdout.clone())
    }
}

/// Build the failed result for output already known to be a failure.
pub fn failure_from_output(output: &ToolOutput) -> TransferResult {
    let detail = output.error_detail();
    let detail = if detail.is_empty() {
        match output.exit_code {
            Some(code) => format!("adb exited with status {}", code),
            None => "adb was terminated by a signal".to_string(),
        }
    } else {
        detail
    };
    TransferResult::failure(ErrorKind::classify(&detail), detail)
}

fn legacy_failed(output: &ToolOutput, kind: InvocationKind) -> bool {
    if output.exit_code != Some(0) {
        return true;
    }
    let combined = output.combined();
    let lowered = combined.to_lowercase();
    if lowered.contains("error") || lowered.contains("failed") {
        return true;
    }
    kind == InvocationKind::Transfer && !combined.contains(TRANSFER_DONE_MARKER)
}

fn exit_code_failed(output: &ToolOutput, kind: InvocationKind) -> bool {
    if output.exit_code != Some(0) {
        return true;
    }
    let combined = output.combined();
    if has_error_line(&combined) {
        return true;
    }
    if kind == InvocationKind::Transfer && !combined.contains(TRANSFER_DONE_MARKER) {
        warn!(
            stdout = %output.stdout.trim(),
            "transfer exited cleanly without a completion summary"
        );
    }
    false
}

/// True when some line *starts* with an adb error prefix.
///
/// File names appear mid-line in adb output, so a file called
/// `failed-upload.log` does not trip this check.
pub fn has_error_line(text: &str) -> bool {
    text.lines().any(|line| {
        let line = line.trim_start().to_lowercase();
        line.starts_with("error:") || line.starts_with("adb: error") || line.starts_with("adb: failed")
    })
}
