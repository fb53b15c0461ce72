//! adb push and pull as item actions.
//!
//! Both directions follow the same shape: work out the expected size, spawn
//! the streaming invocation, poll the destination until the process exits,
//! stop the poller, then classify the output.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::classify::{classify, InvocationKind};
use crate::invoker::ProcessInvoker;
use crate::listing::remote_join;
use crate::model::{TransferItem, TransferResult};
use crate::orchestrator::ItemAction;
use crate::poller::{LocalFileProbe, ProgressPoller, ProgressSender, RemoteStatProbe, SizeProbe};

/// Run one transfer invocation under a progress poller.
///
/// The poller starts only once the process has spawned and is stopped
/// exactly once, when the process exits.
pub async fn run_transfer(
    invoker: &dyn ProcessInvoker,
    args: &[String],
    poller: &ProgressPoller,
    item: &str,
    expected_total: u64,
    probe: Arc<dyn SizeProbe>,
    progress: ProgressSender,
) -> TransferResult {
    let invocation = match invoker.invoke_streaming(args) {
        Ok(invocation) => invocation,
        Err(e) => return TransferResult::failure(e.kind(), e.to_string()),
    };

    let handle = poller.start(item, expected_total, probe, progress);
    let completion = invocation.wait().await;
    let ticks = handle.stop().await;
    debug!(item = %item, ticks, "transfer process exited");

    match completion {
        Ok(output) => classify(&output, InvocationKind::Transfer, invoker.detection()),
        Err(e) => TransferResult::failure(e.kind(), e.to_string()),
    }
}

/// Sends items from a local directory to a device directory.
pub struct PushAction {
    invoker: Arc<dyn ProcessInvoker>,
    local_dir: PathBuf,
    remote_dir: String,
    poller: ProgressPoller,
}

impl PushAction {
    pub fn new(invoker: Arc<dyn ProcessInvoker>, local_dir: impl Into<PathBuf>, remote_dir: impl Into<String>) -> Self {
        PushAction {
            invoker,
            local_dir: local_dir.into(),
            remote_dir: remote_dir.into(),
            poller: ProgressPoller::default(),
        }
    }

    pub fn with_poller(mut self, poller: ProgressPoller) -> Self {
        self.poller = poller;
        self
    }

    /// `adb push <local> <remote_dir>`
    pub fn args(&self, item: &TransferItem) -> Vec<String> {
        vec![
            "push".to_string(),
            self.local_dir.join(&item.path).to_string_lossy().into_owned(),
            self.remote_dir.clone(),
        ]
    }
}

/// Size of a regular local file; directories and missing paths give 0.
async fn local_file_size(path: &Path) -> u64 {
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => metadata.len(),
        _ => 0,
    }
}

#[async_trait]
impl ItemAction for PushAction {
    async fn transfer(&self, item: &TransferItem, progress: ProgressSender) -> TransferResult {
        let expected = local_file_size(&self.local_dir.join(&item.path)).await;
        let remote_path = remote_join(&self.remote_dir, item.display_name());
        let probe = Arc::new(RemoteStatProbe::new(self.invoker.clone(), remote_path));

        run_transfer(
            self.invoker.as_ref(),
            &self.args(item),
            &self.poller,
            &item.path,
            expected,
            probe,
            progress,
        )
        .await
    }
}

/// Downloads items from a device directory into a local directory.
pub struct PullAction {
    invoker: Arc<dyn ProcessInvoker>,
    remote_dir: String,
    local_dir: PathBuf,
    poller: ProgressPoller,
}

impl PullAction {
    pub fn new(invoker: Arc<dyn ProcessInvoker>, remote_dir: impl Into<String>, local_dir: impl Into<PathBuf>) -> Self {
        PullAction {
            invoker,
            remote_dir: remote_dir.into(),
            local_dir: local_dir.into(),
            poller: ProgressPoller::default(),
        }
    }

    pub fn with_poller(mut self, poller: ProgressPoller) -> Self {
        self.poller = poller;
        self
    }

    /// `adb pull <remote_dir>/<item> <local_dir>`
    pub fn args(&self, item: &TransferItem) -> Vec<String> {
        vec![
            "pull".to_string(),
            remote_join(&self.remote_dir, &item.path),
            self.local_dir.to_string_lossy().into_owned(),
        ]
    }
}

#[async_trait]
impl ItemAction for PullAction {
    async fn transfer(&self, item: &TransferItem, progress: ProgressSender) -> TransferResult {
        let remote_path = remote_join(&self.remote_dir, &item.path);
        // An unknown size only disables the percentage.
        let expected = RemoteStatProbe::new(self.invoker.clone(), remote_path)
            .current_size()
            .await
            .unwrap_or(0);
        let probe = Arc::new(LocalFileProbe::new(self.local_dir.join(item.display_name())));

        run_transfer(
            self.invoker.as_ref(),
            &self.args(item),
            &self.poller,
            &item.path,
            expected,
            probe,
            progress,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::invoker::{StreamingInvocation, ToolOutput};
    use crate::model::ErrorKind;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Answers size queries with a fixed value and completes transfers with
    /// a scripted output after a delay.
    struct FakeAdb {
        remote_size: u64,
        transfer_output: ToolOutput,
        delay: Duration,
        streaming_calls: Mutex<Vec<Vec<String>>>,
        fail_spawn: bool,
    }

    impl FakeAdb {
        fn new(transfer_output: ToolOutput) -> Self {
            FakeAdb {
                remote_size: 0,
                transfer_output,
                delay: Duration::from_millis(0),
                streaming_calls: Mutex::new(Vec::new()),
                fail_spawn: false,
            }
        }
    }

    #[async_trait]
    impl ProcessInvoker for FakeAdb {
        async fn invoke(&self, _args: &[String]) -> Result<ToolOutput, EngineError> {
            Ok(ToolOutput::success(format!("{}\n", self.remote_size)))
        }

        fn invoke_streaming(&self, args: &[String]) -> Result<StreamingInvocation, EngineError> {
            if self.fail_spawn {
                return Err(EngineError::ToolNotFound { path: "adb".into() });
            }
            self.streaming_calls.lock().unwrap().push(args.to_vec());
            let output = self.transfer_output.clone();
            let delay = self.delay;
            Ok(StreamingInvocation::spawn("adb", async move {
                tokio::time::sleep(delay).await;
                Ok(output)
            }))
        }
    }

    #[tokio::test]
    async fn test_push_arguments_and_success() {
        let adb = Arc::new(FakeAdb::new(ToolOutput::success(
            "photo.jpg: 1 file pushed, 0 skipped. 3.2 MB/s (1024 bytes in 0.001s)\n",
        )));
        let action = PushAction::new(adb.clone(), "/home/me/Pictures", "/sdcard");
        let (tx, _rx) = mpsc::unbounded_channel();

        let result = action.transfer(&TransferItem::new("photo.jpg"), tx).await;

        assert!(result.success);
        let calls = adb.streaming_calls.lock().unwrap();
        assert_eq!(calls[0][0], "push");
        assert!(calls[0][1].ends_with("photo.jpg"));
        assert_eq!(calls[0][2], "/sdcard");
    }

    #[tokio::test]
    async fn test_pull_arguments_and_failure() {
        let adb = Arc::new(FakeAdb::new(ToolOutput::failure(1, "error: device offline")));
        let action = PullAction::new(adb.clone(), "/sdcard", "/tmp/out");
        let (tx, _rx) = mpsc::unbounded_channel();

        let result = action.transfer(&TransferItem::new("DCIM/x.mp4"), tx).await;

        assert!(!result.success);
        assert_eq!(result.error, Some(ErrorKind::Offline));
        let calls = adb.streaming_calls.lock().unwrap();
        assert_eq!(calls[0], vec!["pull", "/sdcard/DCIM/x.mp4", "/tmp/out"]);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_a_failed_result() {
        let mut adb = FakeAdb::new(ToolOutput::success(""));
        adb.fail_spawn = true;
        let action = PushAction::new(Arc::new(adb), "/tmp", "/sdcard");
        let (tx, _rx) = mpsc::unbounded_channel();

        let result = action.transfer(&TransferItem::new("a.txt"), tx).await;

        assert!(!result.success);
        assert_eq!(result.error, Some(ErrorKind::ProcessFailure));
        assert!(result.detail.unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn test_pull_reports_progress_from_local_file() {
        let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        std::fs::write(dir.path().join("x.mp4"), vec![0u8; 400]).unwrap();

        let mut adb = FakeAdb::new(ToolOutput::success("1 file pulled, 0 skipped."));
        adb.remote_size = 1000;
        adb.delay = Duration::from_millis(200);
        let action = PullAction::new(Arc::new(adb), "/sdcard/DCIM", dir.path())
            .with_poller(ProgressPoller::new(Duration::from_millis(50)));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let result = action.transfer(&TransferItem::new("x.mp4"), tx).await;

        assert!(result.success);
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(!events.is_empty());
        assert!(events.iter().all(|e| e.percent == 40 && e.item == "x.mp4"));
    }

    /// Never answers, like a `shell stat` against a wedged device.
    struct StuckProbe;

    #[async_trait]
    impl SizeProbe for StuckProbe {
        async fn current_size(&self) -> Result<u64, EngineError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_stuck_probe_does_not_hold_back_completion() {
        let mut adb = FakeAdb::new(ToolOutput::success("1 file pushed, 0 skipped."));
        adb.delay = Duration::from_millis(200);
        let poller = ProgressPoller::new(Duration::from_millis(20));
        let (tx, _rx) = mpsc::unbounded_channel();

        let result = tokio::time::timeout(
            Duration::from_secs(3),
            run_transfer(&adb, &["push".to_string()], &poller, "a.bin", 1000, Arc::new(StuckProbe), tx),
        )
        .await
        .expect("transfer stayed blocked on the size probe");

        assert!(result.success);
    }
}
