//! Progress Poller: periodic size probes while one transfer runs.
//!
//! adb prints nothing useful until a push or pull finishes, so progress is
//! estimated by measuring how much of the destination file exists. Each tick
//! asks a [`SizeProbe`] for the current size and emits a [`ProgressEvent`].
//! A tick whose probe fails (destination not created yet) or reads zero is
//! skipped silently.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

use crate::error::EngineError;
use crate::invoker::ProcessInvoker;
use crate::listing::{parse_size, remote_size_args};
use crate::model::ProgressEvent;

/// Default probe period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Channel on which progress ticks are delivered.
pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;

/// Measures how many bytes of the destination exist right now.
#[async_trait]
pub trait SizeProbe: Send + Sync {
    async fn current_size(&self) -> Result<u64, EngineError>;
}

/// Reads a file size from the local filesystem (pull destination).
pub struct LocalFileProbe {
    path: PathBuf,
}

impl LocalFileProbe {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        LocalFileProbe { path: path.into() }
    }
}

#[async_trait]
impl SizeProbe for LocalFileProbe {
    async fn current_size(&self) -> Result<u64, EngineError> {
        tokio::fs::metadata(&self.path)
            .await
            .map(|metadata| metadata.len())
            .map_err(|e| EngineError::Probe {
                reason: format!("{}: {}", self.path.display(), e),
            })
    }
}

/// Asks the device for a file size with a separate adb call (push destination).
pub struct RemoteStatProbe {
    invoker: Arc<dyn ProcessInvoker>,
    remote_path: String,
}

impl RemoteStatProbe {
    pub fn new(invoker: Arc<dyn ProcessInvoker>, remote_path: impl Into<String>) -> Self {
        RemoteStatProbe {
            invoker,
            remote_path: remote_path.into(),
        }
    }
}

#[async_trait]
impl SizeProbe for RemoteStatProbe {
    async fn current_size(&self) -> Result<u64, EngineError> {
        let result = self.invoker.query(&remote_size_args(&self.remote_path)).await;
        if !result.success {
            return Err(EngineError::Probe {
                reason: result.detail.unwrap_or_default(),
            });
        }
        parse_size(result.data_or_empty()).ok_or_else(|| EngineError::Probe {
            reason: format!("unexpected size output for {}", self.remote_path),
        })
    }
}

/// Percentage and rate label for one tick.
///
/// Returns `None` when nothing can be said yet: zero bytes on the
/// destination, or an unknown expected total.
pub fn compute_progress(current: u64, expected_total: u64, elapsed: Duration) -> Option<(u8, String)> {
    if current == 0 || expected_total == 0 {
        return None;
    }
    let percent = (current as f64 / expected_total as f64 * 100.0)
        .round()
        .clamp(0.0, 100.0) as u8;
    Some((percent, format_rate(current, elapsed)))
}

/// Megabytes per second with one decimal, elapsed floored at 0.1s.
pub fn format_rate(bytes: u64, elapsed: Duration) -> String {
    let megabytes = bytes as f64 / BYTES_PER_MB;
    let seconds = elapsed.as_secs_f64().max(0.1);
    format!("{:.1} MB/s", megabytes / seconds)
}

/// Starts pollers with a fixed period.
#[derive(Debug, Clone, Copy)]
pub struct ProgressPoller {
    interval: Duration,
}

impl Default for ProgressPoller {
    fn default() -> Self {
        ProgressPoller::new(DEFAULT_POLL_INTERVAL)
    }
}

impl ProgressPoller {
    pub fn new(interval: Duration) -> Self {
        ProgressPoller { interval }
    }

    /// Begin polling for `item`. The first probe runs one period after start.
    pub fn start(
        &self,
        item: impl Into<String>,
        expected_total: u64,
        probe: Arc<dyn SizeProbe>,
        sink: ProgressSender,
    ) -> PollerHandle {
        let item = item.into();
        let period = self.interval;
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = time::interval_at(started + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut emitted = 0usize;

            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        // A stop request abandons an in-flight probe.
                        let probed = tokio::select! {
                            biased;
                            _ = &mut stop_rx => break,
                            probed = probe.current_size() => probed,
                        };
                        let size = match probed {
                            Ok(size) => size,
                            Err(e) => {
                                debug!(item = %item, error = %e, "probe tick skipped");
                                continue;
                            }
                        };
                        let Some((percent, rate_label)) =
                            compute_progress(size, expected_total, started.elapsed())
                        else {
                            continue;
                        };
                        let event = ProgressEvent {
                            item: item.clone(),
                            percent,
                            rate_label,
                        };
                        if sink.send(event).is_err() {
                            // Nobody is listening any more.
                            break;
                        }
                        emitted += 1;
                    }
                }
            }
            emitted
        });

        PollerHandle {
            stop: Some(stop_tx),
            task: Some(task),
        }
    }
}

/// Running poller. Stopping consumes the handle, so it happens at most once.
///
/// Dropping the handle without calling [`PollerHandle::stop`] aborts the
/// timer task.
pub struct PollerHandle {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<usize>>,
}

impl PollerHandle {
    /// Stop the timer and wait until no probe is running. A probe still in
    /// flight is dropped rather than awaited.
    ///
    /// Returns the number of events emitted.
    pub async fn stop(mut self) -> usize {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        match self.task.take() {
            Some(task) => task.await.unwrap_or(0),
            None => 0,
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const MB: u64 = 1024 * 1024;

    /// Replays scripted sizes, then fails.
    struct ScriptedProbe {
        sizes: Mutex<VecDeque<Result<u64, EngineError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedProbe {
        fn new(sizes: Vec<Result<u64, EngineError>>) -> Arc<Self> {
            Arc::new(ScriptedProbe {
                sizes: Mutex::new(sizes.into()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SizeProbe for ScriptedProbe {
        async fn current_size(&self) -> Result<u64, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.sizes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(EngineError::Probe { reason: "exhausted".into() }))
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_compute_progress() {
        let (percent, rate) = compute_progress(40 * MB, 100 * MB, Duration::from_secs(2)).unwrap();
        assert_eq!(percent, 40);
        assert_eq!(rate, "20.0 MB/s");
    }

    #[test]
    fn test_compute_progress_clamps_and_rounds() {
        assert_eq!(compute_progress(150, 100, Duration::from_secs(1)).unwrap().0, 100);
        assert_eq!(compute_progress(1, 3, Duration::from_secs(1)).unwrap().0, 33);
        assert_eq!(compute_progress(2, 3, Duration::from_secs(1)).unwrap().0, 67);
    }

    #[test]
    fn test_compute_progress_skips_zero_and_unknown_total() {
        assert!(compute_progress(0, 100, Duration::from_secs(1)).is_none());
        assert!(compute_progress(10, 0, Duration::from_secs(1)).is_none());
    }

    #[test]
    fn test_rate_floors_elapsed() {
        assert_eq!(format_rate(MB, Duration::from_millis(0)), "10.0 MB/s");
        assert_eq!(format_rate(3 * MB, Duration::from_secs(2)), "1.5 MB/s");
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_ticks_report_forty_then_forty_five() {
        let probe = ScriptedProbe::new(vec![Ok(40 * MB), Ok(45 * MB)]);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = ProgressPoller::default().start("movie.mp4", 100 * MB, probe.clone(), tx);
        time::sleep(Duration::from_millis(1100)).await;
        let emitted = handle.stop().await;

        let events = drain(&mut rx);
        assert_eq!(emitted, 2);
        assert_eq!(events.iter().map(|e| e.percent).collect::<Vec<_>>(), vec![40, 45]);
        assert!(events.iter().all(|e| e.percent <= 100 && e.item == "movie.mp4"));
        assert!(events.iter().all(|e| e.rate_label.ends_with(" MB/s")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_and_zero_probes_are_skipped() {
        let probe = ScriptedProbe::new(vec![
            Err(EngineError::Probe { reason: "No such file".into() }),
            Ok(0),
            Ok(50 * MB),
        ]);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = ProgressPoller::default().start("a.bin", 100 * MB, probe.clone(), tx);
        time::sleep(Duration::from_millis(1600)).await;
        handle.stop().await;

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].percent, 50);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_probe_runs_after_stop() {
        let probe = ScriptedProbe::new((0..10).map(|_| Ok(MB)).collect());
        let (tx, _rx) = mpsc::unbounded_channel();

        let handle = ProgressPoller::new(Duration::from_millis(100)).start("x", 10 * MB, probe.clone(), tx);
        time::sleep(Duration::from_millis(250)).await;
        handle.stop().await;
        let calls_at_stop = probe.calls.load(Ordering::SeqCst);

        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), calls_at_stop);
        assert_eq!(calls_at_stop, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_aborts_timer() {
        let probe = ScriptedProbe::new((0..10).map(|_| Ok(MB)).collect());
        let (tx, _rx) = mpsc::unbounded_channel();

        let handle = ProgressPoller::new(Duration::from_millis(100)).start("x", 10 * MB, probe.clone(), tx);
        drop(handle);
        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }

    /// Never answers.
    struct StuckProbe {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SizeProbe for StuckProbe {
        async fn current_size(&self) -> Result<u64, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_abandons_stuck_probe() {
        let probe = Arc::new(StuckProbe { calls: AtomicUsize::new(0) });
        let (tx, _rx) = mpsc::unbounded_channel();

        let handle = ProgressPoller::new(Duration::from_millis(100)).start("x", 10 * MB, probe.clone(), tx);
        time::sleep(Duration::from_millis(250)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);

        let emitted = time::timeout(Duration::from_secs(1), handle.stop())
            .await
            .expect("stop waited on a stuck probe");
        assert_eq!(emitted, 0);
    }

    #[tokio::test]
    async fn test_local_probe_reads_size() {
        let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("part.bin");
        std::fs::write(&path, vec![0u8; 2048]).unwrap();

        assert_eq!(LocalFileProbe::new(&path).current_size().await.unwrap(), 2048);
        assert!(LocalFileProbe::new(dir.path().join("absent")).current_size().await.is_err());
    }
}
