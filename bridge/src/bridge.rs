//! Typed calls across the presentation boundary.

use engine::listing::{remote_list_args, parse_listing};
use engine::{
    list_local_dir, query_status, AppConfig, DeviceStatus, ErrorKind, ItemAction, ProcessInvoker,
    ProgressEvent, ProgressPoller, PullAction, PushAction, TransferItem, TransferResult,
};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::hub::{ProgressHub, Subscription};
use crate::picker::{DirectoryPicker, RfdPicker};

/// Entry point for a presentation layer.
///
/// Every call resolves to a value; tool failures come back as failed
/// [`TransferResult`]s. Progress for push and pull is delivered to
/// subscribers registered with [`Bridge::on_progress`].
pub struct Bridge {
    invoker: Arc<dyn ProcessInvoker>,
    config: AppConfig,
    picker: Arc<dyn DirectoryPicker>,
    hub: Arc<ProgressHub>,
    poller: ProgressPoller,
}

impl Bridge {
    pub fn new(invoker: Arc<dyn ProcessInvoker>, config: AppConfig) -> Self {
        let poller = ProgressPoller::new(config.poll_interval());
        Bridge {
            invoker,
            config,
            picker: Arc::new(RfdPicker),
            hub: ProgressHub::new(),
            poller,
        }
    }

    pub fn with_picker(mut self, picker: Arc<dyn DirectoryPicker>) -> Self {
        self.picker = picker;
        self
    }

    pub fn with_poller(mut self, poller: ProgressPoller) -> Self {
        self.poller = poller;
        self
    }

    /// Run `adb <command>` where `command` is a whitespace-separated string,
    /// e.g. `shell getprop ro.product.model`.
    pub async fn query_device_property(&self, command: &str) -> TransferResult {
        self.invoker.query(&split_args(command)).await
    }

    pub async fn query_status(&self) -> DeviceStatus {
        query_status(self.invoker.as_ref()).await
    }

    pub async fn pick_directory(&self) -> Option<PathBuf> {
        self.picker.pick_directory().await
    }

    /// Entry names of a local folder, sorted; empty when unreadable.
    pub async fn list_directory(&self, path: &Path) -> Vec<String> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || list_local_dir(&path))
            .await
            .unwrap_or_default()
    }

    /// Raw `ls` output of a device folder (the configured root by default).
    pub async fn list_device(&self, path: Option<&str>) -> TransferResult {
        let dir = path.unwrap_or(self.config.remote_dir.as_str());
        self.invoker.query(&remote_list_args(dir)).await
    }

    /// Device listing split into entry names.
    pub async fn list_device_entries(&self, path: Option<&str>) -> Result<Vec<String>, TransferResult> {
        let result = self.list_device(path).await;
        if result.success {
            Ok(parse_listing(result.data_or_empty()))
        } else {
            Err(result)
        }
    }

    /// Push `<path>/<file_name>` to the configured device folder.
    pub async fn push_file(&self, path: &Path, file_name: &str) -> TransferResult {
        let action = PushAction::new(self.invoker.clone(), path, self.config.remote_dir.clone())
            .with_poller(self.poller);
        info!(file = %file_name, "push requested");
        self.run_with_progress(&action, file_name).await
    }

    /// Pull `<remote root>/<file_name>` into the local folder `path`.
    pub async fn pull_file(&self, file_name: &str, path: &Path) -> TransferResult {
        let action = PullAction::new(self.invoker.clone(), self.config.remote_dir.clone(), path)
            .with_poller(self.poller);
        info!(file = %file_name, "pull requested");
        self.run_with_progress(&action, file_name).await
    }

    /// Run arbitrary adb arguments, e.g. `devices -l`.
    pub async fn raw_command(&self, args: &str) -> TransferResult {
        let args = split_args(args);
        if args.is_empty() {
            return TransferResult::failure(ErrorKind::ProcessFailure, "empty command");
        }
        self.invoker.query(&args).await
    }

    /// Register a progress listener; dropping the handle unsubscribes.
    pub fn on_progress<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ProgressEvent) + Send + Sync + 'static,
    {
        let subscription = self.hub.subscribe(callback);
        debug!(listeners = self.hub.listener_count(), "progress listener registered");
        subscription
    }

    async fn run_with_progress(&self, action: &dyn ItemAction, file_name: &str) -> TransferResult {
        let item = TransferItem::new(file_name);
        let (tx, rx) = mpsc::unbounded_channel();
        forward_progress(action.transfer(&item, tx), rx, &self.hub).await
    }
}

/// Drive `transfer` while publishing each progress event it emits.
async fn forward_progress<F>(
    transfer: F,
    mut rx: mpsc::UnboundedReceiver<ProgressEvent>,
    hub: &ProgressHub,
) -> TransferResult
where
    F: Future<Output = TransferResult>,
{
    tokio::pin!(transfer);
    loop {
        tokio::select! {
            result = &mut transfer => {
                // Ticks already queued still belong to this transfer.
                while let Ok(event) = rx.try_recv() {
                    hub.publish(&event);
                }
                return result;
            }
            Some(event) = rx.recv() => {
                debug!(item = %event.item, percent = event.percent, "progress");
                hub.publish(&event);
            }
        }
    }
}

/// Split a command line on whitespace, keeping double-quoted runs together.
pub fn split_args(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        args.push(current);
    }
    args
}
