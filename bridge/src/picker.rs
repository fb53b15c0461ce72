use async_trait::async_trait;
use std::path::PathBuf;
use tracing::warn;

/// Asks the user for a local folder.
#[async_trait]
pub trait DirectoryPicker: Send + Sync {
    /// `None` when the dialog was cancelled.
    async fn pick_directory(&self) -> Option<PathBuf>;
}

/// Native folder dialog.
#[derive(Debug, Default, Clone, Copy)]
pub struct RfdPicker;

#[async_trait]
impl DirectoryPicker for RfdPicker {
    async fn pick_directory(&self) -> Option<PathBuf> {
        // The dialog blocks until the user answers.
        match tokio::task::spawn_blocking(|| rfd::FileDialog::new().pick_folder()).await {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "folder dialog task failed");
                None
            }
        }
    }
}

/// Always answers with the same folder.
#[derive(Debug, Clone, Default)]
pub struct FixedPicker {
    path: Option<PathBuf>,
}

impl FixedPicker {
    pub fn new(path: Option<PathBuf>) -> Self {
        FixedPicker { path }
    }
}

#[async_trait]
impl DirectoryPicker for FixedPicker {
    async fn pick_directory(&self) -> Option<PathBuf> {
        self.path.clone()
    }
}
