//! Process Invoker: one external `adb` process per call.
//!
//! Two call shapes:
//! - [`ProcessInvoker::invoke`] waits for the process and returns its output.
//!   Used for property queries, listings and size probes.
//! - [`ProcessInvoker::invoke_streaming`] returns immediately with a handle
//!   whose stdout/stderr buffers fill while the process runs. Used for
//!   push/pull so a progress poller can run alongside.
//!
//! No process is reused across calls.

use async_trait::async_trait;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::classify::{classify, InvocationKind};
use crate::config::{resolve_adb_path, AppConfig, DetectionPolicy};
use crate::error::EngineError;
use crate::model::TransferResult;

/// Captured output of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code; `None` if the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Successful exit with the given stdout.
    pub fn success(stdout: impl Into<String>) -> Self {
        ToolOutput {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed exit with the given stderr.
    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        ToolOutput {
            exit_code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// stdout followed by stderr.
    pub fn combined(&self) -> String {
        if self.stdout.is_empty() {
            self.stderr.clone()
        } else if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout.trim_end(), self.stderr)
        }
    }

    /// Trimmed stderr, or trimmed stdout when stderr is empty.
    pub fn error_detail(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

type SharedBuffer = Arc<Mutex<Vec<u8>>>;

fn snapshot(buffer: &SharedBuffer) -> String {
    let guard = buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    String::from_utf8_lossy(&guard).into_owned()
}

/// Handle to a running process started by [`ProcessInvoker::invoke_streaming`].
pub struct StreamingInvocation {
    program: PathBuf,
    stdout: SharedBuffer,
    stderr: SharedBuffer,
    completion: JoinHandle<Result<ToolOutput, EngineError>>,
}

impl StreamingInvocation {
    /// Wrap an arbitrary completion future; buffers stay empty.
    ///
    /// Lets test doubles stand in for a real process.
    pub fn spawn<F>(program: impl Into<PathBuf>, completion: F) -> Self
    where
        F: Future<Output = Result<ToolOutput, EngineError>> + Send + 'static,
    {
        StreamingInvocation {
            program: program.into(),
            stdout: SharedBuffer::default(),
            stderr: SharedBuffer::default(),
            completion: tokio::spawn(completion),
        }
    }

    /// Standard output received so far.
    pub fn stdout_so_far(&self) -> String {
        snapshot(&self.stdout)
    }

    /// Standard error received so far.
    pub fn stderr_so_far(&self) -> String {
        snapshot(&self.stderr)
    }

    /// Wait for the process to exit. This is the completion event.
    pub async fn wait(self) -> Result<ToolOutput, EngineError> {
        match self.completion.await {
            Ok(result) => result,
            Err(join_error) => Err(EngineError::Io {
                path: self.program,
                source: io::Error::new(io::ErrorKind::Other, join_error.to_string()),
            }),
        }
    }
}

/// Seam between the engine and the external tool.
#[async_trait]
pub trait ProcessInvoker: Send + Sync {
    /// Run to completion and capture output.
    async fn invoke(&self, args: &[String]) -> Result<ToolOutput, EngineError>;

    /// Start the process and return without waiting.
    fn invoke_streaming(&self, args: &[String]) -> Result<StreamingInvocation, EngineError>;

    /// Output rules applied by [`ProcessInvoker::query`].
    fn detection(&self) -> DetectionPolicy {
        DetectionPolicy::ExitCode
    }

    /// Run a simple query and normalize the outcome.
    ///
    /// Never fails: spawn errors become a failed [`TransferResult`].
    async fn query(&self, args: &[String]) -> TransferResult {
        match self.invoke(args).await {
            Ok(output) => classify(&output, InvocationKind::Query, self.detection()),
            Err(e) => TransferResult::failure(e.kind(), e.to_string()),
        }
    }
}

/// Runs the real adb executable.
#[derive(Debug, Clone)]
pub struct AdbInvoker {
    program: PathBuf,
    base_args: Vec<String>,
    detection: DetectionPolicy,
}

impl AdbInvoker {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        AdbInvoker {
            program: program.into(),
            base_args: Vec::new(),
            detection: DetectionPolicy::ExitCode,
        }
    }

    /// Build from configuration: resolves the executable and device serial.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut invoker = AdbInvoker::new(resolve_adb_path(config.adb_path.as_deref()))
            .with_detection(config.detection);
        if let Some(serial) = config.serial.as_deref().filter(|s| !s.is_empty()) {
            invoker.base_args = vec!["-s".to_string(), serial.to_string()];
        }
        invoker
    }

    /// Arguments placed before every call's own arguments.
    pub fn with_base_args(mut self, args: Vec<String>) -> Self {
        self.base_args = args;
        self
    }

    pub fn with_detection(mut self, detection: DetectionPolicy) -> Self {
        self.detection = detection;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.base_args)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        debug!(program = %self.program.display(), ?args, "spawning adb");
        cmd
    }

    fn spawn_error(&self, source: io::Error) -> EngineError {
        if source.kind() == io::ErrorKind::NotFound {
            EngineError::ToolNotFound {
                path: self.program.clone(),
            }
        } else {
            EngineError::Spawn {
                program: self.program.clone(),
                source,
            }
        }
    }
}

async fn pump<R>(mut reader: R, sink: SharedBuffer) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; 4096];
    loop {
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            return Ok(());
        }
        sink.lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend_from_slice(&chunk[..read]);
    }
}

#[async_trait]
impl ProcessInvoker for AdbInvoker {
    async fn invoke(&self, args: &[String]) -> Result<ToolOutput, EngineError> {
        let output = self
            .command(args)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        Ok(ToolOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn invoke_streaming(&self, args: &[String]) -> Result<StreamingInvocation, EngineError> {
        let mut child = self
            .command(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = SharedBuffer::default();
        let stderr = SharedBuffer::default();
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let out_sink = stdout.clone();
        let err_sink = stderr.clone();
        let program = self.program.clone();

        let completion = tokio::spawn(async move {
            let out_task = stdout_pipe.map(|pipe| tokio::spawn(pump(pipe, out_sink.clone())));
            let err_task = stderr_pipe.map(|pipe| tokio::spawn(pump(pipe, err_sink.clone())));

            let status = child.wait().await.map_err(|e| EngineError::Io {
                path: program.clone(),
                source: e,
            })?;

            // Drain what is left in the pipes after exit.
            for task in [out_task, err_task].into_iter().flatten() {
                let _ = task.await;
            }

            Ok::<ToolOutput, EngineError>(ToolOutput {
                exit_code: status.code(),
                stdout: snapshot(&out_sink),
                stderr: snapshot(&err_sink),
            })
        });

        Ok(StreamingInvocation {
            program: self.program.clone(),
            stdout,
            stderr,
            completion,
        })
    }

    fn detection(&self) -> DetectionPolicy {
        self.detection
    }
}
