//! Rocket Sync - Command-line interface for the adb transfer engine.
//!
//! This is a simple CLI for scripting and manual use of the engine.
//! It provides argument parsing and progress reporting to stderr; `serve`
//! exposes the JSON bridge on stdin/stdout.

use bridge::{serve_stdio, Bridge, FixedPicker};
use clap::{Parser, Subcommand};
use engine::{
    config::{default_config_path, AppConfig},
    failure_notice, list_local_dir,
    listing::{parse_listing, remote_list_args},
    model::{BatchSummary, ItemState, ProgressEvent, TransferItem, TransferResult},
    progress::ProgressCallback,
    query_status, transfer_all, AdbInvoker, DetectionPolicy, Direction, ItemAction, ProcessInvoker,
    ProgressPoller, PullAction, PushAction, TransferSession,
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Rocket Sync - move files between this computer and an Android device
#[derive(Parser, Debug)]
#[command(name = "rocket-sync")]
#[command(version = "0.1.0")]
#[command(about = "Push and pull files over adb with progress tracking")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to the adb executable
    #[arg(long, global = true, value_name = "PATH")]
    adb: Option<PathBuf>,

    /// Device serial, when more than one device is attached
    #[arg(long, global = true, value_name = "SERIAL")]
    serial: Option<String>,

    /// Device folder to list, push into and pull from
    #[arg(long, global = true, value_name = "DIR")]
    remote_dir: Option<String>,

    /// Use the original substring-based success detection
    #[arg(long, global = true)]
    legacy_detection: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the connected device
    Status,

    /// List a local folder, or the device folder with --device
    Ls {
        /// Folder to list
        path: Option<String>,

        /// List the device instead of this computer
        #[arg(long)]
        device: bool,
    },

    /// Send entries of a local folder to the device
    Push {
        /// Local folder holding the entries
        #[arg(long, value_name = "PATH")]
        src: PathBuf,

        /// Entries to send (default: all)
        files: Vec<String>,
    },

    /// Download entries of the device folder into a local folder
    Pull {
        /// Local folder receiving the entries
        #[arg(long, value_name = "PATH")]
        dst: PathBuf,

        /// Entries to download (default: all)
        files: Vec<String>,
    },

    /// Run adb with arbitrary arguments
    Raw {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        args: Vec<String>,
    },

    /// Print the effective settings as TOML
    Config {
        /// Also write them to the configuration file
        #[arg(long)]
        save: bool,
    },

    /// Serve the JSON bridge on stdin/stdout
    Serve {
        /// Answer folder requests with this path instead of opening a dialog
        #[arg(long, value_name = "PATH")]
        pick: Option<PathBuf>,
    },
}

/// CLI implementation of ProgressCallback for displaying transfer progress
struct CliProgress {
    direction: Direction,
    verbose: bool,
    start_time: Instant,
    last_progress_update: Mutex<Instant>,
}

impl CliProgress {
    fn new(direction: Direction, verbose: bool) -> Self {
        let now = Instant::now();
        CliProgress {
            direction,
            verbose,
            start_time: now,
            last_progress_update: Mutex::new(now),
        }
    }

    fn format_elapsed(elapsed: std::time::Duration) -> String {
        let secs = elapsed.as_secs();
        match (secs / 3600, secs % 3600 / 60, secs % 60) {
            (0, 0, s) => format!("{}s", s),
            (0, m, s) => format!("{}m {:02}s", m, s),
            (h, m, s) => format!("{}h {:02}m {:02}s", h, m, s),
        }
    }

    /// `a.mp4 [=======             ]  35% at 12.0 MB/s`
    fn progress_line(item: &TransferItem, event: &ProgressEvent) -> String {
        let percent = event.percent.min(100) as usize;
        let filled = percent / 5;
        format!(
            "{} [{}{}] {:>3}% at {}",
            item.display_name(),
            "=".repeat(filled),
            " ".repeat(20 - filled),
            percent,
            event.rate_label
        )
    }
}

impl ProgressCallback for CliProgress {
    fn on_batch_started(&self, session: &TransferSession, selected: usize) {
        let verb = match session.direction() {
            Direction::Push => "Sending",
            Direction::Pull => "Downloading",
        };
        eprintln!("{} {} of {} items...", verb, selected, session.len());
        eprintln!();
    }

    fn on_item_started(&self, item: &TransferItem) {
        if self.verbose {
            eprintln!("Starting: {}", item.display_name());
        }
    }

    fn on_item_progress(&self, item: &TransferItem, event: &ProgressEvent) {
        // Throttle progress updates to avoid spam (max once per 200ms)
        let mut last = self
            .last_progress_update
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if last.elapsed().as_millis() < 200 {
            return;
        }
        *last = Instant::now();

        eprint!("\r{}", Self::progress_line(item, event));
        let _ = std::io::Write::flush(&mut std::io::stderr());
    }

    fn on_item_completed(&self, item: &TransferItem, _result: &TransferResult) {
        if item.state == ItemState::Failed {
            eprintln!();
            eprintln!("{}", failure_notice(self.direction, item));
        } else if self.verbose {
            eprintln!();
            eprintln!("Done: {}", item.display_name());
        }
    }

    fn on_batch_completed(&self, summary: &BatchSummary) {
        eprintln!();
        if let Some(text) = summary.notification() {
            eprintln!("{}", text);
        }
        eprintln!("Elapsed: {}", Self::format_elapsed(self.start_time.elapsed()));
        if self.verbose {
            eprintln!("Batch: {}", summary.batch_id);
        }

        if summary.failed > 0 {
            eprintln!();
            eprintln!("Failed files:");
            for (name, error) in &summary.failed_items {
                eprintln!("  {}: {}", name, error);
            }
        }
    }
}

/// Parse command-line arguments, then run the requested command
fn main() {
    let args = Args::parse();

    // Exit code tracking
    let exit_code = match run_cli(&args) {
        Ok(()) => 0,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            2
        }
    };

    std::process::exit(exit_code);
}

fn load_config(args: &Args) -> Result<AppConfig, String> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
    .map_err(|e| format!("Could not load configuration: {}", e))?;

    if let Some(adb) = &args.adb {
        config.adb_path = Some(adb.clone());
    }
    if let Some(serial) = &args.serial {
        config.serial = Some(serial.clone());
    }
    if let Some(remote_dir) = &args.remote_dir {
        config.remote_dir = remote_dir.clone();
    }
    if args.legacy_detection {
        config.detection = DetectionPolicy::Legacy;
    }
    Ok(config)
}

fn init_logging(config: &AppConfig, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter))
    };
    // Tests call run_cli repeatedly; only the first subscriber sticks.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args) -> Result<(), String> {
    let config = load_config(args)?;
    init_logging(&config, args.verbose);

    if let Command::Push { src, .. } = &args.command {
        if !src.is_dir() {
            return Err(format!("Source is not a directory: {}", src.display()));
        }
    }
    if let Command::Pull { dst, .. } = &args.command {
        if !dst.is_dir() {
            return Err(format!("Destination is not a directory: {}", dst.display()));
        }
    }

    if let Command::Config { save } = &args.command {
        return show_config(args, &config, *save);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Could not start runtime: {}", e))?;
    runtime.block_on(run_command(args, config))
}

async fn run_command(args: &Args, config: AppConfig) -> Result<(), String> {
    let adb: Arc<dyn ProcessInvoker> = Arc::new(AdbInvoker::from_config(&config));
    let poller = ProgressPoller::new(config.poll_interval());

    match &args.command {
        Command::Status => {
            let status = query_status(adb.as_ref()).await;
            println!("{}", status.label);
            if status.is_connected() {
                Ok(())
            } else {
                Err(format!("No usable device ({})", status.label))
            }
        }
        Command::Ls { path, device: false } => {
            let dir = path.clone().unwrap_or_else(|| ".".to_string());
            for name in list_local_dir(std::path::Path::new(&dir)) {
                println!("{}", name);
            }
            Ok(())
        }
        Command::Ls { path, device: true } => {
            let dir = path.as_deref().unwrap_or(config.remote_dir.as_str());
            for name in list_device(adb.as_ref(), dir).await? {
                println!("{}", name);
            }
            Ok(())
        }
        Command::Push { src, files } => {
            let mut session = TransferSession::from_listing(Direction::Push, list_local_dir(src));
            let action = PushAction::new(adb.clone(), src.clone(), config.remote_dir.clone()).with_poller(poller);
            run_batch(&mut session, files, &action, args.verbose).await
        }
        Command::Pull { dst, files } => {
            let entries = list_device(adb.as_ref(), &config.remote_dir).await?;
            let mut session = TransferSession::from_listing(Direction::Pull, entries);
            let action = PullAction::new(adb.clone(), config.remote_dir.clone(), dst.clone()).with_poller(poller);
            run_batch(&mut session, files, &action, args.verbose).await
        }
        Command::Raw { args: raw } => {
            let result = adb.query(raw).await;
            if result.success {
                print!("{}", result.data_or_empty());
                Ok(())
            } else {
                Err(result.detail.unwrap_or_else(|| "adb failed".to_string()))
            }
        }
        Command::Config { save } => show_config(args, &config, *save),
        Command::Serve { pick } => {
            let mut bridge = Bridge::new(adb, config.clone());
            if pick.is_some() {
                bridge = bridge.with_picker(Arc::new(FixedPicker::new(pick.clone())));
            }
            info!("serving bridge on stdio");
            serve_stdio(&bridge).await.map_err(|e| e.to_string())
        }
    }
}

fn show_config(args: &Args, config: &AppConfig, save: bool) -> Result<(), String> {
    if save {
        let path = args
            .config
            .clone()
            .or_else(default_config_path)
            .ok_or_else(|| "No configuration directory on this platform".to_string())?;
        config
            .save_to(&path)
            .map_err(|e| format!("Could not save configuration: {}", e))?;
        eprintln!("Saved {}", path.display());
    }
    let text = config.to_toml().map_err(|e| e.to_string())?;
    print!("{}", text);
    Ok(())
}

async fn list_device(adb: &dyn ProcessInvoker, dir: &str) -> Result<Vec<String>, String> {
    let result = adb.query(&remote_list_args(dir)).await;
    if result.success {
        Ok(parse_listing(result.data_or_empty()))
    } else {
        Err(format!(
            "Could not list {}: {}",
            dir,
            result.detail.unwrap_or_else(|| "adb failed".to_string())
        ))
    }
}

async fn run_batch(
    session: &mut TransferSession,
    files: &[String],
    action: &dyn ItemAction,
    verbose: bool,
) -> Result<(), String> {
    if !files.is_empty() {
        let unknown: Vec<&String> = files.iter().filter(|f| session.get(f).is_none()).collect();
        if !unknown.is_empty() {
            return Err(format!("Not found in listing: {:?}", unknown));
        }
        session.select_only(files);
    }
    if session.selected_paths().is_empty() {
        return Err("Nothing to transfer".to_string());
    }

    let progress = CliProgress::new(session.direction(), verbose);
    let summary = transfer_all(session, action, Some(&progress)).await;

    if summary.failed > 0 {
        Err(format!("{} of {} items failed to transfer", summary.failed, summary.attempted()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(command: Command, adb: PathBuf, config_dir: &TempDir) -> Args {
        Args {
            command,
            adb: Some(adb),
            serial: None,
            remote_dir: None,
            legacy_detection: false,
            config: Some(config_dir.path().join("config.toml")),
            verbose: false,
        }
    }

    fn missing_adb(dir: &TempDir) -> PathBuf {
        dir.path().join("no-such-adb")
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let args = Args::try_parse_from(["rocket-sync", "--serial", "R58M", "push", "--src", "/tmp", "a.txt"]).unwrap();
        assert_eq!(args.serial.as_deref(), Some("R58M"));
        assert!(matches!(args.command, Command::Push { ref files, .. } if files == &["a.txt"]));

        let args = Args::try_parse_from(["rocket-sync", "raw", "shell", "ls", "-la"]).unwrap();
        assert!(matches!(args.command, Command::Raw { ref args } if args.len() == 3));
    }

    #[test]
    fn test_config_flags_override_file() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut a = args(Command::Status, missing_adb(&dir), &dir);
        a.remote_dir = Some("/sdcard/Music".to_string());
        a.legacy_detection = true;

        let config = load_config(&a).unwrap();
        assert_eq!(config.remote_dir, "/sdcard/Music");
        assert_eq!(config.detection, DetectionPolicy::Legacy);
        assert_eq!(config.adb_path, Some(missing_adb(&dir)));
    }

    #[test]
    fn test_progress_line_carries_rate() {
        let event = ProgressEvent {
            item: "DCIM/a.mp4".to_string(),
            percent: 35,
            rate_label: "12.0 MB/s".to_string(),
        };
        let line = CliProgress::progress_line(&TransferItem::new("DCIM/a.mp4"), &event);
        assert_eq!(line, format!("a.mp4 [{}{}]  35% at 12.0 MB/s", "=".repeat(7), " ".repeat(13)));
    }

    #[test]
    fn test_format_elapsed() {
        use std::time::Duration;
        assert_eq!(CliProgress::format_elapsed(Duration::from_secs(9)), "9s");
        assert_eq!(CliProgress::format_elapsed(Duration::from_secs(65)), "1m 05s");
        assert_eq!(CliProgress::format_elapsed(Duration::from_secs(3725)), "1h 02m 05s");
    }

    #[test]
    fn test_config_save_writes_effective_settings() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut a = args(Command::Config { save: true }, missing_adb(&dir), &dir);
        a.serial = Some("R58M123".to_string());

        run_cli(&a).unwrap();

        let saved = AppConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(saved.serial.as_deref(), Some("R58M123"));
        assert_eq!(saved.adb_path, Some(missing_adb(&dir)));
    }

    #[test]
    fn test_config_without_save_leaves_file_alone() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        run_cli(&args(Command::Config { save: false }, missing_adb(&dir), &dir)).unwrap();
        assert!(!dir.path().join("config.toml").exists());
    }

    #[test]
    fn test_cli_rejects_bad_config_file() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(dir.path().join("config.toml"), "poll_interval_ms = \"fast\"").unwrap();
        let result = run_cli(&args(Command::Status, missing_adb(&dir), &dir));
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_rejects_missing_source() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let command = Command::Push {
            src: PathBuf::from("/nonexistent/path"),
            files: Vec::new(),
        };
        assert!(run_cli(&args(command, missing_adb(&dir), &dir)).is_err());
    }

    #[test]
    fn test_cli_lists_local_folder() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        let command = Command::Ls {
            path: Some(dir.path().display().to_string()),
            device: false,
        };
        assert!(run_cli(&args(command, missing_adb(&dir), &dir)).is_ok());
    }

    #[test]
    fn test_status_without_adb_fails() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        assert!(run_cli(&args(Command::Status, missing_adb(&dir), &dir)).is_err());
    }

    #[test]
    fn test_push_without_adb_reports_failures() {
        let src = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(src.path().join("a.txt"), "hello").unwrap();
        std::fs::write(src.path().join("b.txt"), "world").unwrap();
        let command = Command::Push {
            src: src.path().to_path_buf(),
            files: Vec::new(),
        };

        let result = run_cli(&args(command, missing_adb(&src), &src));
        assert_eq!(result.unwrap_err(), "2 of 2 items failed to transfer");
    }

    #[test]
    fn test_push_rejects_unknown_entry() {
        let src = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(src.path().join("a.txt"), "hello").unwrap();
        let command = Command::Push {
            src: src.path().to_path_buf(),
            files: vec!["zzz.txt".to_string()],
        };
        assert!(run_cli(&args(command, missing_adb(&src), &src)).is_err());
    }

    #[cfg(unix)]
    mod with_echo {
        //! `echo` stands in for adb: it exits 0 and prints its arguments.

        use super::*;

        fn echo() -> PathBuf {
            PathBuf::from("/bin/echo")
        }

        #[test]
        fn test_push_succeeds_on_clean_exit() {
            let src = TempDir::new().expect("Failed to create temp dir");
            std::fs::write(src.path().join("a.txt"), "hello").unwrap();
            let command = Command::Push {
                src: src.path().to_path_buf(),
                files: vec!["a.txt".to_string()],
            };
            assert!(run_cli(&args(command, echo(), &src)).is_ok());
        }

        #[test]
        fn test_legacy_detection_needs_summary_line() {
            let src = TempDir::new().expect("Failed to create temp dir");
            std::fs::write(src.path().join("a.txt"), "hello").unwrap();
            let command = Command::Push {
                src: src.path().to_path_buf(),
                files: Vec::new(),
            };
            let mut a = args(command, echo(), &src);
            a.legacy_detection = true;
            assert!(run_cli(&a).is_err());
        }

        #[test]
        fn test_status_reports_connected() {
            let dir = TempDir::new().expect("Failed to create temp dir");
            assert!(run_cli(&args(Command::Status, echo(), &dir)).is_ok());
        }
    }
}
