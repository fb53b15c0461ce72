//! Directory listings and device-side shell commands.

use std::fs;
use std::path::Path;
use tracing::warn;

use crate::error::EngineError;

/// Split raw listing output into entry names.
///
/// Handles both `\n` and `\r\n` line endings and drops empty lines, so a
/// trailing newline never produces a phantom entry.
pub fn parse_listing(raw: &str) -> Vec<String> {
    raw.split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Drop empty names from an already-split listing.
pub fn clean_entries<I, S>(entries: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    entries
        .into_iter()
        .map(Into::into)
        .filter(|name| !name.is_empty())
        .collect()
}

/// Names of the entries in a local directory, sorted.
///
/// Unreadable directories yield an empty list; the failure is logged.
pub fn list_local_dir(path: &Path) -> Vec<String> {
    match try_list_local_dir(path) {
        Ok(names) => names,
        Err(e) => {
            warn!(error = %e, "could not list local directory");
            Vec::new()
        }
    }
}

/// Like [`list_local_dir`] but reports the failure.
pub fn try_list_local_dir(path: &Path) -> Result<Vec<String>, EngineError> {
    let entries = fs::read_dir(path).map_err(|e| EngineError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    Ok(names)
}

/// Quote a path for the device shell.
pub fn shell_quote(path: &str) -> String {
    format!("'{}'", path.replace('\'', "'\\''"))
}

/// Join a device directory and an entry name with exactly one slash.
pub fn remote_join(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// `adb shell ls <dir>`
pub fn remote_list_args(dir: &str) -> Vec<String> {
    vec!["shell".to_string(), "ls".to_string(), shell_quote(dir)]
}

/// `adb shell stat -c %s <path>` prints the size in bytes.
pub fn remote_size_args(path: &str) -> Vec<String> {
    vec![
        "shell".to_string(),
        "stat".to_string(),
        "-c".to_string(),
        "%s".to_string(),
        shell_quote(path),
    ]
}

/// `adb shell getprop <property>`
pub fn property_args(property: &str) -> Vec<String> {
    vec!["shell".to_string(), "getprop".to_string(), property.to_string()]
}

/// Parse the output of a size query.
pub fn parse_size(raw: &str) -> Option<u64> {
    raw.trim().parse().ok()
}
