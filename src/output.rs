use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, SecondsFormat, Utc};
use log::{info, warn};

use crate::error::WriteError;

/// `newsletter-<RFC 3339 timestamp>.docx`
pub fn output_file_name(now: DateTime<Utc>) -> String {
    format!(
        "newsletter-{}.docx",
        now.to_rfc3339_opts(SecondsFormat::Micros, false)
    )
}

/// Write the rendered package into `output_dir`, which must already exist.
pub fn save_newsletter(bytes: &[u8], output_dir: &Path) -> Result<PathBuf, WriteError> {
    if !output_dir.is_dir() {
        return Err(WriteError::MissingDirectory(output_dir.to_path_buf()));
    }

    let path = output_dir.join(output_file_name(Utc::now()));
    fs::write(&path, bytes).map_err(|source| WriteError::Io {
        path: path.clone(),
        source,
    })?;

    info!("Saved newsletter to {}", path.display());
    Ok(path)
}

fn viewer_command(path: &Path) -> Command {
    if cfg!(target_os = "macos") {
        let mut cmd = Command::new("open");
        cmd.arg(path);
        cmd
    } else if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", ""]).arg(path);
        cmd
    } else {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(path);
        cmd
    }
}

/// Open `path` in the default viewer. Failures are only logged.
pub fn open_document(path: &Path) {
    match viewer_command(path).status() {
        Ok(status) if status.success() => info!("Opened {}", path.display()),
        Ok(status) => warn!("Viewer for {} exited with {}", path.display(), status),
        Err(e) => warn!("Could not open {}: {}", path.display(), e),
    }
}
