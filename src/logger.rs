use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use ftail::Ftail;
use log::{LevelFilter, info};

const LOGS_DIR: &str = ".logs";
const PKG_NAME: &str = env!("CARGO_PKG_NAME");

/// `<home>/.logs/<pkg>/<pkg>.log`
fn log_file_in(home: &Path) -> PathBuf {
    home.join(LOGS_DIR)
        .join(PKG_NAME)
        .join(format!("{PKG_NAME}.log"))
}

fn console_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    }
}

/// Info-level file log for every run; the console only shows warnings unless `verbose`.
pub fn init_logger(verbose: bool) -> Result<()> {
    let home = std::env::home_dir().ok_or_else(|| anyhow!("Could not determine $HOME"))?;
    let log_file = log_file_in(&home);

    if let Some(dir) = log_file.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Could not create logs dir at {}", dir.display()))?;
    }

    Ftail::new()
        .console(console_level(verbose))
        .single_file(&log_file, true, LevelFilter::Info)
        .init()
        .map_err(|e| anyhow!("Could not initialize logger: {}", e))?;

    info!("Logging to {}", log_file.display());
    Ok(())
}
