use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_yaml::Deserializer;

const PKG_NAME: &str = env!("CARGO_PKG_NAME");
const CONFIG_FILE: &str = "config.yaml";

pub const DEFAULT_EVENTS_CALENDAR_ID: &str = "quen.mcr@gmail.com";
pub const DEFAULT_SPORTS_CALENDAR_ID: &str = "342i46upg047nehs8t089f7b1c@group.calendar.google.com";

/// Settings from `$XDG_CONFIG_HOME/mcr-newsletter/config.yaml`. Every key is optional.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub events_calendar_id: String,
    pub sports_calendar_id: String,
    pub events_title: String,
    pub sports_title: String,
    pub template_path: PathBuf,
    pub output_dir: PathBuf,
    pub credentials_path: PathBuf,
    /// Where the OAuth token is cached. Defaults to `token.json` in the XDG data dir.
    pub token_path: Option<PathBuf>,
    pub open_after_save: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            events_calendar_id: DEFAULT_EVENTS_CALENDAR_ID.to_string(),
            sports_calendar_id: DEFAULT_SPORTS_CALENDAR_ID.to_string(),
            events_title: "MCR Events Bulletin".to_string(),
            sports_title: "MCR Sports Bulletin".to_string(),
            template_path: PathBuf::from("template.docx"),
            output_dir: PathBuf::from("newsletters"),
            credentials_path: PathBuf::from("./credentials.json"),
            token_path: None,
            open_after_save: true,
        }
    }
}

pub struct EnsureOutcome {
    pub path: PathBuf,
    pub created: bool,
}

impl Config {
    pub fn ensure_user_config() -> Result<EnsureOutcome> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix(PKG_NAME);

        if let Some(path) = xdg_dirs.find_config_file(CONFIG_FILE) {
            return Ok(EnsureOutcome {
                path,
                created: false,
            });
        }

        let config_path = xdg_dirs
            .place_config_file(CONFIG_FILE)
            .context("Cannot create configuration directory")?;
        let mut config_file = File::create(&config_path)
            .with_context(|| format!("Failed to create {}", config_path.display()))?;

        write!(
            &mut config_file,
            r#"# MCR newsletter config (YAML)
# Every key is optional; command-line flags take precedence.

# events_calendar_id: "{events}"
# sports_calendar_id: "{sports}"
# events_title: "MCR Events Bulletin"
# sports_title: "MCR Sports Bulletin"

# template_path: "template.docx"
# output_dir: "newsletters"

# OAuth client secrets downloaded from the Google Cloud console
# credentials_path: "./credentials.json"
# Cached access/refresh token (defaults to the XDG data directory)
# token_path: "/path/to/token.json"

# open_after_save: true
"#,
            events = DEFAULT_EVENTS_CALENDAR_ID,
            sports = DEFAULT_SPORTS_CALENDAR_ID,
        )?;

        Ok(EnsureOutcome {
            path: config_path,
            created: true,
        })
    }

    pub fn from_file(path: &Path) -> Result<Config> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml_str(&raw, &path.display().to_string())
    }

    pub fn from_yaml_str(raw: &str, origin: &str) -> Result<Config> {
        // A file of nothing but comments is an empty document, not an empty mapping.
        if raw.lines().all(|l| l.trim().is_empty() || l.trim_start().starts_with('#')) {
            return Ok(Config::default());
        }

        let deserialized = Deserializer::from_str(raw);
        serde_path_to_error::deserialize(deserialized).map_err(|e| {
            anyhow!(
                "Invalid YAML in {} at `{}`: {}",
                origin,
                e.path(),
                e.inner()
            )
        })
    }
}
