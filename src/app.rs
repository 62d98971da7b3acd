use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use log::{debug, info};

use crate::auth::{TokenStore, authenticate};
use crate::bulletin::read_bulletins_file;
use crate::calendar::CalendarClient;
use crate::config::Config;
use crate::entry::bulletins_to_template_entries;
use crate::error::Error;
use crate::logger::init_logger;
use crate::models::{CalendarSection, NewsletterDocument};
use crate::newsletter::{Sections, assemble};
use crate::output::{open_document, save_newsletter};
use crate::render::render_newsletter;

/// Command-line options for one run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub bulletin_csv: PathBuf,
    pub as_of: Option<NaiveDate>,
    pub disable_events: bool,
    pub disable_sports: bool,
    pub start_num: u32,
    pub template_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub credentials_path: Option<PathBuf>,
    pub token_path: Option<PathBuf>,
    pub no_open: bool,
    pub verbose: bool,
}

/// Effective settings once flags have been layered over the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub template_path: PathBuf,
    pub output_dir: PathBuf,
    pub credentials_path: PathBuf,
    pub token_path: Option<PathBuf>,
    pub open_after_save: bool,
    pub events_calendar_id: String,
    pub sports_calendar_id: String,
    pub events_title: String,
    pub sports_title: String,
}

impl Settings {
    pub fn resolve(opts: &RunOptions, cfg: Config) -> Self {
        Self {
            template_path: opts.template_path.clone().unwrap_or(cfg.template_path),
            output_dir: opts.output_dir.clone().unwrap_or(cfg.output_dir),
            credentials_path: opts.credentials_path.clone().unwrap_or(cfg.credentials_path),
            token_path: opts.token_path.clone().or(cfg.token_path),
            open_after_save: cfg.open_after_save && !opts.no_open,
            events_calendar_id: cfg.events_calendar_id,
            sports_calendar_id: cfg.sports_calendar_id,
            events_title: cfg.events_title,
            sports_title: cfg.sports_title,
        }
    }
}

async fn fetch_calendars(
    opts: &RunOptions,
    settings: &Settings,
    reference: NaiveDate,
) -> Result<(Option<CalendarSection>, Option<CalendarSection>)> {
    if opts.disable_events && opts.disable_sports {
        info!("Both calendars disabled, skipping authentication");
        return Ok((None, None));
    }

    let store = TokenStore::resolve(settings.token_path.as_deref()).map_err(Error::from)?;
    debug!("Token cache at {}", store.path().display());
    let token = authenticate(&store, &settings.credentials_path)
        .await
        .map_err(Error::from)
        .context("Could not authenticate with Google Calendar")?;
    let client = CalendarClient::new(&token.access_token);

    let events = if opts.disable_events {
        info!("--disable-events set, skipping the events calendar");
        None
    } else {
        Some(
            client
                .week_section(&settings.events_calendar_id, &settings.events_title, reference)
                .await
                .context("Could not fetch the events calendar")?,
        )
    };

    let sports = if opts.disable_sports {
        info!("--disable-sports set, skipping the sports calendar");
        None
    } else {
        Some(
            client
                .week_section(&settings.sports_calendar_id, &settings.sports_title, reference)
                .await
                .context("Could not fetch the sports calendar")?,
        )
    };

    Ok((events, sports))
}

/// Nothing is written unless the whole document rendered.
fn render_and_save(
    template_path: &Path,
    doc: &NewsletterDocument,
    output_dir: &Path,
) -> Result<PathBuf> {
    let bytes = render_newsletter(template_path, doc)
        .map_err(Error::from)
        .with_context(|| format!("Could not render {}", template_path.display()))?;
    Ok(save_newsletter(&bytes, output_dir).map_err(Error::from)?)
}

pub async fn run(opts: RunOptions) -> Result<()> {
    // 0) Initialize logger
    init_logger(opts.verbose)?;

    // 1) Ensure config exists, then layer flags over it
    let config_outcome = Config::ensure_user_config()?;
    if config_outcome.created {
        info!(
            "Config file created at {}, continuing with defaults.",
            config_outcome.path.display()
        );
    }
    let cfg = Config::from_file(&config_outcome.path)?;
    let settings = Settings::resolve(&opts, cfg);
    debug!("Effective settings: {:#?}", settings);

    // 2) Read approved, unsent bulletins
    let rows = read_bulletins_file(&opts.bulletin_csv)
        .map_err(Error::from)
        .with_context(|| format!("Could not read {}", opts.bulletin_csv.display()))?;

    // 3) Turn them into template entries and split by section
    let entries = bulletins_to_template_entries(rows);
    let sections = Sections::partition(&entries);
    info!(
        "{} college, {} cambridge, {} jobs bulletins",
        sections.college.len(),
        sections.cambridge.len(),
        sections.jobs.len()
    );

    // 4) Fetch the week's calendars
    let reference = opts.as_of.unwrap_or_else(|| Utc::now().date_naive());
    info!("Reference date {}", reference);
    let (events, sports) = fetch_calendars(&opts, &settings, reference).await?;

    // 5) Number everything
    let doc = assemble(sections, opts.start_num, events, sports);

    // 6) Render, and only then write
    let path = render_and_save(&settings.template_path, &doc, &settings.output_dir)?;
    println!("{}", path.display());

    // 7) Open it
    if settings.open_after_save {
        open_document(&path);
    } else {
        debug!("Not opening {}", path.display());
    }

    Ok(())
}
