mod app;
mod auth;
mod bulletin;
mod calendar;
mod config;
mod docx;
mod entry;
mod error;
mod logger;
mod models;
mod newsletter;
mod output;
mod render;
mod utils;

use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;

use crate::app::RunOptions;

fn parse_as_of(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y%m%d").map_err(|e| format!("expected YYYYMMDD ({e})"))
}

#[derive(Parser)]
#[command(name = "mcr-newsletter")]
#[command(about = "Build the weekly MCR newsletter from the bulletin spreadsheet")]
struct Cli {
    /// CSV export of the bulletin submissions
    bulletin_csv: PathBuf,

    /// Use the calendar week containing this date (YYYYMMDD) instead of today
    #[arg(long, value_parser = parse_as_of)]
    as_of: Option<NaiveDate>,

    /// Leave out the events calendar
    #[arg(long)]
    disable_events: bool,

    /// Leave out the sports calendar
    #[arg(long)]
    disable_sports: bool,

    /// Number of the first entry; lower numbers become blank placeholders
    #[arg(long, alias = "start_num", default_value_t = 1)]
    start_num: u32,

    #[arg(long)]
    template_path: Option<PathBuf>,

    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// OAuth client secrets file
    #[arg(long)]
    google_credentials: Option<PathBuf>,

    /// Where the OAuth token is cached
    #[arg(long)]
    token_path: Option<PathBuf>,

    /// Don't open the document after saving it
    #[arg(long)]
    no_open: bool,

    /// Print info-level logs to the console
    #[arg(short, long)]
    verbose: bool,
}

impl From<Cli> for RunOptions {
    fn from(cli: Cli) -> Self {
        Self {
            bulletin_csv: cli.bulletin_csv,
            as_of: cli.as_of,
            disable_events: cli.disable_events,
            disable_sports: cli.disable_sports,
            start_num: cli.start_num,
            template_path: cli.template_path,
            output_dir: cli.output_dir,
            credentials_path: cli.google_credentials,
            token_path: cli.token_path,
            no_open: cli.no_open,
            verbose: cli.verbose,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    app::run(cli.into()).await
}
