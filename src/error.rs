//! Error types for each stage of newsletter generation.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error for a newsletter run. Every stage error aborts the run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Read error: {0}")]
    Read(#[from] ReadError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Write error: {0}")]
    Write(#[from] WriteError),
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("Could not open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing required column `{0}`")]
    MissingColumn(&'static str),

    #[error("Column {0} has a blank header")]
    BlankHeader(usize),

    #[error("Columns `{first}` and `{second}` both map to field `{field}`")]
    DuplicateColumn {
        first: String,
        second: String,
        field: String,
    },
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Could not read client secrets at {path}: {source}")]
    ClientSecretsIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid client secrets file {path}: {reason}")]
    ClientSecretsInvalid { path: PathBuf, reason: String },

    #[error("Could not store token at {path}: {source}")]
    TokenStore {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Token endpoint rejected the request ({status}): {body}")]
    TokenEndpoint {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Unexpected token response: {0}")]
    TokenResponse(#[from] serde_json::Error),

    #[error("Authorization flow failed: {0}")]
    Flow(String),

    #[error("Calendar rejected the access token ({0})")]
    Rejected(reqwest::StatusCode),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Calendar {calendar_id}: API returned {status}: {body}")]
    Status {
        calendar_id: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Calendar {calendar_id}: malformed response: {source}")]
    Malformed {
        calendar_id: String,
        source: serde_json::Error,
    },

    #[error("Calendar {calendar_id}: event has an unreadable start `{value}`")]
    BadStart { calendar_id: String, value: String },

    #[error("Invalid calendar API URL {0}")]
    BadUrl(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Could not open template {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Template is not a valid .docx archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Template is missing part `{0}`")]
    MissingPart(&'static str),

    #[error("Template part `{0}` is not UTF-8")]
    Encoding(String),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Output directory {0} does not exist")]
    MissingDirectory(PathBuf),

    #[error("Could not write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}
