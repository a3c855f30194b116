use std::path::PathBuf;
use thiserror::Error;

/// The main error type for rawbids operations.
#[derive(Debug, Error)]
pub enum RawBidsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid {entity} '{value}': {reason}")]
    InvalidIdentifier {
        entity: &'static str,
        value: String,
        reason: String,
    },

    #[error("Missing required BIDS entity: {0}")]
    MissingIdentifier(&'static str),

    #[error("Destination already exists: {path} (use --overwrite to replace it)")]
    DestinationExists { path: PathBuf },

    #[error("Failed to read recording {path}: {message}")]
    RecordingRead { path: PathBuf, message: String },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to parse events from {path}: {source}")]
    EventsParse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Invalid events in {path}: {message}")]
    EventsInvalid { path: PathBuf, message: String },

    #[error("Failed to read participants file {path}: {source}")]
    ParticipantsRead {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Invalid participants file {path}: {message}")]
    ParticipantsInvalid { path: PathBuf, message: String },

    #[error("Invalid event id mapping '{value}': {reason}")]
    EventIdInvalid { value: String, reason: String },

    #[error("Failed to write sidecar {path}: {source}")]
    SidecarWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize report: {0}")]
    ReportSerialize(#[source] serde_json::Error),

    #[error("Failed to write TSV {path}: {source}")]
    TsvWrite {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl RawBidsError {
    /// Returns true if this error came from identifier validation.
    pub fn is_invalid_identifier(&self) -> bool {
        matches!(
            self,
            RawBidsError::InvalidIdentifier { .. } | RawBidsError::MissingIdentifier(_)
        )
    }
}
