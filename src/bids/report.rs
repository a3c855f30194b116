//! Summary of what a dataset write produced.
//!
//! Printed as text by default, or as JSON with `--report json`.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// What a written file is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRole {
    /// The recording itself.
    Data,
    /// A file written alongside the recording by its own persistence
    /// (BrainVision `.eeg`/`.vmrk`).
    Companion,
    Events,
    Channels,
    Sidecar,
    Markers,
    Headshape,
    DatasetDescription,
    Participants,
}

impl FileRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileRole::Data => "data",
            FileRole::Companion => "companion",
            FileRole::Events => "events",
            FileRole::Channels => "channels",
            FileRole::Sidecar => "sidecar",
            FileRole::Markers => "markers",
            FileRole::Headshape => "headshape",
            FileRole::DatasetDescription => "dataset_description",
            FileRole::Participants => "participants",
        }
    }
}

/// One file created or updated by the writer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub role: FileRole,
}

/// The result of a successful [`write_raw_bids`](super::write_raw_bids).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WriteReport {
    /// The composed basename of the data file.
    pub basename: String,
    /// The datatype folder the recording was written into.
    pub folder: PathBuf,
    /// Number of rows written to `_events.tsv` (0 if none was written).
    pub events: usize,
    /// Number of channels described in `_channels.tsv`.
    pub channels: usize,
    pub files: Vec<WrittenFile>,
}

impl WriteReport {
    pub fn new(basename: impl Into<String>, folder: impl Into<PathBuf>) -> Self {
        Self {
            basename: basename.into(),
            folder: folder.into(),
            events: 0,
            channels: 0,
            files: Vec::new(),
        }
    }

    /// Records a written file.
    pub fn add(&mut self, path: impl Into<PathBuf>, role: FileRole) {
        let path = path.into();
        tracing::info!(path = %path.display(), role = role.as_str(), "wrote file");
        self.files.push(WrittenFile { path, role });
    }
}

impl fmt::Display for WriteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Wrote {} to {}", self.basename, self.folder.display())?;
        writeln!(
            f,
            "  {} channels, {} events, {} files",
            self.channels,
            self.events,
            self.files.len()
        )?;
        for file in &self.files {
            writeln!(f, "  [{}] {}", file.role.as_str(), file.path.display())?;
        }
        Ok(())
    }
}
