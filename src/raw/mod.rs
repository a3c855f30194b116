//! Raw recording adapters.
//!
//! A reader turns a vendor file into a [`Recording`]: header metadata the
//! BIDS sidecars need, plus the ability to persist itself at a new path.
//! Signal data is never decoded; persistence copies the source bytes.
//!
//! # Supported formats
//!
//! | Extension        | Adapter              | Companion files          |
//! |------------------|----------------------|--------------------------|
//! | `.fif`           | [`fif`]              | none                     |
//! | `.edf`, `.bdf`   | [`edf`]              | none                     |
//! | `.vhdr`          | [`brainvision`]      | `.eeg` data, `.vmrk`     |
//! | `.sqd`, `.con`   | [`kit`]              | marker/digitizer files   |
//! | `c,rfDC` etc.    | [`bti`]              | `config`, `hs_file`      |

pub mod brainvision;
pub mod bti;
pub mod edf;
pub mod fif;
pub mod kit;

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::RawBidsError;

/// Anything that can write its own on-disk representation.
pub trait Persistable {
    /// Writes this object to `path`, replacing anything already there.
    fn save(&self, path: &Path) -> std::io::Result<()>;

    /// Additional paths [`save`](Self::save) writes when targeting `path`.
    ///
    /// Multi-file formats (BrainVision) write companions next to the
    /// primary file; callers use this to check for collisions up front.
    fn companion_paths(&self, _path: &Path) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// A loaded recording, as produced by [`read_raw`].
pub trait Recording: Persistable {
    fn info(&self) -> &RecordingInfo;

    /// Event annotations stored in the recording itself.
    fn annotations(&self) -> &[Annotation] {
        &[]
    }
}

/// The vendor format a recording was read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RawFormat {
    Fif,
    Edf,
    Bdf,
    BrainVision,
    Kit,
    Bti,
}

impl RawFormat {
    /// Human-readable name for the format.
    pub fn name(&self) -> &'static str {
        match self {
            RawFormat::Fif => "fif",
            RawFormat::Edf => "edf",
            RawFormat::Bdf => "bdf",
            RawFormat::BrainVision => "brainvision",
            RawFormat::Kit => "kit",
            RawFormat::Bti => "bti",
        }
    }

    /// The manufacturer reported in the modality sidecar.
    pub fn manufacturer(&self) -> &'static str {
        match self {
            RawFormat::Fif => "Elekta",
            RawFormat::Edf | RawFormat::Bdf => "n/a",
            RawFormat::BrainVision => "BrainProducts",
            RawFormat::Kit => "KIT/Yokogawa",
            RawFormat::Bti => "4D Magnes",
        }
    }

    /// The extension (with leading dot) a BIDS name for `path` carries.
    ///
    /// 4D runs are stored as folders and have none.
    pub fn bids_extension(&self, path: &Path) -> Option<String> {
        match self {
            RawFormat::Bti => None,
            _ => path
                .extension()
                .map(|ext| format!(".{}", ext.to_string_lossy())),
        }
    }

    /// Detects the format from a raw file path.
    pub fn from_path(path: &Path) -> Result<Self, RawBidsError> {
        // 4D names like `e,rfhp1.0Hz` contain dots that are not extensions.
        if bti::is_bti_pdf(path) {
            return Ok(RawFormat::Bti);
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("fif") => Ok(RawFormat::Fif),
            Some("edf") => Ok(RawFormat::Edf),
            Some("bdf") => Ok(RawFormat::Bdf),
            Some("vhdr") => Ok(RawFormat::BrainVision),
            Some("sqd") | Some("con") => Ok(RawFormat::Kit),
            _ => Err(RawBidsError::UnsupportedFormat(format!(
                "'{}' (supported: .fif, .edf, .bdf, .vhdr, .sqd, .con, 4D c,rfDC)",
                path.display()
            ))),
        }
    }
}

/// BIDS channel types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ChannelType {
    MegMag,
    MegGradPlanar,
    MegRef,
    Eeg,
    Eog,
    Ecg,
    Emg,
    Trig,
    Misc,
}

impl ChannelType {
    /// The value written to the `type` column of `channels.tsv`.
    pub fn bids_name(&self) -> &'static str {
        match self {
            ChannelType::MegMag => "MEGMAG",
            ChannelType::MegGradPlanar => "MEGGRADPLANAR",
            ChannelType::MegRef => "MEGREFMAG",
            ChannelType::Eeg => "EEG",
            ChannelType::Eog => "EOG",
            ChannelType::Ecg => "ECG",
            ChannelType::Emg => "EMG",
            ChannelType::Trig => "TRIG",
            ChannelType::Misc => "MISC",
        }
    }

    pub fn is_meg(&self) -> bool {
        matches!(self, ChannelType::MegMag | ChannelType::MegGradPlanar)
    }

    /// Guesses the type of an EEG-system channel from its label.
    pub(crate) fn from_eeg_label(label: &str) -> Self {
        let upper = label.trim().to_ascii_uppercase();
        if upper.starts_with("EOG") || upper.starts_with("HEOG") || upper.starts_with("VEOG") {
            ChannelType::Eog
        } else if upper.starts_with("ECG") || upper.starts_with("EKG") {
            ChannelType::Ecg
        } else if upper.starts_with("EMG") {
            ChannelType::Emg
        } else if upper.starts_with("STI") || upper.starts_with("TRIG") || upper == "STATUS" {
            ChannelType::Trig
        } else {
            ChannelType::Eeg
        }
    }
}

/// One channel's header description.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Channel {
    pub name: String,
    pub channel_type: ChannelType,
    pub unit: String,
    /// Set when the channel is sampled differently from the recording.
    pub sampling_frequency: Option<f64>,
}

impl Channel {
    pub fn new(name: impl Into<String>, channel_type: ChannelType, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            channel_type,
            unit: unit.into(),
            sampling_frequency: None,
        }
    }
}

/// An annotation stored in the recording (e.g. a BrainVision marker).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Annotation {
    /// Seconds from the first sample.
    pub onset: f64,
    /// Seconds.
    pub duration: f64,
    pub description: String,
}

/// Header metadata read from a recording.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecordingInfo {
    pub source: PathBuf,
    pub format: RawFormat,
    pub sfreq: Option<f64>,
    /// Sample index of the first stored sample (FIF only; zero elsewhere).
    pub first_samp: i64,
    pub n_samples: Option<u64>,
    pub channels: Vec<Channel>,
    /// KIT marker coil file supplied to the reader.
    pub markers: Option<PathBuf>,
    /// Head-shape points supplied to the reader.
    pub headshape: Option<PathBuf>,
}

impl RecordingInfo {
    pub fn new(source: impl Into<PathBuf>, format: RawFormat) -> Self {
        Self {
            source: source.into(),
            format,
            sfreq: None,
            first_samp: 0,
            n_samples: None,
            channels: Vec::new(),
            markers: None,
            headshape: None,
        }
    }

    /// Recording length in seconds, when both sample count and rate are known.
    pub fn duration(&self) -> Option<f64> {
        match (self.n_samples, self.sfreq) {
            (Some(n), Some(sfreq)) if sfreq > 0.0 => Some(n as f64 / sfreq),
            _ => None,
        }
    }

    /// Number of channels of the given type.
    pub fn count(&self, channel_type: ChannelType) -> usize {
        self.channels
            .iter()
            .filter(|c| c.channel_type == channel_type)
            .count()
    }
}

/// Auxiliary files some readers need (digitization, configuration).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuxFiles {
    /// Marker coil positions (KIT `.mrk`/`.sqd`).
    pub hpi: Option<PathBuf>,
    /// Head-native digitizer points (KIT `.elp`).
    pub electrode: Option<PathBuf>,
    /// Head-shape points (KIT `.hsp`, 4D `hs_file`).
    pub hsp: Option<PathBuf>,
    /// Acquisition configuration (4D `config`).
    pub config: Option<PathBuf>,
}

impl AuxFiles {
    /// Auxiliary inputs the adapter for `format` does not carry into the
    /// dataset. KIT checks `electrode` for consistency but stores no copy.
    pub fn unused_by(&self, format: RawFormat) -> Vec<(&'static str, &Path)> {
        let consumed: &[&str] = match format {
            RawFormat::Kit => &["hpi", "hsp"],
            RawFormat::Bti => &["hsp", "config"],
            RawFormat::Fif | RawFormat::Edf | RawFormat::Bdf | RawFormat::BrainVision => &[],
        };
        [
            ("hpi", self.hpi.as_deref()),
            ("electrode", self.electrode.as_deref()),
            ("hsp", self.hsp.as_deref()),
            ("config", self.config.as_deref()),
        ]
        .into_iter()
        .filter_map(|(name, path)| path.map(|p| (name, p)))
        .filter(|(name, _)| !consumed.contains(name))
        .collect()
    }
}

/// A single-file recording persisted by copying its source.
#[derive(Clone, Debug)]
pub struct RawFile {
    info: RecordingInfo,
}

impl RawFile {
    pub fn new(info: RecordingInfo) -> Self {
        Self { info }
    }
}

impl Persistable for RawFile {
    fn save(&self, path: &Path) -> std::io::Result<()> {
        fs::copy(&self.info.source, path)?;
        Ok(())
    }
}

impl Recording for RawFile {
    fn info(&self) -> &RecordingInfo {
        &self.info
    }
}

/// Reads the recording at `path`, dispatching on its format.
///
/// # Errors
/// [`RawBidsError::UnsupportedFormat`] for unknown extensions and
/// [`RawBidsError::RecordingRead`] when the file or a required auxiliary
/// file is missing or its header cannot be parsed.
pub fn read_raw(path: &Path, aux: &AuxFiles) -> Result<Box<dyn Recording>, RawBidsError> {
    let format = RawFormat::from_path(path)?;

    if !path.exists() {
        return Err(read_error(path, "file not found"));
    }

    tracing::debug!(path = %path.display(), format = format.name(), "reading raw recording");
    for (name, unused) in aux.unused_by(format) {
        tracing::warn!(
            input = name,
            path = %unused.display(),
            format = format.name(),
            "auxiliary file is not used for this format and will not be stored"
        );
    }

    let recording: Box<dyn Recording> = match format {
        RawFormat::Fif => Box::new(fif::read_fif(path)?),
        RawFormat::Edf | RawFormat::Bdf => Box::new(edf::read_edf(path)?),
        RawFormat::BrainVision => Box::new(brainvision::read_brainvision(path)?),
        RawFormat::Kit => Box::new(kit::read_kit(path, aux)?),
        RawFormat::Bti => Box::new(bti::read_bti(path, aux)?),
    };

    Ok(recording)
}

pub(crate) fn read_error(path: &Path, message: impl Into<String>) -> RawBidsError {
    RawBidsError::RecordingRead {
        path: path.to_path_buf(),
        message: message.into(),
    }
}
