//! BrainVision reader.
//!
//! A BrainVision recording is a triplet: the `.vhdr` text header, a binary
//! `.eeg` data file and an optional `.vmrk` marker file. The header and
//! marker file refer to each other by file name, so saving the triplet under
//! a new basename rewrites those references instead of copying them blindly.
//!
//! Header files are UTF-8 or Latin-1 in the wild. Rewriting works on bytes
//! so the original encoding survives; only the fields we need are decoded.

use std::fs;
use std::path::{Path, PathBuf};

use super::{
    read_error, Annotation, Channel, ChannelType, Persistable, RawFormat, Recording,
    RecordingInfo,
};
use crate::error::RawBidsError;

const DATA_FILE_KEY: &[u8] = b"DataFile=";
const MARKER_FILE_KEY: &[u8] = b"MarkerFile=";

/// Decoded `.vhdr` fields.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VhdrHeader {
    pub data_file: String,
    pub marker_file: Option<String>,
    pub data_format: String,
    pub binary_format: String,
    pub num_channels: usize,
    pub sampling_interval_us: f64,
    /// `(name, unit)` per channel.
    pub channels: Vec<(String, String)>,
}

/// A BrainVision triplet loaded from disk.
#[derive(Clone, Debug)]
pub struct BrainVisionRecording {
    info: RecordingInfo,
    annotations: Vec<Annotation>,
    header_bytes: Vec<u8>,
    data_path: PathBuf,
    marker_path: Option<PathBuf>,
}

/// Reads a `.vhdr` header and its marker file.
pub fn read_brainvision(vhdr_path: &Path) -> Result<BrainVisionRecording, RawBidsError> {
    let header_bytes = fs::read(vhdr_path).map_err(RawBidsError::Io)?;
    let header = parse_vhdr(&header_bytes).map_err(|msg| read_error(vhdr_path, msg))?;

    let dir = vhdr_path.parent().unwrap_or_else(|| Path::new(""));
    let data_path = dir.join(&header.data_file);
    if !data_path.is_file() {
        return Err(read_error(
            vhdr_path,
            format!("data file '{}' not found", data_path.display()),
        ));
    }

    let mut info = RecordingInfo::new(vhdr_path, RawFormat::BrainVision);
    if header.sampling_interval_us > 0.0 {
        info.sfreq = Some(1e6 / header.sampling_interval_us);
    }
    info.channels = header
        .channels
        .iter()
        .map(|(name, unit)| Channel::new(name.clone(), ChannelType::from_eeg_label(name), unit.clone()))
        .collect();

    if header.data_format.eq_ignore_ascii_case("BINARY") && header.num_channels > 0 {
        if let Some(width) = binary_width(&header.binary_format) {
            let bytes = fs::metadata(&data_path).map_err(RawBidsError::Io)?.len();
            info.n_samples = Some(bytes / (width * header.num_channels as u64));
        }
    }

    let (marker_path, annotations) = match &header.marker_file {
        Some(name) => {
            let path = dir.join(name);
            let bytes = fs::read(&path).map_err(|e| {
                read_error(vhdr_path, format!("marker file '{}': {}", path.display(), e))
            })?;
            let markers = parse_vmrk(&bytes, info.sfreq.unwrap_or(0.0));
            (Some(path), markers)
        }
        None => (None, Vec::new()),
    };

    tracing::debug!(
        sfreq = ?info.sfreq,
        nchan = info.channels.len(),
        markers = annotations.len(),
        "parsed BrainVision header"
    );

    Ok(BrainVisionRecording {
        info,
        annotations,
        header_bytes,
        data_path,
        marker_path,
    })
}

impl Persistable for BrainVisionRecording {
    fn save(&self, path: &Path) -> std::io::Result<()> {
        let [data_dest, marker_dest] = triplet_paths(path);
        let data_name = file_name(&data_dest);
        let marker_name = file_name(&marker_dest);

        let header = rewrite_references(
            &self.header_bytes,
            &data_name,
            self.marker_path.as_ref().map(|_| marker_name.as_str()),
        );
        fs::write(path, header)?;
        fs::copy(&self.data_path, &data_dest)?;

        if let Some(marker_src) = &self.marker_path {
            let markers = fs::read(marker_src)?;
            fs::write(&marker_dest, rewrite_references(&markers, &data_name, None))?;
        }

        Ok(())
    }

    fn companion_paths(&self, path: &Path) -> Vec<PathBuf> {
        let [data_dest, marker_dest] = triplet_paths(path);
        let mut paths = vec![data_dest];
        if self.marker_path.is_some() {
            paths.push(marker_dest);
        }
        paths
    }
}

impl Recording for BrainVisionRecording {
    fn info(&self) -> &RecordingInfo {
        &self.info
    }

    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }
}

fn triplet_paths(vhdr: &Path) -> [PathBuf; 2] {
    [vhdr.with_extension("eeg"), vhdr.with_extension("vmrk")]
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn binary_width(binary_format: &str) -> Option<u64> {
    match binary_format.to_ascii_uppercase().as_str() {
        "INT_16" | "UINT_16" => Some(2),
        "INT_32" | "IEEE_FLOAT_32" => Some(4),
        _ => None,
    }
}

fn decode(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Splits `bytes` into lines, trimming the trailing `\r` of CRLF files.
fn lines(bytes: &[u8]) -> impl Iterator<Item = &[u8]> {
    bytes
        .split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
}

/// Parses the fields of a `.vhdr` file.
pub fn parse_vhdr(bytes: &[u8]) -> Result<VhdrHeader, String> {
    let text = decode(bytes);
    let mut lines_iter = text.lines();

    let first = lines_iter.next().unwrap_or_default();
    if !first.contains("Brain Vision Data Exchange Header File") {
        return Err("missing BrainVision header identification line".to_string());
    }

    let mut header = VhdrHeader::default();
    let mut section = String::new();

    for line in lines_iter {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            section = name.to_string();
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };

        match (section.as_str(), key) {
            ("Common Infos", "DataFile") => header.data_file = value.to_string(),
            ("Common Infos", "MarkerFile") => header.marker_file = Some(value.to_string()),
            ("Common Infos", "DataFormat") => header.data_format = value.to_string(),
            ("Common Infos", "NumberOfChannels") => {
                header.num_channels = value
                    .parse()
                    .map_err(|_| format!("invalid NumberOfChannels '{}'", value))?;
            }
            ("Common Infos", "SamplingInterval") => {
                header.sampling_interval_us = value
                    .parse()
                    .map_err(|_| format!("invalid SamplingInterval '{}'", value))?;
            }
            ("Binary Infos", "BinaryFormat") => header.binary_format = value.to_string(),
            ("Channel Infos", k) if k.starts_with("Ch") => {
                // Ch<n>=<name>,<reference>,<resolution>,<unit>
                let fields: Vec<&str> = value.split(',').collect();
                let name = fields.first().copied().unwrap_or_default().replace("\\1", ",");
                let unit = fields
                    .get(3)
                    .map(|u| u.trim())
                    .filter(|u| !u.is_empty())
                    .unwrap_or("µV");
                header.channels.push((name, unit.to_string()));
            }
            _ => {}
        }
    }

    if header.data_file.is_empty() {
        return Err("header has no DataFile entry".to_string());
    }
    if header.channels.len() != header.num_channels {
        return Err(format!(
            "NumberOfChannels is {} but {} channel(s) are described",
            header.num_channels,
            header.channels.len()
        ));
    }

    Ok(header)
}

/// Parses `Mk<n>=<type>,<description>,<position>,<points>,...` entries.
///
/// Positions are 1-based sample indices. Entries that cannot be parsed are
/// skipped with a warning. Onsets are left at zero when `sfreq` is unknown.
pub fn parse_vmrk(bytes: &[u8], sfreq: f64) -> Vec<Annotation> {
    let text = decode(bytes);
    let mut annotations = Vec::new();
    let mut in_markers = false;

    for line in text.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_markers = line == "[Marker Infos]";
            continue;
        }
        if !in_markers || !line.starts_with("Mk") {
            continue;
        }
        let Some((_, value)) = line.split_once('=') else {
            continue;
        };

        let fields: Vec<&str> = value.split(',').collect();
        let position = fields.get(2).and_then(|p| p.trim().parse::<u64>().ok());
        let points = fields
            .get(3)
            .and_then(|p| p.trim().parse::<u64>().ok())
            .unwrap_or(1);

        let Some(position) = position else {
            tracing::warn!(marker = line, "skipping marker without a valid position");
            continue;
        };

        let (onset, duration) = if sfreq > 0.0 {
            let duration = if points > 1 { points as f64 / sfreq } else { 0.0 };
            (position.saturating_sub(1) as f64 / sfreq, duration)
        } else {
            (0.0, 0.0)
        };

        let kind = fields.first().copied().unwrap_or_default();
        let desc = fields.get(1).copied().unwrap_or_default();
        let description = if desc.is_empty() {
            kind.to_string()
        } else {
            format!("{}/{}", kind, desc)
        };

        annotations.push(Annotation {
            onset,
            duration,
            description,
        });
    }

    annotations
}

/// Replaces the `DataFile=` and `MarkerFile=` values, keeping every other
/// byte (including line endings and Latin-1 text) untouched.
fn rewrite_references(bytes: &[u8], data_file: &str, marker_file: Option<&str>) -> Vec<u8> {
    let crlf = bytes.windows(2).any(|w| w == b"\r\n");
    let newline: &[u8] = if crlf { b"\r\n" } else { b"\n" };

    let mut out = Vec::with_capacity(bytes.len());
    let mut iter = lines(bytes).peekable();
    while let Some(line) = iter.next() {
        if line.starts_with(DATA_FILE_KEY) {
            out.extend_from_slice(DATA_FILE_KEY);
            out.extend_from_slice(data_file.as_bytes());
        } else if let (true, Some(marker)) = (line.starts_with(MARKER_FILE_KEY), marker_file) {
            out.extend_from_slice(MARKER_FILE_KEY);
            out.extend_from_slice(marker.as_bytes());
        } else {
            out.extend_from_slice(line);
        }
        if iter.peek().is_some() {
            out.extend_from_slice(newline);
        }
    }
    out
}
