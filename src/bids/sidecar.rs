//! Metadata sidecars: `_channels.tsv`, `_<kind>.json` and the dataset-level
//! `dataset_description.json` / `participants.tsv`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use super::entity::Kind;
use super::tsv::{append_tsv, format_number, write_tsv, NA};
use crate::error::RawBidsError;
use crate::raw::{ChannelType, RecordingInfo};

/// BIDS version written to `dataset_description.json`.
pub const BIDS_VERSION: &str = "1.0.2";

const CHANNELS_HEADER: [&str; 5] = ["name", "type", "units", "sampling_frequency", "status"];
const PARTICIPANT_ID: &str = "participant_id";

/// `dataset_description.json`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DatasetDescription {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "BIDSVersion")]
    pub bids_version: String,
}

/// The modality sidecar (`_meg.json`, `_eeg.json`, `_ieeg.json`).
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct KindSidecar {
    pub task_name: Option<String>,
    pub manufacturer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling_frequency: Option<f64>,
    pub power_line_frequency: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording_duration: Option<f64>,
    #[serde(rename = "MEGChannelCount", skip_serializing_if = "Option::is_none")]
    pub meg_channel_count: Option<usize>,
    #[serde(rename = "MEGREFChannelCount", skip_serializing_if = "Option::is_none")]
    pub meg_ref_channel_count: Option<usize>,
    #[serde(rename = "EEGChannelCount")]
    pub eeg_channel_count: usize,
    #[serde(rename = "EOGChannelCount")]
    pub eog_channel_count: usize,
    #[serde(rename = "ECGChannelCount")]
    pub ecg_channel_count: usize,
    #[serde(rename = "EMGChannelCount")]
    pub emg_channel_count: usize,
    pub misc_channel_count: usize,
    pub trigger_channel_count: usize,
}

impl KindSidecar {
    /// Builds the sidecar from recording metadata.
    ///
    /// MEG counts are only emitted for MEG data. An unknown line frequency
    /// is written as `"n/a"`.
    pub fn from_info(
        info: &RecordingInfo,
        kind: Kind,
        task: Option<&str>,
        line_freq: Option<f64>,
    ) -> Self {
        let meg = kind == Kind::Meg;
        let count = |t: ChannelType| info.count(t);

        Self {
            task_name: task.map(str::to_string),
            manufacturer: info.format.manufacturer().to_string(),
            sampling_frequency: info.sfreq,
            power_line_frequency: match line_freq {
                Some(freq) => serde_json::json!(freq),
                None => serde_json::json!(NA),
            },
            recording_duration: info.duration(),
            meg_channel_count: meg.then(|| {
                info.channels
                    .iter()
                    .filter(|c| c.channel_type.is_meg())
                    .count()
            }),
            meg_ref_channel_count: meg.then(|| count(ChannelType::MegRef)),
            eeg_channel_count: count(ChannelType::Eeg),
            eog_channel_count: count(ChannelType::Eog),
            ecg_channel_count: count(ChannelType::Ecg),
            emg_channel_count: count(ChannelType::Emg),
            misc_channel_count: count(ChannelType::Misc),
            trigger_channel_count: count(ChannelType::Trig),
        }
    }
}

/// Writes any serializable sidecar as pretty JSON.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), RawBidsError> {
    let file = File::create(path).map_err(RawBidsError::Io)?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, value).map_err(|source| {
        RawBidsError::SidecarWrite {
            path: path.to_path_buf(),
            source,
        }
    })?;
    writer.write_all(b"\n").map_err(RawBidsError::Io)?;
    writer.flush().map_err(RawBidsError::Io)
}

/// Writes `_channels.tsv` from the recording's channel list.
pub fn write_channels_tsv(path: &Path, info: &RecordingInfo) -> Result<(), RawBidsError> {
    let rows = info.channels.iter().map(|channel| {
        let sfreq = channel.sampling_frequency.or(info.sfreq);
        vec![
            channel.name.clone(),
            channel.channel_type.bids_name().to_string(),
            channel.unit.clone(),
            sfreq.map(format_number).unwrap_or_else(|| NA.to_string()),
            "good".to_string(),
        ]
    });
    write_tsv(path, &CHANNELS_HEADER, rows.collect::<Vec<_>>())
}

/// Creates `dataset_description.json` if it does not exist yet.
///
/// Returns true when the file was written. An existing description is
/// never modified.
pub fn ensure_dataset_description(root: &Path, name: &str) -> Result<bool, RawBidsError> {
    let path = root.join("dataset_description.json");
    if path.exists() {
        return Ok(false);
    }

    write_json(
        &path,
        &DatasetDescription {
            name: name.to_string(),
            bids_version: BIDS_VERSION.to_string(),
        },
    )?;
    Ok(true)
}

/// Adds `sub-<subject>` to `participants.tsv`, creating the file if needed.
///
/// Extra columns in an existing file are filled with `n/a`. Returns true
/// when a row was added.
pub fn ensure_participant(root: &Path, subject: &str) -> Result<bool, RawBidsError> {
    let path = root.join("participants.tsv");
    let participant = format!("sub-{}", subject);

    if !path.exists() {
        write_tsv(&path, &[PARTICIPANT_ID], vec![vec![participant]])?;
        return Ok(true);
    }

    let file = File::open(&path).map_err(RawBidsError::Io)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(BufReader::new(file));

    let headers = reader
        .headers()
        .map_err(|source| RawBidsError::ParticipantsRead {
            path: path.clone(),
            source,
        })?
        .clone();
    let id_column = headers
        .iter()
        .position(|h| h == PARTICIPANT_ID)
        .ok_or_else(|| RawBidsError::ParticipantsInvalid {
            path: path.clone(),
            message: format!("missing '{}' column", PARTICIPANT_ID),
        })?;

    for record in reader.records() {
        let record = record.map_err(|source| RawBidsError::ParticipantsRead {
            path: path.clone(),
            source,
        })?;
        if record.get(id_column) == Some(participant.as_str()) {
            return Ok(false);
        }
    }

    let mut row = vec![NA.to_string(); headers.len()];
    row[id_column] = participant;
    append_tsv(&path, vec![row])?;
    Ok(true)
}

/// Default dataset name: the output folder's name.
pub fn default_dataset_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "rawbids dataset".to_string())
}
