//! EDF/EDF+ and BDF header reader.
//!
//! Headers are decoded by `edf-reader`. BDF only differs in its magic bytes
//! and 24-bit samples, so the format is told apart by sniffing the first
//! eight bytes before handing the file to the reader.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use edf_reader::model::{EDFChannel, EDFHeader};
use local_edf_reader::init_sync_reader;

use super::{read_error, Channel, ChannelType, RawFile, RawFormat, RecordingInfo};
use crate::error::RawBidsError;

const FIXED_HEADER_LEN: usize = 256;
const BDF_MAGIC: &[u8; 8] = b"\xFFBIOSEMI";
const ANNOTATION_LABELS: [&str; 2] = ["EDF Annotations", "BDF Annotations"];

fn is_annotation(channel: &EDFChannel) -> bool {
    ANNOTATION_LABELS.contains(&channel.label.trim())
}

/// Reads an EDF or BDF recording's header.
pub fn read_edf(path: &Path) -> Result<RawFile, RawBidsError> {
    let format = sniff_format(path)?;
    let path_str = path
        .to_str()
        .ok_or_else(|| read_error(path, "path is not valid UTF-8"))?;
    let reader = init_sync_reader(path_str).map_err(|e| read_error(path, e.to_string()))?;

    let info = recording_info(path, format, &reader.edf_header);
    tracing::debug!(
        sfreq = ?info.sfreq,
        nchan = info.channels.len(),
        format = info.format.name(),
        "parsed EDF header"
    );

    Ok(RawFile::new(info))
}

/// Checks the version field and the fixed numeric fields, which
/// `edf-reader` parses without reporting errors.
fn sniff_format(path: &Path) -> Result<RawFormat, RawBidsError> {
    let mut fixed = [0u8; FIXED_HEADER_LEN];
    BufReader::new(File::open(path)?)
        .read_exact(&mut fixed)
        .map_err(|_| read_error(path, "file is too short for an EDF header"))?;

    let format = if &fixed[..8] == BDF_MAGIC {
        RawFormat::Bdf
    } else if ascii_field(&fixed[..8]) == "0" {
        RawFormat::Edf
    } else {
        return Err(read_error(path, "not an EDF/BDF file (bad version field)"));
    };

    let records = ascii_field(&fixed[236..244]);
    if records.parse::<u64>().is_err() {
        return Err(read_error(
            path,
            format!("invalid number of data records '{}'", records),
        ));
    }
    let duration = ascii_field(&fixed[244..252]);
    if duration.parse::<f64>().is_err() {
        return Err(read_error(
            path,
            format!("invalid data record duration '{}'", duration),
        ));
    }
    let ns = ascii_field(&fixed[252..256]);
    if ns.parse::<u64>().is_err() {
        return Err(read_error(path, format!("invalid number of signals '{}'", ns)));
    }

    Ok(format)
}

fn ascii_field(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

/// Maps a decoded header onto the recording description. Annotation
/// signals are not channels.
fn recording_info(path: &Path, format: RawFormat, header: &EDFHeader) -> RecordingInfo {
    let mut info = RecordingInfo::new(path, format);
    let data_signals: Vec<&EDFChannel> =
        header.channels.iter().filter(|c| !is_annotation(c)).collect();

    // block_duration is in milliseconds
    let block_ms = header.block_duration as f64;
    let rate = |c: &EDFChannel| c.number_of_samples_in_data_record as f64 * 1000.0 / block_ms;
    if block_ms > 0.0 {
        info.sfreq = data_signals.first().map(|c| rate(c));
        info.n_samples = data_signals
            .first()
            .map(|c| c.number_of_samples_in_data_record * header.number_of_blocks);
    }

    info.channels = data_signals
        .iter()
        .map(|c| {
            let label = c.label.trim().to_string();
            let unit = c.physical_dimension.trim();
            let mut channel = Channel::new(
                label.clone(),
                ChannelType::from_eeg_label(&label),
                if unit.is_empty() { "n/a" } else { unit }.to_string(),
            );
            if block_ms > 0.0 && Some(rate(c)) != info.sfreq {
                channel.sampling_frequency = Some(rate(c));
            }
            channel
        })
        .collect();
    info
}
