//! FIF header reader.
//!
//! A FIF file is a sequence of tags. Each tag starts with a 16-byte
//! big-endian header `(kind, type, size, next)` followed by `size` bytes of
//! payload. `next == 0` means the following tag starts right after the
//! payload, `next > 0` is an absolute offset, and `next == -1` ends the file.
//!
//! Only the tags needed for BIDS sidecars are decoded; data buffers are
//! skipped over and only counted.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use super::{read_error, Channel, ChannelType, RawFile, RawFormat, RecordingInfo};
use crate::error::RawBidsError;

const TAG_HEADER_LEN: u64 = 16;

const FIFF_FILE_ID: i32 = 100;
const FIFF_NCHAN: i32 = 200;
const FIFF_SFREQ: i32 = 201;
const FIFF_CH_INFO: i32 = 203;
const FIFF_FIRST_SAMPLE: i32 = 208;
const FIFF_DATA_BUFFER: i32 = 300;

const FIFFT_DAU_PACK16: i32 = 16;
const FIFFT_SHORT: i32 = 2;
const FIFFT_INT: i32 = 3;
const FIFFT_FLOAT: i32 = 4;
const FIFFT_DOUBLE: i32 = 5;

const FIFFV_MEG_CH: i32 = 1;
const FIFFV_EEG_CH: i32 = 2;
const FIFFV_STIM_CH: i32 = 3;
const FIFFV_EOG_CH: i32 = 202;
const FIFFV_REF_MEG_CH: i32 = 301;
const FIFFV_EMG_CH: i32 = 302;
const FIFFV_ECG_CH: i32 = 402;

const FIFF_UNIT_V: i32 = 107;
const FIFF_UNIT_T: i32 = 112;
const FIFF_UNIT_T_M: i32 = 201;

/// Size of a `fiffChInfoRec` payload.
const CH_INFO_LEN: usize = 96;

/// Header fields collected from a FIF tag scan.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FifHeader {
    pub nchan: Option<usize>,
    pub sfreq: Option<f64>,
    pub first_samp: i64,
    pub channels: Vec<Channel>,
    pub n_samples: Option<u64>,
}

#[derive(Debug)]
struct TagHeader {
    kind: i32,
    tag_type: i32,
    size: i32,
    next: i32,
}

/// Reads a FIF recording's header.
pub fn read_fif(path: &Path) -> Result<RawFile, RawBidsError> {
    let file = File::open(path).map_err(RawBidsError::Io)?;
    let header = parse_fif_header(BufReader::new(file)).map_err(|msg| read_error(path, msg))?;

    let mut info = RecordingInfo::new(path, RawFormat::Fif);
    info.sfreq = header.sfreq;
    info.first_samp = header.first_samp;
    info.n_samples = header.n_samples;
    info.channels = header.channels;

    tracing::debug!(
        sfreq = ?info.sfreq,
        nchan = info.channels.len(),
        first_samp = info.first_samp,
        "parsed FIF header"
    );

    Ok(RawFile::new(info))
}

/// Scans FIF tags from `reader`.
///
/// Errors are plain messages; callers attach the path.
pub fn parse_fif_header<R: Read + Seek>(mut reader: R) -> Result<FifHeader, String> {
    let len = reader
        .seek(SeekFrom::End(0))
        .map_err(|e| format!("cannot determine file size: {}", e))?;
    reader
        .seek(SeekFrom::Start(0))
        .map_err(|e| format!("cannot seek: {}", e))?;

    let mut header = FifHeader::default();
    let mut data_bytes: Option<u64> = None;
    let mut data_width: Option<u64> = None;
    let mut pos: u64 = 0;
    let mut first = true;

    while pos + TAG_HEADER_LEN <= len {
        reader
            .seek(SeekFrom::Start(pos))
            .map_err(|e| format!("cannot seek to tag at {}: {}", pos, e))?;
        let tag = read_tag_header(&mut reader)?;

        if first {
            if tag.kind != FIFF_FILE_ID {
                return Err("not a FIF file (missing file id tag)".to_string());
            }
            first = false;
        }

        if tag.size < 0 {
            return Err(format!("negative tag size at offset {}", pos));
        }
        let size = tag.size as u64;
        let payload_end = pos + TAG_HEADER_LEN + size;
        if payload_end > len {
            return Err(format!("tag at offset {} runs past end of file", pos));
        }

        match tag.kind {
            FIFF_NCHAN => header.nchan = Some(read_i32(&mut reader)?.max(0) as usize),
            FIFF_SFREQ => header.sfreq = Some(read_f32(&mut reader)? as f64),
            FIFF_FIRST_SAMPLE => header.first_samp = read_i32(&mut reader)? as i64,
            FIFF_CH_INFO => {
                if (size as usize) < CH_INFO_LEN {
                    return Err(format!("short channel info tag at offset {}", pos));
                }
                let mut buf = [0u8; CH_INFO_LEN];
                reader
                    .read_exact(&mut buf)
                    .map_err(|e| format!("cannot read channel info: {}", e))?;
                header.channels.push(parse_ch_info(&buf));
            }
            FIFF_DATA_BUFFER => {
                *data_bytes.get_or_insert(0) += size;
                data_width = data_width.or_else(|| sample_width(tag.tag_type));
            }
            _ => {}
        }

        pos = match tag.next {
            -1 => break,
            0 => payload_end,
            next if (next as u64) > pos => next as u64,
            next => return Err(format!("tag at offset {} points backwards to {}", pos, next)),
        };
    }

    if first {
        return Err("file is too short to be FIF".to_string());
    }

    let nchan = header.nchan.unwrap_or(header.channels.len());
    if let (Some(bytes), Some(width)) = (data_bytes, data_width) {
        if nchan > 0 {
            header.n_samples = Some(bytes / (width * nchan as u64));
        }
    }

    Ok(header)
}

fn read_tag_header<R: Read>(reader: &mut R) -> Result<TagHeader, String> {
    Ok(TagHeader {
        kind: read_i32(reader)?,
        tag_type: read_i32(reader)?,
        size: read_i32(reader)?,
        next: read_i32(reader)?,
    })
}

fn read_i32<R: Read>(reader: &mut R) -> Result<i32, String> {
    let mut buf = [0u8; 4];
    reader
        .read_exact(&mut buf)
        .map_err(|e| format!("unexpected end of file: {}", e))?;
    Ok(i32::from_be_bytes(buf))
}

fn read_f32<R: Read>(reader: &mut R) -> Result<f32, String> {
    let mut buf = [0u8; 4];
    reader
        .read_exact(&mut buf)
        .map_err(|e| format!("unexpected end of file: {}", e))?;
    Ok(f32::from_be_bytes(buf))
}

fn sample_width(tag_type: i32) -> Option<u64> {
    match tag_type {
        FIFFT_DAU_PACK16 | FIFFT_SHORT => Some(2),
        FIFFT_INT | FIFFT_FLOAT => Some(4),
        FIFFT_DOUBLE => Some(8),
        _ => None,
    }
}

fn be_i32(buf: &[u8], offset: usize) -> i32 {
    i32::from_be_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

/// Decodes a `fiffChInfoRec`:
/// scanno, logno, kind, range, cal, coil_type, loc[12], unit, unit_mul, name[16].
fn parse_ch_info(buf: &[u8; CH_INFO_LEN]) -> Channel {
    let kind = be_i32(buf, 8);
    let unit = be_i32(buf, 72);
    let unit_mul = be_i32(buf, 76);

    let name_bytes = &buf[80..96];
    let name_end = name_bytes.iter().position(|&b| b == 0).unwrap_or(16);
    let name = String::from_utf8_lossy(&name_bytes[..name_end]).trim().to_string();

    let channel_type = match kind {
        FIFFV_MEG_CH if unit == FIFF_UNIT_T_M => ChannelType::MegGradPlanar,
        FIFFV_MEG_CH => ChannelType::MegMag,
        FIFFV_REF_MEG_CH => ChannelType::MegRef,
        FIFFV_EEG_CH => ChannelType::Eeg,
        FIFFV_STIM_CH => ChannelType::Trig,
        FIFFV_EOG_CH => ChannelType::Eog,
        FIFFV_ECG_CH => ChannelType::Ecg,
        FIFFV_EMG_CH => ChannelType::Emg,
        _ => ChannelType::Misc,
    };

    Channel::new(name, channel_type, unit_name(unit, unit_mul))
}

fn unit_name(unit: i32, unit_mul: i32) -> String {
    let base = match unit {
        FIFF_UNIT_V => "V",
        FIFF_UNIT_T => "T",
        FIFF_UNIT_T_M => "T/m",
        _ => return "n/a".to_string(),
    };
    let prefix = match unit_mul {
        -15 => "f",
        -12 => "p",
        -9 => "n",
        -6 => "µ",
        -3 => "m",
        _ => "",
    };
    format!("{}{}", prefix, base)
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Minimal FIF writer for tests.

    pub fn tag(kind: i32, tag_type: i32, payload: &[u8], next: i32) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + payload.len());
        out.extend_from_slice(&kind.to_be_bytes());
        out.extend_from_slice(&tag_type.to_be_bytes());
        out.extend_from_slice(&(payload.len() as i32).to_be_bytes());
        out.extend_from_slice(&next.to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    pub fn ch_info(name: &str, kind: i32, unit: i32, unit_mul: i32) -> Vec<u8> {
        let mut out = vec![0u8; 96];
        out[8..12].copy_from_slice(&kind.to_be_bytes());
        out[72..76].copy_from_slice(&unit.to_be_bytes());
        out[76..80].copy_from_slice(&unit_mul.to_be_bytes());
        let bytes = name.as_bytes();
        out[80..80 + bytes.len()].copy_from_slice(bytes);
        out
    }

    /// Two channels (one magnetometer, one stim) at 1000 Hz, 50 samples.
    pub fn sample_fif() -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(tag(100, 31, &[0u8; 20], 0));
        out.extend(tag(200, 3, &2i32.to_be_bytes(), 0));
        out.extend(tag(201, 4, &1000f32.to_be_bytes(), 0));
        out.extend(tag(203, 30, &ch_info("MEG 0111", 1, 112, 0), 0));
        out.extend(tag(203, 30, &ch_info("STI 014", 3, 107, 0), 0));
        out.extend(tag(208, 3, &25i32.to_be_bytes(), 0));
        out.extend(tag(300, 4, &[0u8; 2 * 4 * 50], -1));
        out
    }
}
