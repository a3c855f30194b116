//! KIT/Yokogawa (`.sqd`, `.con`) adapter.
//!
//! The KIT binary header is not decoded. The adapter checks that the
//! digitization files are consistent and carries the marker and head-shape
//! files along so the writer can store them as BIDS sidecars.

use std::path::Path;

use super::{read_error, AuxFiles, RawFile, RawFormat, RecordingInfo};
use crate::error::RawBidsError;

/// Reads a KIT recording together with its digitization files.
///
/// Marker coils (`hpi`), digitizer points (`electrode`) and head shape
/// (`hsp`) are only meaningful together: either all three are given or
/// none is.
pub fn read_kit(path: &Path, aux: &AuxFiles) -> Result<RawFile, RawBidsError> {
    let given = [
        ("hpi", aux.hpi.as_deref()),
        ("electrode", aux.electrode.as_deref()),
        ("hsp", aux.hsp.as_deref()),
    ];

    let present = given.iter().filter(|(_, p)| p.is_some()).count();
    if present != 0 && present != given.len() {
        let missing: Vec<&str> = given
            .iter()
            .filter(|(_, p)| p.is_none())
            .map(|(name, _)| *name)
            .collect();
        return Err(read_error(
            path,
            format!(
                "KIT digitization needs hpi, electrode and hsp together (missing: {})",
                missing.join(", ")
            ),
        ));
    }

    for (name, aux_path) in given {
        if let Some(aux_path) = aux_path {
            if !aux_path.is_file() {
                return Err(read_error(
                    path,
                    format!("{} file '{}' not found", name, aux_path.display()),
                ));
            }
        }
    }

    let mut info = RecordingInfo::new(path, RawFormat::Kit);
    info.markers = aux.hpi.clone();
    info.headshape = aux.hsp.clone();

    Ok(RawFile::new(info))
}
