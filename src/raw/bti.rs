//! 4D Neuroimaging / BTi adapter.
//!
//! A 4D run is a processed data file (`c,rfDC`, `e,rfhp1.0Hz`, ...) that is
//! only readable together with its acquisition `config` and the `hs_file`
//! head shape, both conventionally stored in the same directory. In a BIDS
//! tree the three files are kept together in a folder named after the
//! recording basename.

use std::fs;
use std::path::{Path, PathBuf};

use super::{read_error, AuxFiles, Persistable, RawFormat, Recording, RecordingInfo};
use crate::error::RawBidsError;

const DEFAULT_CONFIG: &str = "config";
const DEFAULT_HEAD_SHAPE: &str = "hs_file";

/// Returns true for 4D processed-data file names such as `c,rfDC`.
pub fn is_bti_pdf(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| {
            let mut chars = name.chars();
            matches!(
                (chars.next(), chars.next()),
                (Some(c), Some(',')) if c.is_ascii_alphabetic()
            )
        })
}

/// A 4D run and its companion files.
#[derive(Clone, Debug)]
pub struct BtiRecording {
    info: RecordingInfo,
    config: PathBuf,
    head_shape: PathBuf,
}

/// Reads a 4D run, locating `config` and `hs_file` next to it unless given.
pub fn read_bti(path: &Path, aux: &AuxFiles) -> Result<BtiRecording, RawBidsError> {
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let config = aux
        .config
        .clone()
        .unwrap_or_else(|| dir.join(DEFAULT_CONFIG));
    let head_shape = aux
        .hsp
        .clone()
        .unwrap_or_else(|| dir.join(DEFAULT_HEAD_SHAPE));

    for (what, companion) in [("config", &config), ("head shape", &head_shape)] {
        if !companion.is_file() {
            return Err(read_error(
                path,
                format!("4D {} file '{}' not found", what, companion.display()),
            ));
        }
    }

    Ok(BtiRecording {
        info: RecordingInfo::new(path, RawFormat::Bti),
        config,
        head_shape,
    })
}

impl Persistable for BtiRecording {
    /// Creates `path` as a directory holding the run, `config` and `hs_file`.
    fn save(&self, path: &Path) -> std::io::Result<()> {
        fs::create_dir_all(path)?;

        let run_name = self
            .info
            .source
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("c,rfDC"));

        fs::copy(&self.info.source, path.join(run_name))?;
        fs::copy(&self.config, path.join(DEFAULT_CONFIG))?;
        fs::copy(&self.head_shape, path.join(DEFAULT_HEAD_SHAPE))?;
        Ok(())
    }
}

impl Recording for BtiRecording {
    fn info(&self) -> &RecordingInfo {
        &self.info
    }
}
