//! Tab-separated writing shared by the `.tsv` sidecars.

use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::RawBidsError;

/// BIDS placeholder for missing values.
pub const NA: &str = "n/a";

/// Writes `header` and `rows` as TSV to `path`, replacing the file.
pub fn write_tsv<I>(path: &Path, header: &[&str], rows: I) -> Result<(), RawBidsError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let file = File::create(path).map_err(RawBidsError::Io)?;
    write_tsv_to(BufWriter::new(file), path, header, rows)?
        .flush()
        .map_err(RawBidsError::Io)
}

/// Renders `header` and `rows` as a TSV string.
///
/// Useful for testing without file I/O.
pub fn tsv_to_string<I>(header: &[&str], rows: I) -> Result<String, RawBidsError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let dummy_path = Path::new("<string>");
    let bytes = write_tsv_to(Vec::new(), dummy_path, header, rows)?;
    String::from_utf8(bytes).map_err(|e| {
        RawBidsError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })
}

/// Appends `rows` to an existing TSV file without writing a header.
///
/// A missing final newline is added first so the new rows start on their
/// own line.
pub fn append_tsv<I>(path: &Path, rows: I) -> Result<(), RawBidsError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut file = std::fs::OpenOptions::new()
        .read(true)
        .append(true)
        .open(path)
        .map_err(RawBidsError::Io)?;

    if !ends_with_newline(&mut file)? {
        file.write_all(b"\n").map_err(RawBidsError::Io)?;
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(BufWriter::new(file));
    for row in rows {
        writer
            .write_record(&row)
            .map_err(|source| tsv_error(path, source))?;
    }
    writer
        .into_inner()
        .map_err(|e| RawBidsError::Io(e.into_error()))?
        .flush()
        .map_err(RawBidsError::Io)
}

/// True for an empty file or one whose last byte is `\n`.
fn ends_with_newline(file: &mut File) -> Result<bool, RawBidsError> {
    let len = file.metadata().map_err(RawBidsError::Io)?.len();
    if len == 0 {
        return Ok(true);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1)).map_err(RawBidsError::Io)?;
    file.read_exact(&mut last).map_err(RawBidsError::Io)?;
    Ok(last[0] == b'\n')
}

fn write_tsv_to<W, I>(writer: W, path: &Path, header: &[&str], rows: I) -> Result<W, RawBidsError>
where
    W: Write,
    I: IntoIterator<Item = Vec<String>>,
{
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);

    csv_writer
        .write_record(header)
        .map_err(|source| tsv_error(path, source))?;
    for row in rows {
        csv_writer
            .write_record(&row)
            .map_err(|source| tsv_error(path, source))?;
    }

    csv_writer
        .into_inner()
        .map_err(|e| RawBidsError::Io(e.into_error()))
}

fn tsv_error(path: &Path, source: csv::Error) -> RawBidsError {
    RawBidsError::TsvWrite {
        path: path.to_path_buf(),
        source,
    }
}

/// Formats a value in seconds or hertz without float noise.
pub fn format_number(value: f64) -> String {
    let rounded = (value * 1e6).round() / 1e6;
    if rounded == 0.0 {
        // Avoid "-0".
        return "0".to_string();
    }
    rounded.to_string()
}
