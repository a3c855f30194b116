//! Events loading and `_events.tsv` generation.
//!
//! Two kinds of events files are accepted:
//!
//! - **Sample-based** MNE text files (`.eve`, `.txt`): one event per line,
//!   `sample previous code`, optionally with a time column after the
//!   sample. Onsets are computed from the recording's sampling frequency
//!   and first sample.
//! - **Time-based** tables (`.tsv`, `.csv`) with an `onset` column and
//!   optional `duration`, `trial_type`, `value` and `sample` columns.
//!
//! Codes are turned into `trial_type` labels through an [`EventIdMap`].

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::tsv::{format_number, tsv_to_string, write_tsv, NA};
use crate::error::RawBidsError;
use crate::raw::Annotation;

const EVENTS_HEADER: [&str; 5] = ["onset", "duration", "trial_type", "value", "sample"];

/// Mapping between event codes and condition names.
///
/// Parsed from `name=code[,name=code...]`, e.g. `auditory=1,visual=3`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventIdMap {
    by_code: BTreeMap<i64, String>,
}

impl EventIdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a mapping, failing on duplicated names or codes.
    pub fn insert(&mut self, name: impl Into<String>, code: i64) -> Result<(), RawBidsError> {
        let name = name.into();
        let invalid = |reason: String| RawBidsError::EventIdInvalid {
            value: format!("{}={}", name, code),
            reason,
        };

        if name.is_empty() || name.contains(['\t', '\n']) {
            return Err(invalid("names must be non-empty and free of tabs".to_string()));
        }
        if self.by_code.contains_key(&code) {
            return Err(invalid(format!("code {} is mapped twice", code)));
        }
        if self.code(&name).is_some() {
            return Err(invalid(format!("name '{}' is mapped twice", name)));
        }

        self.by_code.insert(code, name);
        Ok(())
    }

    /// The condition name for `code`.
    pub fn name(&self, code: i64) -> Option<&str> {
        self.by_code.get(&code).map(String::as_str)
    }

    /// The code for condition `name`.
    pub fn code(&self, name: &str) -> Option<i64> {
        self.by_code
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(&code, _)| code)
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

impl FromStr for EventIdMap {
    type Err = RawBidsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut map = EventIdMap::new();
        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, code) = pair
                .split_once('=')
                .or_else(|| pair.split_once(':'))
                .ok_or_else(|| RawBidsError::EventIdInvalid {
                    value: pair.to_string(),
                    reason: "expected name=code".to_string(),
                })?;
            let code: i64 = code.trim().parse().map_err(|_| RawBidsError::EventIdInvalid {
                value: pair.to_string(),
                reason: format!("'{}' is not an integer code", code.trim()),
            })?;
            map.insert(name.trim(), code)?;
        }
        Ok(map)
    }
}

/// An event from a sample-based file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleEvent {
    /// Absolute sample index (including the recording's first sample).
    pub sample: i64,
    pub code: i64,
}

/// One row of `_events.tsv`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BidsEvent {
    /// Seconds from the start of the stored data.
    pub onset: f64,
    pub duration: f64,
    pub trial_type: Option<String>,
    pub value: Option<i64>,
    /// Sample index relative to the start of the stored data.
    pub sample: Option<i64>,
}

/// The contents of an events file, before any sampling-rate conversion.
#[derive(Clone, Debug, PartialEq)]
pub enum EventsData {
    Samples(Vec<SampleEvent>),
    Timed(Vec<BidsEvent>),
}

/// A row of a time-based events table.
#[derive(Debug, Deserialize)]
struct TimedRow {
    onset: f64,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    duration: Option<f64>,
    #[serde(default)]
    trial_type: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    value: Option<i64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    sample: Option<i64>,
}

/// Reads an events file, choosing the parser from its extension.
pub fn read_events(path: &Path) -> Result<EventsData, RawBidsError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("eve") | Some("txt") => {
            let text = fs::read_to_string(path).map_err(RawBidsError::Io)?;
            from_mne_events_str(&text, path).map(EventsData::Samples)
        }
        Some("tsv") => read_timed(path, b'\t').map(EventsData::Timed),
        Some("csv") => read_timed(path, b',').map(EventsData::Timed),
        _ => Err(RawBidsError::UnsupportedFormat(format!(
            "events file '{}' (supported: .eve, .txt, .tsv, .csv)",
            path.display()
        ))),
    }
}

/// Parses MNE text events.
///
/// Blank lines and `#` comments are ignored. Lines have three integer
/// columns, or four when a time column follows the sample.
pub fn from_mne_events_str(text: &str, path: &Path) -> Result<Vec<SampleEvent>, RawBidsError> {
    let mut events = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let cols: Vec<&str> = line.split_whitespace().collect();
        let (sample, code) = match cols.as_slice() {
            [sample, _prev, code] | [sample, _, _prev, code] => (*sample, *code),
            _ => {
                return Err(RawBidsError::EventsInvalid {
                    path: path.to_path_buf(),
                    message: format!(
                        "line {}: expected 3 or 4 columns, found {}",
                        idx + 1,
                        cols.len()
                    ),
                })
            }
        };

        let parse = |value: &str, what: &str| {
            value.parse::<i64>().map_err(|_| RawBidsError::EventsInvalid {
                path: path.to_path_buf(),
                message: format!("line {}: invalid {} '{}'", idx + 1, what, value),
            })
        };

        events.push(SampleEvent {
            sample: parse(sample, "sample")?,
            code: parse(code, "event code")?,
        });
    }

    Ok(events)
}

fn read_timed(path: &Path, delimiter: u8) -> Result<Vec<BidsEvent>, RawBidsError> {
    let file = File::open(path).map_err(RawBidsError::Io)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let mut events = Vec::new();
    for result in reader.deserialize() {
        let row: TimedRow = result.map_err(|source| RawBidsError::EventsParse {
            path: path.to_path_buf(),
            source,
        })?;
        events.push(BidsEvent {
            onset: row.onset,
            duration: row.duration.unwrap_or(0.0),
            trial_type: row.trial_type.filter(|t| !t.is_empty() && t != NA),
            value: row.value,
            sample: row.sample,
        });
    }

    Ok(events)
}

/// Converts sample-based events into rows relative to the stored data.
///
/// Codes missing from `event_id` keep their value but get no trial type.
pub fn events_from_samples(
    events: &[SampleEvent],
    sfreq: f64,
    first_samp: i64,
    event_id: Option<&EventIdMap>,
) -> Vec<BidsEvent> {
    events
        .iter()
        .map(|event| {
            let sample = event.sample - first_samp;
            let trial_type = event_id.and_then(|map| map.name(event.code));
            if event_id.is_some() && trial_type.is_none() {
                tracing::warn!(code = event.code, "event code has no entry in the event id mapping");
            }
            BidsEvent {
                onset: sample as f64 / sfreq,
                duration: 0.0,
                trial_type: trial_type.map(str::to_string),
                value: Some(event.code),
                sample: Some(sample),
            }
        })
        .collect()
}

/// Converts annotations stored in a recording into rows.
///
/// The description becomes the trial type; `event_id` supplies the value.
pub fn events_from_annotations(
    annotations: &[Annotation],
    sfreq: Option<f64>,
    event_id: Option<&EventIdMap>,
) -> Vec<BidsEvent> {
    annotations
        .iter()
        .map(|ann| BidsEvent {
            onset: ann.onset,
            duration: ann.duration,
            trial_type: Some(ann.description.clone()),
            value: event_id.and_then(|map| map.code(&ann.description)),
            sample: sfreq.map(|sfreq| (ann.onset * sfreq).round() as i64),
        })
        .collect()
}

/// Attaches codes from `event_id` to time-based rows that name a known
/// trial type but carry no value, and names rows that carry only a value.
pub fn apply_event_id(events: &mut [BidsEvent], event_id: &EventIdMap) {
    for event in events {
        match (&event.trial_type, event.value) {
            (Some(name), None) => event.value = event_id.code(name),
            (None, Some(code)) => event.trial_type = event_id.name(code).map(str::to_string),
            _ => {}
        }
    }
}

fn event_rows(events: &[BidsEvent]) -> Vec<Vec<String>> {
    let mut sorted: Vec<&BidsEvent> = events.iter().collect();
    sorted.sort_by(|a, b| a.onset.total_cmp(&b.onset));

    sorted
        .into_iter()
        .map(|event| {
            vec![
                format_number(event.onset),
                format_number(event.duration),
                event.trial_type.clone().unwrap_or_else(|| NA.to_string()),
                event
                    .value
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| NA.to_string()),
                event
                    .sample
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| NA.to_string()),
            ]
        })
        .collect()
}

/// Writes `_events.tsv`, ordered by onset.
pub fn write_events_tsv(path: &Path, events: &[BidsEvent]) -> Result<(), RawBidsError> {
    write_tsv(path, &EVENTS_HEADER, event_rows(events))
}

/// Renders `_events.tsv` contents as a string.
///
/// Useful for testing without file I/O.
pub fn to_events_tsv_string(events: &[BidsEvent]) -> Result<String, RawBidsError> {
    tsv_to_string(&EVENTS_HEADER, event_rows(events))
}
