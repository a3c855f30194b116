//! Writes a recording and its sidecars into a BIDS tree.
//!
//! Every destination is computed and checked before the first byte is
//! written, so a refused write leaves the dataset untouched.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::entity::Kind;
use super::events::{
    apply_event_id, events_from_annotations, events_from_samples, read_events, write_events_tsv,
    BidsEvent, EventIdMap, EventsData,
};
use super::path::{make_bids_folders, parse_bids_basename, BidsEntities};
use super::report::{FileRole, WriteReport};
use super::sidecar::{
    default_dataset_name, ensure_dataset_description, ensure_participant, write_channels_tsv,
    write_json, KindSidecar,
};
use crate::error::RawBidsError;
use crate::raw::{Recording, RecordingInfo};

/// Options for [`write_raw_bids`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteOptions {
    /// Replace destination files that already exist.
    pub overwrite: bool,
    /// Maps event codes to trial type names.
    pub event_id: Option<EventIdMap>,
    /// Power line frequency (Hz) for the modality sidecar.
    pub line_freq: Option<f64>,
}

/// Every path one write will touch, computed up front.
#[derive(Debug)]
struct WritePlan {
    entities: BidsEntities,
    kind: Kind,
    folder: PathBuf,
    data: PathBuf,
    companions: Vec<PathBuf>,
    events: Option<PathBuf>,
    channels: Option<PathBuf>,
    sidecar: PathBuf,
    markers: Option<(PathBuf, PathBuf)>,
    headshape: Option<(PathBuf, PathBuf)>,
}

impl WritePlan {
    /// Per-recording destinations. Shared files (head shape, dataset
    /// description, participants) are not included.
    fn destinations(&self) -> Vec<&Path> {
        let mut paths = vec![self.data.as_path()];
        paths.extend(self.companions.iter().map(PathBuf::as_path));
        paths.extend(self.events.as_deref());
        paths.extend(self.channels.as_deref());
        paths.push(self.sidecar.as_path());
        paths.extend(self.markers.as_ref().map(|(_, dest)| dest.as_path()));
        paths
    }
}

/// Writes `raw` into the BIDS dataset rooted at `output_path`.
///
/// `bids_basename` names the data file (e.g. `sub-01_task-rest_meg.fif`);
/// its kind decides the datatype folder. Events come from `events_data`
/// when given, otherwise from the recording's own annotations.
///
/// # Errors
/// - [`RawBidsError::InvalidIdentifier`] if the basename does not parse or
///   its extension does not match the recording.
/// - [`RawBidsError::DestinationExists`] if a destination exists, or the
///   datatype folder holds the same recording under another extension,
///   and `overwrite` is false. Nothing is written in that case.
/// - Read errors from the events file and write errors from the
///   filesystem.
pub fn write_raw_bids(
    raw: &dyn Recording,
    bids_basename: &str,
    output_path: &Path,
    events_data: Option<&Path>,
    opts: &WriteOptions,
) -> Result<WriteReport, RawBidsError> {
    let info = raw.info();
    let events = load_events(raw, events_data, opts.event_id.as_ref())?;
    let plan = plan_write(raw, bids_basename, output_path, events.is_some())?;

    tracing::debug!(folder = %plan.folder.display(), data = %plan.data.display(), "planned BIDS write");

    check_destinations(&plan, opts.overwrite)?;

    fs::create_dir_all(&plan.folder).map_err(RawBidsError::Io)?;

    let mut report = WriteReport::new(bids_basename, &plan.folder);

    if is_same_file(&info.source, &plan.data) {
        tracing::debug!(path = %plan.data.display(), "recording already in place, not copying");
    } else {
        raw.save(&plan.data).map_err(RawBidsError::Io)?;
    }
    report.add(&plan.data, FileRole::Data);
    for companion in &plan.companions {
        report.add(companion, FileRole::Companion);
    }

    if let (Some(path), Some(events)) = (&plan.events, &events) {
        write_events_tsv(path, events)?;
        report.events = events.len();
        report.add(path, FileRole::Events);
    }

    if let Some(path) = &plan.channels {
        write_channels_tsv(path, info)?;
        report.channels = info.channels.len();
        report.add(path, FileRole::Channels);
    }

    let sidecar = KindSidecar::from_info(
        info,
        plan.kind,
        plan.entities.task.as_deref(),
        opts.line_freq,
    );
    write_json(&plan.sidecar, &sidecar)?;
    report.add(&plan.sidecar, FileRole::Sidecar);

    if let Some((source, dest)) = &plan.markers {
        fs::copy(source, dest).map_err(RawBidsError::Io)?;
        report.add(dest, FileRole::Markers);
    }

    if let Some((source, dest)) = &plan.headshape {
        if dest.exists() && !opts.overwrite {
            tracing::info!(path = %dest.display(), "keeping existing head shape file");
        } else {
            fs::copy(source, dest).map_err(RawBidsError::Io)?;
            report.add(dest, FileRole::Headshape);
        }
    }

    if ensure_dataset_description(output_path, &default_dataset_name(output_path))? {
        report.add(output_path.join("dataset_description.json"), FileRole::DatasetDescription);
    }

    let subject = plan
        .entities
        .subject
        .as_deref()
        .ok_or(RawBidsError::MissingIdentifier("subject"))?;
    if ensure_participant(output_path, subject)? {
        report.add(output_path.join("participants.tsv"), FileRole::Participants);
    }

    Ok(report)
}

fn plan_write(
    raw: &dyn Recording,
    bids_basename: &str,
    output_path: &Path,
    has_events: bool,
) -> Result<WritePlan, RawBidsError> {
    let info = raw.info();
    let entities = parse_bids_basename(bids_basename)?;
    let kind: Kind = entities.suffix_kind().parse()?;
    check_extension(&entities, info)?;

    let subject = entities
        .subject
        .as_deref()
        .ok_or(RawBidsError::MissingIdentifier("subject"))?;
    let folder = make_bids_folders(output_path, subject, entities.session.as_deref(), kind)?;
    let data = folder.join(bids_basename);

    let sibling = |suffix: String| -> Result<PathBuf, RawBidsError> {
        Ok(folder.join(entities.with_suffix(suffix).basename()?))
    };

    let events = if has_events {
        Some(sibling("events.tsv".to_string())?)
    } else {
        None
    };
    let channels = if info.channels.is_empty() {
        None
    } else {
        Some(sibling("channels.tsv".to_string())?)
    };
    let sidecar = sibling(format!("{}.json", kind))?;

    let markers = match &info.markers {
        Some(source) => Some((source.clone(), sibling(format!("markers{}", ext_of(source)))?)),
        None => None,
    };

    let headshape = match &info.headshape {
        Some(source) => {
            let mut shared = BidsEntities::new(subject, format!("headshape{}", ext_of(source)));
            shared.session = entities.session.clone();
            shared.acquisition = entities.acquisition.clone();
            Some((source.clone(), folder.join(shared.basename()?)))
        }
        None => None,
    };

    Ok(WritePlan {
        companions: raw.companion_paths(&data),
        entities,
        kind,
        folder,
        data,
        events,
        channels,
        sidecar,
        markers,
        headshape,
    })
}

fn ext_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

fn check_extension(entities: &BidsEntities, info: &RecordingInfo) -> Result<(), RawBidsError> {
    let expected = info.format.bids_extension(&info.source);
    let actual = entities.extension();

    let matches = match (expected.as_deref(), actual) {
        (Some(expected), Some(actual)) => expected.eq_ignore_ascii_case(actual),
        (None, None) => true,
        _ => false,
    };

    if matches {
        Ok(())
    } else {
        Err(RawBidsError::InvalidIdentifier {
            entity: "suffix",
            value: entities.suffix.clone(),
            reason: format!(
                "extension does not match the {} recording (expected '{}')",
                info.format.name(),
                expected.as_deref().unwrap_or("no extension")
            ),
        })
    }
}

fn check_destinations(plan: &WritePlan, overwrite: bool) -> Result<(), RawBidsError> {
    if overwrite {
        return Ok(());
    }

    let destinations = plan.destinations();
    if let Some(existing) = destinations.iter().find(|p| p.exists()) {
        return Err(RawBidsError::DestinationExists {
            path: existing.to_path_buf(),
        });
    }

    if let Some(conflict) = find_stem_conflict(plan, &destinations)? {
        return Err(RawBidsError::DestinationExists { path: conflict });
    }

    Ok(())
}

/// Looks for the same recording stored under a different extension, e.g.
/// `sub-01_task-rest_meg.ds` next to a planned `sub-01_task-rest_meg.fif`.
fn find_stem_conflict(
    plan: &WritePlan,
    destinations: &[&Path],
) -> Result<Option<PathBuf>, RawBidsError> {
    if !plan.folder.is_dir() {
        return Ok(None);
    }

    let stem = format!("{}_{}", plan.entities.entity_prefix()?, plan.kind);
    let with_ext = format!("{}.", stem);

    for entry in WalkDir::new(&plan.folder).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            RawBidsError::Io(e.into_io_error().unwrap_or_else(|| {
                std::io::Error::other("directory loop while scanning destination")
            }))
        })?;

        let name = entry.file_name().to_string_lossy();
        if name != stem.as_str() && !name.starts_with(&with_ext) {
            continue;
        }
        if destinations.iter().any(|p| *p == entry.path()) {
            continue;
        }
        return Ok(Some(entry.path().to_path_buf()));
    }

    Ok(None)
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Resolves the events to write, before anything touches the dataset.
fn load_events(
    raw: &dyn Recording,
    events_data: Option<&Path>,
    event_id: Option<&EventIdMap>,
) -> Result<Option<Vec<BidsEvent>>, RawBidsError> {
    let info = raw.info();
    if let Some(map) = event_id {
        tracing::debug!(mappings = map.len(), "applying event id mapping");
    }

    let Some(path) = events_data else {
        let annotations = raw.annotations();
        if annotations.is_empty() {
            return Ok(None);
        }
        tracing::debug!(count = annotations.len(), "using annotations stored in the recording");
        return Ok(Some(events_from_annotations(annotations, info.sfreq, event_id)));
    };

    let events = match read_events(path)? {
        EventsData::Samples(samples) => {
            let sfreq = info
                .sfreq
                .filter(|sfreq| *sfreq > 0.0)
                .ok_or_else(|| RawBidsError::EventsInvalid {
                    path: path.to_path_buf(),
                    message: "sample-based events need the recording's sampling frequency"
                        .to_string(),
                })?;
            events_from_samples(&samples, sfreq, info.first_samp, event_id)
        }
        EventsData::Timed(mut timed) => {
            if let Some(map) = event_id {
                apply_event_id(&mut timed, map);
            }
            timed
        }
    };

    tracing::debug!(path = %path.display(), count = events.len(), "loaded events");
    Ok(Some(events))
}
