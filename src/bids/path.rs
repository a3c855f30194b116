//! Filename and folder composition for BIDS datasets.
//!
//! A composed basename has the shape
//! `sub-<subject>[_ses-<session>][_task-<task>][_acq-<acq>][_run-<run>]_<suffix>`
//! and lives in `<root>/sub-<subject>[/ses-<session>]/<kind>/`.
//!
//! Everything here is pure: no function touches the filesystem.

use std::path::{Path, PathBuf};

use super::entity::{validate_label, Entity, Kind};
use crate::error::RawBidsError;

/// The identifier set that names one BIDS file.
///
/// Fields are optional so that an incomplete set can be represented and
/// rejected with a useful error instead of failing at construction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BidsEntities {
    pub subject: Option<String>,
    pub session: Option<String>,
    pub task: Option<String>,
    pub acquisition: Option<String>,
    pub run: Option<String>,
    /// Kind plus optional extension, e.g. `meg.fif` or `events.tsv`.
    pub suffix: String,
}

impl BidsEntities {
    /// Creates an identifier set for `subject` with the given suffix.
    pub fn new(subject: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            suffix: suffix.into(),
            ..Default::default()
        }
    }

    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    pub fn with_acquisition(mut self, acquisition: impl Into<String>) -> Self {
        self.acquisition = Some(acquisition.into());
        self
    }

    pub fn with_run(mut self, run: impl Into<String>) -> Self {
        self.run = Some(run.into());
        self
    }

    /// Returns a copy of this set with a different suffix.
    ///
    /// Sidecars share every entity with their data file and differ only in
    /// the suffix (`events.tsv`, `channels.tsv`, ...).
    pub fn with_suffix(&self, suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            ..self.clone()
        }
    }

    /// Returns the label of `entity`, if present.
    pub fn get(&self, entity: Entity) -> Option<&str> {
        match entity {
            Entity::Subject => self.subject.as_deref(),
            Entity::Session => self.session.as_deref(),
            Entity::Task => self.task.as_deref(),
            Entity::Acquisition => self.acquisition.as_deref(),
            Entity::Run => self.run.as_deref(),
        }
    }

    fn set(&mut self, entity: Entity, label: String) {
        let slot = match entity {
            Entity::Subject => &mut self.subject,
            Entity::Session => &mut self.session,
            Entity::Task => &mut self.task,
            Entity::Acquisition => &mut self.acquisition,
            Entity::Run => &mut self.run,
        };
        *slot = Some(label);
    }

    /// Composes the entity part of the name, without the suffix.
    ///
    /// `sub-01_ses-02_task-rest` for a set with subject, session and task.
    pub fn entity_prefix(&self) -> Result<String, RawBidsError> {
        if self.subject.is_none() {
            return Err(RawBidsError::MissingIdentifier(Entity::Subject.name()));
        }

        let mut parts = Vec::with_capacity(Entity::ORDERED.len());
        for entity in Entity::ORDERED {
            if let Some(label) = self.get(entity) {
                validate_label(entity, label)?;
                parts.push(format!("{}-{}", entity.key(), label));
            }
        }

        Ok(parts.join("_"))
    }

    /// Composes the full basename. See [`make_bids_basename`].
    pub fn basename(&self) -> Result<String, RawBidsError> {
        make_bids_basename(self)
    }

    /// The kind part of the suffix (`meg` for `meg.fif`).
    pub fn suffix_kind(&self) -> &str {
        split_suffix(&self.suffix).0
    }

    /// The extension part of the suffix, including the leading dot.
    pub fn extension(&self) -> Option<&str> {
        self.suffix.find('.').map(|idx| &self.suffix[idx..])
    }
}

/// Composes a BIDS basename from an identifier set.
///
/// # Errors
/// Returns [`RawBidsError::MissingIdentifier`] if the subject is absent and
/// [`RawBidsError::InvalidIdentifier`] if any present label or the suffix
/// contains disallowed characters.
///
/// # Example
/// ```
/// use rawbids::bids::{make_bids_basename, BidsEntities};
///
/// let entities = BidsEntities::new("01", "meg.fif").with_task("rest");
/// assert_eq!(make_bids_basename(&entities)?, "sub-01_task-rest_meg.fif");
/// # Ok::<(), rawbids::RawBidsError>(())
/// ```
pub fn make_bids_basename(entities: &BidsEntities) -> Result<String, RawBidsError> {
    let prefix = entities.entity_prefix()?;
    validate_suffix(&entities.suffix)?;
    Ok(format!("{}_{}", prefix, entities.suffix))
}

/// Computes the folder holding files of `kind` for a subject/session.
///
/// Returns `<root>/sub-<subject>[/ses-<session>]/<kind>`. Nothing is
/// created on disk.
pub fn make_bids_folders(
    root: &Path,
    subject: &str,
    session: Option<&str>,
    kind: Kind,
) -> Result<PathBuf, RawBidsError> {
    validate_label(Entity::Subject, subject)?;

    let mut path = root.join(format!("sub-{}", subject));
    if let Some(session) = session {
        validate_label(Entity::Session, session)?;
        path = path.join(format!("ses-{}", session));
    }

    Ok(path.join(kind.as_str()))
}

/// Parses a composed basename back into its identifier set.
///
/// The inverse of [`make_bids_basename`]: entities must appear in the fixed
/// order, at most once each, and the name must end in a suffix.
pub fn parse_bids_basename(name: &str) -> Result<BidsEntities, RawBidsError> {
    let invalid = |reason: String| RawBidsError::InvalidIdentifier {
        entity: "basename",
        value: name.to_string(),
        reason,
    };

    let mut parts: Vec<&str> = name.split('_').collect();
    let suffix = match parts.pop() {
        Some(s) if parts.is_empty() => {
            return Err(invalid(format!("'{}' has no entities before the suffix", s)))
        }
        Some(s) => s,
        None => return Err(invalid("empty name".to_string())),
    };

    let mut entities = BidsEntities {
        suffix: suffix.to_string(),
        ..Default::default()
    };

    let mut last: Option<Entity> = None;
    for part in parts {
        let (key, label) = part
            .split_once('-')
            .ok_or_else(|| invalid(format!("segment '{}' is not key-label", part)))?;
        let entity = Entity::from_key(key)
            .ok_or_else(|| invalid(format!("unknown entity key '{}'", key)))?;

        if last.is_some_and(|prev| prev >= entity) {
            return Err(invalid(format!(
                "entity '{}' is duplicated or out of order",
                key
            )));
        }
        last = Some(entity);

        validate_label(entity, label)?;
        entities.set(entity, label.to_string());
    }

    if entities.subject.is_none() {
        return Err(RawBidsError::MissingIdentifier(Entity::Subject.name()));
    }
    validate_suffix(&entities.suffix)?;

    Ok(entities)
}

/// Splits `meg.fif` into `("meg", Some(".fif"))`.
pub(crate) fn split_suffix(suffix: &str) -> (&str, Option<&str>) {
    match suffix.find('.') {
        Some(idx) => (&suffix[..idx], Some(&suffix[idx..])),
        None => (suffix, None),
    }
}

fn validate_suffix(suffix: &str) -> Result<(), RawBidsError> {
    let invalid = |reason: &str| RawBidsError::InvalidIdentifier {
        entity: "suffix",
        value: suffix.to_string(),
        reason: reason.to_string(),
    };

    if suffix.is_empty() {
        return Err(RawBidsError::MissingIdentifier("suffix"));
    }

    let (kind, ext) = split_suffix(suffix);
    if kind.is_empty() || !kind.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid("suffix must start with letters and digits only"));
    }

    if let Some(ext) = ext {
        let body = &ext[1..];
        if body.is_empty()
            || body.ends_with('.')
            || body.contains("..")
            || !body.chars().all(|c| c.is_ascii_alphanumeric() || c == '.')
        {
            return Err(invalid("extension must be letters, digits and single dots"));
        }
    }

    Ok(())
}
