//! BIDS entities and the data kinds that name folders and suffixes.
//!
//! An entity is a `key-label` pair embedded in a BIDS filename, such as
//! `sub-01` or `task-rest`. Labels are restricted to ASCII letters and
//! digits so that `-` and `_` remain unambiguous separators.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::RawBidsError;

/// The entities rawbids knows how to compose, in filename order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Entity {
    Subject,
    Session,
    Task,
    Acquisition,
    Run,
}

impl Entity {
    /// All entities in the fixed order they appear in a basename.
    pub const ORDERED: [Entity; 5] = [
        Entity::Subject,
        Entity::Session,
        Entity::Task,
        Entity::Acquisition,
        Entity::Run,
    ];

    /// The short key used in filenames (`sub`, `ses`, ...).
    pub fn key(&self) -> &'static str {
        match self {
            Entity::Subject => "sub",
            Entity::Session => "ses",
            Entity::Task => "task",
            Entity::Acquisition => "acq",
            Entity::Run => "run",
        }
    }

    /// Human-readable name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Entity::Subject => "subject",
            Entity::Session => "session",
            Entity::Task => "task",
            Entity::Acquisition => "acquisition",
            Entity::Run => "run",
        }
    }

    /// Looks up an entity from its filename key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ORDERED.into_iter().find(|e| e.key() == key)
    }
}

/// Checks that `value` is a usable label for `entity`.
///
/// Empty labels and labels with anything other than ASCII alphanumerics
/// are rejected.
pub fn validate_label(entity: Entity, value: &str) -> Result<(), RawBidsError> {
    if value.is_empty() {
        return Err(RawBidsError::InvalidIdentifier {
            entity: entity.name(),
            value: value.to_string(),
            reason: "label must not be empty".to_string(),
        });
    }

    if let Some(bad) = value.chars().find(|c| !c.is_ascii_alphanumeric()) {
        return Err(RawBidsError::InvalidIdentifier {
            entity: entity.name(),
            value: value.to_string(),
            reason: format!("character '{}' is not allowed (use letters and digits only)", bad),
        });
    }

    Ok(())
}

/// The modality of a recording.
///
/// Used both as the datatype folder (`sub-01/meg/`) and as the filename
/// suffix (`..._meg.fif`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    #[default]
    Meg,
    Eeg,
    Ieeg,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Meg => "meg",
            Kind::Eeg => "eeg",
            Kind::Ieeg => "ieeg",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = RawBidsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "meg" => Ok(Kind::Meg),
            "eeg" => Ok(Kind::Eeg),
            "ieeg" => Ok(Kind::Ieeg),
            other => Err(RawBidsError::InvalidIdentifier {
                entity: "kind",
                value: other.to_string(),
                reason: "expected one of: meg, eeg, ieeg".to_string(),
            }),
        }
    }
}
