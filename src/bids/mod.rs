//! BIDS naming and dataset writing.
//!
//! [`path`] composes entity-based file and folder names without touching
//! the filesystem; [`writer`] lays a recording and its sidecars out under a
//! dataset root.

pub mod entity;
pub mod events;
pub mod path;
pub mod report;
pub mod sidecar;
pub mod tsv;
pub mod writer;

pub use entity::{Entity, Kind};
pub use events::EventIdMap;
pub use path::{make_bids_basename, make_bids_folders, parse_bids_basename, BidsEntities};
pub use report::{FileRole, WriteReport, WrittenFile};
pub use writer::{write_raw_bids, WriteOptions};
