//! File change domain.
//!
//! - [`entities`]: proposed changes, journal entries, snapshots, rollback reports
//! - [`patch`]: literal substring patching with ambiguity detection
//! - [`path_policy`]: which workspace-relative paths may be mutated

pub mod entities;
pub mod patch;
pub mod path_policy;
