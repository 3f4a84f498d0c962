//! Scene comparison for mapmerge.
//!
//! A [`ComparisonResult`] describes every difference between a compared
//! scene and a base scene: entities added, removed or modified, and for
//! modified entities the primitive and key/value changes. Two comparison
//! results computed against the same base feed a three-way merge.
//!
//! # Key Types
//!
//! - [`ComparisonResult`] -- all differences of one scene against a base
//! - [`EntityDifference`] -- one entity added / removed / modified
//! - [`PrimitiveDifference`] -- one primitive added / removed (by fingerprint)
//! - [`KeyValueDifference`] -- one key added / changed / removed
//!
//! [`compare_scenes`] is a reference comparator. Editors that already track
//! their own changes can build a `ComparisonResult` directly.

pub mod comparison;
pub mod error;
pub mod key_values;
pub mod scene_diff;

pub use comparison::{
    ComparisonResult, EntityDifference, EntityDifferenceKind, KeyValueDifference,
    KeyValueDifferenceKind, PrimitiveDifference, PrimitiveDifferenceKind,
};
pub use error::{DiffError, DiffResult};
pub use key_values::diff_key_values;
pub use scene_diff::compare_scenes;
