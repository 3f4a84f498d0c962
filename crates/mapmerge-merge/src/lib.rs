//! Three-way scene merge for mapmerge.
//!
//! Reconciles two divergent edits of a scene ("source" and "target") against
//! their common base. The input is a pair of [`ComparisonResult`]s sharing
//! the same base; the output is an ordered list of inert [`MergeAction`]s
//! that, applied to the target scene, bring in every source change that does
//! not contradict a target change. Contradicting changes become conflict
//! actions that must be resolved before application.
//!
//! # Key Types
//!
//! - [`ThreeWayMergeOperation`] -- runs the reconciliation at construction
//! - [`MergeAction`] -- closed set of edit and conflict actions
//! - [`MergeSettings`] -- extension toggles (not yet supported)
//! - [`apply_actions`] -- reference executor for [`SceneGraphMut`] targets
//!
//! [`ComparisonResult`]: mapmerge_diff::ComparisonResult
//! [`SceneGraphMut`]: mapmerge_scene::SceneGraphMut

pub mod action;
pub mod apply;
pub mod error;
pub mod operation;
pub mod settings;

pub use action::{
    ActionType, EntityConflictResolution, KeyValueConflictResolution, MergeAction, ResolutionType,
};
pub use apply::{apply_actions, resolve_all, ApplySummary};
pub use error::{MergeError, MergeResult};
pub use operation::ThreeWayMergeOperation;
pub use settings::MergeSettings;
