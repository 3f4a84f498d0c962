use serde::{Deserialize, Serialize};

use crate::error::{MergeError, MergeResult};

/// Options of a three-way merge.
///
/// Both toggles are extension points for merging editor-side metadata that
/// is not part of the entity/primitive tree. Neither has an implementation
/// yet, so enabling one is rejected instead of being silently ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeSettings {
    /// Merge selection group membership.
    pub merge_selection_groups: bool,
    /// Merge layer assignments.
    pub merge_layers: bool,
}

impl MergeSettings {
    /// Check that every enabled option is supported.
    pub fn validate(&self) -> MergeResult<()> {
        if self.merge_selection_groups {
            return Err(MergeError::NotSupported("selection group merging"));
        }
        if self.merge_layers {
            return Err(MergeError::NotSupported("layer merging"));
        }
        Ok(())
    }
}
