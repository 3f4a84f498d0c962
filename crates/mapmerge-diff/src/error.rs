//! Error types for the diff crate.

use mapmerge_types::SceneId;

/// Errors that can occur while comparing scenes.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// Entity names must be unique within a scene.
    #[error("entity name {name:?} is used more than once in scene {scene:?}")]
    DuplicateEntityName { scene: SceneId, name: String },

    /// Scene access failed.
    #[error("scene error: {0}")]
    Scene(#[from] mapmerge_scene::SceneError),
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
