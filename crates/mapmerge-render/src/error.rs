//! Error types for the render crate.

use crate::buffer::Handle;

/// Errors returned by [`ContinuousBuffer`](crate::ContinuousBuffer).
///
/// All of these are contract violations by the caller; the buffer itself
/// never fails for lack of space, it grows instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    /// `set_data` was called with a different element count than allocated.
    #[error("allocation size mismatch: slot holds {expected} elements, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// The handle does not name a live allocation.
    #[error("invalid buffer handle {0}")]
    InvalidHandle(Handle),

    /// The handle was already released.
    #[error("buffer handle {0} has already been deallocated")]
    DoubleFree(Handle),

    /// Zero-length allocations have no offset of their own.
    #[error("cannot allocate zero elements")]
    ZeroSize,

    /// Every handle value is in use.
    #[error("slot limit of the buffer reached")]
    SlotLimit,
}

/// Convenience alias for buffer results.
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors returned by [`GeometryStore`](crate::GeometryStore).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    /// Geometry needs at least one vertex and one index.
    #[error("geometry must not be empty ({vertices} vertices, {indices} indices)")]
    EmptyGeometry { vertices: usize, indices: usize },

    /// Allocation or access in one of the backing buffers failed.
    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),
}

/// Convenience alias for geometry store results.
pub type GeometryResult<T> = Result<T, GeometryError>;
