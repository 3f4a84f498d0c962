//! Render-side storage for mapmerge.
//!
//! # Key Types
//!
//! - [`ContinuousBuffer`] -- first-fit range allocator over one growable array
//! - [`GeometryStore`] -- vertex and index buffers addressed by [`Slot`]
//!
//! Neither type is synchronised; share them behind a lock.

pub mod buffer;
pub mod error;
pub mod geometry;

pub use buffer::{ContinuousBuffer, Handle};
pub use error::{BufferError, BufferResult, GeometryError, GeometryResult};
pub use geometry::{Aabb, GeometryStore, MeshVertex, RenderParameters, Slot};
