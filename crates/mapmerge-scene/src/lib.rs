//! Scene interface for the mapmerge engine.
//!
//! The merge engine does not own any scene graph. It reads scenes through
//! the [`SceneGraph`] trait and an executor writes merge results back through
//! [`SceneGraphMut`]. A scene is a flat list of entities; each entity owns
//! an ordered list of primitive children and an unordered set of key/value
//! attributes.
//!
//! # Data Types
//!
//! - [`Primitive`] -- brush or patch geometry, made of [`Face`]s
//! - [`EntitySnapshot`] -- detached copy of an entity (key/values + primitives)
//!
//! # Implementations
//!
//! - [`InMemoryScene`] -- slot-vector scene for tests and embedding
//!
//! # Identity Rules
//!
//! 1. Entities are matched across scenes by name (the `name` key).
//! 2. Primitives are matched across scenes by [`Fingerprint`], never by position.
//! 3. Fingerprints are independent of face order and key/value order.
//! 4. Key names are compared case-insensitively.
//!
//! [`Fingerprint`]: mapmerge_types::Fingerprint

pub mod error;
pub mod memory;
pub mod node;
pub mod traits;

pub use error::{SceneError, SceneResult};
pub use memory::InMemoryScene;
pub use node::{entity_fingerprint, EntitySnapshot, Face, Primitive, PrimitiveKind};
pub use traits::{SceneGraph, SceneGraphMut};
