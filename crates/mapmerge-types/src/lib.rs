//! Foundation types for mapmerge.
//!
//! Every other mapmerge crate depends on `mapmerge-types`. The types here
//! identify scenes, address nodes inside them, and fingerprint node content
//! so that primitives without a stable identifier can be matched across
//! scenes.
//!
//! # Key Types
//!
//! - [`Fingerprint`] -- Content hash (BLAKE3) of a primitive or entity
//! - [`FingerprintHasher`] -- Domain-separated hasher with order-independent combination
//! - [`SceneId`] -- Identity of one scene root (UUID v7)
//! - [`NodeId`] / [`NodeRef`] -- Non-owning node handles

pub mod fingerprint;
pub mod hasher;
pub mod node;

pub use fingerprint::Fingerprint;
pub use hasher::FingerprintHasher;
pub use node::{NodeId, NodeRef, SceneId};
