use serde::{Deserialize, Serialize};

use mapmerge_types::{Fingerprint, FingerprintHasher};

/// Plane components are rounded to this many steps per unit before hashing.
const PLANE_QUANTISATION: f64 = 1e5;

// ---------------------------------------------------------------------------
// Primitive
// ---------------------------------------------------------------------------

/// The kind of geometry a primitive holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Brush,
    Patch,
}

impl PrimitiveKind {
    fn tag(&self) -> &'static [u8] {
        match self {
            Self::Brush => b"brush",
            Self::Patch => b"patch",
        }
    }
}

impl std::fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Brush => write!(f, "brush"),
            Self::Patch => write!(f, "patch"),
        }
    }
}

/// One bounding plane of a primitive together with its surface shader.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Face {
    /// Plane equation `(a, b, c, d)`.
    pub plane: [f64; 4],
    pub shader: String,
}

impl Face {
    pub fn new(plane: [f64; 4], shader: impl Into<String>) -> Self {
        Self {
            plane,
            shader: shader.into(),
        }
    }

    /// Content fingerprint of this face.
    ///
    /// Plane components are quantised so that float noise from a save/load
    /// cycle does not change the identity of the face.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut bytes = Vec::with_capacity(32 + self.shader.len());
        for component in self.plane {
            let quantised = (component * PLANE_QUANTISATION).round() as i64;
            bytes.extend_from_slice(&quantised.to_le_bytes());
        }
        bytes.extend_from_slice(self.shader.as_bytes());
        FingerprintHasher::FACE.hash(&bytes)
    }
}

/// Child geometry of an entity. Primitives have no stable identifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Primitive {
    pub kind: PrimitiveKind,
    pub faces: Vec<Face>,
}

impl Primitive {
    pub fn new(kind: PrimitiveKind, faces: Vec<Face>) -> Self {
        Self { kind, faces }
    }

    pub fn brush(faces: Vec<Face>) -> Self {
        Self::new(PrimitiveKind::Brush, faces)
    }

    pub fn patch(faces: Vec<Face>) -> Self {
        Self::new(PrimitiveKind::Patch, faces)
    }

    /// Axis-aligned box brush spanning `min..max`, all faces using `shader`.
    pub fn cuboid(min: [f64; 3], max: [f64; 3], shader: &str) -> Self {
        Self::brush(vec![
            Face::new([1.0, 0.0, 0.0, max[0]], shader),
            Face::new([-1.0, 0.0, 0.0, -min[0]], shader),
            Face::new([0.0, 1.0, 0.0, max[1]], shader),
            Face::new([0.0, -1.0, 0.0, -min[1]], shader),
            Face::new([0.0, 0.0, 1.0, max[2]], shader),
            Face::new([0.0, 0.0, -1.0, -min[2]], shader),
        ])
    }

    /// Order-independent content fingerprint (kind + face set).
    pub fn fingerprint(&self) -> Fingerprint {
        let faces: Vec<Fingerprint> = self.faces.iter().map(Face::fingerprint).collect();
        FingerprintHasher::PRIMITIVE.hash_unordered(self.kind.tag(), &faces)
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// Fingerprint of one key/value pair. Keys are case-insensitive.
fn key_value_fingerprint(key: &str, value: &str) -> Fingerprint {
    let mut bytes = Vec::with_capacity(key.len() + value.len() + 1);
    bytes.extend_from_slice(key.to_ascii_lowercase().as_bytes());
    bytes.push(0);
    bytes.extend_from_slice(value.as_bytes());
    FingerprintHasher::KEY_VALUE.hash(&bytes)
}

/// Order-independent fingerprint of a whole entity.
///
/// Covers every key/value pair and the fingerprints of all primitive
/// children; neither the key order nor the child order contributes.
pub fn entity_fingerprint<'a>(
    key_values: impl IntoIterator<Item = (&'a str, &'a str)>,
    primitives: impl IntoIterator<Item = Fingerprint>,
) -> Fingerprint {
    let mut parts: Vec<Fingerprint> = key_values
        .into_iter()
        .map(|(k, v)| key_value_fingerprint(k, v))
        .collect();
    parts.extend(primitives);
    FingerprintHasher::ENTITY.hash_unordered(b"entity", &parts)
}

/// Detached copy of an entity, used to move entities between scenes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub key_values: Vec<(String, String)>,
    pub primitives: Vec<Primitive>,
}

impl EntitySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a snapshot carrying `classname` and `name`.
    pub fn named(classname: &str, name: &str) -> Self {
        Self::new()
            .with_key_value("classname", classname)
            .with_key_value("name", name)
    }

    pub fn with_key_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.key_values.push((key.into(), value.into()));
        self
    }

    pub fn with_primitive(mut self, primitive: Primitive) -> Self {
        self.primitives.push(primitive);
        self
    }

    pub fn fingerprint(&self) -> Fingerprint {
        entity_fingerprint(
            self.key_values.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            self.primitives.iter().map(Primitive::fingerprint),
        )
    }
}
