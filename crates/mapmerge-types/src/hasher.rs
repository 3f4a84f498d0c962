use crate::fingerprint::Fingerprint;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g., `"mapmerge-primitive-v1"`) that is
/// prepended to every hash computation, so a face and a primitive with
/// identical bytes never collide.
///
/// Scene content is unordered in several places (the faces of a brush, the
/// key/values of an entity), and the fingerprint must not depend on the order
/// a scene happens to store them in. [`hash_unordered`] sorts the part
/// fingerprints before combining them.
///
/// [`hash_unordered`]: FingerprintHasher::hash_unordered
pub struct FingerprintHasher {
    domain: &'static str,
}

impl FingerprintHasher {
    /// Hasher for a single brush face or patch control row.
    pub const FACE: Self = Self {
        domain: "mapmerge-face-v1",
    };
    /// Hasher for a single key/value pair.
    pub const KEY_VALUE: Self = Self {
        domain: "mapmerge-keyvalue-v1",
    };
    /// Hasher for whole primitives.
    pub const PRIMITIVE: Self = Self {
        domain: "mapmerge-primitive-v1",
    };
    /// Hasher for whole entities.
    pub const ENTITY: Self = Self {
        domain: "mapmerge-entity-v1",
    };

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> Fingerprint {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        Fingerprint::from_hash(*hasher.finalize().as_bytes())
    }

    /// Combine a header and a set of part fingerprints into one fingerprint.
    ///
    /// The parts are sorted first, so any permutation of `parts` yields the
    /// same result. Duplicate parts are kept: a set with a part twice is not
    /// the same as the set with it once.
    pub fn hash_unordered(&self, header: &[u8], parts: &[Fingerprint]) -> Fingerprint {
        let mut sorted = parts.to_vec();
        sorted.sort_unstable();

        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(&(header.len() as u64).to_le_bytes());
        hasher.update(header);
        for part in &sorted {
            hasher.update(part.as_bytes());
        }
        Fingerprint::from_hash(*hasher.finalize().as_bytes())
    }
}
