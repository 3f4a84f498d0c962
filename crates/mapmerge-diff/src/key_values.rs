//! Key/value diff: compare the attribute sets of two versions of an entity.
//!
//! Keys are matched case-insensitively, values are compared exactly.

use crate::comparison::KeyValueDifference;

fn lookup<'a>(pairs: &[(&'a str, &'a str)], key: &str) -> Option<(&'a str, &'a str)> {
    pairs
        .iter()
        .copied()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
}

/// Compute the key/value differences from `old` to `new`.
///
/// Removed and changed keys are reported first, in `old` order, followed by
/// added keys in `new` order. Changed and added keys use the spelling found
/// in `new`.
pub fn diff_key_values(old: &[(&str, &str)], new: &[(&str, &str)]) -> Vec<KeyValueDifference> {
    let mut changes = Vec::new();

    // Check for removed and changed keys.
    for &(key, old_value) in old {
        match lookup(new, key) {
            Some((new_key, new_value)) => {
                if old_value != new_value {
                    changes.push(KeyValueDifference::changed(new_key, new_value));
                }
            }
            None => changes.push(KeyValueDifference::removed(key)),
        }
    }

    // Check for added keys.
    for &(key, value) in new {
        if lookup(old, key).is_none() {
            changes.push(KeyValueDifference::added(key, value));
        }
    }

    changes
}
