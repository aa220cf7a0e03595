//! Instance-name normalization
//!
//! Device names in the configuration file are arbitrary strings; instance
//! identifiers must satisfy the active backend's grammar. A legal name is
//! used verbatim. Anything else maps to `MD5_<32 hex>` — fixed prefix,
//! fixed length, legal under every supported grammar, and stable across
//! runs so reconciliation stays idempotent.
//!
//! The mapping is one-way: nothing decodes a hashed identifier back to a
//! device name. Callers that need the original name re-derive forward
//! over the known device list (see `DeviceFor` in the CLI). A genuine
//! MD5 collision between two distinct device names is detected and
//! reported, not resolved.

use md5::{Digest, Md5};

/// Fallback identifier for a device name that fails the backend grammar.
pub fn hashed_identifier(name: &str) -> String {
    format!("MD5_{:x}", Md5::digest(name.as_bytes()))
}

/// Map a device name to a backend-legal instance identifier: verbatim if
/// `is_legal` accepts it, hashed otherwise.
pub fn instance_identifier(name: &str, is_legal: impl Fn(&str) -> bool) -> String {
    if is_legal(name) {
        name.to_string()
    } else {
        hashed_identifier(name)
    }
}

/// Two desired devices whose identifiers coincide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub first: String,
    pub second: String,
    pub identity: String,
}

/// Pair every name with its identifier and detect collisions.
///
/// Returns the `(name, identity)` pairs in input order plus every
/// detected collision. Colliding names keep their entries; the caller
/// decides to exclude them from mutation.
pub fn identity_pairs(
    names: &[&str],
    is_legal: impl Fn(&str) -> bool,
) -> (Vec<(String, String)>, Vec<Collision>) {
    let mut pairs: Vec<(String, String)> = Vec::with_capacity(names.len());
    let mut collisions = Vec::new();

    for name in names {
        let identity = instance_identifier(name, &is_legal);
        if let Some((prior, _)) = pairs.iter().find(|(_, id)| *id == identity) {
            collisions.push(Collision {
                first: prior.clone(),
                second: (*name).to_string(),
                identity: identity.clone(),
            });
        }
        pairs.push(((*name).to_string(), identity));
    }

    (pairs, collisions)
}
