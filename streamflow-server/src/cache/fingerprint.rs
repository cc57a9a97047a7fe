//! Cache keys derived from query shape.

use std::fmt;

/// Deterministic cache key for a station query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Key for a tag query: `tag:<tag>:limit:<limit>`.
    pub fn tag(tag: &str, limit: usize) -> Self {
        Self(format!("tag:{tag}:limit:{limit}"))
    }

    /// Key for a uuid batch: `uuids:<sorted ids joined by '_'>`.
    ///
    /// Any permutation of the same set of ids, repeats included, yields the
    /// same key.
    pub fn uuids<S: AsRef<str>>(uuids: &[S]) -> Self {
        Self(format!("uuids:{}", canonical_uuids(uuids).join("_")))
    }

    /// The key as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sort and de-duplicate a list of station ids.
pub fn canonical_uuids<S: AsRef<str>>(uuids: &[S]) -> Vec<String> {
    let mut ids: Vec<String> = uuids.iter().map(|u| u.as_ref().to_string()).collect();
    ids.sort();
    ids.dedup();
    ids
}
