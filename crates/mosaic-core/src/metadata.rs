//! Backend call metadata.
//!
//! [`Metadata`] is a multi-valued map with lowercase keys, mirroring the
//! metadata model of RPC transports. It is populated from inbound headers
//! (through the incoming header matcher) and from [`MetadataAnnotator`]s,
//! and handlers attach it to the backend calls they make.

use crate::context::RequestContext;
use crate::types::Request;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// Multi-valued, insertion-ordered metadata with lowercase keys.
///
/// # Example
///
/// ```
/// use mosaic_core::Metadata;
///
/// let mut md = Metadata::new();
/// md.insert("X-User", "alice");
/// md.insert("x-user", "bob");
///
/// assert_eq!(md.get("x-user"), Some("alice"));
/// assert_eq!(md.get_all("X-USER"), ["alice", "bob"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: IndexMap<String, Vec<String>>,
}

impl Metadata {
    /// Creates empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds metadata from key/value pairs.
    pub fn pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        pairs.into_iter().collect()
    }

    /// Appends a value under `key`.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .entry(key.as_ref().to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    /// Replaces every value under `key` with `value`.
    pub fn set(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .insert(key.as_ref().to_ascii_lowercase(), vec![value.into()]);
    }

    /// Returns the first value under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Returns every value under `key`, in insertion order.
    #[must_use]
    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map_or(&[], Vec::as_slice)
    }

    /// Returns `true` if at least one value exists under `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_ascii_lowercase())
    }

    /// Appends every entry of `other`.
    pub fn extend(&mut self, other: Metadata) {
        for (key, values) in other.entries {
            self.entries.entry(key).or_default().extend(values);
        }
    }

    /// Iterates over `(key, value)` pairs; multi-valued keys yield one pair per value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().flat_map(|(key, values)| {
            values
                .iter()
                .map(move |value| (key.as_str(), value.as_str()))
        })
    }

    /// Returns the number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no keys are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut md = Self::new();
        for (key, value) in iter {
            md.insert(key, value);
        }
        md
    }
}

/// Shared sink for metadata returned by backends during a request.
///
/// Clones share the same storage, so a resolver holding a clone of the
/// [`RequestContext`] can report headers that the response writer later
/// forwards to the client.
#[derive(Debug, Clone, Default)]
pub struct ResponseMetadata {
    inner: Arc<Mutex<Metadata>>,
}

impl ResponseMetadata {
    /// Appends a value under `key`.
    pub fn insert(&self, key: impl AsRef<str>, value: impl Into<String>) {
        self.inner.lock().insert(key, value);
    }

    /// Appends every entry of `metadata`.
    pub fn extend(&self, metadata: Metadata) {
        self.inner.lock().extend(metadata);
    }

    /// Returns a copy of the metadata collected so far.
    #[must_use]
    pub fn snapshot(&self) -> Metadata {
        self.inner.lock().clone()
    }
}

/// Derives backend call metadata from the inbound request.
///
/// Annotators are registered either when the gateway is built or through
/// the metadata middleware for a single request. Any
/// `Fn(&RequestContext, &Request) -> Metadata` closure is an annotator.
///
/// # Example
///
/// ```
/// use mosaic_core::{Metadata, MetadataAnnotator, Request, RequestContext};
///
/// let annotator = |_ctx: &RequestContext, req: &Request| {
///     Metadata::pairs([("x-path", req.uri().path().to_string())])
/// };
///
/// let req = Request::new(bytes::Bytes::new());
/// let md = annotator.annotate(&RequestContext::new(), &req);
/// assert_eq!(md.get("x-path"), Some("/"));
/// ```
pub trait MetadataAnnotator: Send + Sync + 'static {
    /// Produces metadata pairs for the backend calls of this request.
    fn annotate(&self, ctx: &RequestContext, request: &Request) -> Metadata;
}

impl<F> MetadataAnnotator for F
where
    F: Fn(&RequestContext, &Request) -> Metadata + Send + Sync + 'static,
{
    fn annotate(&self, ctx: &RequestContext, request: &Request) -> Metadata {
        self(ctx, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_case_insensitive() {
        let mut md = Metadata::new();
        md.insert("Authorization", "Bearer t");
        assert!(md.contains_key("authorization"));
        assert_eq!(md.get("AUTHORIZATION"), Some("Bearer t"));
        assert_eq!(md.iter().next(), Some(("authorization", "Bearer t")));
    }

    #[test]
    fn test_set_replaces_all_values() {
        let mut md = Metadata::pairs([("k", "1"), ("k", "2")]);
        assert_eq!(md.get_all("k").len(), 2);
        md.set("k", "3");
        assert_eq!(md.get_all("k"), ["3"]);
    }

    #[test]
    fn test_extend_appends() {
        let mut md = Metadata::pairs([("a", "1")]);
        md.extend(Metadata::pairs([("a", "2"), ("b", "3")]));
        assert_eq!(md.get_all("a"), ["1", "2"]);
        assert_eq!(md.get("b"), Some("3"));
        assert_eq!(md.len(), 2);
        assert_eq!(md.iter().count(), 3);
    }

    #[test]
    fn test_missing_key() {
        let md = Metadata::new();
        assert!(md.is_empty());
        assert_eq!(md.get("absent"), None);
        assert!(md.get_all("absent").is_empty());
    }
}
