//! Header translation between the wire protocol and backend metadata.
//!
//! Two matchers govern the boundary:
//!
//! - **Incoming** (wire → backend): permanent HTTP headers are forwarded as
//!   `grpcgateway-<Canonical-Name>`; headers prefixed with `Grpc-Metadata-`
//!   are forwarded with the prefix stripped; everything else is dropped.
//! - **Outgoing** (backend → wire): every metadata key is exposed as
//!   `Grpc-Metadata-<key>`.
//!
//! Both matchers can be replaced on a [`HeaderTranslator`], which is fixed
//! once the gateway is built.

use crate::metadata::Metadata;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use std::fmt;
use std::sync::Arc;

/// Prefix applied to permanent HTTP headers forwarded to backends.
pub const METADATA_PREFIX: &str = "grpcgateway-";

/// Wire header prefix that maps directly onto backend metadata keys.
pub const METADATA_HEADER_PREFIX: &str = "Grpc-Metadata-";

/// Permanent HTTP header names (IANA registry), in canonical form.
pub static PERMANENT_HEADERS: &[&str] = &[
    "Accept",
    "Accept-Charset",
    "Accept-Language",
    "Accept-Ranges",
    "Authorization",
    "Cache-Control",
    "Content-Type",
    "Cookie",
    "Date",
    "Expect",
    "From",
    "Host",
    "If-Match",
    "If-Modified-Since",
    "If-None-Match",
    "If-Schedule-Tag-Match",
    "If-Unmodified-Since",
    "Max-Forwards",
    "Origin",
    "Pragma",
    "Referer",
    "User-Agent",
    "Via",
    "Warning",
];

/// Maps a header key across the boundary; `None` drops the header.
pub type HeaderMatcher = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Returns the canonical MIME form of a header key.
///
/// The first character and every character following a hyphen are
/// upper-cased, the rest lower-cased. Keys containing a space or a
/// non-token byte are returned unchanged.
///
/// ```
/// use mosaic_core::headers::canonical_header_key;
///
/// assert_eq!(canonical_header_key("accept-language"), "Accept-Language");
/// assert_eq!(canonical_header_key("GRPC-METADATA-USER"), "Grpc-Metadata-User");
/// assert_eq!(canonical_header_key("bad key"), "bad key");
/// ```
pub fn canonical_header_key(key: &str) -> String {
    if !key.bytes().all(is_token_byte) {
        return key.to_string();
    }

    let mut out = String::with_capacity(key.len());
    let mut upper = true;
    for c in key.chars() {
        if upper {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c.to_ascii_lowercase());
        }
        upper = c == '-';
    }
    out
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// Checks whether a canonical header key is on the permanent allow-list.
pub fn is_permanent_header(canonical_key: &str) -> bool {
    PERMANENT_HEADERS.contains(&canonical_key)
}

/// Default incoming matcher using the standard prefixes.
///
/// ```
/// use mosaic_core::headers::default_incoming_matcher;
///
/// assert_eq!(default_incoming_matcher("host"), Some("grpcgateway-Host".to_string()));
/// assert_eq!(default_incoming_matcher("grpc-metadata-tenant"), Some("Tenant".to_string()));
/// assert_eq!(default_incoming_matcher("x-custom"), None);
/// ```
pub fn default_incoming_matcher(key: &str) -> Option<String> {
    incoming_with_prefixes(key, METADATA_PREFIX, METADATA_HEADER_PREFIX)
}

/// Default outgoing matcher: always prefixes with `Grpc-Metadata-`.
pub fn default_outgoing_matcher(key: &str) -> Option<String> {
    Some(format!("{METADATA_HEADER_PREFIX}{key}"))
}

fn incoming_with_prefixes(key: &str, metadata_prefix: &str, header_prefix: &str) -> Option<String> {
    let key = canonical_header_key(key);
    if is_permanent_header(&key) {
        return Some(format!("{metadata_prefix}{key}"));
    }
    key.strip_prefix(header_prefix)
        .filter(|rest| !rest.is_empty())
        .map(str::to_string)
}

/// The pair of matchers used by one gateway instance.
///
/// # Example
///
/// ```
/// use mosaic_core::HeaderTranslator;
///
/// let translator = HeaderTranslator::default();
/// assert_eq!(translator.incoming("cookie"), Some("grpcgateway-Cookie".to_string()));
/// assert_eq!(translator.outgoing("trace-id"), Some("Grpc-Metadata-trace-id".to_string()));
/// ```
#[derive(Clone)]
pub struct HeaderTranslator {
    incoming: HeaderMatcher,
    outgoing: HeaderMatcher,
}

impl HeaderTranslator {
    /// Creates a translator from explicit matchers.
    pub fn new(incoming: HeaderMatcher, outgoing: HeaderMatcher) -> Self {
        Self { incoming, outgoing }
    }

    /// Creates the default translator with custom prefixes.
    ///
    /// `metadata_prefix` is prepended to permanent headers; `header_prefix`
    /// marks wire headers that map straight onto metadata keys and is
    /// prepended to outgoing keys.
    pub fn with_prefixes(metadata_prefix: impl Into<String>, header_prefix: impl Into<String>) -> Self {
        let metadata_prefix: String = metadata_prefix.into();
        let header_prefix = canonical_header_key(&header_prefix.into());
        let outgoing_prefix = header_prefix.clone();

        Self {
            incoming: Arc::new(move |key| {
                incoming_with_prefixes(key, &metadata_prefix, &header_prefix)
            }),
            outgoing: Arc::new(move |key| Some(format!("{outgoing_prefix}{key}"))),
        }
    }

    /// Replaces the incoming matcher.
    #[must_use]
    pub fn incoming_matcher<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.incoming = Arc::new(matcher);
        self
    }

    /// Replaces the outgoing matcher.
    #[must_use]
    pub fn outgoing_matcher<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.outgoing = Arc::new(matcher);
        self
    }

    /// Maps a wire header key to a backend metadata key.
    pub fn incoming(&self, key: &str) -> Option<String> {
        (self.incoming)(key)
    }

    /// Maps a backend metadata key to a wire header key.
    pub fn outgoing(&self, key: &str) -> Option<String> {
        (self.outgoing)(key)
    }

    /// Builds backend metadata from inbound wire headers.
    ///
    /// Headers rejected by the incoming matcher, and values that are not
    /// valid UTF-8, are dropped.
    pub fn incoming_metadata(&self, headers: &HeaderMap) -> Metadata {
        let mut md = Metadata::new();
        for (name, value) in headers {
            let Some(key) = self.incoming(name.as_str()) else {
                continue;
            };
            match value.to_str() {
                Ok(value) => md.insert(key, value),
                Err(_) => tracing::debug!(header = %name, "dropping non-UTF-8 header value"),
            }
        }
        md
    }

    /// Writes backend metadata onto wire response headers.
    ///
    /// Keys rejected by the outgoing matcher, or that do not form valid
    /// header names or values, are skipped.
    pub fn apply_outgoing(&self, metadata: &Metadata, headers: &mut HeaderMap) {
        for (key, value) in metadata.iter() {
            let Some(wire_key) = self.outgoing(key) else {
                continue;
            };
            let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(wire_key.as_bytes()),
                HeaderValue::from_str(value),
            ) else {
                tracing::debug!(key = %wire_key, "skipping invalid outgoing header");
                continue;
            };
            headers.append(name, value);
        }
    }
}

impl Default for HeaderTranslator {
    fn default() -> Self {
        Self {
            incoming: Arc::new(default_incoming_matcher),
            outgoing: Arc::new(default_outgoing_matcher),
        }
    }
}

impl fmt::Debug for HeaderTranslator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderTranslator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_canonical_header_key() {
        assert_eq!(canonical_header_key("content-type"), "Content-Type");
        assert_eq!(canonical_header_key("USER-AGENT"), "User-Agent");
        assert_eq!(canonical_header_key("x"), "X");
        assert_eq!(canonical_header_key("if--match"), "If--Match");
    }

    #[test]
    fn test_permanent_headers_are_prefixed() {
        for name in ["accept", "authorization", "cookie", "host", "user-agent"] {
            let mapped = default_incoming_matcher(name).unwrap();
            assert_eq!(mapped, format!("grpcgateway-{}", canonical_header_key(name)));
        }
    }

    #[test]
    fn test_metadata_prefix_is_stripped() {
        assert_eq!(
            default_incoming_matcher("Grpc-Metadata-Request-Source"),
            Some("Request-Source".to_string())
        );
        assert_eq!(default_incoming_matcher("grpc-metadata-"), None);
    }

    #[test]
    fn test_other_headers_are_dropped() {
        assert_eq!(default_incoming_matcher("x-forwarded-for"), None);
        assert_eq!(default_incoming_matcher("connection"), None);
    }

    #[test]
    fn test_incoming_metadata_from_header_map() {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("example.com"));
        headers.insert("grpc-metadata-tenant", HeaderValue::from_static("acme"));
        headers.insert("x-ignored", HeaderValue::from_static("1"));

        let md = HeaderTranslator::default().incoming_metadata(&headers);
        assert_eq!(md.get("grpcgateway-host"), Some("example.com"));
        assert_eq!(md.get("tenant"), Some("acme"));
        assert_eq!(md.len(), 2);
    }

    #[test]
    fn test_apply_outgoing() {
        let md = Metadata::pairs([("x-backend", "users"), ("x-backend", "orders")]);
        let mut headers = HeaderMap::new();
        HeaderTranslator::default().apply_outgoing(&md, &mut headers);

        let values: Vec<_> = headers
            .get_all("grpc-metadata-x-backend")
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(values, ["users", "orders"]);
    }

    #[test]
    fn test_custom_prefixes() {
        let translator = HeaderTranslator::with_prefixes("gw-", "x-backend-");
        assert_eq!(translator.incoming("accept"), Some("gw-Accept".to_string()));
        assert_eq!(translator.incoming("x-backend-user"), Some("User".to_string()));
        assert_eq!(translator.incoming("grpc-metadata-user"), None);
        assert_eq!(translator.outgoing("user"), Some("X-Backend-user".to_string()));
    }

    #[test]
    fn test_replaced_matchers() {
        let translator = HeaderTranslator::default()
            .incoming_matcher(|key| Some(key.to_uppercase()))
            .outgoing_matcher(|_| None);

        assert_eq!(translator.incoming("x-any"), Some("X-ANY".to_string()));
        assert_eq!(translator.outgoing("x-any"), None);

        let mut headers = HeaderMap::new();
        translator.apply_outgoing(&Metadata::pairs([("k", "v")]), &mut headers);
        assert!(headers.is_empty());
    }

    proptest! {
        #[test]
        fn prop_permanent_header_maps_to_prefixed_canonical(index in 0..PERMANENT_HEADERS.len(), lower in any::<bool>()) {
            let name = PERMANENT_HEADERS[index];
            let wire = if lower { name.to_lowercase() } else { name.to_uppercase() };
            prop_assert_eq!(default_incoming_matcher(&wire), Some(format!("grpcgateway-{name}")));
        }

        #[test]
        fn prop_outgoing_then_incoming_recovers_key(key in "[a-z][a-z0-9]{0,8}(-[a-z0-9]{1,8}){0,3}") {
            let wire = default_outgoing_matcher(&key).unwrap();
            prop_assert_eq!(default_incoming_matcher(&wire), Some(canonical_header_key(&key)));
        }
    }
}
