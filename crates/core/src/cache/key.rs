//! Retention classes, URL normalization and cache key derivation.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::Error;

/// How long a cached entry is expected to live.
///
/// Session entries belong to the current run and are dropped when the cache
/// starts fresh; permanent entries survive restarts until purged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RetentionClass {
    Session,
    Permanent,
}

impl RetentionClass {
    pub const ALL: [RetentionClass; 2] = [RetentionClass::Session, RetentionClass::Permanent];

    pub fn as_str(self) -> &'static str {
        match self {
            RetentionClass::Session => "session",
            RetentionClass::Permanent => "permanent",
        }
    }

    /// Directory under the cache root holding this class's entries.
    pub fn dir_name(self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for RetentionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetentionClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "session" => Ok(RetentionClass::Session),
            "permanent" => Ok(RetentionClass::Permanent),
            other => Err(Error::InvalidRequest(format!("unknown retention class: {other}"))),
        }
    }
}

/// Storage address of one cached payload.
///
/// Carries its retention class; the digest is lowercase hex SHA-256 over the
/// class tag and the normalized URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    class: RetentionClass,
    digest: String,
}

impl CacheKey {
    /// Derive the key for `url` within `class`.
    ///
    /// The URL is expected to be normalized already (see [`normalize_url`]);
    /// the class tag is hashed in so the two namespaces never share a digest.
    pub fn derive(url: &Url, class: RetentionClass) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(class.as_str().as_bytes());
        hasher.update(b"\n");
        hasher.update(url.as_str().as_bytes());
        CacheKey { class, digest: hex::encode(hasher.finalize()) }
    }

    /// Rebuild a key from its hex digest, e.g. a file name read back from disk.
    pub fn from_hex(class: RetentionClass, digest: &str) -> Option<Self> {
        is_digest(digest).then(|| CacheKey { class, digest: digest.to_string() })
    }

    pub fn class(&self) -> RetentionClass {
        self.class
    }

    pub fn as_str(&self) -> &str {
        &self.digest
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.class, self.digest)
    }
}

pub(crate) fn is_digest(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Normalize a URL string for consistent keying.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn normalize_url(input: &str) -> Result<Url, Error> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(Error::InvalidRequest("empty URL".into()));
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let parsed = Url::parse(&url_str).map_err(|e| Error::InvalidRequest(format!("invalid URL: {e}")))?;
    normalize_parsed(parsed)
}

/// Apply the same normalization to an already-parsed URL.
pub fn normalize_parsed(mut url: Url) -> Result<Url, Error> {
    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(Error::InvalidRequest(format!("unsupported scheme: {scheme}"))),
    }

    let host = url
        .host_str()
        .map(str::to_lowercase)
        .ok_or_else(|| Error::InvalidRequest("URL has no host".into()))?;
    url.set_host(Some(&host))
        .map_err(|e| Error::InvalidRequest(format!("invalid URL: {e}")))?;

    url.set_fragment(None);

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(url: &str, class: RetentionClass) -> CacheKey {
        CacheKey::derive(&normalize_url(url).unwrap(), class)
    }

    #[test]
    fn test_key_stability() {
        let k1 = key("https://example.com/a?b=1", RetentionClass::Session);
        let k2 = key("https://example.com/a?b=1", RetentionClass::Session);
        assert_eq!(k1, k2);
    }

    #[test]
    fn test_key_differs_by_class() {
        let session = key("https://example.com", RetentionClass::Session);
        let permanent = key("https://example.com", RetentionClass::Permanent);
        assert_ne!(session, permanent);
    }

    #[test]
    fn test_key_ignores_fragment_and_host_case() {
        let k1 = key("https://EXAMPLE.com/page#top", RetentionClass::Permanent);
        let k2 = key("https://example.com/page", RetentionClass::Permanent);
        assert_eq!(k1, k2);
    }

    #[test]
    fn test_key_respects_query() {
        let k1 = key("https://example.com/page?a=1&b=2", RetentionClass::Session);
        let k2 = key("https://example.com/page?b=2&a=1", RetentionClass::Session);
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_key_format() {
        let k = key("https://example.com", RetentionClass::Session);
        assert_eq!(k.as_str().len(), 64);
        assert_eq!(k.class(), RetentionClass::Session);
        assert_eq!(CacheKey::from_hex(RetentionClass::Session, k.as_str()), Some(k.clone()));
        assert!(CacheKey::from_hex(RetentionClass::Session, "not-a-key").is_none());
        assert!(CacheKey::from_hex(RetentionClass::Session, &"A".repeat(64)).is_none());
        assert!(k.to_string().starts_with("session/"));
    }

    #[test]
    fn test_normalize_default_scheme() {
        let url = normalize_url("example.com/x").unwrap();
        assert_eq!(url.as_str(), "https://example.com/x");
    }

    #[test]
    fn test_normalize_keeps_port() {
        let url = normalize_url("http://example.com:8080/x").unwrap();
        assert_eq!(url.port(), Some(8080));
    }

    #[test]
    fn test_normalize_trim_whitespace() {
        let url = normalize_url("  https://example.com  ").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn test_normalize_rejects_bad_input() {
        assert!(matches!(normalize_url(""), Err(Error::InvalidRequest(_))));
        assert!(matches!(normalize_url("   "), Err(Error::InvalidRequest(_))));
        assert!(matches!(normalize_url("file:///etc/passwd"), Err(Error::InvalidRequest(_))));
        assert!(matches!(normalize_url("https://"), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_retention_class_parse() {
        assert_eq!("Session".parse::<RetentionClass>().unwrap(), RetentionClass::Session);
        assert_eq!("permanent".parse::<RetentionClass>().unwrap(), RetentionClass::Permanent);
        assert!("forever".parse::<RetentionClass>().is_err());
    }

    #[test]
    fn test_retention_class_serde() {
        let json = serde_json::to_string(&RetentionClass::Permanent).unwrap();
        assert_eq!(json, "\"permanent\"");
        let class: RetentionClass = serde_json::from_str("\"session\"").unwrap();
        assert_eq!(class, RetentionClass::Session);
    }
}
