//! url_cache_put tool implementation.
//!
//! Stores caller-supplied text under a URL without touching the network.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use urlvault_core::{RetentionClass, UrlCache};

use crate::tools::json_result;

/// Parameters for the url_cache_put tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePutParams {
    /// URL the data is stored under.
    pub url: String,

    /// Retention class for the entry.
    pub retention: RetentionClass,

    /// Payload to store.
    pub text: String,
}

/// Output from the url_cache_put tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePutOutput {
    /// Cache key, as `class/digest`.
    pub key: String,
    /// Bytes written.
    pub len: usize,
}

/// Implementation of the url_cache_put tool.
pub async fn put_impl(cache: &UrlCache, params: CachePutParams) -> Result<CallToolResult, McpError> {
    let key = cache.key_for(&params.url, params.retention)?;
    let len = params.text.len();

    cache.cache_data(params.text, &params.url, params.retention).await?;

    json_result(&CachePutOutput { key: key.to_string(), len })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_util::{cache, output};

    #[tokio::test]
    async fn test_put_then_load_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir).await;

        let params = CachePutParams {
            url: "https://example.com/note".into(),
            retention: RetentionClass::Session,
            text: "stored".into(),
        };
        let out: CachePutOutput = output(&put_impl(&cache, params).await.unwrap());
        assert!(out.key.starts_with("session/"));
        assert_eq!(out.len, 6);

        let loaded = cache
            .load_url("https://example.com/note", RetentionClass::Session, true)
            .await
            .unwrap();
        assert!(loaded.from_cache);
        assert_eq!(&loaded.bytes[..], b"stored");
    }

    #[tokio::test]
    async fn test_put_rejects_bad_url() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir).await;

        let params =
            CachePutParams { url: "ftp://example.com/x".into(), retention: RetentionClass::Permanent, text: "x".into() };
        let err = put_impl(&cache, params).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }
}
