//! url_cache_purge tool implementation.
//!
//! Removes every entry of one retention class.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use urlvault_core::{RetentionClass, UrlCache};

use crate::tools::json_result;

/// Parameters for the url_cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Retention class to purge.
    pub retention: RetentionClass,
}

/// Output from the url_cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    pub retention: RetentionClass,
    pub purged: bool,
}

/// Implementation of the url_cache_purge tool.
pub async fn purge_impl(cache: &UrlCache, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    cache.purge_cache(params.retention).await?;
    json_result(&CachePurgeOutput { retention: params.retention, purged: true })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_util::{cache, output};

    #[tokio::test]
    async fn test_purge_only_touches_one_class() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir).await;
        let url = "https://example.com/a";

        cache.cache_data("s", url, RetentionClass::Session).await.unwrap();
        cache.cache_data("p", url, RetentionClass::Permanent).await.unwrap();

        let result = purge_impl(&cache, CachePurgeParams { retention: RetentionClass::Session })
            .await
            .unwrap();
        let out: CachePurgeOutput = output(&result);
        assert!(out.purged);
        assert_eq!(out.retention, RetentionClass::Session);

        assert_eq!(cache.stats(RetentionClass::Session).await.unwrap().entries, 0);
        assert_eq!(cache.stats(RetentionClass::Permanent).await.unwrap().entries, 1);
    }

    #[tokio::test]
    async fn test_purge_empty_class() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir).await;

        let result = purge_impl(&cache, CachePurgeParams { retention: RetentionClass::Permanent }).await;
        assert!(result.is_ok());
    }
}
