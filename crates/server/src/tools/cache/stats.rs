//! url_cache_stats tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use urlvault_core::{RetentionClass, StoreStats, UrlCache};

use crate::tools::json_result;

/// Parameters for the url_cache_stats tool (none).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatsParams {}

/// Per-class entry counts and sizes.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatsOutput {
    pub session: StoreStats,
    pub permanent: StoreStats,
}

/// Implementation of the url_cache_stats tool.
pub async fn stats_impl(cache: &UrlCache, _params: CacheStatsParams) -> Result<CallToolResult, McpError> {
    let output = CacheStatsOutput {
        session: cache.stats(RetentionClass::Session).await?,
        permanent: cache.stats(RetentionClass::Permanent).await?,
    };
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_util::{cache, output};

    #[tokio::test]
    async fn test_stats_per_class() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir).await;

        cache.cache_data("abc", "https://example.com/1", RetentionClass::Permanent).await.unwrap();
        cache.cache_data("de", "https://example.com/2", RetentionClass::Permanent).await.unwrap();
        cache.cache_data("f", "https://example.com/3", RetentionClass::Session).await.unwrap();

        let out: CacheStatsOutput = output(&stats_impl(&cache, CacheStatsParams::default()).await.unwrap());
        assert_eq!(out.permanent.entries, 2);
        assert_eq!(out.permanent.bytes, 5);
        assert_eq!(out.session.entries, 1);
        assert_eq!(out.session.bytes, 1);
    }
}
