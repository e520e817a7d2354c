//! url_load tool implementation.
//!
//! Loads a URL through the cache: cached copy when allowed and present,
//! otherwise fetched and persisted.

use std::collections::BTreeMap;
use std::time::Duration;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use urlvault_core::{FetchRequest, RetentionClass, UrlCache};

use super::json_result;

/// Input parameters for the url_load tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UrlLoadParams {
    /// The URL to load.
    pub url: String,

    /// Retention class: "session" (dropped on restart) or "permanent" (default).
    #[serde(default = "default_retention")]
    pub retention: RetentionClass,

    /// Serve from the cache when a copy exists (default: true).
    #[serde(default = "default_true")]
    pub use_cache: bool,

    /// Extra request headers forwarded to the origin.
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,

    /// Per-request timeout in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_retention() -> RetentionClass {
    RetentionClass::Permanent
}

fn default_true() -> bool {
    true
}

/// Output structure for the url_load tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UrlLoadOutput {
    /// The normalized URL that was loaded.
    pub url: String,
    /// Whether the bytes came from the cache.
    pub from_cache: bool,
    /// Payload size in bytes.
    pub len: usize,
    /// Hex SHA-256 of the payload.
    pub sha256: String,
    /// The payload as text, when it is valid UTF-8.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Implementation of the url_load tool.
pub async fn load_impl(cache: &UrlCache, params: UrlLoadParams) -> Result<CallToolResult, McpError> {
    let mut request = FetchRequest::parse(&params.url)?;
    for (name, value) in params.headers.unwrap_or_default() {
        request = request.header(name, value);
    }
    if let Some(ms) = params.timeout_ms {
        request = request.timeout(Duration::from_millis(ms));
    }

    let outcome = cache.load_request(request, params.retention, params.use_cache).await?;

    let output = UrlLoadOutput {
        url: outcome.url.to_string(),
        from_cache: outcome.from_cache,
        len: outcome.bytes.len(),
        sha256: hex::encode(Sha256::digest(&outcome.bytes)),
        text: std::str::from_utf8(&outcome.bytes).ok().map(str::to_string),
    };

    json_result(&output)
}
