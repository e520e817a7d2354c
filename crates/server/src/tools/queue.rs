//! url_queue tool implementation.
//!
//! Suspends or resumes the cache work queue. Work submitted while suspended
//! is held until the next resume.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use urlvault_core::{QueueState, UrlCache};

use super::json_result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum QueueAction {
    Suspend,
    Resume,
}

/// Parameters for the url_queue tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueueParams {
    /// "suspend" or "resume".
    pub action: QueueAction,
}

/// Output from the url_queue tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueueOutput {
    pub state: QueueState,
    /// Jobs held, waiting to start.
    pub queued: usize,
    /// Jobs executing.
    pub running: usize,
}

/// Implementation of the url_queue tool.
pub async fn queue_impl(cache: &UrlCache, params: QueueParams) -> Result<CallToolResult, McpError> {
    match params.action {
        QueueAction::Suspend => cache.suspend(),
        QueueAction::Resume => cache.resume(),
    }

    let queue = cache.queue();
    json_result(&QueueOutput { state: queue.state(), queued: queue.queued(), running: queue.running() })
}
