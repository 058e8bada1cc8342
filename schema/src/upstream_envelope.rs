use crate::gemini::GenerateContentRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The outer envelope sent to the upstream `v1internal:*GenerateContent`
/// endpoints: `{project, requestId, model, userAgent, request}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamRequestEnvelope {
    pub project: String,
    pub request_id: String,
    pub model: String,
    pub user_agent: String,
    pub request: InnerRequest,
}

/// `request` field of the envelope: the generate-content body plus a
/// per-call `sessionId` the upstream expects alongside it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InnerRequest {
    #[serde(flatten)]
    pub body: GenerateContentRequest,

    pub session_id: String,

    #[serde(default, flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl UpstreamRequestEnvelope {
    pub fn new(
        project: String,
        request_id: String,
        model: String,
        user_agent: String,
        session_id: String,
        body: GenerateContentRequest,
    ) -> Self {
        Self {
            project,
            request_id,
            model,
            user_agent,
            request: InnerRequest {
                body,
                session_id,
                extra: BTreeMap::new(),
            },
        }
    }
}
