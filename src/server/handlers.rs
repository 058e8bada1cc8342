use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Duration as ChronoDuration, Utc};
use protogate_schema::message::MessageRequest;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::credentials::CooldownReason;
use crate::error::GatewayError;
use crate::stream::build_stream_response;
use crate::tokens::estimate_request_input_tokens;
use crate::translate::{translate_request, translate_response, TranslationContext};
use crate::utils::logging::with_pretty_json_debug;

use super::auth::RequireApiKey;
use super::state::GatewayState;

/// Client-facing chat completion endpoint: select a credential, translate
/// and dispatch the request, and on a recoverable upstream rejection
/// install a cooldown and reselect, up to `retry_max_attempts` rounds.
pub async fn messages_handler(
    State(state): State<GatewayState>,
    _auth: RequireApiKey,
    Json(request): Json<MessageRequest>,
) -> Result<Response, GatewayError> {
    if request.messages.is_empty() {
        return Err(GatewayError::TranslationInput {
            field: "messages".to_string(),
            message: "at least one message is required".to_string(),
        });
    }

    let request_id = Uuid::new_v4().to_string();
    let input_tokens = estimate_request_input_tokens(&request);
    let max_attempts = state.config.basic.retry_max_attempts;

    let mut last_err = GatewayError::PoolExhausted;

    for attempt in 0..max_attempts {
        let credential = match state.selector.select(Some(&request.model)).await {
            Ok(cred) => cred,
            Err(e) => {
                last_err = e;
                break;
            }
        };
        let project_id = credential
            .project_id
            .clone()
            .unwrap_or_else(|| credential.refresh_token.clone());

        let ctx = TranslationContext {
            project_id: &project_id,
            session_id: &credential.session_id.to_string(),
            request_id: &request_id,
            user_agent: &state.config.basic.api_user_agent,
            default_system_instruction: &state.config.basic.system_instruction,
            max_images: state.config.basic.max_images,
            default_max_tokens: state.config.basic.default_max_tokens,
            default_temperature: state.config.basic.default_temperature,
            default_top_p: state.config.basic.default_top_p,
            default_top_k: state.config.basic.default_top_k,
        };

        let envelope = translate_request(&request, &ctx, &state.thoughtsig);
        with_pretty_json_debug(&envelope, |pretty| {
            debug!(attempt, model = %request.model, body = %pretty, "dispatching upstream request");
        });

        let access_token = credential.access_token.clone().unwrap_or_default();
        let url = if request.stream {
            format!("{}?alt=sse", state.config.basic.api_url)
        } else {
            state.config.basic.api_no_stream_url.to_string()
        };

        let upstream = state
            .http
            .post(&url)
            .bearer_auth(&access_token)
            .header("host", state.config.basic.api_host.as_str())
            .json(&envelope)
            .send()
            .await;

        let upstream = match upstream {
            Ok(resp) => resp,
            Err(e) => {
                warn!(attempt, error = %e, "upstream request failed, retrying");
                last_err = GatewayError::Transient(e.to_string());
                continue;
            }
        };

        let status = upstream.status();
        if status.is_success() {
            return Ok(if request.stream {
                build_stream_response(upstream, request_id, request.model.clone(), input_tokens)
                    .into_response()
            } else {
                let body: protogate_schema::gemini::GenerateContentResponse = upstream
                    .json()
                    .await
                    .map_err(|e| GatewayError::Transient(e.to_string()))?;
                let mapped = translate_response(&body, &request_id, &request.model, input_tokens);
                Json(mapped).into_response()
            });
        }

        let retry_after = upstream
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok());

        if status.as_u16() == 429 || status.as_u16() == 401 || status.as_u16() == 403 {
            let reset_at = Utc::now() + ChronoDuration::seconds(retry_after.unwrap_or(3600));
            let reason = if status.as_u16() == 429 {
                CooldownReason::ResourceExhausted
            } else {
                CooldownReason::Other
            };
            if let Err(e) = state
                .selector
                .install_cooldown(&project_id, &request.model, reset_at, reason)
                .await
            {
                warn!(error = %e, "failed to persist cooldown");
            }
            last_err = GatewayError::QuotaExhausted {
                reset_at,
                reason: format!("upstream returned {status}"),
            };
            continue;
        }

        if state
            .config
            .basic
            .retry_status_codes
            .contains(&status.as_u16())
        {
            warn!(attempt, %status, "upstream returned a retryable status");
            last_err = GatewayError::UpstreamStatus(status);
            continue;
        }

        return Err(GatewayError::UpstreamStatus(status));
    }

    Err(last_err)
}
