use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use serde_json::json;
use subtle::ConstantTimeEq;

use super::state::GatewayState;

/// Accepts either `x-api-key` (the client schema's own convention) or a
/// standard `Authorization: Bearer` header, mirroring how upstream-facing
/// gateways in this family accept more than one inbound key placement.
fn extract_token(headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(key) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        return Some(key.to_string());
    }
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
}

#[derive(Debug, Clone, Copy)]
pub struct RequireApiKey;

impl FromRequestParts<GatewayState> for RequireApiKey {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &GatewayState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers).ok_or(AuthError::MissingKey)?;
        let expected = state.api_key.as_bytes();
        if token.as_bytes().ct_eq(expected).into() {
            Ok(RequireApiKey)
        } else {
            Err(AuthError::InvalidKey)
        }
    }
}

pub enum AuthError {
    MissingKey,
    InvalidKey,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, reason) = match self {
            AuthError::MissingKey => (StatusCode::UNAUTHORIZED, "missing API key"),
            AuthError::InvalidKey => (StatusCode::UNAUTHORIZED, "invalid API key"),
        };
        (
            status,
            Json(json!({"error": {"code": "UNAUTHORIZED", "message": reason}})),
        )
            .into_response()
    }
}
