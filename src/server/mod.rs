mod auth;
mod handlers;
mod router;
mod state;

pub use router::build_router;
pub use state::GatewayState;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::collections::HashSet;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::credentials::PersistedCredential;

    async fn test_state(credentials: Vec<PersistedCredential>) -> (GatewayState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let creds_path = dir.path().join("credentials.json");
        tokio::fs::write(&creds_path, serde_json::to_vec(&credentials).unwrap())
            .await
            .unwrap();

        let mut config = Config::default();
        config.basic.api_key = "test-key".to_string();
        let state = GatewayState::build(std::sync::Arc::new(config), creds_path).await;
        (state, dir)
    }

    #[tokio::test]
    async fn missing_api_key_is_rejected() {
        let (state, _dir) = test_state(vec![]).await;
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/messages")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({
                            "model": "gemini-2.5-pro",
                            "messages": [{"role": "user", "content": [{"type": "text", "text": "hi"}]}]
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn empty_pool_surfaces_pool_exhausted() {
        let (state, _dir) = test_state(vec![]).await;
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/messages")
                    .header("content-type", "application/json")
                    .header("x-api-key", "test-key")
                    .body(Body::from(
                        serde_json::json!({
                            "model": "gemini-2.5-pro",
                            "messages": [{"role": "user", "content": [{"type": "text", "text": "hi"}]}]
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn empty_messages_array_is_rejected_before_selection() {
        let (state, _dir) = test_state(vec![PersistedCredential {
            refresh_token: "rt".into(),
            access_token: Some("tok".into()),
            expires_in: Some(3600),
            timestamp: Some(chrono::Utc::now()),
            project_id: Some("proj".into()),
            enable: true,
            disabled_models: HashSet::new(),
        }])
        .await;
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/messages")
                    .header("content-type", "application/json")
                    .header("x-api-key", "test-key")
                    .body(Body::from(
                        serde_json::json!({"model": "gemini-2.5-pro", "messages": []}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let (state, _dir) = test_state(vec![]).await;
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/nonexistent")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
