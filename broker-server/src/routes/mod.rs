pub mod api;
pub mod auth;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Router,
};
use core_auth::ProviderKind;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Plain-text error response
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

pub fn provider_from_path(name: &str) -> Result<ProviderKind, AppError> {
    ProviderKind::parse(name)
        .ok_or_else(|| AppError::new(StatusCode::NOT_FOUND, format!("Unknown provider: {}", name)))
}

/// Every route, with permissive CORS for the frontend.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(auth::router())
        .merge(api::router())
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
    use bytes::Bytes;
    use core_runtime::config::{BrokerConfig, ProviderSettings};
    use core_service::BrokerService;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Google's token endpoint and events list, canned.
    struct FakeGoogle;

    #[async_trait]
    impl HttpClient for FakeGoogle {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            let body = if request.method == HttpMethod::Post
                && request.url.starts_with("https://oauth2.googleapis.com/token")
            {
                r#"{"access_token": "ya29.server", "expires_in": 3599, "token_type": "Bearer"}"#
            } else if request.url.contains("/calendars/primary/events") {
                r#"{"items": [{"id": "evt1", "summary": "Standup", "start": {"dateTime": "2030-01-07T09:00:00Z"}, "end": {"dateTime": "2030-01-07T09:15:00Z"}}]}"#
            } else {
                return Ok(HttpResponse {
                    status: 404,
                    headers: HashMap::new(),
                    body: Bytes::from_static(b"{}"),
                });
            };
            Ok(HttpResponse {
                status: 200,
                headers: HashMap::new(),
                body: Bytes::from(body),
            })
        }
    }

    async fn spawn_app() -> String {
        let config = BrokerConfig::builder()
            .http_client(Arc::new(FakeGoogle))
            .google_calendar(
                ProviderSettings::new("client-id", "http://localhost:3001/auth/google/callback")
                    .with_client_secret("client-secret"),
            )
            .build()
            .unwrap();
        let service = BrokerService::start(config).await.unwrap();
        let router = app(AppState::new(service, "http://localhost:3000"));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client() -> reqwest::Client {
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap()
    }

    async fn begin_and_get_state(base: &str) -> String {
        let response = client()
            .get(format!("{}/auth/google", base))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 302);

        let location = response.headers()["location"].to_str().unwrap().to_string();
        assert!(location.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        reqwest::Url::parse(&location)
            .unwrap()
            .query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned())
            .unwrap()
    }

    #[tokio::test]
    async fn test_events_require_login() {
        let base = spawn_app().await;

        let status: serde_json::Value = client()
            .get(format!("{}/api/is_authenticated", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status, serde_json::json!({"isAuthenticated": false}));

        let response = client()
            .get(format!("{}/api/calendar/events", base))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 401);
        assert_eq!(response.text().await.unwrap(), "You need to log in first.");
    }

    #[tokio::test]
    async fn test_code_flow_then_events() {
        let base = spawn_app().await;
        let state = begin_and_get_state(&base).await;

        let response = client()
            .get(format!("{}/auth/google/callback?code=4/abc&state={}", base, state))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 302);
        assert_eq!(
            response.headers()["location"],
            "http://localhost:3000?auth_success=true"
        );

        let status: serde_json::Value = client()
            .get(format!("{}/api/is_authenticated", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["isAuthenticated"], true);

        let events: serde_json::Value = client()
            .get(format!("{}/api/calendar/events", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(events[0]["id"], "evt1");
        assert_eq!(events[0]["title"], "Standup");
    }

    #[tokio::test]
    async fn test_callback_with_wrong_state_fails() {
        let base = spawn_app().await;
        begin_and_get_state(&base).await;

        let response = client()
            .get(format!("{}/auth/google/callback?code=4/abc&state=forged", base))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 500);
        assert_eq!(response.text().await.unwrap(), "Error retrieving access token");
    }

    #[tokio::test]
    async fn test_unknown_provider_is_not_found() {
        let base = spawn_app().await;

        let response = client()
            .get(format!("{}/auth/dropbox", base))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn test_sync_without_connections_is_empty() {
        let base = spawn_app().await;

        let results: serde_json::Value = client()
            .post(format!("{}/api/sync", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(results, serde_json::json!([]));
    }
}
