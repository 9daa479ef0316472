//! Authorization endpoints

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use core_auth::{AuthError, CodeCallback, HandshakeOutcome, ProviderKind};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::routes::{provider_from_path, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/{provider}", get(begin).delete(disconnect))
        .route("/auth/{provider}/callback", get(callback))
        .route("/auth/{provider}/token", post(connect_with_token))
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// GET /auth/{provider} - Redirect to the consent screen
async fn begin(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<Response, AppError> {
    let provider = provider_from_path(&provider)?;

    let handle = state
        .service
        .handshakes()
        .begin_code_authorization(provider)
        .await
        .map_err(|e| {
            error!(provider = %provider, error = %e, "Could not start authorization");
            match e {
                AuthError::Configuration { .. } => AppError::internal(e.to_string()),
                other => AppError::bad_request(other.to_string()),
            }
        })?;

    Ok(found(&handle.authorization_url))
}

/// GET /auth/{provider}/callback - Exchange the code and return to the frontend
async fn callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<CodeCallback>,
) -> Result<Response, AppError> {
    let provider = provider_from_path(&provider)?;

    match state
        .service
        .handshakes()
        .complete_code_authorization(provider, &params)
        .await
    {
        Ok(HandshakeOutcome::Authorized(_)) => {
            info!(provider = %provider, "Authorization completed");
            Ok(found(&format!("{}?auth_success=true", state.frontend_url)))
        }
        Ok(outcome) => {
            warn!(provider = %provider, state = %outcome.state(), "Authorization not granted");
            Err(AppError::internal("Error retrieving access token"))
        }
        Err(e) => {
            error!(provider = %provider, error = %e, "Error retrieving access token");
            Err(AppError::internal("Error retrieving access token"))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct TokenBody {
    #[serde(default)]
    token: Option<String>,
}

#[derive(Serialize)]
struct ConnectionResponse {
    provider: ProviderKind,
    connected: bool,
}

/// POST /auth/{provider}/token - Store an integration token
///
/// Without a `token` in the body the configured API key is used.
async fn connect_with_token(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(body): Json<TokenBody>,
) -> Result<Json<ConnectionResponse>, AppError> {
    let provider = provider_from_path(&provider)?;

    state
        .service
        .handshakes()
        .authorize_with_token(provider, body.token.as_deref())
        .await
        .map_err(|e| AppError::bad_request(e.to_string()))?;

    Ok(Json(ConnectionResponse {
        provider,
        connected: true,
    }))
}

/// DELETE /auth/{provider} - Forget the credential
async fn disconnect(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<Json<ConnectionResponse>, AppError> {
    let provider = provider_from_path(&provider)?;
    state.service.handshakes().disconnect(provider).await;

    Ok(Json(ConnectionResponse {
        provider,
        connected: false,
    }))
}
