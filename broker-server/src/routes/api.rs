//! Data endpoints

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use bridge_traits::provider::{ExternalItem, ListFilter, ProviderClient};
use bridge_traits::time::Clock;
use core_auth::{HandshakeState, ProviderInfo, ProviderKind};
use core_service::SyncResult;
use serde::Serialize;
use tracing::error;

use crate::routes::AppError;
use crate::state::AppState;

/// Calendar and page size of `/api/calendar/events`.
const EVENTS_CALENDAR: &str = "primary";
const EVENTS_LIMIT: u32 = 10;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/is_authenticated", get(is_authenticated))
        .route("/api/calendar/events", get(calendar_events))
        .route("/api/providers", get(providers))
        .route("/api/sync", post(sync).get(last_sync))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthStatus {
    is_authenticated: bool,
}

/// GET /api/is_authenticated - Whether Google Calendar is connected
async fn is_authenticated(State(state): State<AppState>) -> Json<AuthStatus> {
    let is_authenticated = state
        .service
        .handshakes()
        .is_connected(ProviderKind::GoogleCalendar)
        .await;
    Json(AuthStatus { is_authenticated })
}

/// GET /api/calendar/events - Next upcoming events of the primary calendar
async fn calendar_events(
    State(state): State<AppState>,
) -> Result<Json<Vec<ExternalItem>>, AppError> {
    let service = &state.service;
    let login_first = || AppError::new(StatusCode::UNAUTHORIZED, "You need to log in first.");

    if !service
        .handshakes()
        .is_connected(ProviderKind::GoogleCalendar)
        .await
    {
        return Err(login_first());
    }

    let filter = ListFilter::upcoming(service.config().clock.now(), EVENTS_LIMIT);
    match service
        .google_calendar()
        .list(EVENTS_CALENDAR, Some(filter))
        .await
    {
        Ok(items) => Ok(Json(items)),
        Err(e) if e.is_authentication_required() => Err(login_first()),
        Err(e) => {
            error!(error = %e, "The API returned an error");
            Err(AppError::internal("Failed to fetch calendar events"))
        }
    }
}

#[derive(Serialize)]
struct ProviderStatus {
    #[serde(flatten)]
    info: ProviderInfo,
    connected: bool,
    state: HandshakeState,
}

/// GET /api/providers - Supported providers and their connection state
async fn providers(State(state): State<AppState>) -> Json<Vec<ProviderStatus>> {
    let handshakes = state.service.handshakes();
    let mut statuses = Vec::new();
    for info in handshakes.list_providers() {
        let kind = info.kind;
        statuses.push(ProviderStatus {
            info,
            connected: handshakes.is_connected(kind).await,
            state: handshakes.handshake_state(kind).await,
        });
    }
    Json(statuses)
}

/// POST /api/sync - Sync every connected provider
async fn sync(State(state): State<AppState>) -> Json<Vec<SyncResult>> {
    Json(state.service.sync_connected().await)
}

/// GET /api/sync - Results of the last pass
async fn last_sync(State(state): State<AppState>) -> Json<Vec<SyncResult>> {
    Json(state.service.coordinator().last_results().await)
}
