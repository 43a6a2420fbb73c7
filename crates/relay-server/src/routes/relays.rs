use axum::extract::{Path, State};
use axum::Json;
use relay_core::controller::MANUAL_CAUSE;
use relay_core::{Action, Status};

use crate::error::AppError;
use crate::state::AppState;

/// Parse the `{relay}` path segment.
pub(crate) fn parse_relay(raw: &str) -> Result<u8, AppError> {
    raw.parse::<u8>()
        .map_err(|_| AppError::bad_request(format!("invalid relay '{raw}': must be a number")))
}

/// GET /api/relays
///
/// State and name of every relay.
pub async fn get_status(State(app): State<AppState>) -> Result<Json<Status>, AppError> {
    let controller = app.controller.clone();
    let status = tokio::task::spawn_blocking(move || controller.status())
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(status))
}

/// POST /api/relays/:relay/toggle
///
/// Flip a relay, returning the new status.
pub async fn toggle_relay(
    State(app): State<AppState>,
    Path(relay): Path<String>,
) -> Result<Json<Status>, AppError> {
    let relay = parse_relay(&relay)?;
    let controller = app.controller.clone();
    let status = tokio::task::spawn_blocking(move || controller.toggle(relay))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(status))
}

/// POST /api/relays/:relay/on
pub async fn switch_on(
    State(app): State<AppState>,
    Path(relay): Path<String>,
) -> Result<Json<Status>, AppError> {
    switch(app, &relay, Action::On).await
}

/// POST /api/relays/:relay/off
pub async fn switch_off(
    State(app): State<AppState>,
    Path(relay): Path<String>,
) -> Result<Json<Status>, AppError> {
    switch(app, &relay, Action::Off).await
}

async fn switch(app: AppState, relay: &str, action: Action) -> Result<Json<Status>, AppError> {
    let relay = parse_relay(relay)?;
    let controller = app.controller.clone();
    let status = tokio::task::spawn_blocking(move || {
        controller.set_state(relay, action, MANUAL_CAUSE)?;
        controller.status()
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(status))
}
