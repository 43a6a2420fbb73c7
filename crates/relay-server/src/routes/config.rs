use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use relay_core::scheduler::ScheduleEngine;
use relay_core::{Config, RelayError, Schedule, Status};

use super::relays::parse_relay;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/config
///
/// The full configuration snapshot.
pub async fn get_config(State(app): State<AppState>) -> Result<Json<Config>, AppError> {
    Ok(Json(app.config.get()?))
}

/// GET /api/config/schedules
pub async fn list_schedules(State(app): State<AppState>) -> Result<Json<Vec<Schedule>>, AppError> {
    Ok(Json(app.config.get()?.schedules))
}

/// POST /api/config/schedules
///
/// Create a schedule (no id) or replace the one
/// with the given id.
///
/// The expression is checked before anything else so a rejected request
/// leaves the armed schedules alone. The updated configuration is then
/// applied to the controller and only persisted if it applied, so the stored
/// and armed schedule sets never drift apart.
pub async fn upsert_schedule(
    State(app): State<AppState>,
    Json(body): Json<Schedule>,
) -> Result<(StatusCode, Json<Schedule>), AppError> {
    ScheduleEngine::parse(&body.expression)?;
    let config_write = app.config_write.clone();
    let _guard = config_write.lock().await;
    let stored = tokio::task::spawn_blocking(move || {
        let mut config = app.config.get()?;
        let stored = config.upsert_schedule(body)?;
        app.controller.apply_config(&config)?;
        app.config.set(config)?;
        Ok::<_, RelayError>(stored)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    tracing::info!(id = %stored.id, relay = stored.relay, expression = %stored.expression, "schedule saved");
    Ok((StatusCode::CREATED, Json(stored)))
}

/// DELETE /api/config/schedules/:id
pub async fn remove_schedule(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Schedule>, AppError> {
    let config_write = app.config_write.clone();
    let _guard = config_write.lock().await;
    let removed = tokio::task::spawn_blocking(move || {
        let mut config = app.config.get()?;
        let removed = config.remove_schedule(&id)?;
        app.controller.apply_config(&config)?;
        app.config.set(config)?;
        Ok::<_, RelayError>(removed)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    tracing::info!(id = %removed.id, "schedule removed");
    Ok(Json(removed))
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRelayNameBody {
    relay_name: String,
}

/// POST /api/config/relay/:relay/name
///
/// Set or clear a relay's display name.
pub async fn set_relay_name(
    State(app): State<AppState>,
    Path(relay): Path<String>,
    Json(body): Json<SetRelayNameBody>,
) -> Result<Json<Status>, AppError> {
    let relay = parse_relay(&relay)?;
    let config_write = app.config_write.clone();
    let _guard = config_write.lock().await;
    let status = tokio::task::spawn_blocking(move || {
        if !app.controller.is_valid_relay(relay) {
            return Err(RelayError::InvalidRelay {
                relay,
                count: app.controller.relay_count(),
            });
        }
        let mut config = app.config.get()?;
        config.set_relay_name(relay, body.relay_name);
        app.config.set(config)?;
        app.controller.status()
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(status))
}
