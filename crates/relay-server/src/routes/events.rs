use axum::extract::State;
use axum::Json;
use relay_core::Event;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/events
///
/// The retained audit trail, newest first.
pub async fn list_events(State(app): State<AppState>) -> Result<Json<Vec<Event>>, AppError> {
    let events = app.events.clone();
    let mut list = tokio::task::spawn_blocking(move || events.list())
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    list.reverse();
    Ok(Json(list))
}
