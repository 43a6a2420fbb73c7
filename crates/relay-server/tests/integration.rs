use axum::http::StatusCode;
use http_body_util::BodyExt;
use relay_core::hardware::StubBackend;
use relay_core::{ConfigStore, JsonConfigStore, JsonlEventLog, RelayController, RelayNames};
use relay_server::AppState;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct TestApp {
    dir: TempDir,
    state: AppState,
    store: Arc<JsonConfigStore>,
    backend: Arc<StubBackend>,
}

impl TestApp {
    fn router(&self) -> axum::Router {
        relay_server::build_router(self.state.clone())
    }
}

/// Wire a three-relay stub controller to file-backed config and events
/// inside a fresh temp directory.
fn test_app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(JsonConfigStore::open(dir.path().join("config.json")).unwrap());
    let events = Arc::new(JsonlEventLog::open(dir.path().join("events.jsonl"), 100).unwrap());
    let backend = Arc::new(StubBackend::new());
    let config = store.get().unwrap();
    let controller = RelayController::new(
        backend.clone(),
        vec![26, 20, 21],
        RelayNames::new(store.clone()),
        events.clone(),
        tokio::runtime::Handle::current(),
        &config,
    )
    .unwrap();
    let state = AppState::new(Arc::new(controller), store.clone(), events);
    TestApp {
        dir,
        state,
        store,
        backend,
    }
}

/// Send a request via `oneshot` and return (status, parsed JSON body).
async fn send(
    app: axum::Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = axum::http::Request::builder().method(method).uri(uri);
    let req = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    };
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, "GET", uri, None).await
}

async fn post(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, "POST", uri, None).await
}

async fn post_json(
    app: axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, "POST", uri, Some(body)).await
}

fn relay_states(json: &serde_json::Value) -> Vec<u64> {
    json["relayStates"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["state"].as_u64().unwrap())
        .collect()
}

// ---------------------------------------------------------------------------
// Relays
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_ok() {
    let app = test_app();
    let (status, json) = get(app.router(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn status_lists_all_relays_off() {
    let app = test_app();
    let (status, json) = get(app.router(), "/api/relays").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        serde_json::json!({
            "relayStates": [
                { "relay": 1, "state": 0, "name": "Relay 1" },
                { "relay": 2, "state": 0, "name": "Relay 2" },
                { "relay": 3, "state": 0, "name": "Relay 3" },
            ]
        })
    );
}

#[tokio::test]
async fn toggle_flips_relay_and_logs_event() {
    let app = test_app();
    let (status, json) = post(app.router(), "/api/relays/2/toggle").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(relay_states(&json), vec![0, 1, 0]);

    let (status, json) = get(app.router(), "/api/events").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json[0]["msg"],
        "Toggled 'Relay 2' (relay 2), new state is on"
    );
}

#[tokio::test]
async fn events_are_listed_newest_first() {
    let app = test_app();
    post(app.router(), "/api/relays/1/toggle").await;
    post(app.router(), "/api/relays/1/toggle").await;
    let (_, json) = get(app.router(), "/api/events").await;
    let events = json.as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["msg"], "Toggled 'Relay 1' (relay 1), new state is off");
    assert_eq!(events[1]["msg"], "Toggled 'Relay 1' (relay 1), new state is on");
}

#[tokio::test]
async fn toggle_rejects_out_of_range_relay() {
    let app = test_app();
    for uri in ["/api/relays/0/toggle", "/api/relays/4/toggle"] {
        let (status, json) = post(app.router(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(json["error"].as_str().unwrap().contains("invalid relay"));
    }
}

#[tokio::test]
async fn toggle_rejects_non_numeric_relay() {
    let app = test_app();
    let (status, _) = post(app.router(), "/api/relays/pump/toggle").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn on_and_off_set_state_unconditionally() {
    let app = test_app();
    post(app.router(), "/api/relays/3/on").await;
    let (status, json) = post(app.router(), "/api/relays/3/on").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(relay_states(&json), vec![0, 0, 1]);

    let (_, json) = post(app.router(), "/api/relays/3/off").await;
    assert_eq!(relay_states(&json), vec![0, 0, 0]);

    let (_, json) = get(app.router(), "/api/events").await;
    assert_eq!(
        json[0]["msg"],
        "Switching 'Relay 3' (relay 3) off, cause: manual action"
    );
}

#[tokio::test]
async fn unavailable_hardware_maps_to_503() {
    let app = test_app();
    app.backend.set_unavailable(true);
    let (status, json) = get(app.router(), "/api/relays").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(json["error"].as_str().unwrap().contains("hardware unavailable"));
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[tokio::test]
async fn relay_name_is_persisted_and_shown() {
    let app = test_app();
    let (status, json) = post_json(
        app.router(),
        "/api/config/relay/1/name",
        serde_json::json!({ "relayName": "Pool pump" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["relayStates"][0]["name"], "Pool pump");
    assert_eq!(
        app.store.get().unwrap().relay_names.get(&1).map(String::as_str),
        Some("Pool pump")
    );

    post(app.router(), "/api/relays/1/toggle").await;
    let (_, json) = get(app.router(), "/api/events").await;
    assert_eq!(
        json[0]["msg"],
        "Toggled 'Pool pump' (relay 1), new state is on"
    );
}

#[tokio::test]
async fn relay_name_rejects_invalid_relay() {
    let app = test_app();
    let (status, _) = post_json(
        app.router(),
        "/api/config/relay/7/name",
        serde_json::json!({ "relayName": "Nope" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.store.get().unwrap().relay_names.is_empty());
}

#[tokio::test]
async fn create_schedule_assigns_id_persists_and_arms() {
    let app = test_app();
    let (status, json) = post_json(
        app.router(),
        "/api/config/schedules",
        serde_json::json!({ "relay": 2, "expression": "0 7 * * *", "action": "on" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = json["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());

    let stored = app.store.get().unwrap();
    assert_eq!(stored.schedules.len(), 1);
    assert_eq!(stored.schedules[0].id, id);
    assert_eq!(app.state.controller.armed_expressions(), vec!["0 7 * * *"]);

    let (status, json) = get(app.router(), "/api/config/schedules").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["id"], id.as_str());
}

#[tokio::test]
async fn replace_schedule_keeps_id() {
    let app = test_app();
    let (_, created) = post_json(
        app.router(),
        "/api/config/schedules",
        serde_json::json!({ "relay": 1, "expression": "0 7 * * *", "action": "on" }),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let (status, json) = post_json(
        app.router(),
        "/api/config/schedules",
        serde_json::json!({ "id": id, "relay": 1, "expression": "0 8 * * *", "action": "off" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["id"], id);

    let stored = app.store.get().unwrap();
    assert_eq!(stored.schedules.len(), 1);
    assert_eq!(stored.schedules[0].expression, "0 8 * * *");
    assert_eq!(app.state.controller.armed_expressions(), vec!["0 8 * * *"]);
}

#[tokio::test]
async fn replace_unknown_schedule_is_404() {
    let app = test_app();
    let (status, _) = post_json(
        app.router(),
        "/api/config/schedules",
        serde_json::json!({ "id": "nope", "relay": 1, "expression": "0 8 * * *", "action": "off" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_expression_is_rejected_and_not_persisted() {
    let app = test_app();
    post_json(
        app.router(),
        "/api/config/schedules",
        serde_json::json!({ "relay": 1, "expression": "0 7 * * *", "action": "on" }),
    )
    .await;

    let (status, json) = post_json(
        app.router(),
        "/api/config/schedules",
        serde_json::json!({ "relay": 1, "expression": "every morning", "action": "on" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["error"].as_str().unwrap().contains("every morning"));
    assert_eq!(app.store.get().unwrap().schedules.len(), 1);

    let on_disk = std::fs::read_to_string(app.dir.path().join("config.json")).unwrap();
    let parsed: relay_core::Config = serde_json::from_str(&on_disk).unwrap();
    assert_eq!(parsed.schedules.len(), 1);

    // The previously armed schedule keeps running.
    assert_eq!(app.state.controller.armed_expressions(), vec!["0 7 * * *"]);
    assert!(app.state.controller.schedules_running());
}

#[tokio::test]
async fn delete_schedule_disarms_and_persists() {
    let app = test_app();
    let (_, created) = post_json(
        app.router(),
        "/api/config/schedules",
        serde_json::json!({ "relay": 3, "expression": "30 18 * * 0", "action": "off" }),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();

    let uri = format!("/api/config/schedules/{id}");
    let (status, json) = send(app.router(), "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], id.as_str());
    assert!(app.store.get().unwrap().schedules.is_empty());
    assert!(app.state.controller.armed_expressions().is_empty());

    let (status, _) = send(app.router(), "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_config_returns_names_and_schedules() {
    let app = test_app();
    post_json(
        app.router(),
        "/api/config/relay/2/name",
        serde_json::json!({ "relayName": "Heater" }),
    )
    .await;
    let (status, json) = get(app.router(), "/api/config").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["relayNames"]["2"], "Heater");
    assert!(json["schedules"].as_array().unwrap().is_empty());
}
