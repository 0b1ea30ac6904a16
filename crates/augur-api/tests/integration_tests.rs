//! Integration tests for the HTTP surface.
//!
//! Each test builds its own router over fresh in-memory state and drives
//! it with `oneshot`.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use augur_api::handlers::HealthResponse;
use augur_api::{create_router, AppState};
use augur_chat::{ChatError, EchoNarrator, NarrationRequest, NarrationStream, Narrator};
use augur_core::config::AugurConfig;

// =============================================================================
// Helpers
// =============================================================================

fn make_state() -> AppState {
    AppState::new(AugurConfig::default(), Arc::new(EchoNarrator::new(32)))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), 4 * 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(resp: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

/// Parse an SSE body into `(event, data)` pairs.
fn sse_events(raw: &[u8]) -> Vec<(String, Value)> {
    let text = String::from_utf8_lossy(raw);
    text.split("\n\n")
        .filter_map(|block| {
            let mut event = None;
            let mut data = None;
            for line in block.lines() {
                if let Some(v) = line.strip_prefix("event:") {
                    event = Some(v.trim().to_string());
                } else if let Some(v) = line.strip_prefix("data:") {
                    data = serde_json::from_str(v.trim()).ok();
                }
            }
            Some((event?, data?))
        })
        .collect()
}

async fn generate(state: &AppState, body: Value) -> Vec<(String, Value)> {
    let resp = create_router(state.clone())
        .oneshot(post_json("/turn", body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    sse_events(&body_bytes(resp).await)
}

fn delta_text(events: &[(String, Value)]) -> String {
    events
        .iter()
        .filter(|(e, _)| e == "delta")
        .filter_map(|(_, d)| d["delta"].as_str())
        .collect()
}

fn mirror(payload: Value) -> Value {
    json!([{"id": "c1", "name": "chart.json", "type": "mirror", "content": payload.to_string()}])
}

fn subject(name: &str) -> Value {
    json!({"name": name, "chart": {"planets": [{"name": "Moon"}]}})
}

// =============================================================================
// Health and sessions
// =============================================================================

#[tokio::test]
async fn test_health() {
    let resp = create_router(make_state()).oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let health: HealthResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.active_sessions, 0);
}

#[tokio::test]
async fn test_sessions_listing_after_turn() {
    let state = make_state();
    generate(
        &state,
        json!({"action": "generate", "input": "hello", "sessionId": "s1"}),
    )
    .await;

    let resp = create_router(state.clone()).oneshot(get("/sessions")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["sessions"][0]["id"], "s1");
    assert_eq!(body["sessions"][0]["turn_count"], 1);
    assert_eq!(body["sessions"][0]["last_mode"], "explanation");
}

// =============================================================================
// POST /turn
// =============================================================================

#[tokio::test]
async fn test_generate_streams_meta_then_deltas() {
    let state = make_state();
    let events = generate(
        &state,
        json!({"action": "generate", "input": "hello there", "sessionId": "s1"}),
    )
    .await;

    assert_eq!(events[0].0, "meta");
    assert_eq!(events[0].1["sessionId"], "s1");
    assert_eq!(events[0].1["intent"], "explanation");
    assert_eq!(events[0].1["provenance"]["plan"], "none");
    assert_eq!(delta_text(&events), "You said: hello there");
    assert!(events.iter().all(|(e, _)| e != "probe"));
}

#[tokio::test]
async fn test_full_reading_feedback_and_export() {
    let state = make_state();
    let contexts = mirror(json!({"person_a": subject("Ada")}));

    let events = generate(
        &state,
        json!({"action": "generate", "input": "read my chart", "sessionId": "s1",
               "options": {"reportContexts": contexts}}),
    )
    .await;
    assert_eq!(events[0].1["provenance"]["source"], "local");
    assert!(delta_text(&events).contains("Ada"));

    let events = generate(
        &state,
        json!({"action": "generate", "input": "it's me", "sessionId": "s1",
               "options": {"reportContexts": contexts}}),
    )
    .await;
    assert_eq!(events[0].1["provenance"]["plan"], "solo_auto");
    let (_, probe) = events.iter().find(|(e, _)| e == "probe").expect("probe event");
    let probe_id = probe["probe"]["id"].as_str().unwrap().to_string();

    let resp = create_router(state.clone())
        .oneshot(post_json(
            "/turn",
            json!({"action": "feedback", "sessionId": "s1",
                   "options": {"probeId": probe_id, "tag": "ABE"}}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["scores"]["edgeCapture"], 1.0);
    assert_eq!(body["probe"]["tag"], "ABE");

    let resp = create_router(state.clone())
        .oneshot(post_json(
            "/turn",
            json!({"action": "feedback", "sessionId": "s1",
                   "options": {"probeId": probe_id, "tag": "WB"}}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(resp).await["error"], "conflict");

    let resp = create_router(state.clone())
        .oneshot(post_json("/turn", json!({"action": "export", "sessionId": "s1"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["sessionId"], "s1");
    assert_eq!(body["log"].as_array().unwrap().len(), 4);
    assert_eq!(body["scores"]["counts"]["ABE"], 1);
}

#[tokio::test]
async fn test_close_then_export_is_not_found() {
    let state = make_state();
    generate(
        &state,
        json!({"action": "generate", "input": "hello", "sessionId": "s1"}),
    )
    .await;

    let resp = create_router(state.clone())
        .oneshot(post_json("/turn", json!({"action": "close", "sessionId": "s1"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["closed"], true);

    let resp = create_router(state.clone())
        .oneshot(post_json("/turn", json!({"action": "export", "sessionId": "s1"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_actions_without_session_are_not_found() {
    for action in ["export", "close", "feedback"] {
        let resp = create_router(make_state())
            .oneshot(post_json("/turn", json!({"action": action})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "action {}", action);
        assert_eq!(body_json(resp).await["error"], "not_found");
    }
}

#[tokio::test]
async fn test_empty_input_is_bad_request() {
    let resp = create_router(make_state())
        .oneshot(post_json("/turn", json!({"action": "generate", "input": "  "})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_action_is_bad_request() {
    let resp = create_router(make_state())
        .oneshot(post_json("/turn", json!({"action": "dance", "input": "hi"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert!(body["message"].as_str().unwrap().contains("Invalid turn request"));
}

#[tokio::test]
async fn test_malformed_json_gets_error_body() {
    for uri in ["/turn", "/validate"] {
        let req = Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from("{\"action\": \"generate\", "))
            .unwrap();
        let resp = create_router(make_state()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", uri);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "bad_request");
        assert!(body["message"].as_str().unwrap().starts_with("Invalid JSON body"));
    }
}

#[tokio::test]
async fn test_missing_content_type_gets_error_body() {
    let req = Request::post("/turn")
        .body(Body::from(json!({"action": "generate", "input": "hi"}).to_string()))
        .unwrap();
    let resp = create_router(make_state()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"], "bad_request");
}

#[tokio::test]
async fn test_disabled_is_service_unavailable() {
    let mut config = AugurConfig::default();
    config.session.enabled = false;
    let state = AppState::new(config, Arc::new(EchoNarrator::new(8)));
    let resp = create_router(state)
        .oneshot(post_json("/turn", json!({"action": "generate", "input": "hi"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

struct BrokenNarrator;

#[async_trait]
impl Narrator for BrokenNarrator {
    fn name(&self) -> &str {
        "broken"
    }

    async fn narrate(&self, _request: NarrationRequest) -> Result<NarrationStream, ChatError> {
        Err(ChatError::NarratorError("connection reset".into()))
    }
}

#[tokio::test]
async fn test_narrator_failure_streams_fallback_and_memoises() {
    let state = AppState::new(AugurConfig::default(), Arc::new(BrokenNarrator));
    let contexts = mirror(json!({"person_a": subject("Ada")}));
    let turn = |input: &str| {
        json!({"action": "generate", "input": input, "sessionId": "s1",
               "options": {"reportContexts": contexts}})
    };

    generate(&state, turn("read my chart")).await;
    let events = generate(&state, turn("yes")).await;
    assert_eq!(events[0].1["provenance"]["plan"], "solo_auto");
    assert!(delta_text(&events).contains("retry"));

    let events = generate(&state, turn("so what now")).await;
    assert_eq!(events[0].1["provenance"]["plan"], "none");
}

// =============================================================================
// POST /validate
// =============================================================================

#[tokio::test]
async fn test_validate_relational_downgrade() {
    let resp = create_router(make_state())
        .oneshot(post_json(
            "/validate",
            json!({"report_type": "relational", "personA": {"name": "A"}, "personB": {"name": "B"}}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["valid"], true);
    assert_eq!(body["explicitDowngradeMode"], "generic_symbolic");
    assert_eq!(body["forceGenericSymbolicRead"], true);
    assert_eq!(body["infos"][0]["code"], "RELATIONAL_GENERIC_SYMBOLIC_DOWNGRADE");
}

#[tokio::test]
async fn test_validate_window_too_large() {
    let resp = create_router(make_state())
        .oneshot(post_json(
            "/validate",
            json!({"person_a": {"name": "A"}, "window": {"start": "2025-01-01", "end": "2025-02-15"}}),
        ))
        .await
        .unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["valid"], false);
    assert_eq!(body["errors"][0]["code"], "WINDOW_TOO_LARGE");
}
