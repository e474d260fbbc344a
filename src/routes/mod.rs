//! Router assembly: HTTP endpoints, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod extract;
pub mod http;

/// Build the application router with:
/// - REST-ish API under `/api/v1/...`
/// - CORS (allow any origin/method/headers); the web client is served elsewhere
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/lessons", get(http::http_get_lessons))
        .route("/api/v1/lessons/start", post(http::http_post_start_lesson))
        .route("/api/v1/lessons/complete", post(http::http_post_complete_lesson))
        .route("/api/v1/profile", get(http::http_get_profile).post(http::http_post_profile))
        .route("/api/v1/league/join", post(http::http_post_join_league))
        .route("/api/v1/league/standings", get(http::http_get_standings))
        .route("/api/v1/league/close-month", post(http::http_post_close_month))
        .route("/api/v1/xp/recent", get(http::http_get_recent_xp))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::ServiceConfig;
    use crate::store::MemoryStore;

    async fn app() -> Router {
        let state = AppState::with_store(Arc::new(MemoryStore::new()), ServiceConfig::default())
            .await
            .expect("state");
        build_router(Arc::new(state))
    }

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.expect("response");
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).expect("json") };
        (status, value)
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_reports_seeded_catalog() {
        let app = app().await;
        let (status, body) = call(&app, get_req("/api/v1/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["lessons"], 10);
    }

    #[tokio::test]
    async fn complete_flow_over_http() {
        let app = app().await;
        let (status, _) = call(&app, post("/api/v1/profile", json!({ "userId": "u1" }))).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, course) = call(&app, get_req("/api/v1/lessons?userId=u1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(course["lessons"][0]["isCurrent"], true);
        assert_eq!(course["lessons"][1]["isLocked"], true);
        assert_eq!(course["summary"]["total"], 10);

        let (status, out) = call(
            &app,
            post("/api/v1/lessons/complete", json!({ "userId": "u1", "lessonId": "lesson-1.1", "score": 100 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(out["xpAwarded"], 20);
        assert_eq!(out["coinsAwarded"], 10);
        assert_eq!(out["status"], "mastered");
        assert_eq!(out["newStreak"], 1);

        let (_, course) = call(&app, get_req("/api/v1/lessons?userId=u1")).await;
        assert_eq!(course["lessons"][0]["isCompleted"], true);
        assert_eq!(course["lessons"][1]["isLocked"], false);
        assert_eq!(course["lessons"][1]["isCurrent"], true);

        let (_, profile) = call(&app, get_req("/api/v1/profile?userId=u1")).await;
        assert_eq!(profile["xp"], 20);
        assert_eq!(profile["badges"][0], "first_lesson");
    }

    #[tokio::test]
    async fn errors_map_to_status_codes() {
        let app = app().await;
        let (status, body) = call(&app, get_req("/api/v1/lessons?userId=ghost")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("ghost"));

        call(&app, post("/api/v1/profile", json!({ "userId": "u1" }))).await;
        let (status, _) = call(&app, post("/api/v1/profile", json!({ "userId": "u1" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = call(
            &app,
            post("/api/v1/lessons/complete", json!({ "userId": "u1", "lessonId": "lesson-1.2", "score": 90 })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = call(
            &app,
            post("/api/v1/lessons/complete", json!({ "userId": "u1", "lessonId": "lesson-1.1", "score": 250 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn league_join_and_standings() {
        let app = app().await;
        call(&app, post("/api/v1/profile", json!({ "userId": "u1" }))).await;
        let (status, entry) = call(&app, post("/api/v1/league/join", json!({ "userId": "u1" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(entry["monthlyXp"], 0);

        call(
            &app,
            post("/api/v1/lessons/complete", json!({ "userId": "u1", "lessonId": "lesson-1.1", "score": 80 })),
        )
        .await;
        let (_, table) = call(&app, get_req("/api/v1/league/standings")).await;
        assert_eq!(table[0]["rank"], 1);
        assert_eq!(table[0]["userId"], "u1");
        assert_eq!(table[0]["monthlyXp"], 10);
    }

    #[tokio::test]
    async fn malformed_requests_get_json_errors() {
        let app = app().await;
        let (status, body) = call(&app, post("/api/v1/profile", json!({ "userId": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid input: profiles: empty user id");

        call(&app, post("/api/v1/profile", json!({ "userId": "u1" }))).await;
        let (status, body) = call(
            &app,
            post("/api/v1/lessons/complete", json!({ "userId": "u1", "lessonId": "lesson-1.1", "score": -5 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("invalid input:"));

        let (status, body) = call(&app, get_req("/api/v1/lessons")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("userId"));
    }

    #[tokio::test]
    async fn recent_xp_and_division_standings() {
        let app = app().await;
        call(&app, post("/api/v1/profile", json!({ "userId": "u1" }))).await;
        call(&app, post("/api/v1/league/join", json!({ "userId": "u1" }))).await;
        call(
            &app,
            post("/api/v1/lessons/complete", json!({ "userId": "u1", "lessonId": "lesson-1.1", "score": 100 })),
        )
        .await;

        let (status, feed) = call(&app, get_req("/api/v1/xp/recent?userId=u1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(feed[0]["source"], "perfect_score");
        assert_eq!(feed[0]["xp"], 20);
        assert_eq!(feed[0]["lessonId"], "lesson-1.1");

        let (_, table) = call(&app, get_req("/api/v1/league/standings?userId=u1")).await;
        assert_eq!(table[0]["division"], "bronze");
        assert_eq!(table[0]["monthlyXp"], 20);
        let (_, gold) = call(&app, get_req("/api/v1/league/standings?division=gold")).await;
        assert_eq!(gold, json!([]));

        let (status, closed) = call(&app, post("/api/v1/league/close-month", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(closed["settlements"], json!([]));
    }
}
