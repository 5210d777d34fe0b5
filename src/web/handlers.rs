//! HTTP request handlers.
//!
//! Every failure surfaces as a structured JSON body with an
//! explanatory message; internal errors are logged, never leaked.

use super::AppState;
use crate::alerts::Notification;
use crate::db::{NewTarget, StoreError, TargetPatch};
use crate::metrics::MetricName;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use serde_json::json;

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn store_error_response(err: StoreError) -> Response {
    match err {
        StoreError::Validation(msg) => error_response(StatusCode::BAD_REQUEST, msg),
        StoreError::NotFound => error_response(StatusCode::NOT_FOUND, "target not found"),
        other => {
            tracing::error!(error = %other, "storage backend failure");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "storage backend failure")
        }
    }
}

/// Bodies are parsed by hand so a malformed payload yields the same
/// structured 400 as any other validation failure.
fn parse_body<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, Response> {
    serde_json::from_str(body)
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, "invalid JSON in request body"))
}

fn parse_time_range(
    start: Option<&str>,
    end: Option<&str>,
    default_span: ChronoDuration,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let end = end
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    let start = start
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| end - default_span);
    (start, end)
}

// ============================================================================
// API: Targets
// ============================================================================

pub async fn handle_list_targets(State(state): State<AppState>) -> Response {
    match state.store.list_targets() {
        Ok(targets) => {
            Json(json!({ "count": targets.len(), "targets": targets })).into_response()
        }
        Err(e) => store_error_response(e),
    }
}

pub async fn handle_create_target(State(state): State<AppState>, body: String) -> Response {
    let req: NewTarget = match parse_body(&body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match state.store.create_target(req) {
        Ok(target) => (
            StatusCode::CREATED,
            Json(json!({ "message": "target created", "target": target })),
        )
            .into_response(),
        Err(e) => store_error_response(e),
    }
}

pub async fn handle_get_target(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.store.get_target(&id) {
        Ok(target) => Json(json!({ "target": target })).into_response(),
        Err(e) => store_error_response(e),
    }
}

pub async fn handle_update_target(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: String,
) -> Response {
    let patch: TargetPatch = match parse_body(&body) {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    match state.store.update_target(&id, patch) {
        Ok(target) => {
            Json(json!({ "message": "target updated", "target": target })).into_response()
        }
        Err(e) => store_error_response(e),
    }
}

pub async fn handle_delete_target(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.store.delete_target(&id) {
        Ok(()) => Json(json!({ "message": "target deleted" })).into_response(),
        Err(e) => store_error_response(e),
    }
}

// ============================================================================
// API: Alarms
// ============================================================================

/// Inbound alert notifications, in either supported shape. Always
/// answers 200 with the persisted count once the body parses; entry
/// level problems degrade per the recorder's rules.
pub async fn handle_notify(State(state): State<AppState>, body: String) -> Response {
    let notification: Notification = match parse_body(&body) {
        Ok(n) => n,
        Err(resp) => return resp,
    };

    let processed = state.recorder.process(notification);
    Json(json!({ "processed": processed })).into_response()
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    pub limit: Option<i64>,
}

pub async fn handle_alarm_history(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let (start, end) = parse_time_range(
        query.start.as_deref(),
        query.end.as_deref(),
        ChronoDuration::hours(24),
    );

    match state
        .store
        .get_alarm_records(&name, start, end, query.limit.unwrap_or(100))
    {
        Ok(alarms) => Json(json!({ "count": alarms.len(), "alarms": alarms })).into_response(),
        Err(e) => store_error_response(e),
    }
}

// ============================================================================
// API: Metrics
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SamplesQuery {
    pub url: String,
    pub metric: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub limit: Option<i64>,
}

pub async fn handle_get_samples(
    State(state): State<AppState>,
    Query(query): Query<SamplesQuery>,
) -> Response {
    let metric = match MetricName::parse(&query.metric) {
        Some(m) => m,
        None => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("unknown metric {:?}", query.metric),
            )
        }
    };

    let (start, end) = parse_time_range(
        query.start.as_deref(),
        query.end.as_deref(),
        ChronoDuration::hours(1),
    );

    match state.store.get_samples(
        &query.url,
        metric.as_str(),
        start,
        end,
        query.limit.unwrap_or(1000),
    ) {
        Ok(samples) => Json(json!({ "count": samples.len(), "samples": samples })).into_response(),
        Err(e) => store_error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlarmRecorder;
    use crate::db::Store;
    use crate::web::router;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tempfile::NamedTempFile;
    use tower::util::ServiceExt;

    fn test_state() -> (NamedTempFile, AppState) {
        let tmp = NamedTempFile::new().unwrap();
        let store = Arc::new(Store::new(tmp.path()).unwrap());
        let recorder = AlarmRecorder::new(store.clone());
        (tmp, AppState { store, recorder })
    }

    async fn request(
        state: AppState,
        method: &str,
        uri: &str,
        body: Option<&str>,
    ) -> (StatusCode, serde_json::Value) {
        let app = router(state);
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_create_and_list_targets() {
        let (_tmp, state) = test_state();

        let (status, body) = request(
            state.clone(),
            "POST",
            "/api/targets",
            Some(r#"{"url": "https://example.com", "name": "Example"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["target"]["name"], "Example");
        assert!(body["target"]["enabled"].as_bool().unwrap());

        let (status, body) = request(state, "GET", "/api/targets", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
    }

    #[tokio::test]
    async fn test_create_without_url_is_400_with_required_message() {
        let (_tmp, state) = test_state();
        let (status, body) =
            request(state, "POST", "/api/targets", Some(r#"{"name": "X"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let message = body["error"].as_str().unwrap().to_lowercase();
        assert!(message.contains("required"), "got {:?}", message);
    }

    #[tokio::test]
    async fn test_create_with_malformed_url_is_400() {
        let (_tmp, state) = test_state();
        let (status, _) = request(
            state,
            "POST",
            "/api/targets",
            Some(r#"{"url": "not-a-url", "name": "X"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_with_invalid_json_is_400() {
        let (_tmp, state) = test_state();
        let (status, body) =
            request(state, "POST", "/api/targets", Some("{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_get_update_delete_round_trip() {
        let (_tmp, state) = test_state();
        let (_, created) = request(
            state.clone(),
            "POST",
            "/api/targets",
            Some(r#"{"url": "https://example.com"}"#),
        )
        .await;
        let id = created["target"]["id"].as_str().unwrap().to_string();

        let (status, body) =
            request(state.clone(), "GET", &format!("/api/targets/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["target"]["id"], id.as_str());

        let (status, body) = request(
            state.clone(),
            "PUT",
            &format!("/api/targets/{}", id),
            Some(r#"{"name": "Renamed"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["target"]["name"], "Renamed");
        // Partial merge keeps the unsupplied fields.
        assert_eq!(body["target"]["url"], "https://example.com");

        let (status, _) =
            request(state.clone(), "DELETE", &format!("/api/targets/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) =
            request(state.clone(), "DELETE", &format!("/api/targets/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = request(state, "GET", &format!("/api/targets/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_target_is_404_json() {
        let (_tmp, state) = test_state();
        let (status, body) = request(state, "GET", "/api/targets/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_unsupported_method_is_405() {
        let (_tmp, state) = test_state();
        let (status, _) = request(state, "PATCH", "/api/targets", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_notify_and_history() {
        let (_tmp, state) = test_state();
        let (status, body) = request(
            state.clone(),
            "POST",
            "/api/alarms/notify",
            Some(
                r#"{"AlarmName": "HighLatency", "NewStateValue": "ALARM", "NewStateReason": "too slow"}"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["processed"], 1);

        let (status, body) =
            request(state, "GET", "/api/alarms/HighLatency", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["alarms"][0]["state"], "ALARM");
    }

    #[tokio::test]
    async fn test_metrics_query_rejects_unknown_metric() {
        let (_tmp, state) = test_state();
        let (status, _) = request(
            state,
            "GET",
            "/api/metrics?url=https://example.com&metric=Nope",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
