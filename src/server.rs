// src/server.rs

//! Read-only HTTP API over the catalog service.
//!
//! | Route                                  | Result                         |
//! |----------------------------------------|--------------------------------|
//! | `GET /get/info`                        | `{}`                           |
//! | `GET /get/namespaces`                  | namespace names                |
//! | `GET /get/latest/namespace/:name`      | entries of one namespace       |
//! | `GET /get/latest/function/:id`         | one entry                      |
//! | `GET /get/latest/diff`                 | newest raw record              |
//! | `GET /get/function/:id/diffs/*date`    | entry history, `y/m/d/y/m/d`   |
//! | `GET /search/:query`                   | matches grouped by namespace   |
//!
//! Queries without data answer 404; malformed date ranges answer 400.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::error::{AppError, Result};
use crate::models::{DateRange, EntryView, Patch};
use crate::services::{CatalogService, HistoryItem};

#[derive(Clone)]
pub struct AppState {
    service: Arc<CatalogService>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: "not found".into(),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(error: AppError) -> Self {
        let status = match &error {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            log::error!("Request failed: {error}");
        }
        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// One history item as returned to clients.
#[derive(Debug, Serialize)]
struct HistoryView {
    date: DateTime<Utc>,
    #[serde(flatten)]
    entry: EntryView,
    #[serde(skip_serializing_if = "Option::is_none")]
    patch: Option<Patch>,
}

impl From<HistoryItem> for HistoryView {
    fn from(item: HistoryItem) -> Self {
        Self {
            date: item.captured_at,
            entry: EntryView::from(&item.entry),
            patch: item.patch,
        }
    }
}

/// Build the API router.
pub fn router(service: Arc<CatalogService>) -> Router {
    Router::new()
        .route("/get/info", get(info))
        .route("/get/namespaces", get(namespaces))
        .route("/get/latest/namespace/:name", get(namespace))
        .route("/get/latest/function/:id", get(function))
        .route("/get/latest/diff", get(latest_diff))
        .route("/get/function/:id/diffs/*date", get(function_history))
        .route("/search/:query", get(search))
        .with_state(AppState { service })
}

/// Serve the API until `shutdown` turns true.
pub async fn serve(
    listener: TcpListener,
    service: Arc<CatalogService>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    log::info!("Read API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(service))
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await?;
    Ok(())
}

async fn info() -> Json<serde_json::Value> {
    Json(serde_json::json!({}))
}

async fn namespaces(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    state
        .service
        .list_namespaces()
        .map(Json)
        .ok_or_else(ApiError::not_found)
}

async fn namespace(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<BTreeMap<String, EntryView>> {
    let entries = state
        .service
        .get_namespace(&name)
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(
        entries
            .iter()
            .map(|(id, entry)| (id.clone(), EntryView::from(entry)))
            .collect(),
    ))
}

async fn function(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<EntryView> {
    let entry = state.service.get_entry(&id).ok_or_else(ApiError::not_found)?;
    Ok(Json(EntryView::from(&entry)))
}

async fn latest_diff(State(state): State<AppState>) -> std::result::Result<Response, ApiError> {
    let content = state
        .service
        .latest_raw()
        .await?
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(content.as_ref()).into_response())
}

async fn function_history(
    State(state): State<AppState>,
    Path((id, date)): Path<(String, String)>,
) -> ApiResult<Vec<HistoryView>> {
    let range = DateRange::parse_segments(&date)?;
    let items = state
        .service
        .entry_history(&id, range)
        .await?
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(items.into_iter().map(HistoryView::from).collect()))
}

async fn search(
    State(state): State<AppState>,
    Path(query): Path<String>,
) -> ApiResult<IndexMap<String, BTreeMap<String, EntryView>>> {
    let results = state.service.search(&query).ok_or_else(ApiError::not_found)?;
    Ok(Json(
        results
            .into_iter()
            .map(|(namespace, entries)| {
                let views = entries
                    .iter()
                    .map(|(id, entry)| (id.clone(), EntryView::from(entry)))
                    .collect();
                (namespace, views)
            })
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{ScriptedSource, scripted_service};
    use axum::body::Body;
    use axum::http::Request;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn app(tmp: &TempDir) -> Router {
        let source = Arc::new(ScriptedSource::new());
        source.put("PLAYER", "P1", "GetX", &["first", "second"]);
        source.put("PLAYER", "P2", "GetPlayerPed", &[]);
        source.put("AUDIO", "A1", "PlaySound", &[]);

        let service = scripted_service(&source, tmp.path(), &["PLAYER", "AUDIO"]);
        service.init().await.unwrap();
        router(Arc::new(service))
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or_default())
    }

    fn day_path(date: chrono::NaiveDate) -> String {
        date.format("%Y/%m/%d").to_string()
    }

    #[tokio::test]
    async fn test_info_and_namespaces() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp).await;

        let (status, body) = get(&app, "/get/info").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({}));

        let (status, body) = get(&app, "/get/namespaces").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!(["PLAYER", "AUDIO"]));
    }

    #[tokio::test]
    async fn test_function_renders_description_text() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp).await;

        let (status, body) = get(&app, "/get/latest/function/p1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "GetX");
        assert_eq!(body["returnType"], "void");
        assert_eq!(body["hash"], "HP1");
        assert_eq!(body["description"], "first\nsecond");
        assert_eq!(body["params"]["0"]["type"], "Player");

        let (status, _) = get(&app, "/get/latest/function/NOPE").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_namespace_is_upper_cased() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp).await;

        let (status, body) = get(&app, "/get/latest/namespace/player").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_object().unwrap().len(), 2);

        let (status, _) = get(&app, "/get/latest/namespace/VEHICLE").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_latest_diff_is_raw_record() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp).await;

        let (status, body) = get(&app, "/get/latest/diff").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["V"], "1.0");
        assert_eq!(body["PLAYER"]["P1"]["description"]["add"]["1"], "second");
    }

    #[tokio::test]
    async fn test_history_date_handling() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp).await;
        let today = Utc::now().date_naive();
        let yesterday = today.pred_opt().unwrap();
        let tomorrow = today.succ_opt().unwrap();

        let uri = format!(
            "/get/function/P1/diffs/{}/{}",
            day_path(yesterday),
            day_path(tomorrow)
        );
        let (status, body) = get(&app, &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["name"], "GetX");
        assert!(body[0]["date"].is_string());

        let (status, _) = get(&app, "/get/function/P1/diffs/2017/1/1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get(&app, "/get/function/P1/diffs/2017/13/1/2017/1/2").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get(&app, "/get/function/P1/diffs/2017/x/1/2017/1/2").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let uri = format!(
            "/get/function/P1/diffs/{}/{}",
            day_path(tomorrow),
            day_path(yesterday)
        );
        let (status, _) = get(&app, &uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_search() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp).await;

        let (status, body) = get(&app, "/search/getp").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["PLAYER"]["P2"]["name"], "GetPlayerPed");
        assert!(body["PLAYER"].get("P1").is_none());

        let (status, _) = get(&app, "/search/g").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_empty_service_answers_not_found() {
        let tmp = TempDir::new().unwrap();
        let source = Arc::new(ScriptedSource::new());
        let service = scripted_service(&source, tmp.path(), &["PLAYER"]);
        let app = router(Arc::new(service));

        for uri in ["/get/namespaces", "/get/latest/diff", "/get/latest/function/P1"] {
            let (status, _) = get(&app, uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        }
    }
}
