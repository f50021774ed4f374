//! The HTTP surface: five device endpoints (API-key gated) plus the
//! unauthenticated dashboard API.
//!
//! Every error response carries a `{"detail": "…"}` body.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use jiff::{SignedDuration, Timestamp, Zoned};
use serde_json::json;

use ink_codec::TileFormat;
use ink_registry::DeviceRecord;
use ink_schedule::ScheduleStatus;
use ink_store::SnapshotError;
use ink_types::Mode;

use crate::App;

pub fn router(app: Arc<App>) -> Router {
    Router::new()
        .route("/get_hash", get(get_hash))
        .route("/get_image", get(get_image))
        .route("/get_sleep", get(get_sleep))
        .route("/post_log", post(post_log))
        .route("/post_metrics", post(post_metrics))
        .route("/api/config", get(api_config))
        .route("/api/clients", get(api_clients))
        .route("/api/preview/{page_id}", get(api_preview))
        .route("/api/page_status", get(api_page_status))
        .route("/api/update_page", post(api_update_page))
        .route("/api/toggle_sleep", post(api_toggle_sleep))
        .with_state(app)
}

// ----------------------------------------------------------------------------

pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "invalid api key")
    }

    fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }

    /// Tile-read failures: zero-size crops are the client's mistake, the
    /// rest surface as 500 (bitmap missing, crop out of the image).
    fn from_snapshot(err: SnapshotError) -> Self {
        match &err {
            SnapshotError::EmptyCrop { .. } => Self::bad_request(err.to_string()),
            _ => Self::internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

// ----------------------------------------------------------------------------
// Device endpoints

#[derive(serde::Deserialize)]
struct HashParams {
    api_key: String,
    device: String,
    mode: String,
}

async fn get_hash(
    State(app): State<Arc<App>>,
    params: Result<Query<HashParams>, QueryRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Query(params) = params?;
    if !app.check_api_key(&params.api_key) {
        return Err(ApiError::unauthorized());
    }

    app.registry.touch(&params.device, Timestamp::now(), |record| {
        record.mode = Some(params.mode.clone());
    });

    let mode: Mode = params
        .mode
        .parse()
        .map_err(|_| ApiError::not_found(format!("unsupported mode: {}", params.mode)))?;
    if !app.config.is_supported_mode(mode) {
        return Err(ApiError::not_found(format!(
            "unsupported mode: {}",
            params.mode
        )));
    }

    let (page_id, _) = app
        .config
        .page_for_device(&params.device)
        .ok_or_else(|| ApiError::not_found("no page configured for device"))?;

    let hash = app
        .store
        .hash(page_id, mode)
        .ok_or_else(|| ApiError::not_found("image not available yet"))?;

    Ok(Json(json!({ "hash": hash })))
}

#[derive(serde::Deserialize)]
struct ImageParams {
    api_key: String,
    device: String,
    mode: String,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    #[serde(default = "default_image_format")]
    format: String,
}

fn default_image_format() -> String {
    "png".to_owned()
}

async fn get_image(
    State(app): State<Arc<App>>,
    params: Result<Query<ImageParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params?;
    if !app.check_api_key(&params.api_key) {
        return Err(ApiError::unauthorized());
    }

    app.registry.touch(&params.device, Timestamp::now(), |record| {
        record.mode = Some(params.mode.clone());
    });

    let (page_id, _) = app
        .config
        .page_for_device(&params.device)
        .ok_or_else(|| ApiError::internal("no page configured for device"))?;

    let mode: Mode = params
        .mode
        .parse()
        .map_err(|_| ApiError::internal(format!("unsupported mode: {}", params.mode)))?;
    let format: TileFormat = params
        .format
        .parse()
        .map_err(|_| ApiError::internal(format!("unsupported format: {}", params.format)))?;

    let bytes = app
        .store
        .crop(page_id, mode, params.x, params.y, params.w, params.h, format)
        .map_err(ApiError::from_snapshot)?;

    Ok(([(header::CONTENT_TYPE, format.media_type())], bytes).into_response())
}

#[derive(serde::Deserialize)]
struct DeviceParams {
    api_key: String,
    device: String,
}

async fn get_sleep(
    State(app): State<Arc<App>>,
    params: Result<Query<DeviceParams>, QueryRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Query(params) = params?;
    if !app.check_api_key(&params.api_key) {
        return Err(ApiError::unauthorized());
    }

    let now = Zoned::now();
    app.registry.touch(&params.device, now.timestamp(), |_| {});

    let sleep_disabled = app.registry.sleep_disabled(&params.device);
    let page = app
        .config
        .page_for_device(&params.device)
        .map(|(_, page)| page);
    let seconds = ink_schedule::sleep_seconds(page, sleep_disabled, now.time());

    if seconds > 0 {
        app.registry.set_next_refresh(
            &params.device,
            now.timestamp()
                .saturating_add(SignedDuration::from_secs(seconds))
                .unwrap(),
        );
    }

    Ok(Json(json!({ "sleep_seconds": seconds })))
}

async fn post_log(
    State(app): State<Arc<App>>,
    params: Result<Query<DeviceParams>, QueryRejection>,
    body: String,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Query(params) = params?;
    if !app.check_api_key(&params.api_key) {
        return Err(ApiError::unauthorized());
    }

    ink_log::info!("device log [{}]: {}", params.device, body.trim_end());
    app.registry.touch(&params.device, Timestamp::now(), move |record| {
        record.last_log = Some(body);
    });

    Ok(Json(json!({ "status": "ok" })))
}

async fn post_metrics(
    State(app): State<Arc<App>>,
    params: Result<Query<DeviceParams>, QueryRejection>,
    body: String,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Query(params) = params?;
    if !app.check_api_key(&params.api_key) {
        return Err(ApiError::unauthorized());
    }

    let metrics: serde_json::Value = serde_json::from_str(&body)
        .map_err(|_| ApiError::bad_request("invalid metrics format"))?;

    ink_log::info!("device metrics [{}]: {metrics}", params.device);
    app.registry.touch(&params.device, Timestamp::now(), move |record| {
        record.metrics = Some(metrics);
    });

    Ok(Json(json!({ "status": "ok" })))
}

// ----------------------------------------------------------------------------
// Dashboard API (trusted network, no auth)

async fn api_config(State(app): State<Arc<App>>) -> Json<serde_json::Value> {
    Json(json!({
        "pages": app.config.pages,
        "devices": app.config.devices,
        "supported_modes": app.config.supported_modes,
    }))
}

async fn api_clients(State(app): State<Arc<App>>) -> Json<BTreeMap<String, DeviceRecord>> {
    Json(app.registry.snapshot())
}

#[derive(serde::Deserialize)]
struct PreviewParams {
    mode: String,
}

async fn api_preview(
    State(app): State<Arc<App>>,
    Path(page_id): Path<String>,
    params: Result<Query<PreviewParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params?;
    let mode: Mode = params
        .mode
        .parse()
        .map_err(|_| ApiError::not_found("image not found"))?;

    let png = app
        .store
        .full_png(&page_id, mode)
        .map_err(|_| ApiError::not_found("image not found"))?;

    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

async fn api_page_status(State(app): State<Arc<App>>) -> Json<ScheduleStatus> {
    Json(app.scheduler.lock().status(Timestamp::now()))
}

#[derive(serde::Deserialize)]
struct UpdatePageBody {
    page_id: String,
}

async fn api_update_page(
    State(app): State<Arc<App>>,
    body: Result<Json<UpdatePageBody>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(body) = body?;
    if !app.config.pages.contains_key(&body.page_id) {
        return Err(ApiError::not_found("page not found"));
    }

    app.request_render(&body.page_id);

    Ok(Json(json!({
        "status": "ok",
        "message": format!("update triggered for {}", body.page_id),
    })))
}

#[derive(serde::Deserialize)]
struct ToggleSleepBody {
    device: String,
    #[serde(default)]
    disable: bool,
}

async fn api_toggle_sleep(
    State(app): State<Arc<App>>,
    body: Result<Json<ToggleSleepBody>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(body) = body?;
    app.registry.set_sleep_disabled(&body.device, body.disable);
    Ok(Json(json!({ "status": "ok" })))
}

// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_error_status_mapping() {
        let empty = ApiError::from_snapshot(SnapshotError::EmptyCrop { w: 0, h: 10 });
        assert_eq!(empty.status, StatusCode::BAD_REQUEST);

        let oob = ApiError::from_snapshot(SnapshotError::OutOfBounds {
            width: 800,
            height: 480,
        });
        assert_eq!(oob.status, StatusCode::INTERNAL_SERVER_ERROR);

        let missing = ApiError::from_snapshot(SnapshotError::Missing {
            page: "p".to_owned(),
            mode: "800x480x1xB".parse().unwrap(),
        });
        assert_eq!(missing.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(missing.detail.contains("image not available"));
    }
}
