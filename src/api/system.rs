use axum::{Json, extract::State};
use std::sync::Arc;

use super::{ApiResponse, AppState, StatusResponse};

/// GET /system/status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<StatusResponse>> {
    let database_ok = state.store().ping().await.is_ok();

    Json(ApiResponse::success(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        database_ok,
        remote_store_configured: state.shared.config.remote_store.is_configured(),
        local_dev: state.shared.config.general.local_dev,
    }))
}
