pub mod nodes;
pub mod status;

use axum::{http::StatusCode, Json, Router};
use serde::Serialize;

use crate::app_state::AppState;

/// 所有 API 路由（统一入口）
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/nodes", nodes::node_routes())
        .merge(status::status_routes())
}

/// 通用响应
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
}

/// 错误响应
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn api_error(status: StatusCode, error: String) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            success: false,
            error,
        }),
    )
}
