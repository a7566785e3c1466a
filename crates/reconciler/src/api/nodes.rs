/// 节点电源接口

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use common::Error;

use super::{api_error, ApiError, ApiResponse};
use crate::app_state::AppState;

/// 节点路由
pub fn node_routes() -> Router<AppState> {
    Router::new()
        .route("/:name/power_on", post(power_on))
        .route("/:name/power_off", post(power_off))
}

/// 请求开启节点
pub async fn power_on(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    let manager = state.manager();
    let mut manager = manager.lock().await;

    match manager.power_on(&name).await {
        Ok(()) => Ok(Json(ApiResponse {
            success: true,
            message: format!("节点 {} 开机请求已接受", name),
        })),
        Err(e @ Error::CapacityReached { .. }) => Err(api_error(
            StatusCode::CONFLICT,
            format!("开启节点失败: {}", e),
        )),
        Err(e) => Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("开启节点失败: {}", e),
        )),
    }
}

/// 请求关闭节点
pub async fn power_off(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    let manager = state.manager();
    let mut manager = manager.lock().await;

    match manager.power_off(&name).await {
        Ok(()) => Ok(Json(ApiResponse {
            success: true,
            message: format!("节点 {} 关机请求已接受", name),
        })),
        Err(e @ Error::NotFound(_)) => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("关闭节点失败: {}", e),
        )),
        Err(e) => Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("关闭节点失败: {}", e),
        )),
    }
}
