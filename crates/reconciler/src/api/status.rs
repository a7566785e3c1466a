/// 跟踪状态查询接口

use axum::{extract::State, routing::get, Json, Router};
use common::Task;

use crate::app_state::AppState;
use crate::services::TrackedVm;

pub fn status_routes() -> Router<AppState> {
    Router::new()
        .route("/vms", get(list_vms))
        .route("/tasks", get(list_tasks))
}

/// 已跟踪的虚拟机
pub async fn list_vms(State(state): State<AppState>) -> Json<Vec<TrackedVm>> {
    let manager = state.manager();
    let manager = manager.lock().await;
    Json(manager.tracked_vms())
}

/// 待处理任务（按处理顺序）
pub async fn list_tasks(State(state): State<AppState>) -> Json<Vec<Task>> {
    let manager = state.manager();
    let manager = manager.lock().await;
    Json(manager.pending_tasks())
}
