/// 应用全局状态

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::services::PowerManager;

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    /// 电源管理器，生命周期与 API 请求共用，同一时刻只有一方持有
    pub manager: Arc<Mutex<PowerManager>>,
}

impl AppState {
    pub fn new(manager: PowerManager) -> Self {
        Self {
            manager: Arc::new(Mutex::new(manager)),
        }
    }

    /// 获取电源管理器（克隆）
    pub fn manager(&self) -> Arc<Mutex<PowerManager>> {
        self.manager.clone()
    }
}
