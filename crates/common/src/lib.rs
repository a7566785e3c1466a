/// CLUES Orchestrator Power Manager - 公共库
/// 
/// 提供电源管理器与各外部接口共享的类型、错误处理、工具函数等

pub mod errors;
pub mod models;
pub mod utils;

// 重新导出常用类型
pub use errors::{Error, Result};
pub use models::{
    DeploymentStatus, MonitoringNode, MonitoringSnapshot, NodeState, PowerOperation, Resource,
    ResourceState, Task,
};
