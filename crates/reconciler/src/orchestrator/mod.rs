/// 编排器接口
///
/// 电源管理器只通过 `Orchestrator` Trait 与编排器交互：查询部署资源、部署状态，
/// 以及提交一次结构性变更（增加或删除工作节点）

mod client;
pub mod template;

pub use client::OrchestratorClient;

use async_trait::async_trait;
use common::{DeploymentStatus, Resource, Result};

/// 一次伸缩请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaleChange {
    /// 新增节点（写入 dns_name）
    Add(Vec<String>),
    /// 删除指定虚拟机（写入 removal_list）
    Remove(Vec<String>),
}

/// 编排器 Trait
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// 部署中全部计算类型资源（已合并分页）
    async fn list_compute_resources(&self) -> Result<Vec<Resource>>;

    /// 部署当前状态
    async fn deployment_status(&self) -> Result<DeploymentStatus>;

    /// 以当前节点数 `current_count` 为基准提交伸缩请求
    async fn apply_scale(&self, current_count: usize, change: &ScaleChange) -> Result<()>;
}
