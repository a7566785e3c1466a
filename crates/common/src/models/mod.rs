/// 共享数据模型
///
/// 定义电源管理器、编排器客户端与监控系统之间共享的数据结构

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 电源操作
///
/// 持久化时使用整数编码：0 = 关机，1 = 开机
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PowerOperation {
    PowerOff,
    PowerOn,
}

impl PowerOperation {
    pub fn as_i32(&self) -> i32 {
        match self {
            PowerOperation::PowerOff => 0,
            PowerOperation::PowerOn => 1,
        }
    }
}

impl TryFrom<i32> for PowerOperation {
    type Error = crate::Error;

    fn try_from(value: i32) -> crate::Result<Self> {
        match value {
            0 => Ok(PowerOperation::PowerOff),
            1 => Ok(PowerOperation::PowerOn),
            other => Err(crate::Error::InvalidArgument(format!("未知的电源操作: {}", other))),
        }
    }
}

impl fmt::Display for PowerOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerOperation::PowerOff => write!(f, "Power Off"),
            PowerOperation::PowerOn => write!(f, "Power On"),
        }
    }
}

/// 待处理的电源任务
///
/// 两个任务当且仅当操作与节点名都相同时视为同一任务。
/// 对于没有归属节点的虚拟机，`node_name` 中存放的是编排器分配的 VM ID。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Task {
    pub operation: PowerOperation,
    pub node_name: String,
}

impl Task {
    pub fn new(operation: PowerOperation, node_name: impl Into<String>) -> Self {
        Self {
            operation,
            node_name: node_name.into(),
        }
    }

    pub fn power_on(node_name: impl Into<String>) -> Self {
        Self::new(PowerOperation::PowerOn, node_name)
    }

    pub fn power_off(node_name: impl Into<String>) -> Self {
        Self::new(PowerOperation::PowerOff, node_name)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.operation, self.node_name)
    }
}

/// 监控系统中的节点状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    #[serde(alias = "ON")]
    On,
    #[serde(alias = "IDLE")]
    Idle,
    #[serde(alias = "USED")]
    Used,
    #[serde(alias = "OFF")]
    Off,
    #[serde(rename = "off_err", alias = "OFF_ERR")]
    OffErr,
    #[serde(rename = "on_err", alias = "ON_ERR")]
    OnErr,
    #[serde(alias = "POWON")]
    PowOn,
    #[serde(alias = "POWOFF")]
    PowOff,
    #[serde(other)]
    Unknown,
}

impl NodeState {
    /// 是否属于"故障类"状态（关机、关机出错、未知）
    pub fn is_failure(&self) -> bool {
        matches!(self, NodeState::Off | NodeState::OffErr | NodeState::Unknown)
    }
}

/// 监控系统提供的单个节点信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitoringNode {
    pub name: String,
    pub enabled: bool,
    pub state: NodeState,
    /// 进入当前状态的时间
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp_state: DateTime<Utc>,
}

/// 监控快照（按监控系统给出的顺序）
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MonitoringSnapshot {
    #[serde(alias = "nodelist")]
    pub nodes: Vec<MonitoringNode>,
}

impl MonitoringSnapshot {
    pub fn new(nodes: Vec<MonitoringNode>) -> Self {
        Self { nodes }
    }

    /// 按名称查找节点
    pub fn node(&self, name: &str) -> Option<&MonitoringNode> {
        self.nodes.iter().find(|node| node.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.node(name).is_some()
    }
}

/// 编排器资源状态（TOSCA 节点生命周期）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceState {
    Initial,
    Creating,
    Created,
    Configuring,
    Configured,
    Starting,
    Started,
    Stopping,
    Deleting,
    Error,
    #[serde(other)]
    Unknown,
}

/// 编排器部署中的资源
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub uuid: String,
    pub state: ResourceState,
    /// 格式: 2016-02-04T10:43+0000
    pub creation_time: String,
    pub tosca_node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
}

impl Resource {
    pub fn is_compute(&self) -> bool {
        self.tosca_node_type == constants::COMPUTE_NODE_TYPE
    }
}

/// 部署状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStatus {
    CreateInProgress,
    CreateComplete,
    CreateFailed,
    UpdateInProgress,
    UpdateComplete,
    UpdateFailed,
    DeleteInProgress,
    DeleteComplete,
    DeleteFailed,
    #[serde(other)]
    Unknown,
}

impl DeploymentStatus {
    /// 部署正在进行结构性变更，此时不能提交新的修改
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            DeploymentStatus::CreateInProgress
                | DeploymentStatus::UpdateInProgress
                | DeploymentStatus::DeleteInProgress
        )
    }
}

/// 常量定义
pub mod constants {
    /// 计算节点的 TOSCA 类型
    pub const COMPUTE_NODE_TYPE: &str = "tosca.nodes.indigo.Compute";

    /// 工作节点模板类型前缀
    pub const WORKER_NODE_TYPE_PREFIX: &str = "tosca.nodes.indigo.LRMS.WorkerNode";

    /// 编排器接受的 HTTP 状态码
    pub const ACCEPTED_STATUS_CODES: [u16; 4] = [200, 201, 202, 204];

    /// 默认遗忘窗口（秒）
    pub const DEFAULT_FORGET_MISSING_VMS: i64 = 30;

    /// 默认故障回收窗口（秒）
    pub const DEFAULT_DROP_FAILING_VMS: i64 = 30;

    /// 默认分页大小
    pub const DEFAULT_PAGE_SIZE: u32 = 20;
}
