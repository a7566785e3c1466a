/// 状态持久化
///
/// 提供三类记录的基本读写：已跟踪虚拟机、待处理任务、缓存的访问令牌。
/// 所有写操作返回显式结果，由调用方记录日志后继续执行。

mod db_store;
mod memory;

pub use db_store::DbStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use common::{Result, Task};

/// 持久化的任务记录（操作码尚未校验）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTask {
    pub node_name: String,
    pub operation: i32,
}

/// 状态存储 Trait
#[async_trait]
pub trait StateStore: Send + Sync {
    /// 加载全部已跟踪虚拟机：(节点名, 虚拟机 ID)
    async fn load_vms(&self) -> Result<Vec<(String, String)>>;

    /// 保存（或覆盖）一个节点的虚拟机映射
    async fn insert_vm(&self, node_name: &str, vm_id: &str) -> Result<()>;

    /// 删除一个节点的虚拟机映射
    async fn delete_vm(&self, node_name: &str) -> Result<()>;

    /// 按入队顺序加载全部任务
    async fn load_tasks(&self) -> Result<Vec<StoredTask>>;

    async fn insert_task(&self, task: &Task) -> Result<()>;

    async fn delete_task(&self, task: &Task) -> Result<()>;

    async fn load_token(&self) -> Result<Option<String>>;

    /// 替换缓存的访问令牌
    async fn save_token(&self, token: &str) -> Result<()>;
}
