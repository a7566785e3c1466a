/// 内存状态存储
///
/// 用于开发与测试；可切换为"故障"模式以模拟持久化失败

use async_trait::async_trait;
use common::{Error, Result, Task};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{StateStore, StoredTask};

#[derive(Debug, Default)]
struct Inner {
    vms: BTreeMap<String, String>,
    tasks: Vec<StoredTask>,
    token: Option<String>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 打开后所有操作都返回数据库错误
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// 直接写入一条原始任务记录
    pub fn push_raw_task(&self, node_name: &str, operation: i32) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.tasks.push(StoredTask {
                node_name: node_name.to_string(),
                operation,
            });
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> Result<T> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Database("内存存储处于故障模式".to_string()));
        }
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| Error::Internal("内存存储锁已损坏".to_string()))?;
        Ok(f(&mut inner))
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load_vms(&self) -> Result<Vec<(String, String)>> {
        self.with(|inner| {
            inner
                .vms
                .iter()
                .map(|(name, id)| (name.clone(), id.clone()))
                .collect()
        })
    }

    async fn insert_vm(&self, node_name: &str, vm_id: &str) -> Result<()> {
        self.with(|inner| {
            inner.vms.insert(node_name.to_string(), vm_id.to_string());
        })
    }

    async fn delete_vm(&self, node_name: &str) -> Result<()> {
        self.with(|inner| {
            inner.vms.remove(node_name);
        })
    }

    async fn load_tasks(&self) -> Result<Vec<StoredTask>> {
        self.with(|inner| inner.tasks.clone())
    }

    async fn insert_task(&self, task: &Task) -> Result<()> {
        self.with(|inner| {
            inner.tasks.push(StoredTask {
                node_name: task.node_name.clone(),
                operation: task.operation.as_i32(),
            });
        })
    }

    async fn delete_task(&self, task: &Task) -> Result<()> {
        let operation = task.operation.as_i32();
        self.with(|inner| {
            inner
                .tasks
                .retain(|t| !(t.node_name == task.node_name && t.operation == operation));
        })
    }

    async fn load_token(&self) -> Result<Option<String>> {
        self.with(|inner| inner.token.clone())
    }

    async fn save_token(&self, token: &str) -> Result<()> {
        self.with(|inner| {
            inner.token = Some(token.to_string());
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failing_mode() {
        let store = MemoryStore::new();
        store.insert_vm("wn1", "uuid-1").await.unwrap();

        store.set_failing(true);
        assert!(store.insert_vm("wn2", "uuid-2").await.is_err());
        assert!(store.load_vms().await.is_err());

        store.set_failing(false);
        assert_eq!(store.load_vms().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_task_removes_all_copies() {
        let store = MemoryStore::new();
        store.insert_task(&Task::power_off("wn1")).await.unwrap();
        store.insert_task(&Task::power_on("wn1")).await.unwrap();
        store.push_raw_task("wn1", 0);

        store.delete_task(&Task::power_off("wn1")).await.unwrap();
        let tasks = store.load_tasks().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].operation, 1);
    }
}
