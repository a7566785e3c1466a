/// 任务队列
///
/// 按到达顺序保存待处理的电源任务，(操作, 节点) 相同的任务只保留一个

use common::{PowerOperation, Result, Task};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::error;

use crate::store::StateStore;

pub struct TaskBacklog {
    tasks: VecDeque<Task>,
    store: Arc<dyn StateStore>,
}

impl TaskBacklog {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            tasks: VecDeque::new(),
            store,
        }
    }

    /// 从持久化存储重新加载，返回加载的数量
    ///
    /// 操作码无法识别的记录会被丢弃并记录错误
    pub async fn load(&mut self) -> Result<usize> {
        let rows = self.store.load_tasks().await?;

        self.tasks.clear();
        for row in rows {
            match PowerOperation::try_from(row.operation) {
                Ok(operation) => {
                    let task = Task::new(operation, row.node_name);
                    if !self.tasks.contains(&task) {
                        self.tasks.push_back(task);
                    }
                }
                Err(e) => {
                    error!("丢弃无法识别的任务 (节点 {}): {}", row.node_name, e);
                }
            }
        }

        Ok(self.tasks.len())
    }

    /// 入队，重复任务不会再次加入
    ///
    /// 返回 `Ok(true)` 表示新加入、`Ok(false)` 表示已存在。
    /// 返回 `Err` 时任务已加入内存队列，只是持久化失败。
    pub async fn enqueue(&mut self, task: Task) -> Result<bool> {
        if self.tasks.contains(&task) {
            return Ok(false);
        }
        self.tasks.push_back(task.clone());
        self.store.insert_task(&task).await?;
        Ok(true)
    }

    pub fn peek_front(&self) -> Option<&Task> {
        self.tasks.front()
    }

    /// 从队首取出任务（只修改内存，持久化副本由 `forget` 删除）
    pub fn dequeue_front(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    /// 删除任务的持久化副本
    pub async fn forget(&self, task: &Task) -> Result<()> {
        self.store.delete_task(task).await
    }

    /// 从队列与持久化存储中删除任务，返回任务是否在队列中
    pub async fn remove(&mut self, task: &Task) -> Result<bool> {
        let before = self.tasks.len();
        self.tasks.retain(|t| t != task);
        let removed = self.tasks.len() != before;
        self.store.delete_task(task).await?;
        Ok(removed)
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// 从队首开始按顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_enqueue_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let mut backlog = TaskBacklog::new(store.clone());

        assert!(backlog.enqueue(Task::power_on("wn1")).await.unwrap());
        assert!(!backlog.enqueue(Task::power_on("wn1")).await.unwrap());
        assert!(backlog.enqueue(Task::power_off("wn1")).await.unwrap());

        assert_eq!(backlog.len(), 2);
        assert_eq!(store.load_tasks().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let store = Arc::new(MemoryStore::new());
        let mut backlog = TaskBacklog::new(store);

        backlog.enqueue(Task::power_off("a")).await.unwrap();
        backlog.enqueue(Task::power_on("b")).await.unwrap();

        assert_eq!(backlog.peek_front(), Some(&Task::power_off("a")));
        assert_eq!(backlog.dequeue_front(), Some(Task::power_off("a")));
        assert_eq!(backlog.dequeue_front(), Some(Task::power_on("b")));
        assert!(backlog.dequeue_front().is_none());
        assert!(backlog.is_empty());
    }

    #[tokio::test]
    async fn test_remove_deletes_persisted_copy() {
        let store = Arc::new(MemoryStore::new());
        let mut backlog = TaskBacklog::new(store.clone());

        backlog.enqueue(Task::power_off("a")).await.unwrap();
        backlog.enqueue(Task::power_off("b")).await.unwrap();

        assert!(backlog.remove(&Task::power_off("a")).await.unwrap());
        assert!(!backlog.remove(&Task::power_off("zz")).await.unwrap());
        assert_eq!(backlog.len(), 1);
        assert_eq!(store.load_tasks().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_load_drops_unknown_operations() {
        let store = Arc::new(MemoryStore::new());
        store.push_raw_task("a", 0);
        store.push_raw_task("b", 5);
        store.push_raw_task("c", 1);
        store.push_raw_task("a", 0);

        let mut backlog = TaskBacklog::new(store);
        assert_eq!(backlog.load().await.unwrap(), 2);

        let tasks: Vec<_> = backlog.iter().cloned().collect();
        assert_eq!(tasks, vec![Task::power_off("a"), Task::power_on("c")]);
    }

    #[tokio::test]
    async fn test_enqueue_persist_failure_keeps_memory() {
        let store = Arc::new(MemoryStore::new());
        let mut backlog = TaskBacklog::new(store.clone());
        store.set_failing(true);

        assert!(backlog.enqueue(Task::power_off("a")).await.is_err());
        assert_eq!(backlog.peek_front(), Some(&Task::power_off("a")));
    }
}
