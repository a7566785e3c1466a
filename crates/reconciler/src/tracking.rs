/// 虚拟机跟踪
///
/// 维护逻辑节点名到编排器虚拟机 ID 的映射。每次增删先更新内存，再写入持久化存储；
/// 写入失败以 `Err` 返回给调用方，内存中的状态在本轮仍然有效。

use chrono::{DateTime, Utc};
use common::utils::elapsed_secs;
use common::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::store::StateStore;

/// 已跟踪的虚拟机
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VmRecord {
    pub vm_id: String,
    pub timestamp_created: DateTime<Utc>,
    pub timestamp_seen: DateTime<Utc>,
    /// 最近一次被强制回收的时间，`None` 表示从未回收
    pub timestamp_recovered: Option<DateTime<Utc>>,
}

impl VmRecord {
    pub fn new(vm_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            vm_id: vm_id.into(),
            timestamp_created: now,
            timestamp_seen: now,
            timestamp_recovered: None,
        }
    }

    pub fn seen(&mut self, now: DateTime<Utc>) {
        self.timestamp_seen = now;
    }

    pub fn recovered(&mut self, now: DateTime<Utc>) {
        self.timestamp_recovered = Some(now);
    }

    /// 距离上次回收的秒数；从未回收时返回 `None`
    pub fn secs_since_recovered(&self, now: DateTime<Utc>) -> Option<i64> {
        self.timestamp_recovered.map(|t| elapsed_secs(now, t))
    }
}

pub struct VmTracker {
    vms: BTreeMap<String, VmRecord>,
    store: Arc<dyn StateStore>,
}

impl VmTracker {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            vms: BTreeMap::new(),
            store,
        }
    }

    /// 从持久化存储重新加载，返回加载的数量
    ///
    /// 加载的记录以 `now` 作为创建与最近可见时间
    pub async fn load(&mut self, now: DateTime<Utc>) -> Result<usize> {
        let rows = self.store.load_vms().await?;
        self.vms = rows
            .into_iter()
            .map(|(node_name, vm_id)| (node_name, VmRecord::new(vm_id, now)))
            .collect();
        Ok(self.vms.len())
    }

    pub fn get(&self, node_name: &str) -> Option<&VmRecord> {
        self.vms.get(node_name)
    }

    pub fn get_mut(&mut self, node_name: &str) -> Option<&mut VmRecord> {
        self.vms.get_mut(node_name)
    }

    pub fn contains(&self, node_name: &str) -> bool {
        self.vms.contains_key(node_name)
    }

    pub fn len(&self) -> usize {
        self.vms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vms.is_empty()
    }

    pub fn all(&self) -> &BTreeMap<String, VmRecord> {
        &self.vms
    }

    /// 根据虚拟机 ID 反查节点名（线性扫描）
    pub fn node_for_vm(&self, vm_id: &str) -> Option<&str> {
        self.vms
            .iter()
            .find(|(_, vm)| vm.vm_id == vm_id)
            .map(|(name, _)| name.as_str())
    }

    pub fn vm_ids(&self) -> Vec<String> {
        self.vms.values().map(|vm| vm.vm_id.clone()).collect()
    }

    /// 超过 `window` 秒未见到的节点
    pub fn unseen_for(&self, now: DateTime<Utc>, window: i64) -> Vec<String> {
        self.vms
            .iter()
            .filter(|(_, vm)| elapsed_secs(now, vm.timestamp_seen) > window)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// 添加（或覆盖）一个节点的虚拟机
    pub async fn insert(&mut self, node_name: &str, record: VmRecord) -> Result<()> {
        let vm_id = record.vm_id.clone();
        self.vms.insert(node_name.to_string(), record);
        self.store.insert_vm(node_name, &vm_id).await
    }

    /// 移除一个节点的虚拟机，返回被移除的记录
    pub async fn remove(&mut self, node_name: &str) -> Result<Option<VmRecord>> {
        let removed = self.vms.remove(node_name);
        self.store.delete_vm(node_name).await?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Duration;

    #[test]
    fn test_vm_record_new() {
        let now = Utc::now();
        let vm = VmRecord::new("1", now);
        assert_eq!(vm.vm_id, "1");
        assert_eq!(vm.timestamp_created, now);
        assert_eq!(vm.timestamp_seen, now);
        assert!(vm.timestamp_recovered.is_none());
    }

    #[tokio::test]
    async fn test_insert_and_reverse_lookup() {
        let store = Arc::new(MemoryStore::new());
        let mut tracker = VmTracker::new(store.clone());
        let now = Utc::now();

        tracker.insert("wn1", VmRecord::new("uuid-1", now)).await.unwrap();
        tracker.insert("wn2", VmRecord::new("uuid-2", now)).await.unwrap();

        assert_eq!(tracker.node_for_vm("uuid-2"), Some("wn2"));
        assert_eq!(tracker.node_for_vm("uuid-9"), None);
        assert_eq!(store.load_vms().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_one_record_per_node() {
        let store = Arc::new(MemoryStore::new());
        let mut tracker = VmTracker::new(store.clone());
        let now = Utc::now();

        tracker.insert("wn1", VmRecord::new("uuid-1", now)).await.unwrap();
        tracker.insert("wn1", VmRecord::new("uuid-2", now)).await.unwrap();

        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.get("wn1").unwrap().vm_id, "uuid-2");
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_memory() {
        let store = Arc::new(MemoryStore::new());
        let mut tracker = VmTracker::new(store.clone());
        store.set_failing(true);

        let result = tracker.insert("wn1", VmRecord::new("uuid-1", Utc::now())).await;
        assert!(result.is_err());
        assert!(tracker.contains("wn1"));
    }

    #[tokio::test]
    async fn test_load_and_unseen() {
        let store = Arc::new(MemoryStore::new());
        store.insert_vm("wn1", "uuid-1").await.unwrap();
        store.insert_vm("wn2", "uuid-2").await.unwrap();

        let start = Utc::now();
        let mut tracker = VmTracker::new(store.clone());
        assert_eq!(tracker.load(start).await.unwrap(), 2);

        let later = start + Duration::seconds(31);
        tracker.get_mut("wn2").unwrap().seen(later);
        assert_eq!(tracker.unseen_for(later, 30), vec!["wn1".to_string()]);

        tracker.remove("wn1").await.unwrap();
        assert_eq!(store.load_vms().await.unwrap().len(), 1);
    }
}
