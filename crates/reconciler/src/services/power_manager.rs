/// 电源管理服务
///
/// 每次生命周期执行一轮：刷新虚拟机跟踪、比对监控信息与编排器资源、
/// 将纠正动作写入任务队列，最后交给任务处理器提交至多一次变更。

use chrono::{DateTime, Utc};
use common::utils::elapsed_secs;
use common::{
    Error, MonitoringSnapshot, NodeState, Resource, ResourceState, Result, Task,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::auth::CredentialProvider;
use crate::backlog::TaskBacklog;
use crate::clock::Clock;
use crate::config::ReconcilerConfig;
use crate::masters::MasterClassifier;
use crate::monitoring::MonitoringProvider;
use crate::orchestrator::Orchestrator;
use crate::store::StateStore;
use crate::tracking::{VmRecord, VmTracker};

/// 已跟踪虚拟机（对外展示）
#[derive(Debug, Clone, Serialize)]
pub struct TrackedVm {
    pub node_name: String,
    #[serde(flatten)]
    pub record: VmRecord,
}

pub struct PowerManager {
    pub(super) config: ReconcilerConfig,
    pub(super) orchestrator: Arc<dyn Orchestrator>,
    pub(super) monitoring: Arc<dyn MonitoringProvider>,
    pub(super) credentials: Arc<dyn CredentialProvider>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) tracker: VmTracker,
    pub(super) backlog: TaskBacklog,
    pub(super) masters: MasterClassifier,
}

impl PowerManager {
    pub fn new(
        config: ReconcilerConfig,
        store: Arc<dyn StateStore>,
        orchestrator: Arc<dyn Orchestrator>,
        monitoring: Arc<dyn MonitoringProvider>,
        credentials: Arc<dyn CredentialProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            monitoring,
            credentials,
            clock,
            tracker: VmTracker::new(store.clone()),
            backlog: TaskBacklog::new(store),
            masters: MasterClassifier::new(),
        }
    }

    /// 从持久化存储恢复跟踪记录与任务队列
    pub async fn restore(&mut self) {
        let now = self.clock.now();
        match self.tracker.load(now).await {
            Ok(count) => info!("已加载 {} 个虚拟机跟踪记录", count),
            Err(e) => error!("加载虚拟机跟踪记录失败: {}", e),
        }
        match self.backlog.load().await {
            Ok(count) => info!("已加载 {} 个待处理任务", count),
            Err(e) => error!("加载待处理任务失败: {}", e),
        }
    }

    pub fn tracked_vms(&self) -> Vec<TrackedVm> {
        self.tracker
            .all()
            .iter()
            .map(|(name, record)| TrackedVm {
                node_name: name.clone(),
                record: record.clone(),
            })
            .collect()
    }

    pub fn pending_tasks(&self) -> Vec<Task> {
        self.backlog.iter().cloned().collect()
    }

    /// 请求开机
    ///
    /// 已达到最大实例数时拒绝；节点已有虚拟机时直接返回成功
    pub async fn power_on(&mut self, node_name: &str) -> Result<()> {
        let tracked = self.tracker.len();
        if tracked >= self.config.max_instances {
            debug!(
                "当前已有 {} 个虚拟机，达到上限，不再开启 {}",
                tracked, node_name
            );
            return Err(Error::CapacityReached {
                tracked,
                max: self.config.max_instances,
            });
        }

        if self.tracker.contains(node_name) {
            warn!("节点 {} 已存在虚拟机，忽略开机请求", node_name);
            return Ok(());
        }

        self.enqueue(Task::power_on(node_name)).await;
        Ok(())
    }

    /// 请求关机
    pub async fn power_off(&mut self, node_name: &str) -> Result<()> {
        if !self.tracker.contains(node_name) {
            error!("节点 {} 没有关联的虚拟机，无需关机", node_name);
            return Err(Error::NotFound(format!("节点 {} 没有关联的虚拟机", node_name)));
        }

        self.enqueue(Task::power_off(node_name)).await;
        Ok(())
    }

    /// 回收节点：直接关机，成功时报告节点进入 OFF
    pub async fn recover(&mut self, node_name: &str) -> Result<NodeState> {
        self.power_off(node_name).await?;
        Ok(NodeState::Off)
    }

    /// 执行一轮完整的生命周期，任何错误都只记录日志
    pub async fn run_pass(&mut self) {
        if let Err(e) = self.lifecycle().await {
            error!("电源管理生命周期执行失败: {}", e);
        }
    }

    async fn lifecycle(&mut self) -> Result<()> {
        if let Err(e) = self.credentials.refresh_if_needed().await {
            error!("刷新访问令牌失败: {}", e);
        }

        let monitoring = self.monitoring.monitoring_info().await?;

        let inventory = match self.orchestrator.list_compute_resources().await {
            Ok(resources) => resources,
            Err(e) => {
                error!("获取部署资源失败: {}", e);
                Vec::new()
            }
        };

        self.reconcile(&monitoring, &inventory).await?;
        self.process(&monitoring).await;
        Ok(())
    }

    /// 刷新虚拟机跟踪并比对监控信息，把纠正动作写入任务队列
    pub async fn reconcile(
        &mut self,
        monitoring: &MonitoringSnapshot,
        inventory: &[Resource],
    ) -> Result<()> {
        self.refresh_vms(inventory).await?;

        let now = self.clock.now();
        let mut recover = Vec::new();

        for node in monitoring.nodes.iter().filter(|node| node.enabled) {
            if node.state.is_failure() {
                if self.config.drop_failing_vms <= 0 {
                    continue;
                }
                let Some(vm) = self.tracker.get_mut(&node.name) else {
                    continue;
                };

                let time_off = elapsed_secs(now, node.timestamp_state);
                warn!(
                    "节点 {} 有运行中的虚拟机，但监控状态为 {:?} 已 {} 秒",
                    node.name, node.state, time_off
                );
                if time_off <= self.config.drop_failing_vms {
                    continue;
                }

                match vm.secs_since_recovered(now) {
                    Some(secs) if secs <= self.config.drop_failing_vms => {
                        debug!("节点 {} 在 {} 秒前刚被回收，暂不再次回收", node.name, secs);
                    }
                    _ => {
                        warn!("尝试回收节点 {} (状态: {:?})", node.name, node.state);
                        vm.recovered(now);
                        recover.push(node.name.clone());
                    }
                }
            } else if !self.tracker.contains(&node.name) {
                warn!(
                    "监控系统检测到节点 {}，但没有关联的虚拟机（可能由其他凭据创建）",
                    node.name
                );
            }
        }

        let unknown: Vec<String> = self
            .tracker
            .all()
            .keys()
            .filter(|name| !monitoring.contains(name))
            .cloned()
            .collect();
        for name in unknown {
            warn!("编排器中的虚拟机 {} 不在监控系统中，回收该节点", name);
            if let Some(vm) = self.tracker.get_mut(&name) {
                vm.recovered(now);
            }
            recover.push(name);
        }

        for name in recover {
            if let Err(e) = self.recover(&name).await {
                error!("回收节点 {} 失败: {}", name, e);
            }
        }

        Ok(())
    }

    /// 根据编排器资源刷新虚拟机跟踪
    pub async fn refresh_vms(&mut self, inventory: &[Resource]) -> Result<()> {
        let now = self.clock.now();

        if inventory.is_empty() {
            warn!("未从编排器获取到任何资源");
        } else {
            let masters = self.masters.masters(inventory)?;

            for resource in inventory.iter().filter(|r| r.is_compute()) {
                if masters.contains(&resource.uuid) {
                    continue;
                }

                match resource.state {
                    ResourceState::Error => {
                        error!(
                            "虚拟机 {} 处于 ERROR 状态: {}，执行关机",
                            resource.uuid,
                            resource.status_reason.as_deref().unwrap_or_default()
                        );
                        self.enqueue(Task::power_off(resource.uuid.as_str())).await;
                    }
                    ResourceState::Deleting => {
                        debug!("虚拟机 {} 正在删除，忽略", resource.uuid);
                    }
                    _ => self.observe(&resource.uuid, now).await,
                }
            }
        }

        for name in self.tracker.unseen_for(now, self.config.forget_missing_vms) {
            debug!("虚拟机 {} 长时间未出现，不再跟踪", name);
            if let Err(e) = self.tracker.remove(&name).await {
                error!("删除虚拟机跟踪记录 {} 失败: {}", name, e);
            }
        }

        Ok(())
    }

    /// 处理编排器中仍然存在的虚拟机
    async fn observe(&mut self, vm_id: &str, now: DateTime<Utc>) {
        let Some(node_name) = self.tracker.node_for_vm(vm_id).map(str::to_string) else {
            error!("虚拟机 {} 没有对应的节点名", vm_id);
            self.enqueue(Task::power_off(vm_id)).await;
            return;
        };

        match self.tracker.get_mut(&node_name) {
            Some(vm) => vm.seen(now),
            None => {
                warn!("节点 {} 不在已跟踪的虚拟机中", node_name);
                self.track(&node_name, VmRecord::new(vm_id, now)).await;
            }
        }
    }

    /// 入队，持久化失败只记录日志
    pub(super) async fn enqueue(&mut self, task: Task) {
        match self.backlog.enqueue(task.clone()).await {
            Ok(true) => debug!("新任务: {}", task),
            Ok(false) => debug!("任务已在队列中: {}", task),
            Err(e) => error!("保存任务 {} 失败: {}", task, e),
        }
    }

    pub(super) async fn track(&mut self, node_name: &str, record: VmRecord) {
        if let Err(e) = self.tracker.insert(node_name, record).await {
            error!("保存虚拟机跟踪记录 {} 失败: {}", node_name, e);
        }
    }
}
