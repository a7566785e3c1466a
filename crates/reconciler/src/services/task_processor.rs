/// 任务处理
///
/// 编排器同一时间只接受一次结构性变更，因此每轮最多提交一次：
/// 队首为开机任务时只处理这一个；队首为关机任务时合并连续的关机任务为一批。

use common::{MonitoringSnapshot, NodeState, PowerOperation, Task};
use std::collections::HashSet;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, warn};

use super::PowerManager;
use crate::orchestrator::ScaleChange;
use crate::tracking::VmRecord;

impl PowerManager {
    /// 处理队首任务
    pub async fn process(&mut self, monitoring: &MonitoringSnapshot) {
        let Some(front) = self.backlog.peek_front().cloned() else {
            return;
        };

        match self.orchestrator.deployment_status().await {
            Ok(status) if status.is_in_progress() => {
                debug!("部署处于 {:?} 状态，暂不处理任务", status);
                return;
            }
            Ok(_) => {}
            Err(e) => error!("获取部署状态失败: {}", e),
        }

        debug!("待处理任务: {:?}", self.pending_tasks());

        match front.operation {
            PowerOperation::PowerOn => {
                let Some(task) = self.backlog.dequeue_front() else {
                    return;
                };
                self.forget(&task).await;

                if self.execute_power_on(&task.node_name).await {
                    debug!("任务 {} 处理完成", task);
                } else {
                    error!("任务 {} 处理失败", task);
                }
            }
            PowerOperation::PowerOff => {
                let batch = self.drain_power_off(monitoring).await;
                if batch.is_empty() {
                    return;
                }

                if self.execute_power_off(&batch).await {
                    debug!("关机任务 {} 处理完成", batch.join(","));
                } else {
                    error!("关机任务 {} 处理失败", batch.join(","));
                }
            }
        }
    }

    /// 取出队首连续的关机任务，返回需要删除的虚拟机 ID
    async fn drain_power_off(&mut self, monitoring: &MonitoringSnapshot) -> Vec<String> {
        let mut batch = Vec::new();
        let mut seen = HashSet::new();

        while self
            .backlog
            .peek_front()
            .is_some_and(|task| task.operation == PowerOperation::PowerOff)
        {
            let Some(task) = self.backlog.dequeue_front() else {
                break;
            };
            self.forget(&task).await;

            if let Some(vm_id) = self.power_off_target(&task.node_name, monitoring) {
                if seen.insert(vm_id.clone()) {
                    batch.push(vm_id);
                }
            }
        }

        batch
    }

    /// 解析关机目标
    ///
    /// 目标可以是节点名，也可以是编排器中的虚拟机 ID。按所属节点检查监控信息：
    /// 不在监控中或正在使用则放弃，否则返回要删除的虚拟机 ID。
    fn power_off_target(&self, target: &str, monitoring: &MonitoringSnapshot) -> Option<String> {
        let (node_name, vm_id) = if let Some(vm) = self.tracker.get(target) {
            (target, vm.vm_id.as_str())
        } else if let Some(name) = self.tracker.node_for_vm(target) {
            (name, target)
        } else {
            (target, target)
        };

        let Some(node) = monitoring.node(node_name) else {
            warn!("节点 {} 不在监控信息中，放弃关机", node_name);
            return None;
        };

        if node.state == NodeState::Used {
            debug!("节点 {} 正在使用，放弃关机", node_name);
            return None;
        }

        Some(vm_id.to_string())
    }

    /// 新增一个节点并等待编排器中出现对应的虚拟机
    async fn execute_power_on(&mut self, node_name: &str) -> bool {
        let change = ScaleChange::Add(vec![node_name.to_string()]);
        if let Err(e) = self.orchestrator.apply_scale(self.tracker.len(), &change).await {
            error!("开启节点 {} 失败: {}", node_name, e);
            return false;
        }
        debug!("节点 {} 创建请求已提交", node_name);

        let deadline = Instant::now() + self.config.power_on_timeout;
        let new_ids = loop {
            let new_ids = self.untracked_vm_ids().await;
            if !new_ids.is_empty() || Instant::now() >= deadline {
                break new_ids;
            }
            sleep(self.config.power_on_poll_delay).await;
        };

        if new_ids.len() != 1 {
            warn!(
                "查找新节点 {} 的虚拟机 ID 时得到 {} 个结果",
                node_name,
                new_ids.len()
            );
            return false;
        }

        let now = self.clock.now();
        self.track(node_name, VmRecord::new(new_ids[0].as_str(), now))
            .await;
        true
    }

    /// 编排器中既不是主节点也未被跟踪的虚拟机
    async fn untracked_vm_ids(&mut self) -> Vec<String> {
        let resources = match self.orchestrator.list_compute_resources().await {
            Ok(resources) => resources,
            Err(e) => {
                error!("获取部署资源失败: {}", e);
                return Vec::new();
            }
        };

        let masters = match self.masters.masters(&resources) {
            Ok(masters) => masters,
            Err(e) => {
                error!("识别主节点失败: {}", e);
                return Vec::new();
            }
        };

        let tracked: HashSet<String> = self.tracker.vm_ids().into_iter().collect();
        resources
            .into_iter()
            .map(|r| r.uuid)
            .filter(|uuid| !masters.contains(uuid) && !tracked.contains(uuid))
            .collect()
    }

    /// 删除一批虚拟机
    async fn execute_power_off(&self, vm_ids: &[String]) -> bool {
        let change = ScaleChange::Remove(vm_ids.to_vec());
        match self.orchestrator.apply_scale(self.tracker.len(), &change).await {
            Ok(()) => true,
            Err(e) => {
                error!("删除节点 {:?} 失败: {}", vm_ids, e);
                false
            }
        }
    }

    async fn forget(&self, task: &Task) {
        if let Err(e) = self.backlog.forget(task).await {
            error!("删除任务 {} 失败: {}", task, e);
        }
    }
}
