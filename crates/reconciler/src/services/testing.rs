/// 引擎测试用的模拟编排器、监控与装配工具

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use common::models::constants::COMPUTE_NODE_TYPE;
use common::{
    DeploymentStatus, Error, MonitoringNode, MonitoringSnapshot, NodeState, Resource,
    ResourceState, Result,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::PowerManager;
use crate::auth::StaticToken;
use crate::clock::{Clock, ManualClock};
use crate::config::ReconcilerConfig;
use crate::monitoring::MonitoringProvider;
use crate::orchestrator::{Orchestrator, ScaleChange};
use crate::store::MemoryStore;
use crate::tracking::VmRecord;

pub fn compute(uuid: &str, state: ResourceState, created: &str) -> Resource {
    Resource {
        uuid: uuid.to_string(),
        state,
        creation_time: created.to_string(),
        tosca_node_type: COMPUTE_NODE_TYPE.to_string(),
        status_reason: None,
    }
}

pub fn monitored(name: &str, state: NodeState, since: DateTime<Utc>) -> MonitoringNode {
    MonitoringNode {
        name: name.to_string(),
        enabled: true,
        state,
        timestamp_state: since,
    }
}

#[derive(Default)]
struct OrchestratorState {
    resources: Vec<Resource>,
    /// 伸缩成功后在第 `appear_on_poll` 次查询时出现
    appear_on_scale: Vec<Resource>,
    appear_on_poll: usize,
    hidden: Vec<Resource>,
    hidden_polls: usize,
    list_calls: usize,
    status: Option<DeploymentStatus>,
    scale_calls: Vec<(usize, ScaleChange)>,
    scale_fails: bool,
}

#[derive(Default)]
pub struct FakeOrchestrator {
    state: Mutex<OrchestratorState>,
}

impl FakeOrchestrator {
    fn with<T>(&self, f: impl FnOnce(&mut OrchestratorState) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn set_resources(&self, resources: Vec<Resource>) {
        self.with(|s| s.resources = resources);
    }

    pub fn appear_on_scale(&self, resources: Vec<Resource>) {
        self.appear_on_poll(resources, 1);
    }

    /// 伸缩成功后，资源在第 `poll` 次查询时才出现
    pub fn appear_on_poll(&self, resources: Vec<Resource>, poll: usize) {
        self.with(|s| {
            s.appear_on_scale = resources;
            s.appear_on_poll = poll;
        });
    }

    pub fn list_calls(&self) -> usize {
        self.with(|s| s.list_calls)
    }

    pub fn set_status(&self, status: DeploymentStatus) {
        self.with(|s| s.status = Some(status));
    }

    pub fn set_scale_fails(&self, fails: bool) {
        self.with(|s| s.scale_fails = fails);
    }

    pub fn scale_calls(&self) -> Vec<(usize, ScaleChange)> {
        self.with(|s| s.scale_calls.clone())
    }
}

#[async_trait]
impl Orchestrator for FakeOrchestrator {
    async fn list_compute_resources(&self) -> Result<Vec<Resource>> {
        Ok(self.with(|s| {
            s.list_calls += 1;
            if !s.hidden.is_empty() {
                if s.hidden_polls <= 1 {
                    let visible = std::mem::take(&mut s.hidden);
                    s.resources.extend(visible);
                } else {
                    s.hidden_polls -= 1;
                }
            }
            s.resources.clone()
        }))
    }

    async fn deployment_status(&self) -> Result<DeploymentStatus> {
        self.with(|s| s.status)
            .ok_or_else(|| Error::Http {
                status: 500,
                body: "unavailable".to_string(),
            })
    }

    async fn apply_scale(&self, current_count: usize, change: &ScaleChange) -> Result<()> {
        self.with(|s| {
            s.scale_calls.push((current_count, change.clone()));
            if s.scale_fails {
                return Err(Error::Http {
                    status: 400,
                    body: "rejected".to_string(),
                });
            }
            s.hidden = std::mem::take(&mut s.appear_on_scale);
            s.hidden_polls = s.appear_on_poll;
            Ok(())
        })
    }
}

#[derive(Default)]
pub struct FakeMonitoring {
    snapshot: Mutex<MonitoringSnapshot>,
    failing: AtomicBool,
}

impl FakeMonitoring {
    pub fn set_snapshot(&self, snapshot: MonitoringSnapshot) {
        *self.snapshot.lock().unwrap() = snapshot;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl MonitoringProvider for FakeMonitoring {
    async fn monitoring_info(&self) -> Result<MonitoringSnapshot> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Monitoring("unavailable".to_string()));
        }
        Ok(self.snapshot.lock().unwrap().clone())
    }
}

pub struct Harness {
    pub manager: PowerManager,
    pub store: Arc<MemoryStore>,
    pub orchestrator: Arc<FakeOrchestrator>,
    pub monitoring: Arc<FakeMonitoring>,
    pub clock: ManualClock,
    config: ReconcilerConfig,
}

impl Harness {
    pub fn new(max_instances: usize) -> Self {
        let config = ReconcilerConfig {
            max_instances,
            forget_missing_vms: 30,
            drop_failing_vms: 30,
            power_on_poll_delay: Duration::ZERO,
            power_on_timeout: Duration::ZERO,
        };
        let store = Arc::new(MemoryStore::new());
        let orchestrator = Arc::new(FakeOrchestrator::default());
        let monitoring = Arc::new(FakeMonitoring::default());
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2016, 2, 4, 12, 0, 0).unwrap());

        let manager = PowerManager::new(
            config.clone(),
            store.clone(),
            orchestrator.clone(),
            monitoring.clone(),
            Arc::new(StaticToken::default()),
            Arc::new(clock.clone()),
        );

        Self {
            manager,
            store,
            orchestrator,
            monitoring,
            clock,
            config,
        }
    }

    /// 以相同的存储与模拟组件重新创建管理器
    pub fn rebuild(&self) -> PowerManager {
        PowerManager::new(
            self.config.clone(),
            self.store.clone(),
            self.orchestrator.clone(),
            self.monitoring.clone(),
            Arc::new(StaticToken::default()),
            Arc::new(self.clock.clone()),
        )
    }

    pub async fn track(&mut self, node_name: &str, vm_id: &str) {
        let now = self.clock.now();
        self.manager
            .tracker
            .insert(node_name, VmRecord::new(vm_id, now))
            .await
            .unwrap();
    }
}
