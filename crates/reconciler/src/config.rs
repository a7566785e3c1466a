/// 配置管理

use common::models::constants;
use std::str::FromStr;
use std::time::Duration;

/// 电源管理器（协调引擎）使用的不可变配置
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// 同时跟踪的最大虚拟机数量
    pub max_instances: usize,
    /// 编排器中多久未见到的虚拟机会被遗忘（秒）
    pub forget_missing_vms: i64,
    /// 故障节点持续多久后被回收（秒），0 表示不回收
    pub drop_failing_vms: i64,
    /// 开机后轮询新虚拟机的间隔
    pub power_on_poll_delay: Duration,
    /// 开机后等待新虚拟机出现的超时
    pub power_on_timeout: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_instances: 0,
            forget_missing_vms: constants::DEFAULT_FORGET_MISSING_VMS,
            drop_failing_vms: constants::DEFAULT_DROP_FAILING_VMS,
            power_on_poll_delay: Duration::from_secs(2),
            power_on_timeout: Duration::from_secs(60),
        }
    }
}

/// 编排器连接配置
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub url: String,
    pub deployment_id: String,
    pub page_size: u32,
}

/// 认证配置
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// 初始访问令牌
    pub auth_data: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// 令牌剩余有效期低于该值时刷新（秒）
    pub refresh_margin: i64,
}

impl AuthConfig {
    /// 是否配置了 OAuth2 客户端信息
    pub fn has_client(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }
}

/// 进程级配置
#[derive(Debug, Clone)]
pub struct Config {
    pub reconciler: ReconcilerConfig,
    pub orchestrator: OrchestratorConfig,
    pub auth: AuthConfig,
    pub database_url: String,
    pub monitoring_url: String,
    /// 生命周期执行间隔（秒）
    pub lifecycle_interval: u64,
    pub server_port: u16,
    pub log_level: String,
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> anyhow::Result<Self> {
        let deployment_id = std::env::var("ORCHESTRATOR_DEPLOY_ID")
            .map_err(|_| anyhow::anyhow!("缺少 ORCHESTRATOR_DEPLOY_ID"))?;

        let monitoring_url = std::env::var("MONITORING_URL")
            .map_err(|_| anyhow::anyhow!("缺少 MONITORING_URL"))?;

        let reconciler = ReconcilerConfig {
            max_instances: env_or("ORCHESTRATOR_MAX_INSTANCES", 0)?,
            forget_missing_vms: env_or(
                "ORCHESTRATOR_FORGET_MISSING_VMS",
                constants::DEFAULT_FORGET_MISSING_VMS,
            )?,
            drop_failing_vms: env_or(
                "ORCHESTRATOR_DROP_FAILING_VMS",
                constants::DEFAULT_DROP_FAILING_VMS,
            )?,
            power_on_poll_delay: Duration::from_secs(env_or("POWER_ON_POLL_DELAY", 2)?),
            power_on_timeout: Duration::from_secs(env_or("POWER_ON_TIMEOUT", 60)?),
        };

        let orchestrator = OrchestratorConfig {
            url: std::env::var("ORCHESTRATOR_URL")
                .unwrap_or_else(|_| "http://172.30.15.43:8080".to_string()),
            deployment_id,
            page_size: env_or("ORCHESTRATOR_PAGE_SIZE", constants::DEFAULT_PAGE_SIZE)?,
        };

        let auth = AuthConfig {
            auth_data: non_empty_env("ORCHESTRATOR_AUTH_DATA"),
            client_id: non_empty_env("ORCHESTRATOR_CLIENT_ID"),
            client_secret: non_empty_env("ORCHESTRATOR_CLIENT_SECRET"),
            refresh_margin: env_or("TOKEN_REFRESH_MARGIN", 300)?,
        };

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://clues.db?mode=rwc".to_string());

        let log_level = std::env::var("LOG_LEVEL")
            .unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            reconciler,
            orchestrator,
            auth,
            database_url,
            monitoring_url,
            lifecycle_interval: env_or("LIFECYCLE_INTERVAL", 10)?,
            server_port: env_or("SERVER_PORT", 3100)?,
            log_level,
        })
    }
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("环境变量 {} 无效: {}", key, e)),
        Err(_) => Ok(default),
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
