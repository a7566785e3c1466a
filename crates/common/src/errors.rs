use thiserror::Error;

/// 统一错误类型
#[derive(Error, Debug)]
pub enum Error {
    #[error("数据库错误: {0}")]
    Database(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("认证错误: {0}")]
    Authentication(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效参数: {0}")]
    InvalidArgument(String),

    #[error("编排器错误: {0}")]
    Orchestrator(String),

    #[error("HTTP 错误 ({status}): {body}")]
    Http { status: u16, body: String },

    #[error("模板错误: {0}")]
    Template(String),

    #[error("监控错误: {0}")]
    Monitoring(String),

    #[error("已达到最大实例数: {tracked}/{max}")]
    CapacityReached { tracked: usize, max: usize },

    #[error("内部错误: {0}")]
    Internal(String),

    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 统一结果类型
pub type Result<T> = std::result::Result<T, Error>;
