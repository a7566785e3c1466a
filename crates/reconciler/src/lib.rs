/// CLUES 编排器电源管理
///
/// 让集群工作节点池与编排器中的虚拟机保持一致

pub mod api;
pub mod app_state;
pub mod auth;
pub mod backlog;
pub mod clock;
pub mod config;
pub mod db;
pub mod masters;
pub mod monitoring;
pub mod orchestrator;
pub mod services;
pub mod store;
pub mod tracking;
