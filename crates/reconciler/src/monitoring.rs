/// 集群监控信息来源

use async_trait::async_trait;
use common::{Error, MonitoringNode, MonitoringSnapshot, Result};
use reqwest::header::ACCEPT;
use serde::Deserialize;

/// 监控信息提供者 Trait
#[async_trait]
pub trait MonitoringProvider: Send + Sync {
    async fn monitoring_info(&self) -> Result<MonitoringSnapshot>;
}

/// 监控接口返回节点数组，或带 `nodelist` 字段的对象
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MonitoringPayload {
    List(Vec<MonitoringNode>),
    Snapshot(MonitoringSnapshot),
}

impl From<MonitoringPayload> for MonitoringSnapshot {
    fn from(payload: MonitoringPayload) -> Self {
        match payload {
            MonitoringPayload::List(nodes) => MonitoringSnapshot::new(nodes),
            MonitoringPayload::Snapshot(snapshot) => snapshot,
        }
    }
}

pub fn parse_monitoring_info(body: &str) -> Result<MonitoringSnapshot> {
    let payload: MonitoringPayload = serde_json::from_str(body)?;
    Ok(payload.into())
}

/// 通过 HTTP 拉取监控快照
pub struct HttpMonitoringProvider {
    http: reqwest::Client,
    url: String,
}

impl HttpMonitoringProvider {
    pub fn new(url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl MonitoringProvider for HttpMonitoringProvider {
    async fn monitoring_info(&self) -> Result<MonitoringSnapshot> {
        let response = self
            .http
            .get(&self.url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Error::Monitoring(format!("请求监控信息失败: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Monitoring(format!("读取监控信息失败: {}", e)))?;

        if status != 200 {
            return Err(Error::Http { status, body });
        }
        parse_monitoring_info(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::NodeState;

    #[test]
    fn test_parse_node_list() {
        let body = r#"[
            {"name": "wn1", "enabled": true, "state": "USED", "timestamp_state": 1454582580},
            {"name": "wn2", "enabled": false, "state": "OFF_ERR", "timestamp_state": 1454582600}
        ]"#;
        let snapshot = parse_monitoring_info(body).unwrap();
        assert_eq!(snapshot.nodes.len(), 2);
        assert_eq!(snapshot.node("wn2").map(|n| n.state), Some(NodeState::OffErr));
    }

    #[test]
    fn test_parse_nodelist_object() {
        let body = r#"{"nodelist": [
            {"name": "wn1", "enabled": true, "state": "POWON", "timestamp_state": 0}
        ]}"#;
        let snapshot = parse_monitoring_info(body).unwrap();
        assert!(snapshot.contains("wn1"));
    }
}
