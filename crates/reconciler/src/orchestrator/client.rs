/// 编排器 HTTP 客户端

use async_trait::async_trait;
use common::models::constants::ACCEPTED_STATUS_CODES;
use common::{DeploymentStatus, Error, Resource, Result};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONNECTION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error};

use super::template::render_scale_template;
use super::{Orchestrator, ScaleChange};
use crate::auth::CredentialProvider;
use crate::config::OrchestratorConfig;

#[derive(Debug, Deserialize)]
struct ResourcePage {
    #[serde(default)]
    content: Vec<Resource>,
    #[serde(default)]
    page: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
struct DeploymentInfo {
    status: DeploymentStatus,
}

pub struct OrchestratorClient {
    http: reqwest::Client,
    config: OrchestratorConfig,
    credentials: Arc<dyn CredentialProvider>,
}

impl OrchestratorClient {
    pub fn new(
        config: OrchestratorConfig,
        http: reqwest::Client,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            http,
            config,
            credentials,
        }
    }

    fn deployment_url(&self, path: &str) -> String {
        format!(
            "{}/deployments/{}{}",
            self.config.url.trim_end_matches('/'),
            self.config.deployment_id,
            path
        )
    }

    fn resources_url(&self, page: u32) -> String {
        self.deployment_url(&format!(
            "/resources?size={}&page={}",
            self.config.page_size, page
        ))
    }

    async fn request(&self, method: Method, url: &str, accept: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, url)
            .header(ACCEPT, accept)
            .header(CONNECTION, "close");

        match self.credentials.auth_header().await {
            Some(auth) => builder.header(AUTHORIZATION, auth),
            None => builder,
        }
    }

    /// 发送请求，返回状态码与响应体
    async fn send(&self, builder: RequestBuilder) -> Result<(u16, String)> {
        let response = builder
            .send()
            .await
            .map_err(|e| Error::Orchestrator(format!("请求编排器失败: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Orchestrator(format!("读取编排器响应失败: {}", e)))?;
        Ok((status, body))
    }

    async fn resources_page(&self, page: u32) -> Result<ResourcePage> {
        let url = self.resources_url(page);
        let builder = self
            .request(Method::GET, &url, "application/json")
            .await
            .header(CONTENT_TYPE, "application/json");

        let (status, body) = self.send(builder).await?;
        if status != 200 {
            return Err(Error::Http { status, body });
        }
        parse_resource_page(&body)
    }

    /// 读取部署模板原文
    pub async fn get_template(&self) -> Result<String> {
        let url = self.deployment_url("/template");
        let builder = self.request(Method::GET, &url, "text/plain").await;

        let (status, body) = self.send(builder).await?;
        if status != 200 {
            return Err(Error::Http { status, body });
        }
        Ok(body)
    }
}

fn parse_resource_page(body: &str) -> Result<ResourcePage> {
    Ok(serde_json::from_str(body)?)
}

#[async_trait]
impl Orchestrator for OrchestratorClient {
    async fn list_compute_resources(&self) -> Result<Vec<Resource>> {
        let first = self.resources_page(0).await?;
        let total_pages = first.page.as_ref().map_or(1, |p| p.total_pages);
        let mut resources = first.content;

        for page in 1..total_pages {
            match self.resources_page(page).await {
                Ok(next) => resources.extend(next.content),
                Err(e) => error!("获取部署资源第 {} 页失败: {}", page, e),
            }
        }

        resources.retain(Resource::is_compute);
        Ok(resources)
    }

    async fn deployment_status(&self) -> Result<DeploymentStatus> {
        let url = self.deployment_url("");
        let builder = self.request(Method::GET, &url, "application/json").await;

        let (status, body) = self.send(builder).await?;
        if status != 200 {
            return Err(Error::Http { status, body });
        }

        let info: DeploymentInfo = serde_json::from_str(&body)?;
        debug!("部署状态: {:?}", info.status);
        Ok(info.status)
    }

    async fn apply_scale(&self, current_count: usize, change: &ScaleChange) -> Result<()> {
        let template = self.get_template().await?;
        let rendered = render_scale_template(&template, current_count, change)?;
        debug!("新的部署模板:\n{}", rendered);

        let url = self.deployment_url("");
        let builder = self
            .request(Method::PUT, &url, "application/json")
            .await
            .json(&serde_json::json!({ "template": rendered }));

        let (status, body) = self.send(builder).await?;
        if !ACCEPTED_STATUS_CODES.contains(&status) {
            return Err(Error::Http { status, body });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use common::ResourceState;

    fn client() -> OrchestratorClient {
        let config = OrchestratorConfig {
            url: "http://orchestrator:8080/".to_string(),
            deployment_id: "dep-1".to_string(),
            page_size: 20,
        };
        OrchestratorClient::new(config, reqwest::Client::new(), Arc::new(StaticToken::default()))
    }

    #[test]
    fn test_urls() {
        let client = client();
        assert_eq!(
            client.deployment_url(""),
            "http://orchestrator:8080/deployments/dep-1"
        );
        assert_eq!(
            client.deployment_url("/template"),
            "http://orchestrator:8080/deployments/dep-1/template"
        );
        assert_eq!(
            client.resources_url(2),
            "http://orchestrator:8080/deployments/dep-1/resources?size=20&page=2"
        );
    }

    #[test]
    fn test_parse_resource_page() {
        let body = r#"{
            "content": [
                {"uuid": "a", "state": "CONFIGURED", "creationTime": "2016-02-04T10:43+0000",
                 "toscaNodeType": "tosca.nodes.indigo.Compute"},
                {"uuid": "b", "state": "ERROR", "creationTime": "2016-02-04T10:44+0000",
                 "toscaNodeType": "tosca.nodes.indigo.Compute", "statusReason": "quota"}
            ],
            "page": {"size": 2, "totalElements": 3, "totalPages": 2, "number": 0}
        }"#;
        let page = parse_resource_page(body).unwrap();
        assert_eq!(page.content.len(), 2);
        assert_eq!(page.content[1].state, ResourceState::Error);
        assert_eq!(page.page.map(|p| p.total_pages), Some(2));
    }

    #[test]
    fn test_parse_page_without_paging_info() {
        let page = parse_resource_page(r#"{"content": []}"#).unwrap();
        assert!(page.content.is_empty());
        assert!(page.page.is_none());
        assert!(parse_resource_page("not json").is_err());
    }
}
