/// OAuth2 令牌交换与续期
///
/// 启动时用初始访问令牌换取 refresh token，之后在访问令牌即将过期时续期。
/// 最新的访问令牌写入持久化存储，重启后优先使用。

use async_trait::async_trait;
use chrono::Utc;
use common::{Error, Result};
use jsonwebtoken::{DecodingKey, Validation};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use super::{bearer, CredentialProvider};
use crate::config::AuthConfig;
use crate::store::StateStore;

const TOKEN_SCOPES: &str = "openid profile offline_access";
const TOKEN_EXCHANGE_GRANT: &str = "urn:ietf:params:oauth:grant-type:token-exchange";

/// 访问令牌中用到的声明
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    pub iss: String,
    pub exp: i64,
}

/// 读取 JWT 声明（不校验签名）
pub fn read_claims(token: &str) -> Result<TokenClaims> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| Error::Authentication(format!("无法解析访问令牌: {}", e)))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Default)]
struct TokenState {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

pub struct OAuthCredentials {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    refresh_margin: i64,
    store: Arc<dyn StateStore>,
    state: RwLock<TokenState>,
}

impl OAuthCredentials {
    pub fn new(config: &AuthConfig, http: reqwest::Client, store: Arc<dyn StateStore>) -> Result<Self> {
        let (client_id, client_secret) = match (&config.client_id, &config.client_secret) {
            (Some(id), Some(secret)) => (id.clone(), secret.clone()),
            _ => return Err(Error::Config("缺少 OAuth2 客户端信息".to_string())),
        };

        Ok(Self {
            http,
            client_id,
            client_secret,
            refresh_margin: config.refresh_margin,
            store,
            state: RwLock::new(TokenState {
                access_token: config.auth_data.clone(),
                refresh_token: None,
            }),
        })
    }

    /// 载入缓存的访问令牌并换取 refresh token
    pub async fn initialize(&self) -> Result<()> {
        match self.store.load_token().await {
            Ok(Some(token)) => {
                debug!("使用缓存的访问令牌");
                self.state.write().await.access_token = Some(token);
            }
            Ok(None) => {}
            Err(e) => error!("加载缓存的访问令牌失败: {}", e),
        }

        self.exchange().await
    }

    /// 令牌交换：用访问令牌换取新的访问令牌与 refresh token
    pub async fn exchange(&self) -> Result<()> {
        let subject_token = self
            .state
            .read()
            .await
            .access_token
            .clone()
            .ok_or_else(|| Error::Authentication("没有可交换的访问令牌".to_string()))?;

        let claims = read_claims(&subject_token)?;
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", TOKEN_EXCHANGE_GRANT),
            ("subject_token", subject_token.as_str()),
            ("scope", TOKEN_SCOPES),
        ];
        let response = self.post_token(&claims.iss, &form).await?;

        let refresh_token = response
            .refresh_token
            .ok_or_else(|| Error::Authentication("令牌交换未返回 refresh token".to_string()))?;

        self.update(response.access_token, Some(refresh_token)).await;
        debug!("已获取 refresh token");
        Ok(())
    }

    /// 使用 refresh token 续期访问令牌
    pub async fn refresh(&self) -> Result<()> {
        let (access_token, refresh_token) = {
            let state = self.state.read().await;
            (state.access_token.clone(), state.refresh_token.clone())
        };
        let access_token =
            access_token.ok_or_else(|| Error::Authentication("没有访问令牌".to_string()))?;
        let refresh_token =
            refresh_token.ok_or_else(|| Error::Authentication("没有 refresh token".to_string()))?;

        let claims = read_claims(&access_token)?;
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("scope", TOKEN_SCOPES),
            ("refresh_token", refresh_token.as_str()),
        ];
        let response = self.post_token(&claims.iss, &form).await?;

        self.update(response.access_token, None).await;
        debug!("访问令牌已续期");
        Ok(())
    }

    /// 访问令牌剩余有效期是否低于续期阈值
    pub async fn is_expiring(&self) -> bool {
        let state = self.state.read().await;
        let Some(token) = state.access_token.as_deref() else {
            warn!("没有访问令牌，无法检查有效期");
            return false;
        };

        match read_claims(token) {
            Ok(claims) => {
                let remaining = claims.exp - Utc::now().timestamp();
                debug!("访问令牌剩余有效期 {} 秒", remaining);
                remaining < self.refresh_margin
            }
            Err(e) => {
                error!("{}", e);
                false
            }
        }
    }

    async fn update(&self, access_token: String, refresh_token: Option<String>) {
        {
            let mut state = self.state.write().await;
            state.access_token = Some(access_token.clone());
            if refresh_token.is_some() {
                state.refresh_token = refresh_token;
            }
        }

        if let Err(e) = self.store.save_token(&access_token).await {
            error!("保存访问令牌失败: {}", e);
        }
    }

    async fn post_token(&self, issuer: &str, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let url = format!("{}/token", issuer.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .form(form)
            .send()
            .await
            .map_err(|e| Error::Authentication(format!("请求令牌失败: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Authentication(format!("读取令牌响应失败: {}", e)))?;

        if status != 200 {
            return Err(Error::Http { status, body });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl CredentialProvider for OAuthCredentials {
    async fn auth_header(&self) -> Option<String> {
        self.state.read().await.access_token.as_deref().map(bearer)
    }

    async fn refresh_if_needed(&self) -> Result<()> {
        if self.is_expiring().await {
            self.refresh().await?;
        }
        Ok(())
    }
}
