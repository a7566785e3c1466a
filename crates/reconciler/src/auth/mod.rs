/// 编排器认证
///
/// 电源管理器只需要 `Authorization` 头；令牌的获取与续期由具体实现负责

mod oauth;

pub use oauth::OAuthCredentials;

use async_trait::async_trait;
use common::Result;

/// 凭据提供者 Trait
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// 当前的 `Authorization` 头值，没有凭据时返回 `None`
    async fn auth_header(&self) -> Option<String>;

    /// 令牌即将过期时续期
    async fn refresh_if_needed(&self) -> Result<()> {
        Ok(())
    }
}

/// 固定的 Bearer 令牌（或无认证）
#[derive(Debug, Clone, Default)]
pub struct StaticToken {
    token: Option<String>,
}

impl StaticToken {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

#[async_trait]
impl CredentialProvider for StaticToken {
    async fn auth_header(&self) -> Option<String> {
        self.token.as_ref().map(|token| bearer(token))
    }
}

pub(crate) fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token_header() {
        let provider = StaticToken::new(Some("abc".to_string()));
        assert_eq!(provider.auth_header().await, Some("Bearer abc".to_string()));
        assert!(provider.refresh_if_needed().await.is_ok());

        let anonymous = StaticToken::default();
        assert_eq!(anonymous.auth_header().await, None);
    }
}
