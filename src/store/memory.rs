use async_trait::async_trait;
use dashmap::DashMap;

use super::UserTokenStore;

/// Process-local store used when no database is configured.
#[derive(Default)]
pub struct MemoryUserTokenStore {
    tokens: DashMap<String, String>,
}

impl MemoryUserTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserTokenStore for MemoryUserTokenStore {
    async fn save_user_token(&self, username: &str, token: &str) -> anyhow::Result<()> {
        self.tokens.insert(username.to_string(), token.to_string());
        Ok(())
    }

    async fn get_user_token(&self, username: &str) -> anyhow::Result<Option<String>> {
        Ok(self.tokens.get(username).map(|t| t.value().clone()))
    }

    async fn delete_user_token(&self, username: &str) -> anyhow::Result<bool> {
        Ok(self.tokens.remove(username).is_some())
    }
}
