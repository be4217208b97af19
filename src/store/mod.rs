//! Persistence for personal tokens granted through the OAuth callback.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

pub use memory::MemoryUserTokenStore;
pub use postgres::PgUserTokenStore;

#[async_trait]
pub trait UserTokenStore: Send + Sync {
    /// Insert or replace the token for `username`.
    async fn save_user_token(&self, username: &str, token: &str) -> anyhow::Result<()>;

    async fn get_user_token(&self, username: &str) -> anyhow::Result<Option<String>>;

    /// Returns whether a token was removed.
    async fn delete_user_token(&self, username: &str) -> anyhow::Result<bool>;
}
