use anyhow::Context;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use super::UserTokenStore;
use crate::vault::{SealedToken, VaultCrypto};

/// User tokens in PostgreSQL, sealed with envelope encryption.
pub struct PgUserTokenStore {
    pool: PgPool,
    crypto: VaultCrypto,
}

impl PgUserTokenStore {
    pub async fn connect(database_url: &str, master_key_hex: &str) -> anyhow::Result<Self> {
        let crypto = VaultCrypto::new(master_key_hex)?;
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("failed to connect to PostgreSQL")?;
        Ok(Self { pool, crypto })
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("database migrations applied");
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct UserTokenRow {
    encrypted_dek: Vec<u8>,
    dek_nonce: Vec<u8>,
    encrypted_token: Vec<u8>,
    token_nonce: Vec<u8>,
}

impl From<UserTokenRow> for SealedToken {
    fn from(row: UserTokenRow) -> Self {
        SealedToken {
            encrypted_dek: row.encrypted_dek,
            dek_nonce: row.dek_nonce,
            encrypted_token: row.encrypted_token,
            token_nonce: row.token_nonce,
        }
    }
}

#[async_trait]
impl UserTokenStore for PgUserTokenStore {
    async fn save_user_token(&self, username: &str, token: &str) -> anyhow::Result<()> {
        let sealed = self.crypto.seal(token)?;
        sqlx::query(
            r#"INSERT INTO user_tokens (username, encrypted_dek, dek_nonce, encrypted_token, token_nonce)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (username) DO UPDATE SET
                   encrypted_dek = EXCLUDED.encrypted_dek,
                   dek_nonce = EXCLUDED.dek_nonce,
                   encrypted_token = EXCLUDED.encrypted_token,
                   token_nonce = EXCLUDED.token_nonce,
                   updated_at = NOW()"#,
        )
        .bind(username)
        .bind(&sealed.encrypted_dek)
        .bind(&sealed.dek_nonce)
        .bind(&sealed.encrypted_token)
        .bind(&sealed.token_nonce)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_user_token(&self, username: &str) -> anyhow::Result<Option<String>> {
        let row = sqlx::query_as::<_, UserTokenRow>(
            "SELECT encrypted_dek, dek_nonce, encrypted_token, token_nonce FROM user_tokens WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let token = self
                    .crypto
                    .open(&row.into())
                    .with_context(|| format!("stored token for {} could not be decrypted", username))?;
                Ok(Some(token))
            }
            None => Ok(None),
        }
    }

    async fn delete_user_token(&self, username: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM user_tokens WHERE username = $1")
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
