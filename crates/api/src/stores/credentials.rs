//! Key-value access to Redis for credential and session bookkeeping.

use anyhow::Result;
use async_trait::async_trait;
use redis::AsyncCommands;

/// Minimal TTL-aware key-value store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// `SET key value EX ttl_secs`.
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    /// `GET key`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// `DEL key`. Deleting a missing key is not an error.
    async fn del(&self, key: &str) -> Result<()>;

    /// `EXISTS key`.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Round-trip check used by the health endpoint.
    async fn ping(&self) -> Result<()>;
}

/// Redis implementation of CredentialStore.
#[derive(Clone)]
pub struct RedisCredentialStore {
    client: redis::Client,
}

impl RedisCredentialStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CredentialStore for RedisCredentialStore {
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let _: () = conn.set_ex(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
