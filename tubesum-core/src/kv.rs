//! Key-value backends for the summary store
//!
//! Provides a `KeyValueStore` trait with implementations for:
//! - **Memory** - process-local map, used by tests and ephemeral runs
//! - **Postgres** - durable `kv_store` table (JSONB values)
//!
//! Values are arbitrary JSON. A [`WriteBatch`] is applied atomically: either
//! every upsert and removal in it lands, or none does.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::TubesumConfig;
use crate::error::TubesumError;

// ============================================================================
// KeyValueStore trait
// ============================================================================

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the given keys. Absent keys are simply missing from the map.
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, KvError>;

    /// Every key currently stored.
    async fn keys(&self) -> Result<Vec<String>, KvError>;

    /// Apply all upserts and removals of the batch as one atomic write.
    async fn write(&self, batch: WriteBatch) -> Result<(), KvError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

#[derive(Error, Debug)]
pub enum KvError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A set of upserts and removals applied together.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub set: Map<String, Value>,
    pub remove: Vec<String>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: Value) -> Self {
        self.set.insert(key.into(), value);
        self
    }

    pub fn remove(mut self, key: impl Into<String>) -> Self {
        self.remove.push(key.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty()
    }
}

/// Create the backend named by `[storage] backend`.
pub async fn create_backend(config: &TubesumConfig) -> Result<Arc<dyn KeyValueStore>, TubesumError> {
    match config.storage.backend.as_str() {
        "postgres" => {
            let db = config.database.as_ref().ok_or_else(|| {
                TubesumError::Other("storage backend 'postgres' requires a [database] section".to_string())
            })?;
            let pool = crate::db::create_pool(db).await?;
            crate::db::ensure_schema(&pool).await?;
            Ok(Arc::new(PgKvStore::new(pool)))
        }
        "memory" => Ok(Arc::new(MemoryKvStore::new())),
        other => Err(TubesumError::Other(format!("unknown storage backend '{}'", other))),
    }
}

// ============================================================================
// MemoryKvStore
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, KvError> {
        let entries = self.entries.read().await;
        Ok(keys
            .iter()
            .filter_map(|k| entries.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    async fn keys(&self) -> Result<Vec<String>, KvError> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    async fn write(&self, batch: WriteBatch) -> Result<(), KvError> {
        let mut entries = self.entries.write().await;
        for key in &batch.remove {
            entries.remove(key);
        }
        entries.extend(batch.set);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

// ============================================================================
// PgKvStore
// ============================================================================

#[derive(Debug, Clone)]
pub struct PgKvStore {
    pool: PgPool,
}

impl PgKvStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl KeyValueStore for PgKvStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, KvError> {
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        let rows: Vec<(String, Value)> =
            sqlx::query_as("SELECT key, value FROM kv_store WHERE key = ANY($1)")
                .bind(&keys)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    async fn keys(&self) -> Result<Vec<String>, KvError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT key FROM kv_store")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn write(&self, batch: WriteBatch) -> Result<(), KvError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        if !batch.remove.is_empty() {
            sqlx::query("DELETE FROM kv_store WHERE key = ANY($1)")
                .bind(&batch.remove)
                .execute(&mut *tx)
                .await?;
        }

        for (key, value) in batch.set {
            sqlx::query(
                r#"
                INSERT INTO kv_store (key, value, updated_at)
                VALUES ($1, $2, NOW())
                ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
                "#,
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "postgres"
    }
}

// ============================================================================
// TESTS
// ============================================================================
