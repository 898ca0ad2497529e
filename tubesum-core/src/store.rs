//! Summary cache, bounded history and usage counters on top of a [`KeyValueStore`].
//!
//! Persisted layout:
//! - `<videoId>`          → [`CacheEntry`]
//! - `history`            → `[HistoryRecord]`, most recent first, at most `history_limit`
//! - `timeSaved`          → seconds
//! - `videosSummarized`   → count
//! - `apiKey`, `systemPrompt`, `theme` → [`Settings`] (kept across `clear_all`)
//!
//! Every mutation takes the store's write lock for its whole read-modify-write
//! sequence and lands as a single [`WriteBatch`], so a reader never sees the
//! cache updated while history is stale.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::kv::{KeyValueStore, KvError, WriteBatch};
use crate::models::{CacheEntry, HistoryRecord, Settings, SummaryResult, UsageStats};

pub const DEFAULT_HISTORY_LIMIT: usize = 50;

const HISTORY_KEY: &str = "history";
const TIME_SAVED_KEY: &str = "timeSaved";
const VIDEOS_SUMMARIZED_KEY: &str = "videosSummarized";

/// Keys that never hold a cache entry.
const RESERVED_KEYS: [&str; 6] = [
    HISTORY_KEY,
    TIME_SAVED_KEY,
    VIDEOS_SUMMARIZED_KEY,
    Settings::API_KEY,
    Settings::SYSTEM_PROMPT,
    Settings::THEME,
];

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Kv(#[from] KvError),

    #[error("Stored value under '{key}' is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("'{0}' is a reserved key and cannot be used as a video id")]
    ReservedKey(String),
}

pub struct SummaryStore {
    kv: Arc<dyn KeyValueStore>,
    write_lock: Mutex<()>,
    history_limit: usize,
}

impl SummaryStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self::with_history_limit(kv, DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_history_limit(kv: Arc<dyn KeyValueStore>, history_limit: usize) -> Self {
        Self {
            kv,
            write_lock: Mutex::new(()),
            history_limit: history_limit.max(1),
        }
    }

    pub fn backend_name(&self) -> &str {
        self.kv.name()
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    // ------------------------------------------------------------------------
    // Cache + history
    // ------------------------------------------------------------------------

    pub async fn get_cached(&self, video_id: &str) -> Result<Option<CacheEntry>, StoreError> {
        if is_reserved(video_id) {
            return Ok(None);
        }
        let mut values = self.kv.get(&[video_id]).await?;
        decode_opt(&mut values, video_id)
    }

    /// Overwrite the cache entry for `video_id` and move its history record to
    /// the front, evicting the oldest record past the limit.
    pub async fn record_summary(
        &self,
        video_id: &str,
        title: &str,
        summary: SummaryResult,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if is_reserved(video_id) {
            return Err(StoreError::ReservedKey(video_id.to_string()));
        }

        let _guard = self.write_lock.lock().await;

        let mut history = self.read_history().await?;
        let entry = CacheEntry {
            summary_data: summary.clone(),
            video_title: title.to_string(),
        };
        let evicted = upsert_history(
            &mut history,
            HistoryRecord {
                video_id: video_id.to_string(),
                title: title.to_string(),
                summary,
                timestamp,
            },
            self.history_limit,
        );

        let batch = WriteBatch::new()
            .set(video_id, encode(&entry)?)
            .set(HISTORY_KEY, encode(&history)?);
        self.kv.write(batch).await?;

        tracing::info!(
            video_id = %video_id,
            history_len = history.len(),
            evicted = evicted.len(),
            "Recorded summary"
        );
        Ok(())
    }

    pub async fn get_history(&self) -> Result<Vec<HistoryRecord>, StoreError> {
        self.read_history().await
    }

    /// Drop every cache entry, the history and the usage counters in one write.
    pub async fn clear_all(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut batch = WriteBatch::new()
            .set(HISTORY_KEY, json!([]))
            .set(TIME_SAVED_KEY, json!(0))
            .set(VIDEOS_SUMMARIZED_KEY, json!(0));
        let mut cleared = 0usize;
        for key in self.kv.keys().await? {
            if !is_reserved(&key) {
                batch = batch.remove(key);
                cleared += 1;
            }
        }
        self.kv.write(batch).await?;

        tracing::info!(cache_entries = cleared, "Cleared cache, history and usage");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Usage
    // ------------------------------------------------------------------------

    /// Count one summarized video of `duration_seconds`. Unknown or zero
    /// durations are ignored.
    pub async fn record_usage(&self, duration_seconds: Option<u64>) -> Result<(), StoreError> {
        let Some(duration) = duration_seconds.filter(|d| *d > 0) else {
            tracing::debug!("Usage not recorded: unknown duration");
            return Ok(());
        };

        let _guard = self.write_lock.lock().await;

        let current = self.read_usage().await?;
        let updated = UsageStats {
            time_saved: current.time_saved.saturating_add(duration),
            videos_summarized: current.videos_summarized.saturating_add(1),
        };

        let batch = WriteBatch::new()
            .set(TIME_SAVED_KEY, json!(updated.time_saved))
            .set(VIDEOS_SUMMARIZED_KEY, json!(updated.videos_summarized));
        self.kv.write(batch).await?;

        tracing::debug!(
            time_saved = updated.time_saved,
            videos_summarized = updated.videos_summarized,
            "Recorded usage"
        );
        Ok(())
    }

    pub async fn get_usage(&self) -> Result<UsageStats, StoreError> {
        self.read_usage().await
    }

    // ------------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------------

    pub async fn get_settings(&self) -> Result<Settings, StoreError> {
        let mut values = self.kv.get(&Settings::KEYS).await?;
        Ok(Settings {
            api_key: decode_opt(&mut values, Settings::API_KEY)?,
            system_prompt: decode_opt(&mut values, Settings::SYSTEM_PROMPT)?,
            theme: decode_opt(&mut values, Settings::THEME)?,
        })
    }

    /// Write the fields present in `update`; absent fields keep their value.
    pub async fn save_settings(&self, update: Settings) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut batch = WriteBatch::new();
        if let Some(key) = update.api_key {
            batch = batch.set(Settings::API_KEY, json!(key.trim()));
        }
        if let Some(prompt) = update.system_prompt {
            batch = batch.set(Settings::SYSTEM_PROMPT, json!(prompt.trim()));
        }
        if let Some(theme) = update.theme {
            batch = batch.set(Settings::THEME, encode(&theme)?);
        }
        self.kv.write(batch).await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    async fn read_history(&self) -> Result<Vec<HistoryRecord>, StoreError> {
        let mut values = self.kv.get(&[HISTORY_KEY]).await?;
        Ok(decode_opt(&mut values, HISTORY_KEY)?.unwrap_or_default())
    }

    async fn read_usage(&self) -> Result<UsageStats, StoreError> {
        let mut values = self.kv.get(&[TIME_SAVED_KEY, VIDEOS_SUMMARIZED_KEY]).await?;
        Ok(UsageStats {
            time_saved: decode_opt(&mut values, TIME_SAVED_KEY)?.unwrap_or(0),
            videos_summarized: decode_opt(&mut values, VIDEOS_SUMMARIZED_KEY)?.unwrap_or(0),
        })
    }
}

/// Insert `record` at the front, dropping any older record for the same video
/// and truncating to `limit`. Returns the records evicted by the cap.
pub fn upsert_history(
    history: &mut Vec<HistoryRecord>,
    record: HistoryRecord,
    limit: usize,
) -> Vec<HistoryRecord> {
    history.retain(|h| h.video_id != record.video_id);
    history.insert(0, record);
    if history.len() > limit {
        history.split_off(limit)
    } else {
        Vec::new()
    }
}

fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Kv(KvError::Serialization(e)))
}

fn decode_opt<T: DeserializeOwned>(
    values: &mut HashMap<String, Value>,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match values.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => serde_json::from_value(v)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                key: key.to_string(),
                source,
            }),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKvStore;
    use crate::models::{Concept, Theme};
    use chrono::TimeZone;

    fn summary(text: &str) -> SummaryResult {
        SummaryResult {
            summary: text.to_string(),
            action_steps: vec![format!("step for {}", text)],
            concepts: vec![Concept {
                title: "Key idea".to_string(),
                timestamp: "1:30".to_string(),
            }],
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn new_store() -> SummaryStore {
        SummaryStore::new(Arc::new(MemoryKvStore::new()))
    }

    #[tokio::test]
    async fn test_empty_store_defaults() {
        let store = new_store();
        assert_eq!(store.get_cached("v1").await.unwrap(), None);
        assert!(store.get_history().await.unwrap().is_empty());
        assert_eq!(store.get_usage().await.unwrap(), UsageStats::default());
        assert_eq!(store.get_settings().await.unwrap(), Settings::default());
    }

    #[tokio::test]
    async fn test_resummarizing_moves_video_to_front() {
        let store = new_store();
        store.record_summary("v1", "T1", summary("S1"), at(1)).await.unwrap();
        store.record_summary("v2", "T2", summary("S2"), at(2)).await.unwrap();
        store.record_summary("v1", "T1", summary("S3"), at(3)).await.unwrap();

        let history = store.get_history().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].video_id, "v1");
        assert_eq!(history[0].summary, summary("S3"));
        assert_eq!(history[0].timestamp, at(3));
        assert_eq!(history[1].video_id, "v2");
        assert_eq!(history[1].summary, summary("S2"));
        assert_eq!(history[1].timestamp, at(2));

        let cached = store.get_cached("v1").await.unwrap().unwrap();
        assert_eq!(cached.summary_data, summary("S3"));
        assert_eq!(cached.video_title, "T1");
    }

    #[tokio::test]
    async fn test_history_capped_at_fifty() {
        let store = new_store();
        for i in 0..51 {
            let id = format!("vid{}", i);
            store.record_summary(&id, "title", summary("s"), at(i)).await.unwrap();
        }

        let history = store.get_history().await.unwrap();
        assert_eq!(history.len(), 50);
        assert_eq!(history[0].video_id, "vid50");
        assert!(history.iter().all(|h| h.video_id != "vid0"));

        // Evicted from history, still cached
        assert!(store.get_cached("vid0").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_custom_history_limit() {
        let store = SummaryStore::with_history_limit(Arc::new(MemoryKvStore::new()), 3);
        for i in 0..5 {
            store
                .record_summary(&format!("v{}", i), "t", summary("s"), at(i))
                .await
                .unwrap();
        }
        let ids: Vec<String> = store
            .get_history()
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.video_id)
            .collect();
        assert_eq!(ids, vec!["v4", "v3", "v2"]);
    }

    #[tokio::test]
    async fn test_reads_are_idempotent() {
        let store = new_store();
        store.record_summary("v1", "T1", summary("S1"), at(1)).await.unwrap();

        assert_eq!(store.get_history().await.unwrap(), store.get_history().await.unwrap());
        assert_eq!(
            store.get_cached("v1").await.unwrap(),
            store.get_cached("v1").await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_record_usage_accumulates() {
        let store = new_store();
        store.record_usage(Some(600)).await.unwrap();
        store.record_usage(Some(1200)).await.unwrap();

        assert_eq!(
            store.get_usage().await.unwrap(),
            UsageStats {
                time_saved: 1800,
                videos_summarized: 2
            }
        );
    }

    #[tokio::test]
    async fn test_record_usage_ignores_unknown_duration() {
        let store = new_store();
        store.record_usage(Some(90)).await.unwrap();
        store.record_usage(None).await.unwrap();
        store.record_usage(Some(0)).await.unwrap();

        let usage = store.get_usage().await.unwrap();
        assert_eq!(usage.time_saved, 90);
        assert_eq!(usage.videos_summarized, 1);
    }

    #[tokio::test]
    async fn test_clear_all_resets_everything_but_settings() {
        let store = new_store();
        store
            .save_settings(Settings {
                api_key: Some("secret".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        store.record_summary("v1", "T1", summary("S1"), at(1)).await.unwrap();
        store.record_summary("v2", "T2", summary("S2"), at(2)).await.unwrap();
        store.record_usage(Some(300)).await.unwrap();

        store.clear_all().await.unwrap();

        assert!(store.get_history().await.unwrap().is_empty());
        assert_eq!(store.get_cached("v1").await.unwrap(), None);
        assert_eq!(store.get_cached("v2").await.unwrap(), None);
        assert_eq!(store.get_usage().await.unwrap(), UsageStats::default());
        assert_eq!(store.get_settings().await.unwrap().api_key(), Some("secret"));
    }

    #[tokio::test]
    async fn test_clear_all_on_empty_store() {
        let store = new_store();
        store.clear_all().await.unwrap();
        assert!(store.get_history().await.unwrap().is_empty());
        assert_eq!(store.get_usage().await.unwrap(), UsageStats::default());
    }

    #[tokio::test]
    async fn test_reserved_video_id_rejected() {
        let store = new_store();
        let err = store
            .record_summary("history", "t", summary("s"), at(0))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ReservedKey(ref k) if k == "history"));
        assert_eq!(store.get_cached("history").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_settings_merges_fields() {
        let store = new_store();
        store
            .save_settings(Settings {
                api_key: Some("  k1  ".to_string()),
                system_prompt: Some("Summarize briefly".to_string()),
                theme: None,
            })
            .await
            .unwrap();
        store
            .save_settings(Settings {
                theme: Some(Theme::Light),
                ..Default::default()
            })
            .await
            .unwrap();

        let settings = store.get_settings().await.unwrap();
        assert_eq!(settings.api_key.as_deref(), Some("k1"));
        assert_eq!(settings.system_prompt(), Some("Summarize briefly"));
        assert_eq!(settings.theme(), Theme::Light);
    }

    #[tokio::test]
    async fn test_corrupt_history_surfaces_error() {
        let kv = Arc::new(MemoryKvStore::new());
        kv.write(WriteBatch::new().set(HISTORY_KEY, json!({"not": "a list"})))
            .await
            .unwrap();
        let store = SummaryStore::new(kv);

        match store.get_history().await {
            Err(StoreError::Corrupt { key, .. }) => assert_eq!(key, "history"),
            other => panic!("Expected Corrupt error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_concurrent_records_for_same_video_never_duplicate() {
        let store = Arc::new(new_store());
        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            let id = if i % 2 == 0 { "same" } else { "other" };
            handles.push(tokio::spawn(async move {
                store
                    .record_summary(id, "t", summary(&format!("S{}", i)), at(i))
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let history = store.get_history().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_ne!(history[0].video_id, history[1].video_id);
    }

    #[test]
    fn test_upsert_history_reports_evictions() {
        let rec = |id: &str| HistoryRecord {
            video_id: id.to_string(),
            title: id.to_string(),
            summary: summary(id),
            timestamp: at(0),
        };
        let mut history = vec![rec("b"), rec("a")];

        let evicted = upsert_history(&mut history, rec("a"), 2);
        assert!(evicted.is_empty());
        assert_eq!(history[0].video_id, "a");
        assert_eq!(history[1].video_id, "b");

        let evicted = upsert_history(&mut history, rec("c"), 2);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].video_id, "b");
        assert_eq!(history.len(), 2);
    }
}
