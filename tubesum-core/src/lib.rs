pub mod config;
pub mod db;
pub mod error;
pub mod generator;
pub mod ipc;
pub mod kv;
pub mod models;
pub mod prompt;
pub mod store;

pub use config::TubesumConfig;
pub use error::TubesumError;
pub use generator::{
    GeminiSummaryClient, GenerationRequest, GeneratorConfig, GeneratorError,
    SummaryGenerator,
};
pub use ipc::{ErrorKind, TubesumRequest, TubesumResponse};
pub use kv::{create_backend, KeyValueStore, KvError, MemoryKvStore, PgKvStore, WriteBatch};
pub use models::{
    CacheEntry, Concept, HistoryRecord, Settings, SummaryResult, UsageStats, VideoDetails,
};
pub use store::{StoreError, SummaryStore, DEFAULT_HISTORY_LIMIT};
