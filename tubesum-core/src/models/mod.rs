mod cache;
mod history;
mod settings;
mod summary;
mod usage;
mod video;

pub use cache::CacheEntry;
pub use history::HistoryRecord;
pub use settings::{Settings, Theme};
pub use summary::{Concept, SummaryResult, SummaryValidationError};
pub use usage::UsageStats;
pub use video::{clean_title, extract_video_id, format_duration, VideoDetails};
