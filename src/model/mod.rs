//! Typed data model shared by every component (§3).

mod chunk;
mod day_index;
mod gap;
mod options;
mod sid;
mod time;

pub use chunk::{blob_name, ChunkMeta, ChunkStats, Tier};
pub use day_index::{DayIndex, Tiers};
pub use gap::Gap;
pub use options::RequestOptions;
pub use sid::{format_sample_rate, StationId, NO_LOCATION};
pub use time::{is_whole_second, split_by_day, time_of_day, Day};
