mod project;
mod section_content;

pub use project::*;
pub use section_content::*;

use chrono::{DateTime, TimeZone, Utc};

pub(crate) fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or_default()
}

pub(crate) fn datetime_to_timestamp(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}
