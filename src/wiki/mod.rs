pub mod api;
pub mod dump;

use anyhow::{Result, anyhow};
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// A revision as listed by a source, before its content is fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionMeta {
    pub timestamp: DateTime<Utc>,
    pub source_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Whole calendar years `start_year..=end_year` in `tz`.
    pub fn from_years(start_year: i32, end_year: i32, tz: Tz) -> Result<Self> {
        if start_year > end_year {
            anyhow::bail!("invalid year window: {start_year} is after {end_year}");
        }
        let start = tz
            .with_ymd_and_hms(start_year, 1, 1, 0, 0, 0)
            .earliest()
            .ok_or_else(|| anyhow!("invalid start year {start_year}"))?;
        let end = tz
            .with_ymd_and_hms(end_year, 12, 31, 23, 59, 59)
            .latest()
            .ok_or_else(|| anyhow!("invalid end year {end_year}"))?;
        Ok(Self {
            start: start.with_timezone(&Utc),
            end: end.with_timezone(&Utc),
        })
    }

    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        *ts >= self.start && *ts <= self.end
    }
}

pub fn format_api_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

pub fn parse_api_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Where revisions come from. Implementations may block; `None` content means
/// the revision exists but has nothing usable and should be skipped.
pub trait RevisionSource {
    fn describe(&self) -> String;
    fn list_revisions(&self, page: &str, window: &TimeWindow) -> Result<Vec<RevisionMeta>>;
    fn fetch_content(&self, source_id: &str) -> Result<Option<String>>;
}

impl<S: RevisionSource + ?Sized> RevisionSource for Box<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn list_revisions(&self, page: &str, window: &TimeWindow) -> Result<Vec<RevisionMeta>> {
        (**self).list_revisions(page, window)
    }

    fn fetch_content(&self, source_id: &str) -> Result<Option<String>> {
        (**self).fetch_content(source_id)
    }
}
