use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A candidate item exactly as a source adapter produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawItem {
    pub title: String,
    /// Already canonical (absolute, fragment stripped, query per source).
    pub link: String,
    pub raw_date: String,
    pub source: String,
}

/// The persisted news row. `link` is the primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub link: String,
    pub title: String,
    pub source: String,
    pub country: String,
    pub date: String,
    pub collected_at: NaiveDateTime,
    pub analysis_text: Option<String>,
}

impl NewsItem {
    pub fn from_raw(raw: RawItem, country: &str, date: String, collected_at: NaiveDateTime) -> Self {
        Self {
            link: raw.link,
            title: raw.title,
            source: raw.source,
            country: country.to_string(),
            date,
            collected_at,
            analysis_text: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceCount {
    pub source: String,
    pub fetched: usize,
    pub admitted: usize,
    pub inserted: usize,
    /// Items skipped because the store rejected them; retried next run.
    pub store_errors: usize,
    /// The fetch itself failed.
    pub failed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CollectionReport {
    pub sources: Vec<SourceCount>,
}

impl CollectionReport {
    pub fn total_new(&self) -> usize {
        self.sources.iter().map(|s| s.inserted).sum()
    }

    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceCount> {
        self.sources.iter().filter(|s| s.failed)
    }
}
