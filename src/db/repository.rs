use chrono::{Local, NaiveDateTime};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::NewsItem;

use super::schema::{ADD_ANALYSIS_COLUMN, INDEXES, SCHEMA};

const COLLECTED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const NEWS_COLUMNS: &str = "link, title, source, country, date, collected_at, analysis_text";

/// Durable store of harvested news, keyed by canonical link.
///
/// Every method is a single statement on its own autocommit, so nothing is
/// held open while the caller waits on the network.
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;

            let has_analysis: bool = conn
                .prepare("SELECT 1 FROM pragma_table_info('news') WHERE name = 'analysis_text'")?
                .exists([])?;
            if !has_analysis {
                conn.execute(ADD_ANALYSIS_COLUMN, [])?;
            }

            conn.execute_batch(INDEXES)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Deduplication

    pub async fn exists(&self, link: &str) -> Result<bool> {
        let link = link.to_string();
        let exists = self
            .conn
            .call(move |conn| {
                let found = conn
                    .prepare("SELECT 1 FROM news WHERE link = ?1")?
                    .exists(params![link])?;
                Ok(found)
            })
            .await?;
        Ok(exists)
    }

    /// Inserts the item unless its link is already stored. Returns whether a
    /// new row was created; a duplicate is a silent no-op.
    pub async fn insert_if_absent(&self, item: NewsItem) -> Result<bool> {
        let inserted = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"INSERT INTO news (link, title, source, country, date, collected_at, analysis_text)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)
                       ON CONFLICT(link) DO NOTHING"#,
                    params![
                        item.link,
                        item.title,
                        item.source,
                        item.country,
                        item.date,
                        item.collected_at.format(COLLECTED_AT_FORMAT).to_string(),
                    ],
                )?;
                Ok(changed == 1)
            })
            .await?;
        Ok(inserted)
    }

    #[allow(dead_code)]
    pub async fn get(&self, link: &str) -> Result<Option<NewsItem>> {
        let link = link.to_string();
        let item = self
            .conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare(&format!("SELECT {NEWS_COLUMNS} FROM news WHERE link = ?1"))?;
                let item = stmt.query_row(params![link], news_from_row).optional()?;
                Ok(item)
            })
            .await?;
        Ok(item)
    }

    pub async fn count(&self) -> Result<usize> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM news", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    // Analysis

    /// Rows still waiting for analysis, optionally scoped to one country.
    pub async fn pending_analysis(&self, country: Option<&str>) -> Result<Vec<NewsItem>> {
        let country = country.map(str::to_string);
        let items = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    r#"SELECT {NEWS_COLUMNS} FROM news
                       WHERE analysis_text IS NULL AND (?1 IS NULL OR country = ?1)
                       ORDER BY collected_at, link"#
                ))?;
                let items = stmt
                    .query_map(params![country], news_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(items)
            })
            .await?;
        Ok(items)
    }

    /// Writes the analysis for a link. Only a row whose analysis is still null
    /// is touched, so a stored analysis is never overwritten.
    pub async fn save_analysis(&self, link: &str, analysis: &str) -> Result<bool> {
        let link = link.to_string();
        let analysis = analysis.to_string();
        let updated = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE news SET analysis_text = ?1 WHERE link = ?2 AND analysis_text IS NULL",
                    params![analysis, link],
                )?;
                Ok(changed == 1)
            })
            .await?;
        Ok(updated)
    }

    /// Every analyzed row, newest date first.
    pub async fn analyzed_items(&self) -> Result<Vec<NewsItem>> {
        let items = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!(
                    r#"SELECT {NEWS_COLUMNS} FROM news
                       WHERE analysis_text IS NOT NULL
                       ORDER BY date DESC, link"#
                ))?;
                let items = stmt
                    .query_map([], news_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(items)
            })
            .await?;
        Ok(items)
    }
}

/// Current local time truncated to whole seconds, the resolution stored.
pub fn collected_now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    parse_datetime(&now.format(COLLECTED_AT_FORMAT).to_string()).unwrap_or(now)
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, COLLECTED_AT_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

/// Legacy tables left everything but `link` nullable; missing text reads as
/// empty rather than failing the whole query.
fn news_from_row(row: &Row) -> rusqlite::Result<NewsItem> {
    let text = |idx: usize| -> rusqlite::Result<String> {
        Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
    };
    Ok(NewsItem {
        link: row.get(0)?,
        title: text(1)?,
        source: text(2)?,
        country: text(3)?,
        date: text(4)?,
        collected_at: parse_datetime(&text(5)?).unwrap_or_default(),
        analysis_text: row.get(6)?,
    })
}
