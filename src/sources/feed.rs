use async_trait::async_trait;
use feed_rs::parser;
use reqwest::Client;
use url::Url;

use crate::config::Origin;
use crate::error::Result;
use crate::models::RawItem;

use super::{canonical_link, get_checked, SourceAdapter};

/// Raw date for entries that carry neither a published nor an updated time.
const UNDATED_ENTRY: &str = "Latest";

/// Reads RSS/Atom feeds. Feeds are already topic-scoped, so these sources
/// are usually configured without a keyword gate.
pub struct FeedAdapter {
    client: Client,
    origin: Origin,
    strip_query: bool,
}

impl FeedAdapter {
    pub fn new(client: Client, origin: Origin, strip_query: bool) -> Self {
        Self {
            client,
            origin,
            strip_query,
        }
    }

    pub fn extract(&self, bytes: &[u8], base: &Url) -> Result<Vec<RawItem>> {
        let feed = parser::parse(bytes)?;

        let items = feed
            .entries
            .into_iter()
            .filter_map(|entry| {
                let href = entry.links.first().map(|l| l.href.as_str())?;
                let Some(link) = canonical_link(href, base, self.strip_query) else {
                    tracing::debug!(source = %self.origin.name, href, "Skipping unusable feed link");
                    return None;
                };

                let title = entry
                    .title
                    .map(|t| t.content.trim().to_string())
                    .filter(|t| !t.is_empty())?;

                let raw_date = entry
                    .published
                    .or(entry.updated)
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_else(|| UNDATED_ENTRY.to_string());

                Some(RawItem {
                    title,
                    link,
                    raw_date,
                    source: self.origin.name.clone(),
                })
            })
            .collect();

        Ok(items)
    }
}

#[async_trait]
impl SourceAdapter for FeedAdapter {
    fn name(&self) -> &str {
        &self.origin.name
    }

    async fn fetch(&self) -> Result<Vec<RawItem>> {
        let response = get_checked(&self.client, &self.origin.url).await?;
        let base = response.url().clone();
        let bytes = response.bytes().await?;

        let items = self.extract(&bytes[..], &base)?;
        tracing::debug!(source = %self.origin.name, count = items.len(), "Parsed feed entries");
        Ok(items)
    }
}
