//! Source adapters: one per origin, each turning an external page or feed into
//! raw candidate items. Which adapter runs, and how its output is gated, is
//! entirely driven by [`SourceConfig`].

mod feed;
mod link;
mod markup;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::{Config, Origin, SourceConfig, SourceKind};
use crate::error::{AppError, Result};
use crate::models::RawItem;
use crate::normalize::KeywordFilter;

pub use feed::FeedAdapter;
pub use link::canonical_link;
pub use markup::MarkupAdapter;

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Origin identifier stamped on every item this adapter emits.
    fn name(&self) -> &str;

    /// Fetches and extracts the current candidates. Malformed individual
    /// candidates are skipped; network and payload failures are errors.
    async fn fetch(&self) -> Result<Vec<RawItem>>;
}

/// An adapter plus the policy the pipeline applies to its output.
pub struct ConfiguredSource {
    pub name: String,
    pub country: String,
    /// `None` for unrestricted sources, which admit every candidate.
    pub filter: Option<KeywordFilter>,
    /// Set for historical backfill origins.
    pub year_hint: Option<i32>,
    pub adapter: Box<dyn SourceAdapter>,
}

pub fn http_client(user_agent: &str, timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10).min(timeout))
        .user_agent(user_agent)
        .build()?;
    Ok(client)
}

/// Builds every configured origin in config order. Backfill sources are only
/// included when `include_backfill` is set.
pub fn build_sources(config: &Config, include_backfill: bool) -> Result<Vec<ConfiguredSource>> {
    let client = http_client(&config.user_agent, config.fetch_timeout())?;
    let mut sources = Vec::new();

    for source in &config.sources {
        if source.is_backfill() && !include_backfill {
            continue;
        }

        let filter = match &source.keywords {
            Some(locale) => {
                let keywords = config.keyword_sets.get(locale).ok_or_else(|| {
                    AppError::Config(format!("unknown keyword set {locale:?} for {}", source.name))
                })?;
                Some(KeywordFilter::new(keywords.clone(), source.min_title_length))
            }
            None => None,
        };

        for origin in source.origins() {
            let adapter = build_adapter(client.clone(), source, &origin)?;
            sources.push(ConfiguredSource {
                name: origin.name.clone(),
                country: source.country.clone(),
                filter: filter.clone(),
                year_hint: origin.year,
                adapter,
            });
        }
    }

    Ok(sources)
}

fn build_adapter(
    client: Client,
    source: &SourceConfig,
    origin: &Origin,
) -> Result<Box<dyn SourceAdapter>> {
    let adapter: Box<dyn SourceAdapter> = match source.kind {
        SourceKind::Markup => Box::new(MarkupAdapter::new(client, origin.clone(), source)?),
        SourceKind::Feed => Box::new(FeedAdapter::new(
            client,
            origin.clone(),
            source.strips_query(),
        )),
    };
    Ok(adapter)
}

async fn get_checked(client: &Client, url: &str) -> Result<reqwest::Response> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(AppError::FetchStatus {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }
    Ok(response)
}
