//! Analysis of stored news with remote-first, local-fallback providers.
//!
//! Per pending record:
//!
//! ```text
//! PENDING -> primary attempt -> DONE
//!                      \-> fallback attempt -> DONE
//!                                     \-> STILL_PENDING
//! ```
//!
//! A failed primary attempt falls through to the secondary immediately. Only
//! a primary success is followed by the politeness delay, since only the
//! remote provider is rate limited. A record that fails on both, or whose
//! analysis cannot be saved, stays null and is picked up again by the next run.

use std::time::Duration;

use tokio::time::sleep;

use crate::db::Repository;
use crate::error::Result;
use crate::models::{AnalysisReport, NewsItem, ProviderTag, RecordOutcome};

use super::{AnalysisProvider, PromptTemplate};

pub struct AnalysisScheduler<'a> {
    repository: &'a Repository,
    primary: Box<dyn AnalysisProvider>,
    secondary: Box<dyn AnalysisProvider>,
    template: PromptTemplate,
    country: Option<String>,
    politeness_delay: Duration,
}

impl<'a> AnalysisScheduler<'a> {
    pub fn new(
        repository: &'a Repository,
        primary: Box<dyn AnalysisProvider>,
        secondary: Box<dyn AnalysisProvider>,
        template: PromptTemplate,
    ) -> Self {
        Self {
            repository,
            primary,
            secondary,
            template,
            country: None,
            politeness_delay: Duration::ZERO,
        }
    }

    pub fn with_country(mut self, country: Option<String>) -> Self {
        self.country = country;
        self
    }

    pub fn with_politeness_delay(mut self, delay: Duration) -> Self {
        self.politeness_delay = delay;
        self
    }

    /// Analyzes every pending record once. Only failing to list the pending
    /// records is an error; per-record failures leave that record pending.
    pub async fn run(&self) -> Result<AnalysisReport> {
        let pending = self
            .repository
            .pending_analysis(self.country.as_deref())
            .await?;
        let total = pending.len();
        let mut report = AnalysisReport::default();

        if total == 0 {
            tracing::info!(country = ?self.country, "Nothing pending analysis");
            return Ok(report);
        }
        tracing::info!(total, country = ?self.country, "Starting analysis");

        for (index, item) in pending.iter().enumerate() {
            let position = index + 1;
            let Some((analysis, tag)) = self.analyze_record(item, position, total).await else {
                report.outcomes.push(RecordOutcome {
                    link: item.link.clone(),
                    provider: None,
                });
                continue;
            };

            let provider = match self.repository.save_analysis(&item.link, &analysis).await {
                Ok(saved) => {
                    if !saved {
                        tracing::warn!(link = %item.link, "Record was analyzed elsewhere, keeping stored analysis");
                    }
                    tracing::info!(position, total, provider = %tag, link = %item.link, "Record analyzed");
                    Some(tag)
                }
                Err(e) => {
                    tracing::error!(position, total, link = %item.link, error = %e, "Saving analysis failed, leaving record pending");
                    None
                }
            };
            report.outcomes.push(RecordOutcome {
                link: item.link.clone(),
                provider,
            });

            if tag == ProviderTag::Primary && position < total {
                sleep(self.politeness_delay).await;
            }
        }

        tracing::info!(
            primary = report.count(ProviderTag::Primary),
            secondary = report.count(ProviderTag::Secondary),
            still_pending = report.still_pending(),
            "Analysis finished"
        );
        Ok(report)
    }

    async fn analyze_record(
        &self,
        item: &NewsItem,
        position: usize,
        total: usize,
    ) -> Option<(String, ProviderTag)> {
        let prompt = self.template.render(item);

        let (analysis, tag) = match self.primary.analyze(&prompt).await {
            Ok(text) => (text, ProviderTag::Primary),
            Err(primary_err) => {
                tracing::warn!(
                    position,
                    total,
                    link = %item.link,
                    provider = self.primary.name(),
                    error = %primary_err,
                    "Primary provider failed, falling back"
                );
                match self.secondary.analyze(&prompt).await {
                    Ok(text) => (text, ProviderTag::Secondary),
                    Err(secondary_err) => {
                        tracing::error!(
                            position,
                            total,
                            link = %item.link,
                            provider = self.secondary.name(),
                            error = %secondary_err,
                            "All providers failed, leaving record pending"
                        );
                        return None;
                    }
                }
            }
        };

        Some((analysis, tag))
    }
}
