use std::path::Path;
use std::time::Duration;

use crate::ai::{AnalysisScheduler, ChatCompletionProvider, LocalProvider, PromptTemplate};
use crate::config::Config;
use crate::db::Repository;
use crate::error::Result;
use crate::models::{AnalysisReport, CollectionReport};
use crate::normalize::DateNormalizer;
use crate::pipeline::CollectionPipeline;
use crate::report;
use crate::sources::build_sources;

/// Config plus the opened store; each CLI command is one method.
pub struct App {
    config: Config,
    repository: Repository,
    normalizer: DateNormalizer,
}

impl App {
    pub async fn new(config: Config) -> Result<Self> {
        let repository = Repository::new(&config.db_path).await?;
        let normalizer = DateNormalizer::new(&config.now_markers);

        Ok(Self {
            config,
            repository,
            normalizer,
        })
    }

    pub async fn collect(&self, include_backfill: bool) -> Result<CollectionReport> {
        let sources = build_sources(&self.config, include_backfill)?;
        tracing::info!(sources = sources.len(), include_backfill, "Starting collection");

        let report = CollectionPipeline::new(&self.repository, &self.normalizer)
            .run(&sources)
            .await;
        tracing::info!(stored = self.repository.count().await?, "Store size");
        Ok(report)
    }

    pub async fn analyze(&self) -> Result<AnalysisReport> {
        let analysis = &self.config.analysis;
        if analysis.primary.api_key.is_none() {
            tracing::warn!("No primary API key configured, every record will use the local provider");
        }

        let primary = Box::new(ChatCompletionProvider::new(&analysis.primary)?);
        let secondary = Box::new(LocalProvider::new(&analysis.secondary)?);

        AnalysisScheduler::new(
            &self.repository,
            primary,
            secondary,
            PromptTemplate::new(analysis.prompt_template.clone()),
        )
        .with_country(analysis.country.clone())
        .with_politeness_delay(Duration::from_millis(analysis.politeness_delay_ms))
        .run()
        .await
    }

    pub async fn write_report(&self, path: &Path) -> Result<usize> {
        report::write_report(&self.repository, path).await
    }
}
