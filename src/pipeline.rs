use crate::db::{collected_now, Repository};
use crate::models::{CollectionReport, NewsItem, SourceCount};
use crate::normalize::DateNormalizer;
use crate::sources::ConfiguredSource;

/// Adapter -> keyword gate -> date normalization -> store, one source at a
/// time. A failing source contributes nothing and never stops the others.
pub struct CollectionPipeline<'a> {
    repository: &'a Repository,
    normalizer: &'a DateNormalizer,
}

impl<'a> CollectionPipeline<'a> {
    pub fn new(repository: &'a Repository, normalizer: &'a DateNormalizer) -> Self {
        Self {
            repository,
            normalizer,
        }
    }

    /// Never fails as a whole. A store error skips that one item, which is
    /// picked up again by the next run.
    pub async fn run(&self, sources: &[ConfiguredSource]) -> CollectionReport {
        let mut report = CollectionReport::default();

        for source in sources {
            let count = self.collect_source(source).await;
            tracing::info!(
                source = %count.source,
                fetched = count.fetched,
                admitted = count.admitted,
                inserted = count.inserted,
                store_errors = count.store_errors,
                "Source collected"
            );
            report.sources.push(count);
        }

        tracing::info!(total_new = report.total_new(), "Collection finished");
        report
    }

    async fn collect_source(&self, source: &ConfiguredSource) -> SourceCount {
        let mut count = SourceCount {
            source: source.name.clone(),
            ..SourceCount::default()
        };

        let candidates = match source.adapter.fetch().await {
            Ok(items) => items,
            Err(e) => {
                tracing::error!(
                    source = %source.name,
                    adapter = source.adapter.name(),
                    error = %e,
                    "Fetch failed"
                );
                count.failed = true;
                return count;
            }
        };
        count.fetched = candidates.len();

        for raw in candidates {
            if let Some(filter) = &source.filter {
                if !filter.admit(&raw.title) {
                    continue;
                }
            }
            count.admitted += 1;

            match self.repository.exists(&raw.link).await {
                Ok(true) => {
                    tracing::trace!(link = %raw.link, "Already stored");
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(source = %source.name, link = %raw.link, error = %e, "Lookup failed, skipping item");
                    count.store_errors += 1;
                    continue;
                }
            }

            let date = self.normalizer.normalize(&raw.raw_date, source.year_hint);
            let item = NewsItem::from_raw(raw, &source.country, date, collected_now());
            let link = item.link.clone();

            match self.repository.insert_if_absent(item).await {
                Ok(true) => {
                    tracing::debug!(source = %source.name, %link, "Stored new item");
                    count.inserted += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(source = %source.name, %link, error = %e, "Insert failed, skipping item");
                    count.store_errors += 1;
                }
            }
        }

        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::{AppError, Result};
    use crate::models::RawItem;
    use crate::normalize::KeywordFilter;
    use crate::sources::{build_sources, SourceAdapter};
    use async_trait::async_trait;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StaticAdapter {
        name: String,
        items: Vec<RawItem>,
    }

    #[async_trait]
    impl SourceAdapter for StaticAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        async fn fetch(&self) -> Result<Vec<RawItem>> {
            Ok(self.items.clone())
        }
    }

    struct FailingAdapter;

    #[async_trait]
    impl SourceAdapter for FailingAdapter {
        fn name(&self) -> &str {
            "Broken"
        }

        async fn fetch(&self) -> Result<Vec<RawItem>> {
            Err(AppError::FetchStatus {
                url: "https://broken.example".to_string(),
                status: 500,
            })
        }
    }

    fn raw(source: &str, title: &str, link: &str, date: &str) -> RawItem {
        RawItem {
            title: title.to_string(),
            link: link.to_string(),
            raw_date: date.to_string(),
            source: source.to_string(),
        }
    }

    fn source(name: &str, items: Vec<RawItem>) -> ConfiguredSource {
        ConfiguredSource {
            name: name.to_string(),
            country: "Japan".to_string(),
            filter: None,
            year_hint: None,
            adapter: Box::new(StaticAdapter {
                name: name.to_string(),
                items,
            }),
        }
    }

    async fn setup() -> (TempDir, Repository, DateNormalizer) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("news.db");
        let repo = Repository::new(path.to_str().unwrap()).await.unwrap();
        let normalizer = DateNormalizer::new(&["today".to_string(), "latest".to_string()]);
        (dir, repo, normalizer)
    }

    #[tokio::test]
    async fn same_link_from_two_sources_is_stored_once_for_the_first() {
        let (_dir, repo, normalizer) = setup().await;
        let shared = "https://news.example/boj-decision";
        let sources = vec![
            source("Jiji", vec![raw("Jiji", "BOJ holds", shared, "2024-03-19")]),
            source("Reuters", vec![raw("Reuters", "BOJ holds rates", shared, "2024-03-20")]),
        ];

        let report = CollectionPipeline::new(&repo, &normalizer)
            .run(&sources)
            .await;

        assert_eq!(report.total_new(), 1);
        assert_eq!(report.sources[0].inserted, 1);
        assert_eq!(report.sources[1].inserted, 0);
        assert_eq!(repo.count().await.unwrap(), 1);
        let stored = repo.get(shared).await.unwrap().unwrap();
        assert_eq!(stored.source, "Jiji");
        assert_eq!(stored.date, "2024-03-19");
    }

    #[tokio::test]
    async fn rerunning_is_idempotent() {
        let (_dir, repo, normalizer) = setup().await;
        let sources = vec![source(
            "Yahoo",
            vec![
                raw("Yahoo", "a", "https://y.example/a", "Tue, 19 Mar 2024 07:15:00 +0000"),
                raw("Yahoo", "b", "https://y.example/b", "Today"),
            ],
        )];
        let pipeline = CollectionPipeline::new(&repo, &normalizer);

        assert_eq!(pipeline.run(&sources).await.total_new(), 2);
        assert_eq!(pipeline.run(&sources).await.total_new(), 0);
        assert_eq!(repo.count().await.unwrap(), 2);

        let stored = repo.get("https://y.example/a").await.unwrap().unwrap();
        assert_eq!(stored.date, "2024-03-19 07:15:00");
    }

    #[tokio::test]
    async fn failing_source_does_not_stop_siblings() {
        let (_dir, repo, normalizer) = setup().await;
        let sources = vec![
            ConfiguredSource {
                name: "Broken".to_string(),
                country: "Japan".to_string(),
                filter: None,
                year_hint: None,
                adapter: Box::new(FailingAdapter),
            },
            source("Jiji", vec![raw("Jiji", "t", "https://j.example/1", "Today")]),
        ];

        let report = CollectionPipeline::new(&repo, &normalizer)
            .run(&sources)
            .await;

        assert!(report.sources[0].failed);
        assert_eq!(report.sources[0].inserted, 0);
        assert_eq!(report.failed_sources().count(), 1);
        assert_eq!(report.total_new(), 1);
    }

    #[tokio::test]
    async fn keyword_gate_applies_only_to_filtered_sources() {
        let (_dir, repo, normalizer) = setup().await;
        let filter = KeywordFilter::new(vec!["日銀".to_string()], 15);
        let mut filtered = source(
            "Jiji",
            vec![
                raw("Jiji", "日銀、追加利上げを決定 長期金利が上昇", "https://j.example/hit", "Today"),
                raw("Jiji", "プロ野球の開幕戦、東京で大盛況となる", "https://j.example/miss", "Today"),
                raw("Jiji", "日銀会見", "https://j.example/short", "Today"),
            ],
        );
        filtered.filter = Some(filter);
        let unrestricted = source(
            "Yahoo",
            vec![raw("Yahoo", "x", "https://y.example/any", "Today")],
        );

        let report = CollectionPipeline::new(&repo, &normalizer)
            .run(&[filtered, unrestricted])
            .await;

        assert_eq!(report.sources[0].fetched, 3);
        assert_eq!(report.sources[0].admitted, 1);
        assert_eq!(report.sources[1].admitted, 1);
        assert!(repo.exists("https://j.example/hit").await.unwrap());
        assert!(!repo.exists("https://j.example/miss").await.unwrap());
        assert!(!repo.exists("https://j.example/short").await.unwrap());
        assert!(repo.exists("https://y.example/any").await.unwrap());
    }

    #[tokio::test]
    async fn year_hint_reaches_the_normalizer() {
        let (_dir, repo, normalizer) = setup().await;
        let mut backfill = source(
            "BOJ_2022",
            vec![
                raw("BOJ_2022", "講演", "https://boj.example/1", "07/03"),
                raw("BOJ_2022", "講演", "https://boj.example/2", "2022-XX"),
            ],
        );
        backfill.year_hint = Some(2022);

        CollectionPipeline::new(&repo, &normalizer)
            .run(&[backfill])
            .await;

        let first = repo.get("https://boj.example/1").await.unwrap().unwrap();
        assert_eq!(first.date, "2022-07-03");
        let second = repo.get("https://boj.example/2").await.unwrap().unwrap();
        assert_eq!(second.date, "2022-01-01");
    }

    #[tokio::test]
    async fn store_error_skips_only_that_item() {
        let (dir, repo, normalizer) = setup().await;
        rusqlite::Connection::open(dir.path().join("news.db"))
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_blocked BEFORE INSERT ON news
                 WHEN NEW.link LIKE '%blocked%'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let sources = vec![
            source(
                "Jiji",
                vec![
                    raw("Jiji", "a", "https://j.example/blocked", "Today"),
                    raw("Jiji", "b", "https://j.example/ok", "Today"),
                ],
            ),
            source("Reuters", vec![raw("Reuters", "c", "https://r.example/1", "Today")]),
        ];

        let report = CollectionPipeline::new(&repo, &normalizer).run(&sources).await;

        assert_eq!(report.sources[0].store_errors, 1);
        assert_eq!(report.sources[0].inserted, 1);
        assert!(!report.sources[0].failed);
        assert_eq!(report.sources[1].inserted, 1);
        assert!(!repo.exists("https://j.example/blocked").await.unwrap());
        assert!(repo.exists("https://j.example/ok").await.unwrap());
        assert!(repo.exists("https://r.example/1").await.unwrap());
    }

    #[tokio::test]
    async fn jiji_articles_with_query_ids_become_separate_rows() {
        let server = MockServer::start().await;
        let page = r#"<ul>
  <li><a href="/jc/article?k=2024031900123&amp;g=eco">日銀、追加利上げを決定 長期金利が上昇</a></li>
  <li><a href="/jc/article?k=2024031900456&amp;g=eco">財務省、為替介入の実績を公表 円安けん制</a></li>
</ul>"#;
        Mock::given(method("GET"))
            .and(path("/jc/c"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(page, "text/html; charset=utf-8"))
            .mount(&server)
            .await;

        let mut config = Config::default();
        config.sources.retain(|s| s.name == "Jiji");
        config.sources[0].url = format!("{}/jc/c?g=eco", server.uri());
        let sources = build_sources(&config, false).unwrap();

        let (_dir, repo, normalizer) = setup().await;
        let report = CollectionPipeline::new(&repo, &normalizer).run(&sources).await;

        assert_eq!(report.total_new(), 2);
        assert_eq!(repo.count().await.unwrap(), 2);
        assert!(repo
            .exists(&format!("{}/jc/article?k=2024031900456&g=eco", server.uri()))
            .await
            .unwrap());
    }
}
