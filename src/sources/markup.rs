use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::{Origin, SourceConfig};
use crate::error::{AppError, Result};
use crate::models::RawItem;

use super::{canonical_link, get_checked, SourceAdapter};

/// Scrapes headline links out of an HTML page.
///
/// Every anchor matching `link_selector` is a candidate. Anchors whose href
/// contains none of `href_patterns` (when any are configured) or whose text is
/// not longer than `min_link_text` are skipped. With `date_from_row`, the
/// text of the first cell of the enclosing table row becomes the raw date.
pub struct MarkupAdapter {
    client: Client,
    origin: Origin,
    link_selector: Selector,
    cell_selector: Selector,
    href_patterns: Vec<String>,
    min_link_text: usize,
    date_from_row: bool,
    strip_query: bool,
}

impl MarkupAdapter {
    pub fn new(client: Client, origin: Origin, source: &SourceConfig) -> Result<Self> {
        Ok(Self {
            client,
            origin,
            link_selector: parse_selector(&source.link_selector)?,
            cell_selector: parse_selector("td")?,
            href_patterns: source.href_patterns.clone(),
            min_link_text: source.min_link_text,
            date_from_row: source.date_from_row,
            strip_query: source.strips_query(),
        })
    }

    pub fn extract(&self, html: &str, base: &Url) -> Vec<RawItem> {
        let document = Html::parse_document(html);
        let mut items = Vec::new();

        for anchor in document.select(&self.link_selector) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if !self.href_patterns.is_empty()
                && !self.href_patterns.iter().any(|p| href.contains(p.as_str()))
            {
                continue;
            }

            let title = collapse_whitespace(&anchor.text().collect::<String>());
            if title.is_empty() || title.chars().count() <= self.min_link_text {
                continue;
            }

            let Some(link) = canonical_link(href, base, self.strip_query) else {
                tracing::debug!(source = %self.origin.name, href, "Skipping unusable link");
                continue;
            };

            let raw_date = self
                .date_from_row
                .then(|| self.row_date_cell(anchor))
                .flatten()
                .unwrap_or_else(|| self.origin.date_placeholder.clone());

            items.push(RawItem {
                title,
                link,
                raw_date,
                source: self.origin.name.clone(),
            });
        }

        items
    }

    fn row_date_cell(&self, anchor: ElementRef<'_>) -> Option<String> {
        let row = anchor
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "tr")?;
        let cell = row.select(&self.cell_selector).next()?;
        let text = collapse_whitespace(&cell.text().collect::<String>());
        (!text.is_empty()).then_some(text)
    }
}

#[async_trait]
impl SourceAdapter for MarkupAdapter {
    fn name(&self) -> &str {
        &self.origin.name
    }

    async fn fetch(&self) -> Result<Vec<RawItem>> {
        let response = get_checked(&self.client, &self.origin.url).await?;
        let base = response.url().clone();
        let html = response.text().await?;

        let items = self.extract(&html, &base);
        tracing::debug!(source = %self.origin.name, count = items.len(), "Extracted page links");
        Ok(items)
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| AppError::Selector(format!("{selector}: {e}")))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, SourceKind};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BOJ_PAGE: &str = r#"
<html><body>
<table>
  <tr><td>2024年3月19日</td><td><a href="/about/press/koen_2024/ko240319a.htm?lang=ja">植田総裁講演「最近の金融経済情勢と金融政策運営」</a></td></tr>
  <tr><td>最新</td><td><a href="/about/press/koen_2024/ko240301a.htm">内田副総裁講演「わが国の経済・物価情勢と金融政策」</a></td></tr>
  <tr><td>2024年2月8日</td><td><a href="/about/press/kaiken_2024/ka240208.htm">記者会見要旨のお知らせとご案内について</a></td></tr>
</table>
<ul><li><a href="/about/press/koen_2024/ko240115a.htm">挨拶（金融経済懇談会）における説明</a></li></ul>
<a href="/about/press/koen_2024/">短い</a>
<a href="javascript:void(0)" class="koen">講演資料の一覧をすべて表示する</a>
</body></html>
"#;

    fn boj_source() -> SourceConfig {
        SourceConfig {
            name: "BOJ_{year}".to_string(),
            kind: SourceKind::Markup,
            url: "https://www.boj.or.jp/about/press/koen_{year}/index.htm".to_string(),
            country: "Japan".to_string(),
            keywords: None,
            min_title_length: 0,
            years: vec![2024],
            link_selector: "a[href]".to_string(),
            href_patterns: vec!["/ko".to_string(), "koen".to_string()],
            min_link_text: 10,
            date_from_row: true,
            date_placeholder: "{year}-XX".to_string(),
            strip_query: None,
        }
    }

    fn adapter_for(source: &SourceConfig) -> MarkupAdapter {
        let origin = source.origins().remove(0);
        let client = crate::sources::http_client("test-agent", Duration::from_secs(5)).unwrap();
        MarkupAdapter::new(client, origin, source).unwrap()
    }

    #[test]
    fn extracts_links_with_row_dates_and_placeholders() {
        let adapter = adapter_for(&boj_source());
        let base = Url::parse("https://www.boj.or.jp/about/press/koen_2024/index.htm").unwrap();

        let items = adapter.extract(BOJ_PAGE, &base);
        assert_eq!(items.len(), 3);

        assert_eq!(
            items[0].link,
            "https://www.boj.or.jp/about/press/koen_2024/ko240319a.htm?lang=ja"
        );
        assert_eq!(items[0].raw_date, "2024年3月19日");
        assert_eq!(items[0].source, "BOJ_2024");

        // "latest" cells are kept and resolved later
        assert_eq!(items[1].raw_date, "最新");

        // not inside a table row
        assert_eq!(items[2].raw_date, "2024-XX");
        assert_eq!(items[2].title, "挨拶（金融経済懇談会）における説明");
    }

    #[test]
    fn without_row_dates_the_placeholder_is_used() {
        let source = SourceConfig {
            date_from_row: false,
            ..boj_source()
        };
        let adapter = adapter_for(&source);
        let base = Url::parse("https://www.boj.or.jp/").unwrap();

        let items = adapter.extract(BOJ_PAGE, &base);
        assert!(items.iter().all(|i| i.raw_date == "2024-XX"));
    }

    #[test]
    fn query_stripping_is_opt_in_for_pages() {
        let source = SourceConfig {
            strip_query: Some(true),
            ..boj_source()
        };
        let adapter = adapter_for(&source);
        let base = Url::parse("https://www.boj.or.jp/").unwrap();

        let items = adapter.extract(BOJ_PAGE, &base);
        assert_eq!(items[0].link, "https://www.boj.or.jp/about/press/koen_2024/ko240319a.htm");
    }

    #[test]
    fn jiji_articles_keyed_by_query_stay_distinct() {
        let page = r#"<ul>
  <li><a href="/jc/article?k=2024031900123&amp;g=eco">日銀、追加利上げを決定 長期金利が上昇</a></li>
  <li><a href="/jc/article?k=2024031900456&amp;g=eco">財務省、為替介入の実績を公表 円安けん制</a></li>
</ul>"#;
        let jiji = Config::default()
            .sources
            .into_iter()
            .find(|s| s.name == "Jiji")
            .unwrap();
        let adapter = adapter_for(&jiji);
        let base = Url::parse("https://www.jiji.com/jc/c?g=eco").unwrap();

        let links: Vec<_> = adapter.extract(page, &base).into_iter().map(|i| i.link).collect();
        assert_eq!(
            links,
            vec![
                "https://www.jiji.com/jc/article?k=2024031900123&g=eco",
                "https://www.jiji.com/jc/article?k=2024031900456&g=eco",
            ]
        );
    }

    #[test]
    fn invalid_selector_is_a_config_error() {
        let source = SourceConfig {
            link_selector: "a[[".to_string(),
            ..boj_source()
        };
        let origin = source.origins().remove(0);
        let client = crate::sources::http_client("test-agent", Duration::from_secs(5)).unwrap();
        assert!(matches!(
            MarkupAdapter::new(client, origin, &source),
            Err(AppError::Selector(_))
        ));
    }

    #[tokio::test]
    async fn fetch_resolves_links_against_the_served_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/about/press/koen_2024/index.htm"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(BOJ_PAGE, "text/html; charset=utf-8"))
            .mount(&server)
            .await;

        let source = SourceConfig {
            url: format!("{}/about/press/koen_{{year}}/index.htm", server.uri()),
            ..boj_source()
        };
        let adapter = adapter_for(&source);

        let items = adapter.fetch().await.unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(
            items[0].link,
            format!("{}/about/press/koen_2024/ko240319a.htm?lang=ja", server.uri())
        );
    }

    #[tokio::test]
    async fn non_success_status_is_a_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = SourceConfig {
            url: format!("{}/about/press/koen_{{year}}/index.htm", server.uri()),
            ..boj_source()
        };
        let adapter = adapter_for(&source);

        assert!(matches!(
            adapter.fetch().await,
            Err(AppError::FetchStatus { status: 503, .. })
        ));
    }
}
