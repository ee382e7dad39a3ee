use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{AppError, Result};

const API_KEY_ENV: &str = "GROQ_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Raw date text containing any of these (case-insensitive) means "now".
    #[serde(default = "default_now_markers")]
    pub now_markers: Vec<String>,

    /// Locale key -> keywords used by keyword-filtered sources.
    #[serde(default = "default_keyword_sets")]
    pub keyword_sets: BTreeMap<String, Vec<String>>,

    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,

    #[serde(default)]
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Markup,
    Feed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// May contain `{year}` for backfill sources.
    pub name: String,
    pub kind: SourceKind,
    /// May contain `{year}` for backfill sources.
    pub url: String,
    #[serde(default = "default_country")]
    pub country: String,

    /// Locale key into `keyword_sets`. Absent means the source is unrestricted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(default)]
    pub min_title_length: usize,

    /// Historical years to backfill. Empty for a regular source.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub years: Vec<i32>,

    #[serde(default = "default_link_selector")]
    pub link_selector: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub href_patterns: Vec<String>,
    #[serde(default)]
    pub min_link_text: usize,
    #[serde(default)]
    pub date_from_row: bool,
    /// Raw date used when no date cell is found. `{year}` expands.
    #[serde(default = "default_date_placeholder")]
    pub date_placeholder: String,

    /// Drop the query string from links. Defaults to on for feeds and off for
    /// markup pages, where the query often carries the article id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strip_query: Option<bool>,
}

/// One concrete fetch target produced from a [`SourceConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub name: String,
    pub url: String,
    pub year: Option<i32>,
    pub date_placeholder: String,
}

impl SourceConfig {
    pub fn is_backfill(&self) -> bool {
        !self.years.is_empty()
    }

    pub fn strips_query(&self) -> bool {
        self.strip_query.unwrap_or(self.kind == SourceKind::Feed)
    }

    pub fn origins(&self) -> Vec<Origin> {
        if self.years.is_empty() {
            return vec![Origin {
                name: self.name.clone(),
                url: self.url.clone(),
                year: None,
                date_placeholder: self.date_placeholder.clone(),
            }];
        }

        self.years
            .iter()
            .map(|year| {
                let year_text = year.to_string();
                Origin {
                    name: self.name.replace("{year}", &year_text),
                    url: self.url.replace("{year}", &year_text),
                    year: Some(*year),
                    date_placeholder: self.date_placeholder.replace("{year}", &year_text),
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Only pending rows from this country are analyzed. `"*"` (or an empty
    /// string) in the file means every country.
    #[serde(
        default = "default_analysis_country",
        deserialize_with = "deserialize_country",
        serialize_with = "serialize_country"
    )]
    pub country: Option<String>,

    #[serde(default = "default_politeness_delay")]
    pub politeness_delay_ms: u64,

    /// `{title}` and `{source}` are substituted per record.
    #[serde(default = "default_prompt_template")]
    pub prompt_template: String,

    #[serde(default)]
    pub primary: PrimaryProviderConfig,

    #[serde(default)]
    pub secondary: SecondaryProviderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryProviderConfig {
    #[serde(default = "default_primary_url")]
    pub api_url: String,
    pub api_key: Option<String>,
    #[serde(default = "default_primary_model")]
    pub model: String,
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecondaryProviderConfig {
    #[serde(default = "default_secondary_url")]
    pub url: String,
    #[serde(default = "default_secondary_model")]
    pub model: String,
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("macro-scout");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir
        .join("macro_intelligence.db")
        .to_string_lossy()
        .to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_fetch_timeout() -> u64 {
    15
}

fn default_now_markers() -> Vec<String> {
    ["today", "recent", "latest", "最新", "本日", "今日", "오늘", "최신"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_keyword_sets() -> BTreeMap<String, Vec<String>> {
    let ja = [
        // institutions and policy
        "日銀", "財務省", "金融政策", "金利", "為替", "物価", "円", "介入", "決定会合", "緩和", "出口",
        // officials
        "総裁", "副総裁", "審議委員", "財務相", "財務官", "首相", "閣僚",
        // indicators
        "GDP", "CPI", "短観", "貿易収支", "失業率", "賃金", "実質賃金", "家計調査", "機械受注",
        "景気動向指数",
        // actions
        "利上げ", "利下げ", "据え置き", "修正", "点検", "当面", "踏み込む",
    ];

    BTreeMap::from([(
        "ja".to_string(),
        ja.iter().map(|s| s.to_string()).collect(),
    )])
}

fn default_country() -> String {
    "Japan".to_string()
}

fn default_link_selector() -> String {
    "a[href]".to_string()
}

fn default_date_placeholder() -> String {
    "Latest".to_string()
}

fn default_sources() -> Vec<SourceConfig> {
    let markup = |name: &str, url: &str| SourceConfig {
        name: name.to_string(),
        kind: SourceKind::Markup,
        url: url.to_string(),
        country: default_country(),
        keywords: None,
        min_title_length: 0,
        years: Vec::new(),
        link_selector: default_link_selector(),
        href_patterns: Vec::new(),
        min_link_text: 0,
        date_from_row: false,
        date_placeholder: default_date_placeholder(),
        strip_query: None,
    };
    let boj_patterns = vec!["/ko".to_string(), "koen".to_string()];

    vec![
        SourceConfig {
            href_patterns: boj_patterns.clone(),
            min_link_text: 10,
            date_from_row: true,
            ..markup("BOJ_Latest", "https://www.boj.or.jp/about/press/index.htm")
        },
        SourceConfig {
            href_patterns: boj_patterns,
            min_link_text: 10,
            date_from_row: true,
            years: (2021..=2025).collect(),
            date_placeholder: "{year}-XX".to_string(),
            ..markup("BOJ_{year}", "https://www.boj.or.jp/about/press/koen_{year}/index.htm")
        },
        SourceConfig {
            keywords: Some("ja".to_string()),
            min_title_length: 15,
            date_placeholder: "Today".to_string(),
            ..markup("Jiji", "https://www.jiji.com/jc/c?g=eco")
        },
        SourceConfig {
            keywords: Some("ja".to_string()),
            min_title_length: 15,
            date_placeholder: "Today".to_string(),
            ..markup("Reuters", "https://jp.reuters.com/markets/japan/")
        },
        SourceConfig {
            kind: SourceKind::Feed,
            country: "Global".to_string(),
            ..markup("Yahoo_Finance", "https://finance.yahoo.com/news/rssindex")
        },
        SourceConfig {
            kind: SourceKind::Feed,
            country: "Global".to_string(),
            ..markup("Yahoo_Stocks", "https://finance.yahoo.com/rss/stocks")
        },
    ]
}

fn default_analysis_country() -> Option<String> {
    Some(default_country())
}

const ALL_COUNTRIES: &str = "*";

fn deserialize_country<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let country = String::deserialize(deserializer)?;
    let country = country.trim();
    Ok((!country.is_empty() && country != ALL_COUNTRIES).then(|| country.to_string()))
}

fn serialize_country<S>(country: &Option<String>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(country.as_deref().unwrap_or(ALL_COUNTRIES))
}

fn default_politeness_delay() -> u64 {
    1500
}

fn default_prompt_template() -> String {
    r#"You are a global macro analyst with twenty years of hedge fund experience.
Analyze the following economic headline and report an investment view.

Headline: {title}
Source: {source}

Answer with:
1. [Translation]: the headline translated into clear English.
2. [Analysis]: background, link to current market conditions and hidden implications, at least three sentences.
3. [Strategic implications]: concrete effects on financial markets.
4. [Further research]: indicators or events to watch next."#
        .to_string()
}

fn default_primary_url() -> String {
    "https://api.groq.com/openai/v1/chat/completions".to_string()
}

fn default_primary_model() -> String {
    "groq/compound".to_string()
}

fn default_secondary_url() -> String {
    "http://localhost:11434/api/generate".to_string()
}

fn default_secondary_model() -> String {
    "qwen2.5:14b".to_string()
}

fn default_provider_timeout() -> u64 {
    60
}

impl Default for PrimaryProviderConfig {
    fn default() -> Self {
        Self {
            api_url: default_primary_url(),
            api_key: None,
            model: default_primary_model(),
            timeout_secs: default_provider_timeout(),
        }
    }
}

impl Default for SecondaryProviderConfig {
    fn default() -> Self {
        Self {
            url: default_secondary_url(),
            model: default_secondary_model(),
            timeout_secs: default_provider_timeout(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            country: default_analysis_country(),
            politeness_delay_ms: default_politeness_delay(),
            prompt_template: default_prompt_template(),
            primary: PrimaryProviderConfig::default(),
            secondary: SecondaryProviderConfig::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            fetch_timeout_secs: default_fetch_timeout(),
            now_markers: default_now_markers(),
            keyword_sets: default_keyword_sets(),
            sources: default_sources(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl Config {
    /// Loads the config file, writing the defaults there first if it does not
    /// exist yet. The primary API key falls back to `GROQ_API_KEY`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Config>(&content)?
        } else {
            let config = Config::default();
            config.save(&config_path)?;
            tracing::info!(path = %config_path.display(), "Wrote default configuration");
            config
        };

        if config.analysis.primary.api_key.is_none() {
            config.analysis.primary.api_key = std::env::var(API_KEY_ENV)
                .ok()
                .filter(|key| !key.trim().is_empty());
        }

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("macro-scout")
            .join("config.toml")
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        for source in &self.sources {
            if let Some(locale) = &source.keywords {
                if !self.keyword_sets.contains_key(locale) {
                    return Err(AppError::Config(format!(
                        "source {} references unknown keyword set {locale:?}",
                        source.name
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backfill_source_expands_per_year() {
        let source = default_sources()
            .into_iter()
            .find(|s| s.is_backfill())
            .unwrap();

        let origins = source.origins();
        assert_eq!(origins.len(), 5);
        assert_eq!(
            origins[0],
            Origin {
                name: "BOJ_2021".to_string(),
                url: "https://www.boj.or.jp/about/press/koen_2021/index.htm".to_string(),
                year: Some(2021),
                date_placeholder: "2021-XX".to_string(),
            }
        );
    }

    #[test]
    fn regular_source_has_single_origin_without_year() {
        let source = default_sources()
            .into_iter()
            .find(|s| s.name == "Jiji")
            .unwrap();
        let origins = source.origins();
        assert_eq!(origins.len(), 1);
        assert_eq!(origins[0].year, None);
        assert_eq!(origins[0].date_placeholder, "Today");
    }

    #[test]
    fn minimal_file_fills_in_defaults() {
        let content = r#"
db_path = "/tmp/news.db"

[[sources]]
name = "Yahoo"
kind = "feed"
url = "https://finance.yahoo.com/rss/stocks"
country = "Global"
"#;
        let config: Config = toml::from_str(content).unwrap();
        assert_eq!(config.db_path, "/tmp/news.db");
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].kind, SourceKind::Feed);
        assert_eq!(config.sources[0].link_selector, "a[href]");
        assert!(config.keyword_sets.contains_key("ja"));
        assert_eq!(config.analysis.politeness_delay_ms, 1500);
        assert_eq!(config.analysis.country.as_deref(), Some("Japan"));
        assert_eq!(config.analysis.secondary.model, "qwen2.5:14b");
    }

    #[test]
    fn unknown_keyword_set_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[[sources]]
name = "Somewhere"
kind = "markup"
url = "https://example.com"
keywords = "fr"
"#,
        )
        .unwrap();

        assert!(matches!(Config::load(Some(path.as_path())), Err(AppError::Config(_))));
    }

    #[test]
    fn wildcard_country_analyzes_everything() {
        for value in ["*", ""] {
            let content = format!("[analysis]\ncountry = \"{value}\"\n");
            let config: Config = toml::from_str(&content).unwrap();
            assert_eq!(config.analysis.country, None);
        }

        let config: Config = toml::from_str("[analysis]\ncountry = \"Global\"\n").unwrap();
        assert_eq!(config.analysis.country.as_deref(), Some("Global"));
    }

    #[test]
    fn all_countries_survives_a_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.analysis.country = None;
        config.save(&path).unwrap();

        let reloaded = Config::load(Some(path.as_path())).unwrap();
        assert_eq!(reloaded.analysis.country, None);
    }

    #[test]
    fn query_stripping_defaults_by_source_kind() {
        let sources = default_sources();
        let jiji = sources.iter().find(|s| s.name == "Jiji").unwrap();
        assert!(!jiji.strips_query());
        let yahoo = sources.iter().find(|s| s.name == "Yahoo_Finance").unwrap();
        assert!(yahoo.strips_query());

        let content = r#"
[[sources]]
name = "Paged"
kind = "markup"
url = "https://example.com/list"
strip_query = true
"#;
        let config: Config = toml::from_str(content).unwrap();
        assert!(config.sources[0].strips_query());
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load(Some(path.as_path())).unwrap();
        assert!(path.exists());
        assert_eq!(config.sources.len(), default_sources().len());

        let reloaded = Config::load(Some(path.as_path())).unwrap();
        assert_eq!(reloaded.sources.len(), config.sources.len());
        assert_eq!(reloaded.keyword_sets, config.keyword_sets);
    }
}
