//! Date normalization for scraped and syndicated news items.
//!
//! Sources emit dates as relative words ("Today"), localized calendar literals
//! ("2024年3月19日"), sentinel placeholders ("2024-XX"), partial dates ("07/03")
//! and standard timestamps. [`DateNormalizer`] runs an ordered table of rules
//! over the raw text; the first rule that resolves wins. When nothing resolves
//! the raw text is returned unchanged, so normalization never drops an item.
//!
//! Canonical output is `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime};
use regex::Regex;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const SCRUB_MAX_CHARS: usize = 19;
const BARE_MONTH_DAY_MAX_CHARS: usize = 5;

static LOCALIZED_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})\s*[年년]\s*(\d{1,2})\s*[月월]\s*(\d{1,2})\s*[日일]").expect("valid regex")
});
static YEAR_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i)(\d{4})-XX$").expect("valid regex"));
static BARE_MONTH_DAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})$").expect("valid regex"));
static ISO_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").expect("valid regex"));
static CANONICAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}( \d{2}:\d{2}:\d{2})?$").expect("valid regex")
});

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y.%m.%d %H:%M",
    "%B %d, %Y %H:%M",
    "%b %d, %Y %H:%M",
    "%B %d, %Y %I:%M %p",
    "%b %d, %Y %I:%M %p",
];

const OFFSET_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f %z"];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%b. %d, %Y",
    "%A, %B %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Context handed to every rule.
struct RuleInput<'a> {
    raw: &'a str,
    trimmed: &'a str,
    year_hint: Option<i32>,
    now: NaiveDateTime,
}

type RuleFn = fn(&DateNormalizer, &RuleInput<'_>) -> Option<String>;

/// One step of the cascade. `None` means "not mine, try the next rule".
struct DateRule {
    name: &'static str,
    apply: RuleFn,
}

const RULES: &[DateRule] = &[
    DateRule {
        name: "relative",
        apply: DateNormalizer::relative_marker,
    },
    DateRule {
        name: "localized_literal",
        apply: DateNormalizer::localized_literal,
    },
    DateRule {
        name: "year_placeholder",
        apply: DateNormalizer::year_placeholder,
    },
    DateRule {
        name: "bare_month_day",
        apply: DateNormalizer::bare_month_day,
    },
    DateRule {
        name: "general",
        apply: DateNormalizer::general_parse,
    },
    DateRule {
        name: "scrub",
        apply: DateNormalizer::manual_scrub,
    },
];

#[derive(Clone)]
pub struct DateNormalizer {
    now_markers: Vec<String>,
    clock: fn() -> NaiveDateTime,
}

impl std::fmt::Debug for DateNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DateNormalizer")
            .field("now_markers", &self.now_markers)
            .finish()
    }
}

impl DateNormalizer {
    pub fn new(now_markers: &[String]) -> Self {
        Self {
            now_markers: now_markers
                .iter()
                .map(|m| m.trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
            clock: local_now,
        }
    }

    /// Replaces the wall clock used for "now" and for the default year.
    #[allow(dead_code)]
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    /// Rewrites `raw` into canonical form. Never fails: unrecognized input is
    /// returned unchanged.
    pub fn normalize(&self, raw: &str, year_hint: Option<i32>) -> String {
        let input = RuleInput {
            raw,
            trimmed: raw.trim(),
            year_hint,
            now: (self.clock)(),
        };

        for rule in RULES {
            if let Some(normalized) = (rule.apply)(self, &input) {
                tracing::trace!(rule = rule.name, raw, %normalized, "Normalized date");
                return normalized;
            }
        }

        tracing::debug!(raw, "Date left as-is");
        raw.to_string()
    }

    fn relative_marker(&self, input: &RuleInput<'_>) -> Option<String> {
        let lowered = input.raw.to_lowercase();
        self.now_markers
            .iter()
            .any(|marker| lowered.contains(marker.as_str()))
            .then(|| input.now.format(DATETIME_FORMAT).to_string())
    }

    fn localized_literal(&self, input: &RuleInput<'_>) -> Option<String> {
        let caps = LOCALIZED_LITERAL.captures(input.raw)?;
        let numeric = format!("{}-{:0>2}-{:0>2}", &caps[1], &caps[2], &caps[3]);
        NaiveDate::parse_from_str(&numeric, DATE_FORMAT)
            .ok()
            .map(|date| date.format(DATE_FORMAT).to_string())
    }

    fn year_placeholder(&self, input: &RuleInput<'_>) -> Option<String> {
        let caps = YEAR_PLACEHOLDER.captures(input.trimmed)?;
        Some(format!("{}-01-01", &caps[1]))
    }

    fn bare_month_day(&self, input: &RuleInput<'_>) -> Option<String> {
        if input.trimmed.chars().count() > BARE_MONTH_DAY_MAX_CHARS {
            return None;
        }
        let caps = BARE_MONTH_DAY.captures(input.trimmed)?;
        let year = input.year_hint.unwrap_or_else(|| input.now.year());
        let month: u32 = caps[1].parse().ok()?;
        let day: u32 = caps[2].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day).map(|date| date.format(DATE_FORMAT).to_string())
    }

    fn general_parse(&self, input: &RuleInput<'_>) -> Option<String> {
        let text = input.trimmed;
        if text.is_empty() {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(dt.naive_local().format(DATETIME_FORMAT).to_string());
        }
        if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
            return Some(dt.naive_local().format(DATETIME_FORMAT).to_string());
        }
        for fmt in OFFSET_DATETIME_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
                return Some(dt.naive_local().format(DATETIME_FORMAT).to_string());
            }
        }
        for fmt in DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
                return Some(dt.format(DATETIME_FORMAT).to_string());
            }
        }
        for fmt in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
                return Some(date.format(DATE_FORMAT).to_string());
            }
        }
        None
    }

    /// Last resort for ISO-looking strings the parsers reject: drop the `T`/`Z`
    /// separators and keep the first 19 characters, if that yields a
    /// canonical shape.
    fn manual_scrub(&self, input: &RuleInput<'_>) -> Option<String> {
        if !ISO_PREFIX.is_match(input.trimmed) {
            return None;
        }
        let scrubbed: String = input
            .trimmed
            .replace('T', " ")
            .replace('Z', "")
            .chars()
            .take(SCRUB_MAX_CHARS)
            .collect();
        let scrubbed = scrubbed.trim_end().to_string();
        CANONICAL.is_match(&scrubbed).then_some(scrubbed)
    }
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}
