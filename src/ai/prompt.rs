use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::models::NewsItem;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(title|source)\}").expect("valid regex"));

/// A fixed prompt with `{title}` and `{source}` placeholders.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Substitutes both placeholders in one pass, so text coming from the item
    /// itself is never expanded again.
    pub fn render(&self, item: &NewsItem) -> String {
        PLACEHOLDER
            .replace_all(&self.template, |caps: &Captures<'_>| match &caps[1] {
                "title" => item.title.as_str(),
                _ => item.source.as_str(),
            })
            .into_owned()
    }
}
