/// Admits a headline when it is longer than `min_length` characters and
/// contains at least one keyword verbatim.
pub fn admit(title: &str, keywords: &[String], min_length: usize) -> bool {
    title.chars().count() > min_length && keywords.iter().any(|kw| title.contains(kw.as_str()))
}

/// A keyword gate bound to one locale's keyword set.
#[derive(Debug, Clone)]
pub struct KeywordFilter {
    keywords: Vec<String>,
    min_length: usize,
}

impl KeywordFilter {
    pub fn new(keywords: Vec<String>, min_length: usize) -> Self {
        let keywords = keywords.into_iter().filter(|kw| !kw.is_empty()).collect();
        Self {
            keywords,
            min_length,
        }
    }

    pub fn admit(&self, title: &str) -> bool {
        admit(title, &self.keywords, self.min_length)
    }
}
