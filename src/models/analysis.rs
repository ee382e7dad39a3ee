use std::fmt;

/// Which provider produced an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderTag {
    Primary,
    Secondary,
}

impl ProviderTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderTag::Primary => "primary",
            ProviderTag::Secondary => "secondary",
        }
    }
}

impl fmt::Display for ProviderTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub link: String,
    /// `None` when both providers failed and the record is still pending.
    pub provider: Option<ProviderTag>,
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisReport {
    pub outcomes: Vec<RecordOutcome>,
}

impl AnalysisReport {
    pub fn count(&self, tag: ProviderTag) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.provider == Some(tag))
            .count()
    }

    pub fn still_pending(&self) -> usize {
        self.outcomes.iter().filter(|o| o.provider.is_none()).count()
    }

    #[allow(dead_code)]
    pub fn provider_for(&self, link: &str) -> Option<ProviderTag> {
        self.outcomes
            .iter()
            .find(|o| o.link == link)
            .and_then(|o| o.provider)
    }
}
