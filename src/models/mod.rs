mod analysis;
mod news;

pub use analysis::{AnalysisReport, ProviderTag, RecordOutcome};
pub use news::{CollectionReport, NewsItem, RawItem, SourceCount};
