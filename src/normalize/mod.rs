mod date;
mod keywords;

pub use date::DateNormalizer;
pub use keywords::KeywordFilter;
