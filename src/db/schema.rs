pub const SCHEMA: &str = r#"
-- news table: one row per canonical link
CREATE TABLE IF NOT EXISTS news (
    link TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    source TEXT NOT NULL,
    country TEXT NOT NULL,
    date TEXT NOT NULL,
    collected_at TEXT NOT NULL,
    analysis_text TEXT
);
"#;

/// Databases created by the collector before analysis existed lack this column.
pub const ADD_ANALYSIS_COLUMN: &str = "ALTER TABLE news ADD COLUMN analysis_text TEXT";

pub const INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_news_pending ON news(country) WHERE analysis_text IS NULL;
CREATE INDEX IF NOT EXISTS idx_news_date ON news(date DESC);
"#;
