use std::fmt::Write as _;
use std::path::Path;

use crate::db::Repository;
use crate::error::Result;
use crate::models::NewsItem;

/// Renders analyzed items, newest first, as a markdown log.
pub fn render_markdown(items: &[NewsItem]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Macro Analysis Log");
    let _ = writeln!(out, "**{} analyzed items.**\n", items.len());
    let _ = writeln!(out, "---\n");

    for item in items {
        let _ = writeln!(out, "### {} | {}", item.date, item.source);
        let _ = writeln!(out, "**Headline:** {}\n", item.title);
        let _ = writeln!(out, "> **Analysis**");
        let _ = writeln!(out, "{}\n", item.analysis_text.as_deref().unwrap_or_default());
        let _ = writeln!(out, "[Original article]({})", item.link);
        let _ = writeln!(out, "\n---\n");
    }

    out
}

/// Writes the report to `path`. Returns how many items it contains; nothing
/// is written when no item has been analyzed yet.
pub async fn write_report(repository: &Repository, path: &Path) -> Result<usize> {
    let items = repository.analyzed_items().await?;
    if items.is_empty() {
        tracing::info!("No analyzed items to report");
        return Ok(0);
    }

    tokio::fs::write(path, render_markdown(&items)).await?;
    tracing::info!(count = items.len(), path = %path.display(), "Report written");
    Ok(items.len())
}
