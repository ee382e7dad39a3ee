use async_trait::async_trait;

use crate::error::Result;

/// A text-in, text-out inference backend.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Runs a single prompt. Any error (status, rate limit, transport,
    /// malformed body) counts as a failed attempt.
    async fn analyze(&self, prompt: &str) -> Result<String>;
}
