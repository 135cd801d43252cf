// Relevance model trait: the swap-ready abstraction over the trained classifier.

use anyhow::Result;
use async_trait::async_trait;

use crate::records::ModelScore;

/// Scores a translated job title for outreach relevance.
///
/// Implementations must be async because inference is offloaded from the
/// runtime. The returned score is opaque to the pipeline.
#[async_trait]
pub trait RelevanceModel: Send + Sync {
    async fn score(&self, translated_title: &str) -> Result<ModelScore>;
}
