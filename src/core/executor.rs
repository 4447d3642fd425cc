// Collaborator seams for source discovery and variable extraction

use anyhow::Result;
use async_trait::async_trait;

use crate::error::MiningError;
use crate::types::{ExtractionOutcome, SourceUrl, TractorRef, VariableName};

/// Finds a reference page for a free-text query.
///
/// Best effort: implementations return `None` both for "no result" and for
/// transport failures, and never error.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    async fn resolve(&self, query: &str) -> Option<SourceUrl>;
}

/// Extracts one variable for one tractor from a source page.
///
/// `Err` is reserved for transport faults; backend-reported failures come back
/// as an `Ok` outcome with a non-success status.
#[async_trait]
pub trait VariableExtractor: Send + Sync {
    async fn extract(
        &self,
        tractor: &TractorRef,
        variable: &VariableName,
        source: &SourceUrl,
    ) -> Result<ExtractionOutcome, MiningError>;
}

/// Conversational fallback for free text that is not a command.
#[async_trait]
pub trait ChatResponder: Send + Sync {
    async fn reply(&self, message: &str) -> Result<String>;
}
