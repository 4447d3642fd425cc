// Core modules
mod catalog;
mod config;
mod error;
mod types;
pub mod api;
pub mod api_client;
pub mod core;

mod orchestrator;

// Re-export key types and functions
pub use catalog::{DEFAULT_VARIABLES, default_catalogue, default_variables};
pub use config::{OrchestratorConfig, load_config, load_config_from, resolve_config_path};
pub use error::{INVESTIGATE_USAGE, MiningError};
pub use types::{
    Company, ExtractionOutcome, ExtractionStatus, SourceUrl, TractorModel, TractorRef,
    VariableName,
};

pub use api_client::{ApiClient, TractorFilter, report_file_name};
pub use orchestrator::{
    CHAT_ERROR_REPLY, Command, LineSink, MiningOrchestrator, NullSink, ProgressEvent,
    ProgressSink, RunMode, RunOutcome, RunSummary, SEPARATOR_LINE, UNRECOGNIZED_REPLY, line_sink,
};

use anyhow::Result;
use std::sync::Arc;

use crate::core::FixedDelayPacer;

/// Convenience function to create an orchestrator wired to the HTTP backend.
///
/// The same client serves source lookup, extraction and the chat fallback.
pub fn create_orchestrator(config: &OrchestratorConfig) -> Result<MiningOrchestrator> {
    let client = Arc::new(ApiClient::new(
        config.api_base_url.clone(),
        config.request_timeout,
    )?);

    let orchestrator = MiningOrchestrator::new(client.clone(), client.clone())
        .with_pacer(Arc::new(FixedDelayPacer::from(config.pacing)))
        .with_variables(config.variables.clone())
        .with_catalogue(config.tractors.clone())
        .with_chat(client);

    Ok(orchestrator)
}
