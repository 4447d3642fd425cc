//! Error taxonomy for mining runs.
//!
//! None of these cross the orchestrator boundary as an `Err`: they end up in
//! progress lines or in the outcome of a [`RunSummary`](crate::RunSummary).

use serde::Serialize;
use thiserror::Error;

/// Usage line shown for a malformed single-tractor command.
pub const INVESTIGATE_USAGE: &str = "Uso: /investigar [Marca] [Modelo]";

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum MiningError {
    /// Malformed request; reported before any I/O.
    #[error("comando inválido: {0}")]
    InvalidCommand(String),

    /// The resolver had no candidate for the query.
    #[error("no se encontró una fuente para \"{query}\"")]
    SourceNotFound { query: String },

    /// One variable could not be extracted. Never fatal to the run.
    #[error("fallo de extracción: {0}")]
    ExtractionFailure(String),

    /// Network or remote fault on a collaborator call.
    #[error("fallo de transporte: {0}")]
    TransportFault(String),
}

impl From<reqwest::Error> for MiningError {
    fn from(err: reqwest::Error) -> Self {
        Self::TransportFault(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mining_error_display() {
        let err = MiningError::SourceNotFound {
            query: "Acme T100 technical specs tractordata".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no se encontró una fuente para \"Acme T100 technical specs tractordata\""
        );

        let err = MiningError::TransportFault("connection refused".to_string());
        assert_eq!(err.to_string(), "fallo de transporte: connection refused");
    }
}
