//! Terminal result of a mining run.

use serde::Serialize;
use std::fmt;

use crate::error::{INVESTIGATE_USAGE, MiningError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Single,
    Bulk,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Cancelled,
    /// The run stopped before extracting anything (`InvalidCommand` or
    /// `SourceNotFound`).
    Aborted(MiningError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub mode: RunMode,
    pub outcome: RunOutcome,
    /// Counted extractions across the whole run.
    pub successes: usize,
    /// Denominator of the success ratio: the variable worklist size in single
    /// mode, variables times processed tractors in bulk mode.
    pub planned: usize,
    pub tractors_total: usize,
    pub tractors_processed: usize,
    pub tractors_skipped: usize,
}

impl RunSummary {
    pub(crate) fn new(mode: RunMode, tractors_total: usize) -> Self {
        Self {
            mode,
            outcome: RunOutcome::Completed,
            successes: 0,
            planned: 0,
            tractors_total,
            tractors_processed: 0,
            tractors_skipped: 0,
        }
    }

    pub(crate) fn aborted(mode: RunMode, tractors_total: usize, error: MiningError) -> Self {
        Self {
            outcome: RunOutcome::Aborted(error),
            ..Self::new(mode, tractors_total)
        }
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.outcome, self.mode) {
            (RunOutcome::Aborted(MiningError::InvalidCommand(_)), _) => {
                f.write_str(INVESTIGATE_USAGE)
            }
            (RunOutcome::Aborted(MiningError::SourceNotFound { .. }), RunMode::Single) => {
                f.write_str("No se encontró una ficha técnica fiable.")
            }
            (RunOutcome::Aborted(err), _) => write!(f, "Ejecución abortada: {}", err),
            (RunOutcome::Completed, RunMode::Single) => {
                write!(f, "Finalizado. Datos: {}/{}.", self.successes, self.planned)
            }
            (RunOutcome::Cancelled, RunMode::Single) => {
                write!(f, "Cancelado. Datos: {}/{}.", self.successes, self.planned)
            }
            (outcome, RunMode::Bulk) => {
                let head = if *outcome == RunOutcome::Cancelled {
                    "Proceso masivo cancelado"
                } else {
                    "Proceso masivo completado"
                };
                write!(
                    f,
                    "{}. Datos extraídos: {}/{}. Tractores procesados: {}/{}.",
                    head, self.successes, self.planned, self.tractors_processed, self.tractors_total
                )
            }
        }
    }
}
