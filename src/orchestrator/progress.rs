//! Progress events emitted while a run traverses its worklist.
//!
//! Each event renders to one human-readable line for the chat console. Sinks
//! receive events strictly in emission order.

use serde::Serialize;
use std::fmt;
use tokio::sync::mpsc;

use crate::error::MiningError;
use crate::types::{SourceUrl, TractorRef, VariableName};

pub const SEPARATOR_LINE: &str = "-----------------------------------";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressEvent {
    InvestigationStarted { tractor: String },
    BulkStarted { tractors: usize },
    TractorStarted { tractor: String },
    SourceLookup { query: String },
    SourceFound { url: SourceUrl },
    SourcePredefined { url: SourceUrl },
    TractorSkipped { tractor: String },
    VariableExtracted { variable: VariableName, value: String },
    VariableFailed { variable: VariableName, reason: String },
    TractorFinished { model: String },
    Separator,
    Cancelled,
}

impl ProgressEvent {
    pub(crate) fn variable_failed(variable: &VariableName, error: &MiningError) -> Self {
        Self::VariableFailed {
            variable: variable.clone(),
            reason: error.to_string(),
        }
    }

    pub(crate) fn tractor_started(tractor: &TractorRef) -> Self {
        Self::TractorStarted {
            tractor: tractor.full_name(),
        }
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvestigationStarted { tractor } => {
                write!(f, "Iniciando investigación para: {}", tractor)
            }
            Self::BulkStarted { tractors } => {
                write!(f, "Iniciando modo fábrica. Se procesarán {} tractores de la lista.", tractors)
            }
            Self::TractorStarted { tractor } => write!(f, "Procesando: {}...", tractor),
            Self::SourceLookup { query } => write!(f, "   Buscando ficha técnica: {}", query),
            Self::SourceFound { url } => write!(f, "   Fuente: {}", url),
            Self::SourcePredefined { url } => write!(f, "   Usando URL predefinida: {}", url),
            Self::TractorSkipped { tractor } => {
                write!(f, "   No se encontró URL para {}. Saltando tractor.", tractor)
            }
            Self::VariableExtracted { variable, value } => write!(f, "   OK {}: {}", variable, value),
            Self::VariableFailed { variable, reason } => {
                write!(f, "   Error en {}: {}", variable, reason)
            }
            Self::TractorFinished { model } => write!(f, "   {} finalizado.", model),
            Self::Separator => f.write_str(SEPARATOR_LINE),
            Self::Cancelled => f.write_str("Ejecución cancelada."),
        }
    }
}

/// Observer for run progress.
pub trait ProgressSink: Send {
    fn emit(&mut self, event: ProgressEvent);
}

impl ProgressSink for Vec<ProgressEvent> {
    fn emit(&mut self, event: ProgressEvent) {
        self.push(event);
    }
}

/// Keeps only the rendered lines.
impl ProgressSink for Vec<String> {
    fn emit(&mut self, event: ProgressEvent) {
        self.push(event.to_string());
    }
}

/// Forwards events to a receiver that drains them concurrently.
///
/// A dropped receiver is ignored; the run keeps going.
impl ProgressSink for mpsc::UnboundedSender<ProgressEvent> {
    fn emit(&mut self, event: ProgressEvent) {
        let _ = self.send(event);
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&mut self, _event: ProgressEvent) {}
}

/// Adapts a closure taking the rendered line, the shape of a chat log callback.
pub struct LineSink<F>(F);

impl<F> ProgressSink for LineSink<F>
where
    F: FnMut(String) + Send,
{
    fn emit(&mut self, event: ProgressEvent) {
        (self.0)(event.to_string())
    }
}

pub fn line_sink<F>(f: F) -> LineSink<F>
where
    F: FnMut(String) + Send,
{
    LineSink(f)
}
