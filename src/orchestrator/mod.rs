//! Core orchestrator logic - drives the extraction backend once per
//! (tractor, variable) pair with source discovery, pacing, and partial-failure
//! tolerance.

mod command;
mod progress;
mod summary;

#[cfg(test)]
mod integration_tests;

pub use command::Command;
pub use progress::{
    LineSink, NullSink, ProgressEvent, ProgressSink, SEPARATOR_LINE, line_sink,
};
pub use summary::{RunMode, RunOutcome, RunSummary};

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::catalog::{default_catalogue, default_variables};
use crate::core::{ChatResponder, FixedDelayPacer, Pacer, PauseKind, SourceResolver, VariableExtractor};
use crate::error::{INVESTIGATE_USAGE, MiningError};
use crate::types::{ExtractionOutcome, SourceUrl, TractorRef, VariableName};

/// Reply for input that is neither a command nor forwarded to chat.
pub const UNRECOGNIZED_REPLY: &str = "Comando no reconocido.";

/// Reply when the conversational backend fails.
pub const CHAT_ERROR_REPLY: &str = "Error al conectar con la IA.";

/// Run-local state. Never shared between invocations.
struct RunState<'a> {
    sink: &'a mut dyn ProgressSink,
    cancel: CancellationToken,
    successes: usize,
}

impl<'a> RunState<'a> {
    fn new(sink: &'a mut dyn ProgressSink, cancel: CancellationToken) -> Self {
        Self {
            sink,
            cancel,
            successes: 0,
        }
    }

    fn emit(&mut self, event: ProgressEvent) {
        debug!(line = %event, "progress");
        self.sink.emit(event);
    }
}

/// Sequential mining orchestrator.
///
/// Holds only immutable configuration and collaborators; every run keeps its
/// counter and sink to itself, so one instance can serve overlapping callers.
pub struct MiningOrchestrator {
    resolver: Arc<dyn SourceResolver>,
    extractor: Arc<dyn VariableExtractor>,
    pacer: Arc<dyn Pacer>,
    chat: Option<Arc<dyn ChatResponder>>,
    variables: Vec<VariableName>,
    catalogue: Vec<TractorRef>,
    /// Parent of every in-flight run's token. Replaced once cancelled so later
    /// runs start clean.
    cancel: Mutex<CancellationToken>,
}

impl MiningOrchestrator {
    /// Create an orchestrator with the built-in worklists and wall-clock pacing.
    pub fn new(resolver: Arc<dyn SourceResolver>, extractor: Arc<dyn VariableExtractor>) -> Self {
        Self {
            resolver,
            extractor,
            pacer: Arc::new(FixedDelayPacer::default()),
            chat: None,
            variables: default_variables(),
            catalogue: default_catalogue(),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn with_variables(mut self, variables: Vec<VariableName>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_catalogue(mut self, catalogue: Vec<TractorRef>) -> Self {
        self.catalogue = catalogue;
        self
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    /// Forward free text to a conversational backend instead of rejecting it.
    pub fn with_chat(mut self, chat: Arc<dyn ChatResponder>) -> Self {
        self.chat = Some(chat);
        self
    }

    /// Use `token` as the parent of the runs started while it is live.
    pub fn with_cancellation(self, token: CancellationToken) -> Self {
        Self {
            cancel: Mutex::new(token),
            ..self
        }
    }

    pub fn variables(&self) -> &[VariableName] {
        &self.variables
    }

    pub fn catalogue(&self) -> &[TractorRef] {
        &self.catalogue
    }

    /// Token that stops the runs currently in flight at their next
    /// suspension point. Runs started after it fires are unaffected.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.current_token().clone()
    }

    /// Stop every in-flight run. The next run gets a fresh token.
    pub fn cancel_runs(&self) {
        let mut current = self.current_token();
        current.cancel();
        *current = CancellationToken::new();
    }

    fn current_token(&self) -> std::sync::MutexGuard<'_, CancellationToken> {
        self.cancel.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Token owned by one run.
    fn run_token(&self) -> CancellationToken {
        let mut current = self.current_token();
        if current.is_cancelled() {
            *current = CancellationToken::new();
        }
        current.child_token()
    }

    /// Parse and execute one chat message, returning the final reply.
    pub async fn handle_message(&self, message: &str, sink: &mut dyn ProgressSink) -> String {
        match Command::parse(message) {
            Ok(command) => self.execute(command, sink).await,
            Err(err) => {
                debug!("Rejected command {:?}: {}", message, err);
                INVESTIGATE_USAGE.to_string()
            }
        }
    }

    /// Execute an already parsed command.
    pub async fn execute(&self, command: Command, sink: &mut dyn ProgressSink) -> String {
        match command {
            Command::Investigate(tractor) => self.investigate(tractor, sink).await.to_string(),
            Command::InvestigateAll => self.run_catalogue(sink).await.to_string(),
            Command::Chat(message) => match &self.chat {
                Some(chat) => match chat.reply(&message).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        warn!("Chat backend failed: {}", e);
                        CHAT_ERROR_REPLY.to_string()
                    }
                },
                None => UNRECOGNIZED_REPLY.to_string(),
            },
            Command::Unrecognized(_) => UNRECOGNIZED_REPLY.to_string(),
        }
    }

    /// Research one tractor given as free-text company and model.
    ///
    /// Blank input yields an `InvalidCommand` summary without any I/O.
    pub async fn run_single(
        &self,
        company: &str,
        model: &str,
        sink: &mut dyn ProgressSink,
    ) -> RunSummary {
        match TractorRef::new(company, model) {
            Ok(tractor) => self.investigate(tractor, sink).await,
            Err(err) => {
                warn!("Rejected single run: {}", err);
                RunSummary::aborted(RunMode::Single, 0, err)
            }
        }
    }

    /// Research one tractor. A predefined source skips the resolver.
    pub async fn investigate(&self, tractor: TractorRef, sink: &mut dyn ProgressSink) -> RunSummary {
        let span = info_span!(
            "mining_run",
            run_id = %Uuid::new_v4(),
            mode = "single",
            tractor = %tractor
        );
        self.investigate_inner(tractor, sink).instrument(span).await
    }

    /// Research every tractor of the configured catalogue.
    pub async fn run_catalogue(&self, sink: &mut dyn ProgressSink) -> RunSummary {
        self.run_bulk(&self.catalogue, sink).await
    }

    /// Research each tractor of `worklist` in order.
    ///
    /// Tractors whose source cannot be resolved are skipped; the run carries on.
    pub async fn run_bulk(&self, worklist: &[TractorRef], sink: &mut dyn ProgressSink) -> RunSummary {
        let span = info_span!(
            "mining_run",
            run_id = %Uuid::new_v4(),
            mode = "bulk",
            tractors = worklist.len()
        );
        self.run_bulk_inner(worklist, sink).instrument(span).await
    }

    async fn investigate_inner(&self, tractor: TractorRef, sink: &mut dyn ProgressSink) -> RunSummary {
        let mut summary = RunSummary::new(RunMode::Single, 1);
        summary.planned = self.variables.len();

        if self.variables.is_empty() {
            info!("Variable worklist is empty; nothing to mine");
            return summary;
        }

        let mut run = RunState::new(sink, self.run_token());
        run.emit(ProgressEvent::InvestigationStarted {
            tractor: tractor.full_name(),
        });

        let source = match &tractor.source_url {
            Some(url) => {
                run.emit(ProgressEvent::SourcePredefined { url: url.clone() });
                url.clone()
            }
            None => {
                let query = tractor.search_query();
                run.emit(ProgressEvent::SourceLookup { query: query.clone() });

                match self.resolver.resolve(&query).await {
                    Some(url) => {
                        run.emit(ProgressEvent::SourceFound { url: url.clone() });
                        url
                    }
                    None => {
                        warn!("No source found for {}", tractor);
                        return RunSummary::aborted(
                            RunMode::Single,
                            1,
                            MiningError::SourceNotFound { query },
                        );
                    }
                }
            }
        };

        summary.tractors_processed = 1;
        let flow = self
            .mine_variables(&tractor, &source, PauseKind::SingleVariable, &mut run)
            .await;
        summary.successes = run.successes;

        if flow.is_break() {
            run.emit(ProgressEvent::Cancelled);
            summary.outcome = RunOutcome::Cancelled;
        }

        info!(
            "Single run for {} finished: {}/{}",
            tractor, summary.successes, summary.planned
        );
        summary
    }

    async fn run_bulk_inner(&self, worklist: &[TractorRef], sink: &mut dyn ProgressSink) -> RunSummary {
        let mut summary = RunSummary::new(RunMode::Bulk, worklist.len());

        if self.variables.is_empty() {
            info!("Variable worklist is empty; nothing to mine");
            return summary;
        }

        let mut run = RunState::new(sink, self.run_token());
        run.emit(ProgressEvent::BulkStarted {
            tractors: worklist.len(),
        });

        for tractor in worklist {
            run.emit(ProgressEvent::tractor_started(tractor));

            let source = match &tractor.source_url {
                Some(url) => {
                    run.emit(ProgressEvent::SourcePredefined { url: url.clone() });
                    url.clone()
                }
                None => {
                    let query = tractor.search_query();
                    run.emit(ProgressEvent::SourceLookup { query: query.clone() });

                    let Some(url) = self.resolver.resolve(&query).await else {
                        warn!("No source found for {}, skipping", tractor);
                        run.emit(ProgressEvent::TractorSkipped {
                            tractor: tractor.full_name(),
                        });
                        summary.tractors_skipped += 1;
                        continue;
                    };

                    run.emit(ProgressEvent::SourceFound { url: url.clone() });
                    if self.pause(PauseKind::LookupCooldown, &run.cancel).await.is_break() {
                        summary.outcome = RunOutcome::Cancelled;
                        break;
                    }
                    url
                }
            };

            summary.tractors_processed += 1;
            summary.planned += self.variables.len();

            if self
                .mine_variables(tractor, &source, PauseKind::BulkVariable, &mut run)
                .await
                .is_break()
            {
                summary.outcome = RunOutcome::Cancelled;
                break;
            }

            run.emit(ProgressEvent::TractorFinished {
                model: tractor.model.to_string(),
            });
            run.emit(ProgressEvent::Separator);
        }

        summary.successes = run.successes;
        if summary.outcome == RunOutcome::Cancelled {
            run.emit(ProgressEvent::Cancelled);
        }

        info!(
            "Bulk run finished: {} values, {} processed, {} skipped",
            summary.successes, summary.tractors_processed, summary.tractors_skipped
        );
        summary
    }

    /// Per-variable loop shared by both modes. Breaks only on cancellation.
    async fn mine_variables(
        &self,
        tractor: &TractorRef,
        source: &SourceUrl,
        pace: PauseKind,
        run: &mut RunState<'_>,
    ) -> ControlFlow<()> {
        for variable in &self.variables {
            if self.pause(pace, &run.cancel).await.is_break() {
                return ControlFlow::Break(());
            }

            let result = self
                .extractor
                .extract(tractor, variable, source)
                .await
                .and_then(ExtractionOutcome::into_value);

            match result {
                Ok(value) => {
                    run.successes += 1;
                    run.emit(ProgressEvent::VariableExtracted {
                        variable: variable.clone(),
                        value,
                    });
                }
                Err(err) => {
                    debug!("Extraction of {} for {} failed: {}", variable, tractor, err);
                    run.emit(ProgressEvent::variable_failed(variable, &err));
                }
            }
        }

        ControlFlow::Continue(())
    }

    /// Wait at a suspension point unless the run has been cancelled.
    async fn pause(&self, kind: PauseKind, cancel: &CancellationToken) -> ControlFlow<()> {
        if cancel.is_cancelled() {
            return ControlFlow::Break(());
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => ControlFlow::Break(()),
            _ = self.pacer.pause(kind) => ControlFlow::Continue(()),
        }
    }
}
