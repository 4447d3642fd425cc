//! End-to-end runs of the orchestrator against deterministic stub
//! collaborators.

#![cfg(test)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::core::{NoDelay, PauseKind, RecordingPacer};
use crate::types::ExtractionOutcome;

/// Resolver answering from a fixed query → url table.
#[derive(Default)]
struct StubResolver {
    answers: HashMap<String, String>,
    queries: Mutex<Vec<String>>,
}

impl StubResolver {
    fn with(mut self, query: &str, url: &str) -> Self {
        self.answers.insert(query.to_string(), url.to_string());
        self
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceResolver for StubResolver {
    async fn resolve(&self, query: &str) -> Option<SourceUrl> {
        self.queries.lock().unwrap().push(query.to_string());
        self.answers.get(query).map(|u| SourceUrl::new(u.as_str()))
    }
}

/// Extractor succeeding only for configured variables.
///
/// `faulty` variables reject with a transport fault instead of a structured
/// error outcome.
#[derive(Default)]
struct StubExtractor {
    values: HashMap<String, String>,
    faulty: Vec<String>,
    calls: Mutex<Vec<(String, String, String)>>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl StubExtractor {
    fn value(mut self, variable: &str, value: &str) -> Self {
        self.values.insert(variable.to_string(), value.to_string());
        self
    }

    fn faulty(mut self, variable: &str) -> Self {
        self.faulty.push(variable.to_string());
        self
    }

    fn cancel_after(mut self, calls: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((calls, token));
        self
    }

    fn calls(&self) -> Vec<(String, String, String)> {
        self.calls.lock().unwrap().clone()
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl VariableExtractor for StubExtractor {
    async fn extract(
        &self,
        tractor: &TractorRef,
        variable: &VariableName,
        source: &SourceUrl,
    ) -> Result<ExtractionOutcome, MiningError> {
        let made = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((
                tractor.full_name(),
                variable.to_string(),
                source.to_string(),
            ));
            calls.len()
        };

        if let Some((limit, token)) = &self.cancel_after {
            if made >= *limit {
                token.cancel();
            }
        }

        if self.faulty.iter().any(|v| v == variable.as_str()) {
            return Err(MiningError::TransportFault("connection reset".to_string()));
        }

        Ok(match self.values.get(variable.as_str()) {
            Some(value) => ExtractionOutcome::success(value.as_str()),
            None => ExtractionOutcome::error("variable not present"),
        })
    }
}

fn vars(names: &[&str]) -> Vec<VariableName> {
    names.iter().map(|n| VariableName::from(*n)).collect()
}

fn tractor(company: &str, model: &str, url: Option<&str>) -> TractorRef {
    let t = TractorRef::new(company, model).unwrap();
    match url {
        Some(u) => t.with_source(u),
        None => t,
    }
}

fn orchestrator(
    resolver: Arc<StubResolver>,
    extractor: Arc<StubExtractor>,
    pacer: Arc<dyn Pacer>,
) -> MiningOrchestrator {
    MiningOrchestrator::new(resolver, extractor).with_pacer(pacer)
}

fn count<F: Fn(&ProgressEvent) -> bool>(events: &[ProgressEvent], f: F) -> usize {
    events.iter().filter(|e| f(e)).count()
}

fn is_success(e: &ProgressEvent) -> bool {
    matches!(e, ProgressEvent::VariableExtracted { .. })
}

fn is_finished(e: &ProgressEvent) -> bool {
    matches!(e, ProgressEvent::TractorFinished { .. })
}

fn is_skip(e: &ProgressEvent) -> bool {
    matches!(e, ProgressEvent::TractorSkipped { .. })
}

#[tokio::test]
async fn test_single_run_reference_scenario() {
    let resolver = Arc::new(
        StubResolver::default().with("Acme T100 technical specs tractordata", "https://example.com/x"),
    );
    let extractor = Arc::new(StubExtractor::default().value("rated_power_net", "120"));
    let orch = orchestrator(resolver.clone(), extractor.clone(), Arc::new(NoDelay));

    let mut events: Vec<ProgressEvent> = Vec::new();
    let summary = orch.run_single("Acme", "T100", &mut events).await;

    assert_eq!(summary.to_string(), "Finalizado. Datos: 1/14.");
    assert_eq!(summary.successes, 1);
    assert_eq!(extractor.call_count(), 14);
    assert_eq!(resolver.queries(), vec!["Acme T100 technical specs tractordata".to_string()]);

    // Every call used the resolved source and the full tractor name.
    assert!(extractor
        .calls()
        .iter()
        .all(|(name, _, url)| name == "Acme T100" && url == "https://example.com/x"));

    assert_eq!(count(&events, is_success), 1);
    assert_eq!(
        count(&events, |e| matches!(e, ProgressEvent::VariableFailed { .. })),
        13
    );
    assert_eq!(
        events[0],
        ProgressEvent::InvestigationStarted { tractor: "Acme T100".to_string() }
    );
}

#[tokio::test]
async fn test_single_run_without_source_makes_no_extraction_calls() {
    let resolver = Arc::new(StubResolver::default());
    let extractor = Arc::new(StubExtractor::default().value("torque", "500 Nm"));
    let pacer = Arc::new(RecordingPacer::new());
    let orch = orchestrator(resolver, extractor.clone(), pacer.clone());

    let mut events: Vec<ProgressEvent> = Vec::new();
    let summary = orch.run_single("Acme", "Z9", &mut events).await;

    assert_eq!(summary.to_string(), "No se encontró una ficha técnica fiable.");
    assert!(matches!(
        summary.outcome,
        RunOutcome::Aborted(MiningError::SourceNotFound { .. })
    ));
    assert_eq!(extractor.call_count(), 0);
    assert!(pacer.pauses().is_empty());
    assert_eq!(count(&events, is_success), 0);
}

#[tokio::test]
async fn test_single_run_rejects_missing_model_without_io() {
    let resolver = Arc::new(StubResolver::default());
    let extractor = Arc::new(StubExtractor::default());
    let orch = orchestrator(resolver.clone(), extractor.clone(), Arc::new(NoDelay));

    let mut events: Vec<ProgressEvent> = Vec::new();
    let summary = orch.run_single("Acme", "", &mut events).await;

    assert!(matches!(
        summary.outcome,
        RunOutcome::Aborted(MiningError::InvalidCommand(_))
    ));
    assert!(events.is_empty());
    assert!(resolver.queries().is_empty());
    assert_eq!(extractor.call_count(), 0);
}

#[tokio::test]
async fn test_transport_fault_does_not_abort_the_loop() {
    let resolver = Arc::new(StubResolver::default().with(
        "Fendt 1050 Vario technical specs tractordata",
        "https://example.com/fendt",
    ));
    let extractor = Arc::new(
        StubExtractor::default()
            .faulty("displacement")
            .value("torque", "5000 Nm")
            .value("rated_power_net", "N/A"),
    );
    let orch = orchestrator(resolver, extractor.clone(), Arc::new(NoDelay))
        .with_variables(vars(&["rated_power_net", "displacement", "torque"]));

    let mut events: Vec<ProgressEvent> = Vec::new();
    let summary = orch.run_single("Fendt", "1050 Vario", &mut events).await;

    assert_eq!(summary.to_string(), "Finalizado. Datos: 1/3.");
    assert_eq!(extractor.call_count(), 3);

    let failures: Vec<String> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::VariableFailed { variable, reason } => {
                Some(format!("{}={}", variable, reason))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        failures,
        vec![
            "rated_power_net=fallo de extracción: valor no aplicable".to_string(),
            "displacement=fallo de transporte: connection reset".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_single_run_is_idempotent() {
    let resolver = Arc::new(
        StubResolver::default().with("Acme T100 technical specs tractordata", "https://example.com/x"),
    );
    let extractor = Arc::new(
        StubExtractor::default()
            .value("rated_power_net", "120")
            .value("torque", "480"),
    );
    let orch = orchestrator(resolver, extractor, Arc::new(NoDelay));

    let mut first: Vec<String> = Vec::new();
    let mut second: Vec<String> = Vec::new();
    let a = orch.run_single("Acme", "T100", &mut first).await;
    let b = orch.run_single("Acme", "T100", &mut second).await;

    assert_eq!(a, b);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_empty_variable_worklist_returns_zero_of_zero() {
    let resolver = Arc::new(
        StubResolver::default().with("Acme T100 technical specs tractordata", "https://example.com/x"),
    );
    let extractor = Arc::new(StubExtractor::default());
    let pacer = Arc::new(RecordingPacer::new());
    let orch = orchestrator(resolver.clone(), extractor.clone(), pacer.clone())
        .with_variables(Vec::new());

    let mut events: Vec<ProgressEvent> = Vec::new();
    let single = orch.run_single("Acme", "T100", &mut events).await;
    assert_eq!(single.to_string(), "Finalizado. Datos: 0/0.");

    let worklist = vec![tractor("Acme", "T100", None), tractor("Acme", "T200", Some("https://example.com/y"))];
    let bulk = orch.run_bulk(&worklist, &mut events).await;
    assert!(bulk.to_string().contains("Datos extraídos: 0/0."));

    assert!(events.is_empty());
    assert!(resolver.queries().is_empty());
    assert_eq!(extractor.call_count(), 0);
    assert!(pacer.pauses().is_empty());
}

#[tokio::test]
async fn test_bulk_run_skips_unresolved_tractors() {
    let resolver = Arc::new(StubResolver::default());
    let extractor = Arc::new(
        StubExtractor::default()
            .value("rated_power_net", "400 hp")
            .value("torque", "1800 Nm"),
    );
    let pacer = Arc::new(RecordingPacer::new());
    let orch = orchestrator(resolver.clone(), extractor.clone(), pacer.clone())
        .with_variables(vars(&["rated_power_net", "torque", "wheelbase"]));

    let worklist = vec![
        tractor("John Deere", "9570RT", Some("https://example.com/9570rt")),
        tractor("John Deere", "9520R", None),
        tractor("John Deere", "9570R", Some("https://example.com/9570r")),
        tractor("John Deere", "9470R", None),
    ];

    let mut events: Vec<ProgressEvent> = Vec::new();
    let summary = orch.run_bulk(&worklist, &mut events).await;

    assert_eq!(count(&events, is_skip), 2);
    assert_eq!(count(&events, is_finished), 2);
    assert_eq!(count(&events, |e| *e == ProgressEvent::Separator), 2);

    // Only predefined tractors reached the extractor.
    let calls = extractor.calls();
    assert_eq!(calls.len(), 6);
    assert!(calls
        .iter()
        .all(|(name, _, _)| name == "John Deere 9570RT" || name == "John Deere 9570R"));

    assert_eq!(resolver.queries().len(), 2);
    assert_eq!(pacer.count(PauseKind::BulkVariable), 6);
    assert_eq!(pacer.count(PauseKind::LookupCooldown), 0);

    assert_eq!(summary.successes, 4);
    assert_eq!(summary.successes, count(&events, is_success));
    assert_eq!(summary.tractors_processed, 2);
    assert_eq!(summary.tractors_skipped, 2);
    assert_eq!(
        summary.to_string(),
        "Proceso masivo completado. Datos extraídos: 4/6. Tractores procesados: 2/4."
    );
    assert_eq!(events[0], ProgressEvent::BulkStarted { tractors: 4 });
}

#[tokio::test]
async fn test_bulk_run_cools_down_after_lookup_only() {
    let resolver = Arc::new(StubResolver::default().with(
        "John Deere 8370R technical specs tractordata",
        "https://example.com/8370r",
    ));
    let extractor = Arc::new(StubExtractor::default().value("torque", "1700 Nm"));
    let pacer = Arc::new(RecordingPacer::new());
    let orch = orchestrator(resolver, extractor.clone(), pacer.clone())
        .with_variables(vars(&["torque", "wheelbase"]));

    let worklist = vec![
        tractor("John Deere", "9570RT", Some("https://example.com/9570rt")),
        tractor("John Deere", "8370R", None),
    ];

    let mut events: Vec<ProgressEvent> = Vec::new();
    let summary = orch.run_bulk(&worklist, &mut events).await;

    assert_eq!(
        pacer.pauses(),
        vec![
            PauseKind::BulkVariable,
            PauseKind::BulkVariable,
            PauseKind::LookupCooldown,
            PauseKind::BulkVariable,
            PauseKind::BulkVariable,
        ]
    );
    assert_eq!(count(&events, is_finished), 2);
    assert_eq!(summary.successes, 2);
    assert!(extractor
        .calls()
        .iter()
        .any(|(_, _, url)| url == "https://example.com/8370r"));
}

#[tokio::test]
async fn test_bulk_event_order_for_one_tractor() {
    let resolver = Arc::new(StubResolver::default());
    let extractor = Arc::new(StubExtractor::default().value("torque", "900 Nm"));
    let orch = orchestrator(resolver, extractor, Arc::new(NoDelay))
        .with_variables(vars(&["torque"]));

    let worklist = vec![tractor("Fendt", "1050 Vario", Some("https://example.com/f"))];
    let mut lines: Vec<String> = Vec::new();
    orch.run_bulk(&worklist, &mut lines).await;

    assert_eq!(
        lines,
        vec![
            "Iniciando modo fábrica. Se procesarán 1 tractores de la lista.".to_string(),
            "Procesando: Fendt 1050 Vario...".to_string(),
            "   Usando URL predefinida: https://example.com/f".to_string(),
            "   OK torque: 900 Nm".to_string(),
            "   1050 Vario finalizado.".to_string(),
            SEPARATOR_LINE.to_string(),
        ]
    );
}

#[tokio::test]
async fn test_cancellation_stops_at_next_suspension_point() {
    let token = CancellationToken::new();
    let resolver = Arc::new(StubResolver::default());
    let extractor = Arc::new(
        StubExtractor::default()
            .value("torque", "900 Nm")
            .cancel_after(2, token.clone()),
    );
    let orch = orchestrator(resolver, extractor.clone(), Arc::new(NoDelay))
        .with_variables(vars(&["torque", "wheelbase", "pump_flow"]))
        .with_cancellation(token);

    let worklist = vec![
        tractor("Fendt", "724 Vario", Some("https://example.com/a")),
        tractor("Fendt", "728 Vario", Some("https://example.com/b")),
    ];

    let mut events: Vec<ProgressEvent> = Vec::new();
    let summary = orch.run_bulk(&worklist, &mut events).await;

    assert_eq!(summary.outcome, RunOutcome::Cancelled);
    assert_eq!(extractor.call_count(), 2);
    assert_eq!(summary.successes, 1);
    assert_eq!(count(&events, is_finished), 0);
    assert_eq!(events.last(), Some(&ProgressEvent::Cancelled));
    assert!(summary.to_string().starts_with("Proceso masivo cancelado."));
}

#[tokio::test]
async fn test_handle_message_dispatch() {
    let resolver = Arc::new(
        StubResolver::default().with("Acme T100 technical specs tractordata", "https://example.com/x"),
    );
    let extractor = Arc::new(StubExtractor::default().value("torque", "480"));
    let orch = orchestrator(resolver.clone(), extractor.clone(), Arc::new(NoDelay))
        .with_variables(vars(&["torque"]))
        .with_catalogue(vec![tractor("Acme", "T100", Some("https://example.com/x"))]);

    let mut events: Vec<ProgressEvent> = Vec::new();

    assert_eq!(
        orch.handle_message("/investigar Acme T100", &mut events).await,
        "Finalizado. Datos: 1/1."
    );
    assert_eq!(
        orch.handle_message("/investigar todos", &mut events).await,
        "Proceso masivo completado. Datos extraídos: 1/1. Tractores procesados: 1/1."
    );

    let calls_before = extractor.call_count();
    let queries_before = resolver.queries().len();
    events.clear();

    assert_eq!(
        orch.handle_message("/investigar Acme", &mut events).await,
        INVESTIGATE_USAGE
    );
    assert_eq!(orch.handle_message("/comparar", &mut events).await, UNRECOGNIZED_REPLY);
    assert_eq!(orch.handle_message("hola", &mut events).await, UNRECOGNIZED_REPLY);

    assert!(events.is_empty());
    assert_eq!(extractor.call_count(), calls_before);
    assert_eq!(resolver.queries().len(), queries_before);
}

struct EchoChat;

#[async_trait]
impl ChatResponder for EchoChat {
    async fn reply(&self, message: &str) -> anyhow::Result<String> {
        if message == "fallo" {
            anyhow::bail!("upstream unavailable");
        }
        Ok(format!("eco: {}", message))
    }
}

#[tokio::test]
async fn test_free_text_goes_to_chat_when_configured() {
    let orch = orchestrator(
        Arc::new(StubResolver::default()),
        Arc::new(StubExtractor::default()),
        Arc::new(NoDelay),
    )
    .with_chat(Arc::new(EchoChat));

    let mut sink = NullSink;
    assert_eq!(orch.handle_message("hola", &mut sink).await, "eco: hola");
    assert_eq!(orch.handle_message("fallo", &mut sink).await, CHAT_ERROR_REPLY);
    assert_eq!(orch.handle_message("/calcular", &mut sink).await, UNRECOGNIZED_REPLY);
}

/// Cancels `token` when asked for a `trigger` pause, then waits forever.
struct CancellingPacer {
    trigger: PauseKind,
    token: CancellationToken,
}

#[async_trait]
impl Pacer for CancellingPacer {
    async fn pause(&self, kind: PauseKind) {
        if kind == self.trigger {
            self.token.cancel();
            std::future::pending::<()>().await;
        }
    }
}

#[tokio::test]
async fn test_single_run_uses_single_mode_pacing() {
    let resolver = Arc::new(
        StubResolver::default().with("Acme T100 technical specs tractordata", "https://example.com/x"),
    );
    let extractor = Arc::new(StubExtractor::default());
    let pacer = Arc::new(RecordingPacer::new());
    let orch = orchestrator(resolver, extractor, pacer.clone())
        .with_variables(vars(&["torque", "wheelbase", "pump_flow"]));

    orch.run_single("Acme", "T100", &mut NullSink).await;

    assert_eq!(pacer.pauses(), vec![PauseKind::SingleVariable; 3]);
}

#[tokio::test]
async fn test_investigate_with_predefined_source_skips_resolver() {
    let resolver = Arc::new(StubResolver::default());
    let extractor = Arc::new(StubExtractor::default().value("torque", "5000 Nm"));
    let orch = orchestrator(resolver.clone(), extractor.clone(), Arc::new(NoDelay))
        .with_variables(vars(&["torque", "wheelbase"]));

    let mut events: Vec<ProgressEvent> = Vec::new();
    let summary = orch
        .investigate(tractor("Fendt", "1050 Vario", Some("https://example.com/fendt")), &mut events)
        .await;

    assert_eq!(summary.to_string(), "Finalizado. Datos: 1/2.");
    assert!(resolver.queries().is_empty());
    assert!(extractor
        .calls()
        .iter()
        .all(|(_, _, url)| url == "https://example.com/fendt"));
    assert_eq!(
        events[1],
        ProgressEvent::SourcePredefined { url: SourceUrl::from("https://example.com/fendt") }
    );
    assert!(!events.iter().any(|e| matches!(e, ProgressEvent::SourceLookup { .. })));
}

#[tokio::test]
async fn test_cancellation_during_lookup_cooldown() {
    let token = CancellationToken::new();
    let resolver = Arc::new(StubResolver::default().with(
        "John Deere 8370R technical specs tractordata",
        "https://example.com/8370r",
    ));
    let extractor = Arc::new(StubExtractor::default().value("torque", "1700 Nm"));
    let pacer = Arc::new(CancellingPacer {
        trigger: PauseKind::LookupCooldown,
        token: token.clone(),
    });
    let orch = orchestrator(resolver, extractor.clone(), pacer)
        .with_variables(vars(&["torque"]))
        .with_cancellation(token);

    let worklist = vec![
        tractor("John Deere", "9570RT", Some("https://example.com/9570rt")),
        tractor("John Deere", "8370R", None),
        tractor("John Deere", "9570R", Some("https://example.com/9570r")),
    ];

    let mut events: Vec<ProgressEvent> = Vec::new();
    let summary = orch.run_bulk(&worklist, &mut events).await;

    assert_eq!(summary.outcome, RunOutcome::Cancelled);
    assert_eq!(extractor.call_count(), 1);
    assert_eq!(summary.tractors_processed, 1);
    assert_eq!(count(&events, is_finished), 1);
    assert_eq!(
        summary.to_string(),
        "Proceso masivo cancelado. Datos extraídos: 1/1. Tractores procesados: 1/3."
    );

    let tail: Vec<&ProgressEvent> = events.iter().rev().take(2).collect();
    assert_eq!(*tail[0], ProgressEvent::Cancelled);
    assert_eq!(
        *tail[1],
        ProgressEvent::SourceFound { url: SourceUrl::from("https://example.com/8370r") }
    );
}

#[tokio::test]
async fn test_single_run_cancellation() {
    let token = CancellationToken::new();
    let resolver = Arc::new(
        StubResolver::default().with("Acme T100 technical specs tractordata", "https://example.com/x"),
    );
    let extractor = Arc::new(
        StubExtractor::default()
            .value("torque", "480")
            .cancel_after(1, token.clone()),
    );
    let orch = orchestrator(resolver, extractor.clone(), Arc::new(NoDelay))
        .with_variables(vars(&["torque", "wheelbase", "pump_flow"]))
        .with_cancellation(token);

    let mut lines: Vec<String> = Vec::new();
    let summary = orch.run_single("Acme", "T100", &mut lines).await;

    assert_eq!(summary.outcome, RunOutcome::Cancelled);
    assert_eq!(summary.to_string(), "Cancelado. Datos: 1/3.");
    assert_eq!(extractor.call_count(), 1);
    assert_eq!(lines.last().map(String::as_str), Some("Ejecución cancelada."));
}

#[tokio::test]
async fn test_runs_after_a_cancelled_run_complete() {
    let token = CancellationToken::new();
    let resolver = Arc::new(StubResolver::default());
    let extractor = Arc::new(
        StubExtractor::default()
            .value("torque", "480")
            .cancel_after(1, token.clone()),
    );
    let orch = orchestrator(resolver, extractor.clone(), Arc::new(NoDelay))
        .with_variables(vars(&["torque", "wheelbase", "pump_flow"]))
        .with_cancellation(token.clone());
    let fendt = tractor("Fendt", "724 Vario", Some("https://example.com/724"));

    let first = orch.investigate(fendt.clone(), &mut NullSink).await;
    assert_eq!(first.outcome, RunOutcome::Cancelled);
    assert!(token.is_cancelled());

    // The stale token fires again on every call; it no longer reaches new runs.
    let second = orch.investigate(fendt.clone(), &mut NullSink).await;
    assert_eq!(second.to_string(), "Finalizado. Datos: 1/3.");
    assert_eq!(extractor.call_count(), 4);

    orch.cancel_runs();
    let third = orch.investigate(fendt, &mut NullSink).await;
    assert!(third.is_completed());
    assert_eq!(extractor.call_count(), 7);
}
