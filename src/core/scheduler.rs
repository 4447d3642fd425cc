// Pacing between upstream calls

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;

/// Which suspension point a pause belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PauseKind {
    /// Before each extraction request of a single-tractor run.
    SingleVariable,
    /// Before each extraction request of a bulk run.
    BulkVariable,
    /// After a source lookup in bulk mode, before that tractor's variables.
    LookupCooldown,
}

/// Decides how long a run waits at each suspension point.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, kind: PauseKind);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PacingConfig {
    #[serde(default = "default_single_variable_delay_ms")]
    pub single_variable_delay_ms: u64,
    #[serde(default = "default_bulk_variable_delay_ms")]
    pub bulk_variable_delay_ms: u64,
    #[serde(default = "default_lookup_cooldown_ms")]
    pub lookup_cooldown_ms: u64,
}

fn default_single_variable_delay_ms() -> u64 {
    2000
}

fn default_bulk_variable_delay_ms() -> u64 {
    1000
}

fn default_lookup_cooldown_ms() -> u64 {
    2000
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            single_variable_delay_ms: default_single_variable_delay_ms(),
            bulk_variable_delay_ms: default_bulk_variable_delay_ms(),
            lookup_cooldown_ms: default_lookup_cooldown_ms(),
        }
    }
}

/// Wall-clock pacer backed by `tokio::time::sleep`.
#[derive(Debug, Clone)]
pub struct FixedDelayPacer {
    single_variable_delay: Duration,
    bulk_variable_delay: Duration,
    lookup_cooldown: Duration,
}

impl FixedDelayPacer {
    pub fn new(
        single_variable_delay: Duration,
        bulk_variable_delay: Duration,
        lookup_cooldown: Duration,
    ) -> Self {
        Self {
            single_variable_delay,
            bulk_variable_delay,
            lookup_cooldown,
        }
    }

    pub fn delay_for(&self, kind: PauseKind) -> Duration {
        match kind {
            PauseKind::SingleVariable => self.single_variable_delay,
            PauseKind::BulkVariable => self.bulk_variable_delay,
            PauseKind::LookupCooldown => self.lookup_cooldown,
        }
    }
}

impl Default for FixedDelayPacer {
    fn default() -> Self {
        PacingConfig::default().into()
    }
}

impl From<PacingConfig> for FixedDelayPacer {
    fn from(cfg: PacingConfig) -> Self {
        Self::new(
            Duration::from_millis(cfg.single_variable_delay_ms),
            Duration::from_millis(cfg.bulk_variable_delay_ms),
            Duration::from_millis(cfg.lookup_cooldown_ms),
        )
    }
}

#[async_trait]
impl Pacer for FixedDelayPacer {
    async fn pause(&self, kind: PauseKind) {
        let delay = self.delay_for(kind);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Never waits. For tests and dry runs against local stubs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

#[async_trait]
impl Pacer for NoDelay {
    async fn pause(&self, _kind: PauseKind) {}
}

/// Never waits, but remembers every pause it was asked for.
#[derive(Debug, Default)]
pub struct RecordingPacer {
    pauses: Mutex<Vec<PauseKind>>,
}

impl RecordingPacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pauses(&self) -> Vec<PauseKind> {
        self.pauses
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, kind: PauseKind) -> usize {
        self.pauses().iter().filter(|k| **k == kind).count()
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn pause(&self, kind: PauseKind) {
        if let Ok(mut pauses) = self.pauses.lock() {
            pauses.push(kind);
        }
    }
}
