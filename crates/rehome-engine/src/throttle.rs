//! Circuit breakers around each unit of reassignment work: an execution-time
//! budget, a database health gate, per-table availability and batch pacing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use rehome_core::{HealthProbe, HealthSignal};

use crate::config::ReassignmentConfig;
use crate::errors::ReassignError;

pub trait ExecutionTracker: Send + Sync {
    fn over_limit(&self) -> bool;
}

/// Wall-clock budget measured from the start of an invocation.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionBudget {
    started_at: Instant,
    budget: Duration,
}

impl ExecutionBudget {
    pub fn start(budget: Duration) -> Self {
        Self {
            started_at: Instant::now(),
            budget,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl ExecutionTracker for ExecutionBudget {
    fn over_limit(&self) -> bool {
        self.elapsed() > self.budget
    }
}

/// Health verdict shared across invocations until its TTL runs out.
#[derive(Debug, Clone)]
pub struct HealthCache {
    ttl: Duration,
    inner: Arc<Mutex<Option<(Instant, HealthSignal)>>>,
}

impl HealthCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Arc::new(Mutex::new(None)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<(Instant, HealthSignal)>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn get(&self) -> Option<HealthSignal> {
        let guard = self.lock();
        guard
            .as_ref()
            .filter(|(checked_at, _)| checked_at.elapsed() < self.ttl)
            .map(|(_, signal)| signal.clone())
    }

    pub fn store(&self, signal: HealthSignal) {
        *self.lock() = Some((Instant::now(), signal));
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }
}

/// Per-invocation throttling state. Build one for each engine call.
pub struct Throttle<'a> {
    enabled: bool,
    probe: &'a dyn HealthProbe,
    health_cache: HealthCache,
    tracker: Box<dyn ExecutionTracker + 'a>,
    pacing: Duration,
    health_checked: bool,
    tables: HashMap<String, bool>,
}

impl<'a> Throttle<'a> {
    pub fn new(config: &ReassignmentConfig, probe: &'a dyn HealthProbe, cache: HealthCache) -> Self {
        Self {
            enabled: config.throttling.enabled,
            probe,
            health_cache: cache,
            tracker: Box::new(ExecutionBudget::start(config.execution_budget())),
            pacing: config.relation_batch_sleep(),
            health_checked: false,
            tables: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_tracker(mut self, tracker: impl ExecutionTracker + 'a) -> Self {
        self.tracker = Box::new(tracker);
        self
    }

    #[must_use]
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Runs the database health gate once per invocation.
    pub async fn ensure_healthy(&mut self) -> Result<(), ReassignError> {
        if !self.enabled || self.health_checked {
            return Ok(());
        }
        let signal = match self.health_cache.get() {
            Some(signal) => signal,
            None => {
                let signal = self.probe.check().await?;
                self.health_cache.store(signal.clone());
                signal
            }
        };
        self.health_checked = true;
        match signal {
            HealthSignal::Healthy => Ok(()),
            HealthSignal::Unhealthy(reason) => {
                tracing::warn!(
                    event = "db_unhealthy",
                    reason = %reason,
                    "Database unhealthy. Rescheduling reassignment"
                );
                Err(ReassignError::DatabaseUnhealthy(reason))
            }
        }
    }

    pub fn check_execution_time(&self) -> Result<(), ReassignError> {
        if self.tracker.over_limit() {
            tracing::info!(
                event = "execution_time_exceeded",
                "Execution time budget exceeded, stopping reassignment"
            );
            return Err(ReassignError::ExecutionTimeExceeded);
        }
        Ok(())
    }

    /// Whether `table` may be written during this invocation. The answer is
    /// fixed on first asking.
    pub async fn table_available(&mut self, table: &str, model: &str) -> Result<bool, ReassignError> {
        if !self.enabled {
            return Ok(true);
        }
        if let Some(available) = self.tables.get(table) {
            return Ok(*available);
        }
        let available = !self.probe.table_unavailable(table).await?;
        if !available {
            tracing::warn!(
                event = "table_unavailable",
                table,
                model,
                "{table} table unavailable. Skipping reassignment for model"
            );
        }
        self.tables.insert(table.to_string(), available);
        Ok(available)
    }

    /// Sleeps between batches. Returns whether a sleep happened.
    pub async fn pace(&self) -> bool {
        if self.pacing.is_zero() {
            return false;
        }
        tokio::time::sleep(self.pacing).await;
        true
    }
}
