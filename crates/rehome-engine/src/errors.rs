use rehome_core::StoreError;

pub const RESCHEDULE_EXECUTION_TIME: &str = "execution_time_exceeded";
pub const RESCHEDULE_DB_HEALTH: &str = "db_health_check_failed";

/// Conditions that end an invocation. Everything else is absorbed per item.
#[derive(Debug, thiserror::Error)]
pub enum ReassignError {
    #[error("execution time budget exceeded")]
    ExecutionTimeExceeded,
    #[error("Rescheduling placeholder user records reassignment: database health ({0})")]
    DatabaseUnhealthy(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReassignError {
    /// Why a scheduler should run the invocation again later, if it should.
    pub fn reschedule_reason(&self) -> Option<&'static str> {
        match self {
            Self::ExecutionTimeExceeded => Some(RESCHEDULE_EXECUTION_TIME),
            Self::DatabaseUnhealthy(_) => Some(RESCHEDULE_DB_HEALTH),
            Self::Store(_) => None,
        }
    }

    pub fn is_reschedulable(&self) -> bool {
        self.reschedule_reason().is_some()
    }
}
