#![allow(clippy::pedantic)]
#![allow(clippy::nursery)]
#![deny(clippy::unwrap_used)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
mod conflict;
pub mod direct;
pub mod errors;
mod memberships;
pub mod replay;
pub mod throttle;

pub use config::{DirectConfig, ReassignmentConfig, ThrottlingConfig};
pub use direct::{DirectEngine, DirectOutcome, DirectRequest, DirectStats};
pub use errors::ReassignError;
pub use replay::{ReplayEngine, ReplayOutcome, ReplayStats};
pub use throttle::{ExecutionBudget, ExecutionTracker, HealthCache, Throttle};
