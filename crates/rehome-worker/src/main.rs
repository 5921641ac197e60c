#![allow(clippy::pedantic)]
#![allow(clippy::nursery)]
#![deny(clippy::unwrap_used)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]

use std::process::ExitCode;

use serde::Serialize;

mod cli;
mod config;
mod jobs;
mod runtime;
mod settings;

use cli::RunMode;
use jobs::JobError;

#[tokio::main]
async fn main() -> ExitCode {
    let run_mode = cli::parse_args();
    runtime::init_tracing();
    let settings = settings::Settings::from_env();
    runtime::log_startup(&settings, run_mode.name());

    match run(&settings, &run_mode).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err.exit_code();
            let reschedule_reason = match &err {
                JobError::Reassign(inner) => inner.reschedule_reason(),
                _ => None,
            };
            tracing::error!(
                event = "job_failed",
                command = run_mode.name(),
                exit_code = code,
                reschedule_reason,
                error = %err,
                "rehome worker job failed"
            );
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

async fn run(settings: &settings::Settings, run_mode: &RunMode) -> Result<(), JobError> {
    let pool = rehome_db::connect_postgres_with_max(&settings.db_url, settings.db_pool_max).await?;
    match run_mode {
        RunMode::Migrate => {
            rehome_db::migrate(&pool).await?;
            tracing::info!(event = "migrations_applied", "migrations applied");
        }
        RunMode::VerifyRegistry => {
            jobs::verify_registry(&pool, &settings.config).await?;
        }
        RunMode::Replay(args) => {
            let outcome = jobs::replay(&pool, &settings.config, args).await?;
            print_summary(&outcome_summary(
                "replay",
                replay_status(&outcome),
                outcome.stats(),
            ));
        }
        RunMode::Direct(args) => {
            let outcome = jobs::direct(&pool, &settings.config, args).await?;
            let stats = match &outcome {
                rehome_engine::DirectOutcome::Disabled => None,
                rehome_engine::DirectOutcome::Finished(stats) => Some(stats),
            };
            let status = if stats.is_some() { "finished" } else { "disabled" };
            print_summary(&outcome_summary("direct", status, stats));
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct Summary<'a, T: Serialize> {
    command: &'static str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<&'a T>,
}

fn outcome_summary<'a, T: Serialize>(
    command: &'static str,
    status: &'static str,
    stats: Option<&'a T>,
) -> Summary<'a, T> {
    Summary {
        command,
        status,
        stats,
    }
}

fn replay_status(outcome: &rehome_engine::ReplayOutcome) -> &'static str {
    match outcome {
        rehome_engine::ReplayOutcome::Skipped => "skipped",
        rehome_engine::ReplayOutcome::Completed(_) => "completed",
        rehome_engine::ReplayOutcome::Incomplete(_) => "incomplete",
    }
}

fn print_summary<T: Serialize>(summary: &Summary<'_, T>) {
    match serde_json::to_string(summary) {
        Ok(json) => println!("{json}"),
        Err(err) => tracing::warn!(event = "summary_encode_failed", error = %err),
    }
}
