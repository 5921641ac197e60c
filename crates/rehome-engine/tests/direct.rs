mod support;

use rehome_core::VerifiedRegistry;
use rehome_db::local::{LocalContributionRepo, LocalHealthProbe};
use rehome_db::SqlitePool;
use rehome_engine::{
    DirectConfig, DirectEngine, DirectOutcome, DirectRequest, DirectStats, ReassignError,
    ReassignmentConfig,
};
use support::{
    exec, scalar, setup_db, test_config, verified_registry, LogCapture, TripAfter, DESTINATION,
    OTHER_PLACEHOLDER, PLACEHOLDER,
};
use tracing::Level;

const REQUEST: DirectRequest = DirectRequest {
    placeholder_user_id: PLACEHOLDER,
    reassign_to_user_id: DESTINATION,
    source_user_id: Some(7),
};

fn enabled_config() -> ReassignmentConfig {
    ReassignmentConfig {
        direct: DirectConfig { enabled: true },
        ..test_config()
    }
}

async fn direct(
    pool: &SqlitePool,
    registry: &VerifiedRegistry,
    probe: &LocalHealthProbe,
    config: &ReassignmentConfig,
) -> Result<DirectOutcome, ReassignError> {
    let contributions = LocalContributionRepo::new(pool);
    let throttle = support::throttle(config, probe);
    DirectEngine::new(&contributions, registry, throttle, config)
        .execute(REQUEST)
        .await
}

fn finished(outcome: DirectOutcome) -> DirectStats {
    match outcome {
        DirectOutcome::Finished(stats) => stats,
        DirectOutcome::Disabled => panic!("direct reassignment unexpectedly disabled"),
    }
}

async fn seed_contributions(pool: &SqlitePool) {
    exec(
        pool,
        "INSERT INTO merge_requests (id, title, author_id, merge_user_id) VALUES
            (1, 'one', 100, 100),
            (2, 'two', 100, NULL),
            (3, 'three', 100, 110),
            (4, 'four', 110, NULL),
            (5, 'five', 100, NULL)",
    )
    .await;
    exec(
        pool,
        "INSERT INTO notes (id, note, author_id, resolved_by_id) VALUES
            (1, 'lgtm', 100, NULL),
            (2, 'nit', 110, 100)",
    )
    .await;
    exec(
        pool,
        "INSERT INTO ci_builds (id, type, user_id) VALUES (1, 'Ci::Build', 100), (2, 'Ci::Bridge', 100)",
    )
    .await;
}

#[tokio::test]
async fn moves_every_placeholder_owned_row_once() {
    let pool = setup_db().await;
    let registry = verified_registry(&pool).await;
    let probe = LocalHealthProbe::default();
    let config = enabled_config();
    seed_contributions(&pool).await;

    let stats = finished(
        direct(&pool, &registry, &probe, &config)
            .await
            .expect("direct"),
    );
    assert_eq!(stats.rows_updated, 9);
    assert_eq!(stats.conflicts_resolved, 0);
    assert_eq!(stats.units_skipped, 0);
    assert_eq!(stats.units_processed, registry.pairs().count() as u64);

    assert_eq!(
        scalar(&pool, "SELECT COUNT(*) FROM merge_requests WHERE author_id = 200").await,
        Some(4)
    );
    assert_eq!(
        scalar(&pool, "SELECT merge_user_id FROM merge_requests WHERE id = 1").await,
        Some(DESTINATION)
    );
    assert_eq!(
        scalar(&pool, "SELECT author_id FROM merge_requests WHERE id = 4").await,
        Some(OTHER_PLACEHOLDER),
        "rows of other users are untouched"
    );
    assert_eq!(
        scalar(&pool, "SELECT resolved_by_id FROM notes WHERE id = 2").await,
        Some(DESTINATION)
    );
    assert_eq!(
        scalar(&pool, "SELECT COUNT(*) FROM ci_builds WHERE user_id = 200").await,
        Some(2)
    );

    let again = finished(
        direct(&pool, &registry, &probe, &config)
            .await
            .expect("second run"),
    );
    assert_eq!(again.rows_updated, 0);
    assert_eq!(again.conflicts_resolved, 0);
}

#[tokio::test]
async fn disabled_gate_has_no_side_effects() {
    let pool = setup_db().await;
    let registry = verified_registry(&pool).await;
    let probe = LocalHealthProbe::default();
    seed_contributions(&pool).await;

    let (logs, _guard) = LogCapture::install();
    let outcome = direct(&pool, &registry, &probe, &test_config())
        .await
        .expect("direct");
    assert_eq!(outcome, DirectOutcome::Disabled);
    assert!(logs.events().is_empty());
    assert_eq!(
        scalar(&pool, "SELECT COUNT(*) FROM merge_requests WHERE author_id = 100").await,
        Some(4)
    );
}

#[tokio::test]
async fn collisions_destroy_placeholder_rows() {
    let pool = setup_db().await;
    let registry = verified_registry(&pool).await;
    let probe = LocalHealthProbe::default();
    let config = enabled_config();
    exec(
        &pool,
        "INSERT INTO approvals (id, merge_request_id, user_id) VALUES
            (1, 1, 100),
            (2, 1, 200),
            (3, 2, 100)",
    )
    .await;
    exec(
        &pool,
        "INSERT INTO issue_assignees (issue_id, user_id) VALUES (1, 100), (1, 200), (2, 100)",
    )
    .await;

    let (logs, _guard) = LogCapture::install();
    let stats = finished(
        direct(&pool, &registry, &probe, &config)
            .await
            .expect("direct"),
    );
    assert_eq!(stats.conflicts_resolved, 2);
    assert_eq!(stats.rows_updated, 2);
    assert_eq!(
        scalar(&pool, "SELECT COUNT(*) FROM approvals WHERE user_id = 100").await,
        Some(0)
    );
    assert_eq!(
        scalar(&pool, "SELECT COUNT(*) FROM approvals").await,
        Some(2)
    );
    assert_eq!(
        scalar(&pool, "SELECT COUNT(*) FROM issue_assignees WHERE user_id = 200").await,
        Some(2)
    );
    assert_eq!(
        scalar(&pool, "SELECT COUNT(*) FROM issue_assignees").await,
        Some(2)
    );

    let destroyed = logs.find(
        Level::WARN,
        "Destroying contribution due to uniqueness constraint",
    );
    assert_eq!(destroyed.len(), 2);
    assert!(destroyed.iter().all(|event| event.fields["source_user_id"] == "7"));
}

#[tokio::test]
async fn unavailable_table_skips_its_units() {
    let pool = setup_db().await;
    let registry = verified_registry(&pool).await;
    let probe = LocalHealthProbe::new(vec!["notes".to_string()]);
    let config = enabled_config();
    seed_contributions(&pool).await;

    let stats = finished(
        direct(&pool, &registry, &probe, &config)
            .await
            .expect("direct"),
    );
    let note_columns = registry.columns_for("Note").map(<[String]>::len).unwrap_or(0) as u64;
    assert_eq!(stats.units_skipped, note_columns);
    assert_eq!(
        scalar(&pool, "SELECT author_id FROM notes WHERE id = 1").await,
        Some(PLACEHOLDER)
    );
    assert_eq!(
        scalar(&pool, "SELECT COUNT(*) FROM merge_requests WHERE author_id = 200").await,
        Some(4)
    );
}

#[tokio::test]
async fn execution_budget_interrupts_the_sweep() {
    let pool = setup_db().await;
    let registry = verified_registry(&pool).await;
    let probe = LocalHealthProbe::default();
    let config = enabled_config();
    seed_contributions(&pool).await;

    let contributions = LocalContributionRepo::new(&pool);
    // One check for the first unit, one per batch of the first unit.
    let (tracker, _) = TripAfter::new(3);
    let throttle = support::throttle(&config, &probe).with_tracker(tracker);
    let err = DirectEngine::new(&contributions, &registry, throttle, &config)
        .execute(REQUEST)
        .await
        .expect_err("budget");
    assert!(matches!(err, ReassignError::ExecutionTimeExceeded));
    assert_eq!(
        scalar(&pool, "SELECT COUNT(*) FROM merge_requests WHERE author_id = 200").await,
        Some(4),
        "the first unit ran to completion"
    );
    assert_eq!(
        scalar(&pool, "SELECT merge_user_id FROM merge_requests WHERE id = 1").await,
        Some(PLACEHOLDER)
    );

    // The next call carries on from the live table state.
    let stats = finished(
        direct(&pool, &registry, &probe, &config)
            .await
            .expect("resume"),
    );
    assert_eq!(stats.rows_updated, 5);
}

#[tokio::test]
async fn same_placeholder_and_destination_does_no_work() {
    let pool = setup_db().await;
    let registry = verified_registry(&pool).await;
    let probe = LocalHealthProbe::default();
    let config = ReassignmentConfig {
        batch_size: 2,
        ..enabled_config()
    };
    seed_contributions(&pool).await;

    let contributions = LocalContributionRepo::new(&pool);
    let (tracker, checks) = TripAfter::new(10_000);
    let throttle = support::throttle(&config, &probe).with_tracker(tracker);
    let (logs, _guard) = LogCapture::install();
    let stats = finished(
        DirectEngine::new(&contributions, &registry, throttle, &config)
            .execute(DirectRequest {
                reassign_to_user_id: PLACEHOLDER,
                ..REQUEST
            })
            .await
            .expect("direct"),
    );
    assert_eq!(stats, DirectStats::default());
    assert_eq!(checks.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert_eq!(
        logs.find(
            Level::WARN,
            "Placeholder and destination user are the same, nothing to reassign"
        )
        .len(),
        1
    );
    assert_eq!(
        scalar(&pool, "SELECT COUNT(*) FROM merge_requests WHERE author_id = 100").await,
        Some(4)
    );
}
