//! End-to-end pipeline tests: generator → governor → driver → sink, all
//! against an in-memory session, plus governor pacing tests under a
//! paused clock.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use harvest_core::{FailureKind, ItemGenerator, RegistryItem, SessionOutcome};
use harvest_runtime::config::{HarvestConfig, PacingConfig, SubmitMode, TargetProfile};
use harvest_runtime::governor::Governor;
use harvest_runtime::pipeline::Orchestrator;
use harvest_runtime::session::{InteractiveSession, SessionError, SessionKey};
use harvest_runtime::sink::{ArtifactSink, SinkError};
use tokio_util::sync::CancellationToken;

/// In-memory target: resolves each serial to a scripted outcome.
#[derive(Default)]
struct FleetSession {
    navigations: usize,
    current_serial: String,
    /// Serials the results page reports as missing.
    not_found: HashSet<String>,
    /// Serials whose detail control never appears.
    detail_timeout: HashSet<String>,
    /// Every realm-field wait times out (whole-session failure).
    realm_wait_fails: bool,
    /// Every wait stalls this long before answering (budget tests).
    wait_hang_ms: Option<u64>,
}

#[async_trait]
impl InteractiveSession for FleetSession {
    async fn navigate(&mut self, _url: &str) -> Result<(), SessionError> {
        self.navigations += 1;
        Ok(())
    }

    async fn wait_visible(&mut self, selector: &str, timeout_ms: u64) -> Result<(), SessionError> {
        if let Some(ms) = self.wait_hang_ms {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if self.realm_wait_fails && selector == "#realm" {
            return Err(SessionError::Timeout {
                what: selector.to_string(),
                waited_ms: timeout_ms,
            });
        }
        if selector == "#open-detail" && self.detail_timeout.contains(&self.current_serial) {
            return Err(SessionError::Timeout {
                what: selector.to_string(),
                waited_ms: timeout_ms,
            });
        }
        Ok(())
    }

    async fn click(&mut self, _selector: &str) -> Result<(), SessionError> {
        Ok(())
    }

    async fn type_keys(&mut self, keys: &[SessionKey]) -> Result<(), SessionError> {
        for key in keys {
            if let SessionKey::Text(text) = key {
                if text.len() == 8 && text.chars().all(|c| c.is_ascii_digit()) {
                    self.current_serial = text.clone();
                }
            }
        }
        Ok(())
    }

    async fn read_content(&mut self, selector: &str) -> Result<String, SessionError> {
        if selector == "html" {
            if self.not_found.contains(&self.current_serial) {
                Ok("<html>no record was found</html>".to_string())
            } else {
                Ok("<html>one result</html>".to_string())
            }
        } else {
            Ok(format!("<div>record {}</div>", self.current_serial))
        }
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        Ok(())
    }
}

/// Sink that remembers every store call, optionally cancelling the run
/// after N stores.
#[derive(Clone, Default)]
struct CollectingSink {
    stored: Arc<Mutex<Vec<(String, String)>>>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl ArtifactSink for CollectingSink {
    fn store(&self, item: &RegistryItem, payload: &str) -> Result<PathBuf, SinkError> {
        let mut stored = self.stored.lock().expect("sink lock poisoned");
        stored.push((item.serial_number.clone(), payload.to_string()));
        if let Some((n, token)) = &self.cancel_after {
            if stored.len() >= *n {
                token.cancel();
            }
        }
        Ok(PathBuf::from(format!("/mock/{}", item.serial_number)))
    }
}

fn target() -> TargetProfile {
    TargetProfile {
        entry_url: "https://registry.test/search".to_string(),
        realm_selector: "#realm".to_string(),
        serial_selector: "#serial".to_string(),
        digit_selector: "#digit".to_string(),
        submit: SubmitMode::EnterKey,
        detail_link_selector: "#open-detail".to_string(),
        detail_region_selector: "#record".to_string(),
        not_found_marker: "no record was found".to_string(),
        wait_timeout_ms: 50,
    }
}

fn config(start: u64, end: u64) -> HarvestConfig {
    HarvestConfig {
        realm_code: "OL1O".to_string(),
        start_serial: start,
        end_serial: end,
        journal_path: None,
        pacing: PacingConfig::zero(),
        target: target(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_ten_found_identifiers_stored_in_ascending_order() {
    let config = config(1, 10);
    let sink = CollectingSink::default();
    let mut orchestrator = Orchestrator::new(
        FleetSession::default(),
        sink.clone(),
        &config,
        CancellationToken::new(),
    );

    let report = orchestrator
        .run(ItemGenerator::new("OL1O", 1, 10))
        .await;

    assert_eq!(report.attempted, 10);
    assert_eq!(report.found, 10);
    assert_eq!(report.not_found, 0);
    assert_eq!(report.failed, 0);
    assert!(!report.cancelled);

    let stored = sink.stored.lock().unwrap();
    let serials: Vec<&str> = stored.iter().map(|(s, _)| s.as_str()).collect();
    let expected: Vec<String> = (1..=10).map(|n| format!("{n:08}")).collect();
    assert_eq!(serials, expected.iter().map(String::as_str).collect::<Vec<_>>());
    assert!(stored[0].1.contains("record 00000001"));
}

#[tokio::test]
async fn test_failures_and_not_found_do_not_abort_the_run() {
    let mut session = FleetSession::default();
    session.not_found.insert("00000003".to_string());
    session.detail_timeout.insert("00000005".to_string());

    let config = config(1, 10);
    let sink = CollectingSink::default();
    let mut orchestrator =
        Orchestrator::new(session, sink.clone(), &config, CancellationToken::new());

    let report = orchestrator
        .run(ItemGenerator::new("OL1O", 1, 10))
        .await;

    // Every identifier in range was attempted exactly once regardless of
    // the intervening failure.
    assert_eq!(report.attempted, 10);
    assert_eq!(report.found, 8);
    assert_eq!(report.not_found, 1);
    assert_eq!(report.failed, 1);

    let stored = sink.stored.lock().unwrap();
    assert_eq!(stored.len(), 8);
    assert!(!stored.iter().any(|(s, _)| s == "00000003" || s == "00000005"));
}

#[tokio::test]
async fn test_artifact_check_downgrades_found_to_not_found() {
    let config = config(1, 3);
    let sink = CollectingSink::default();
    let mut orchestrator = Orchestrator::new(
        FleetSession::default(),
        sink.clone(),
        &config,
        CancellationToken::new(),
    )
    .with_artifact_check(Box::new(|artifact| artifact.contains("record 00000002")));

    let report = orchestrator.run(ItemGenerator::new("OL1O", 1, 3)).await;

    assert_eq!(report.found, 1);
    assert_eq!(report.not_found, 2);

    let stored = sink.stored.lock().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].0, "00000002");
}

#[tokio::test]
async fn test_skip_set_suppresses_sessions_for_journaled_serials() {
    let config = config(1, 3);
    let sink = CollectingSink::default();
    let mut skip = HashSet::new();
    skip.insert("00000002".to_string());

    let mut orchestrator = Orchestrator::new(
        FleetSession::default(),
        sink.clone(),
        &config,
        CancellationToken::new(),
    )
    .with_skip(skip);

    let report = orchestrator.run(ItemGenerator::new("OL1O", 1, 3)).await;

    assert_eq!(report.attempted, 2);
    assert_eq!(report.skipped, 1);

    let stored = sink.stored.lock().unwrap();
    let serials: Vec<&str> = stored.iter().map(|(s, _)| s.as_str()).collect();
    assert_eq!(serials, vec!["00000001", "00000003"]);
}

#[tokio::test]
async fn test_cancellation_stops_the_run_promptly() {
    let cancel = CancellationToken::new();
    let config = config(1, 10);
    let sink = CollectingSink {
        stored: Arc::default(),
        cancel_after: Some((3, cancel.clone())),
    };

    let mut orchestrator =
        Orchestrator::new(FleetSession::default(), sink.clone(), &config, cancel);

    let report = orchestrator.run(ItemGenerator::new("OL1O", 1, 10)).await;

    assert!(report.cancelled);
    assert_eq!(report.found, 3);
    assert_eq!(report.attempted, 3);
    assert_eq!(sink.stored.lock().unwrap().len(), 3);
}

// ── Governor pacing (paused clock: sleeps auto-advance, nothing real) ──

fn pacing(item_delay_ms: u64, cooldown_ms: u64, max_attempts: u32) -> PacingConfig {
    PacingConfig {
        step_delay_min_ms: 0,
        step_delay_max_ms: 0,
        item_delay_min_ms: item_delay_ms,
        item_delay_max_ms: item_delay_ms,
        failure_cooldown_ms: cooldown_ms,
        session_timeout_ms: 60_000,
        max_attempts,
    }
}

fn item(serial: u64) -> RegistryItem {
    RegistryItem::new("OL1O", &format!("{serial:08}")).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_consecutive_runs_are_separated_by_the_item_delay() {
    let governor = Governor::new(pacing(500, 5_000, 1), CancellationToken::new());
    let mut session = FleetSession::default();
    let target = target();

    let t0 = tokio::time::Instant::now();
    let first = governor.run(&item(1), &mut session, &target).await;
    assert!(matches!(first, SessionOutcome::Found { .. }));
    // The pacing delay has fully elapsed before the next run may start.
    assert!(t0.elapsed() >= Duration::from_millis(500));

    let t1 = tokio::time::Instant::now();
    let second = governor.run(&item(2), &mut session, &target).await;
    assert!(matches!(second, SessionOutcome::Found { .. }));
    assert!(t1.elapsed() >= Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn test_failure_is_followed_by_the_longer_cooldown() {
    let governor = Governor::new(pacing(100, 5_000, 1), CancellationToken::new());
    let mut session = FleetSession {
        realm_wait_fails: true,
        ..Default::default()
    };
    let target = target();

    let t0 = tokio::time::Instant::now();
    let outcome = governor.run(&item(1), &mut session, &target).await;

    assert!(matches!(
        outcome,
        SessionOutcome::Failed {
            kind: FailureKind::Timeout,
            ..
        }
    ));
    assert!(t0.elapsed() >= Duration::from_millis(5_000));
    // Exactly one attempt by default: no hidden retry.
    assert_eq!(session.navigations, 1);
}

#[tokio::test(start_paused = true)]
async fn test_bounded_retry_reruns_the_whole_session() {
    let governor = Governor::new(pacing(100, 1_000, 2), CancellationToken::new());
    let mut session = FleetSession {
        realm_wait_fails: true,
        ..Default::default()
    };
    let target = target();

    let outcome = governor.run(&item(1), &mut session, &target).await;

    assert!(outcome.is_failed());
    // Whole-session retry, not step retry: a second fresh navigation.
    assert_eq!(session.navigations, 2);
}

#[tokio::test(start_paused = true)]
async fn test_wall_clock_budget_caps_a_stalled_session() {
    let mut config = pacing(0, 0, 1);
    config.session_timeout_ms = 1_000;
    let governor = Governor::new(config, CancellationToken::new());

    let mut session = FleetSession {
        wait_hang_ms: Some(10_000_000),
        ..Default::default()
    };
    let target = target();

    let outcome = governor.run(&item(1), &mut session, &target).await;

    match outcome {
        SessionOutcome::Failed { kind, detail } => {
            assert_eq!(kind, FailureKind::Timeout);
            assert!(detail.contains("wall-clock"), "detail was {detail:?}");
        }
        other => panic!("expected wall-clock timeout, got {other:?}"),
    }
}
