//! Session-driver state machine tests against a scripted session.
//!
//! No browser involved: the mock records every interaction call so the
//! tests can assert exactly what the workflow does — and stops doing —
//! in each terminal case. Pacing is zeroed throughout; humanization
//! delays are a no-op here, never something to assert on.

use async_trait::async_trait;
use harvest_core::{FailureKind, RegistryItem, SessionOutcome};
use harvest_runtime::config::{PacingConfig, SubmitMode, TargetProfile};
use harvest_runtime::driver::SessionDriver;
use harvest_runtime::session::{InteractiveSession, SessionError, SessionKey};
use tokio_util::sync::CancellationToken;

/// Records calls in order; serves configured content; fails chosen
/// selectors on demand.
#[derive(Default)]
struct ScriptedSession {
    calls: Vec<String>,
    timeout_on_wait: Option<String>,
    fail_click_on: Option<String>,
    results_html: String,
    detail_html: String,
}

#[async_trait]
impl InteractiveSession for ScriptedSession {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.calls.push(format!("navigate:{url}"));
        Ok(())
    }

    async fn wait_visible(&mut self, selector: &str, timeout_ms: u64) -> Result<(), SessionError> {
        self.calls.push(format!("wait:{selector}"));
        if self.timeout_on_wait.as_deref() == Some(selector) {
            return Err(SessionError::Timeout {
                what: selector.to_string(),
                waited_ms: timeout_ms,
            });
        }
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), SessionError> {
        self.calls.push(format!("click:{selector}"));
        if self.fail_click_on.as_deref() == Some(selector) {
            return Err(SessionError::Interaction(format!(
                "no element matching {selector}"
            )));
        }
        Ok(())
    }

    async fn type_keys(&mut self, keys: &[SessionKey]) -> Result<(), SessionError> {
        for key in keys {
            let rendered = match key {
                SessionKey::Text(text) => format!("text:{text}"),
                SessionKey::Enter => "enter".to_string(),
                SessionKey::Tab => "tab".to_string(),
                SessionKey::ArrowDown => "arrowdown".to_string(),
                SessionKey::Backspace => "backspace".to_string(),
                SessionKey::SelectAll => "selectall".to_string(),
            };
            self.calls.push(format!("keys:{rendered}"));
        }
        Ok(())
    }

    async fn read_content(&mut self, selector: &str) -> Result<String, SessionError> {
        self.calls.push(format!("read:{selector}"));
        if selector == "html" {
            Ok(self.results_html.clone())
        } else {
            Ok(self.detail_html.clone())
        }
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.calls.push("close".to_string());
        Ok(())
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

fn item() -> RegistryItem {
    RegistryItem::new("OL1O", "00140441").unwrap()
}

async fn drive_with(session: &mut ScriptedSession, target: &TargetProfile) -> SessionOutcome {
    let pacing = PacingConfig::zero();
    let mut driver = SessionDriver::new(session, target, &pacing, CancellationToken::new());
    driver.drive(&item()).await
}

#[tokio::test]
async fn test_happy_path_reaches_found_with_exact_call_order() {
    let mut session = ScriptedSession {
        results_html: "<html>one result</html>".to_string(),
        detail_html: "<div id=\"record\">full record</div>".to_string(),
        ..Default::default()
    };

    let outcome = drive_with(&mut session, &target()).await;
    assert_eq!(
        outcome,
        SessionOutcome::Found {
            artifact: "<div id=\"record\">full record</div>".to_string()
        }
    );

    let expected = vec![
        "navigate:https://registry.test/search",
        "wait:#realm",
        "click:#realm",
        "keys:selectall",
        "keys:backspace",
        "keys:text:OL1O",
        "keys:arrowdown",
        "keys:enter",
        "click:#serial",
        "keys:text:00140441",
        "click:#digit",
        "keys:text:9",
        "keys:enter",
        "read:html",
        "wait:#open-detail",
        "click:#open-detail",
        "wait:#record",
        "read:#record",
    ];
    assert_eq!(session.calls, expected);
}

#[tokio::test]
async fn test_not_found_marker_terminates_without_detail_navigation() {
    let mut session = ScriptedSession {
        results_html: "<html>sorry, no record was found here</html>".to_string(),
        detail_html: "<div>never read</div>".to_string(),
        ..Default::default()
    };

    let outcome = drive_with(&mut session, &target()).await;
    assert_eq!(outcome, SessionOutcome::NotFound);

    // Result evaluation is the last interaction; no detail steps follow.
    assert_eq!(session.calls.last().unwrap(), "read:html");
    assert!(!session.calls.iter().any(|c| c.contains("#open-detail")));
    assert!(!session.calls.iter().any(|c| c.contains("#record")));
}

#[tokio::test]
async fn test_wait_timeout_fails_with_no_further_calls() {
    let mut session = ScriptedSession {
        timeout_on_wait: Some("#realm".to_string()),
        ..Default::default()
    };

    let outcome = drive_with(&mut session, &target()).await;
    match outcome {
        SessionOutcome::Failed { kind, detail } => {
            assert_eq!(kind, FailureKind::Timeout);
            // The failing state is named in the detail.
            assert!(detail.starts_with("start:"), "detail was {detail:?}");
        }
        other => panic!("expected timeout failure, got {other:?}"),
    }

    assert_eq!(
        session.calls,
        vec!["navigate:https://registry.test/search", "wait:#realm"]
    );
}

#[tokio::test]
async fn test_detail_wait_timeout_fails_in_detail_opened_state() {
    let mut session = ScriptedSession {
        results_html: "<html>one result</html>".to_string(),
        timeout_on_wait: Some("#record".to_string()),
        ..Default::default()
    };

    let outcome = drive_with(&mut session, &target()).await;
    match outcome {
        SessionOutcome::Failed { kind, detail } => {
            assert_eq!(kind, FailureKind::Timeout);
            assert!(detail.starts_with("detail_opened:"), "detail was {detail:?}");
        }
        other => panic!("expected timeout failure, got {other:?}"),
    }

    assert_eq!(session.calls.last().unwrap(), "wait:#record");
    assert!(!session.calls.iter().any(|c| c == "read:#record"));
}

#[tokio::test]
async fn test_interaction_error_maps_to_interaction_failure() {
    let mut session = ScriptedSession {
        fail_click_on: Some("#serial".to_string()),
        results_html: "<html>irrelevant</html>".to_string(),
        ..Default::default()
    };

    let outcome = drive_with(&mut session, &target()).await;
    match outcome {
        SessionOutcome::Failed { kind, detail } => {
            assert_eq!(kind, FailureKind::Interaction);
            assert!(detail.starts_with("realm_entered:"), "detail was {detail:?}");
        }
        other => panic!("expected interaction failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_submit_via_click_uses_the_configured_control() {
    let mut session = ScriptedSession {
        results_html: "<html>one result</html>".to_string(),
        detail_html: "<div>record</div>".to_string(),
        ..Default::default()
    };

    let mut profile = target();
    profile.submit = SubmitMode::Click {
        selector: "#search-btn".to_string(),
    };

    let outcome = drive_with(&mut session, &profile).await;
    assert!(matches!(outcome, SessionOutcome::Found { .. }));

    assert!(session.calls.iter().any(|c| c == "click:#search-btn"));
    // The only Enter is the realm type-ahead confirmation.
    let enters = session.calls.iter().filter(|c| *c == "keys:enter").count();
    assert_eq!(enters, 1);
}

#[tokio::test]
async fn test_pre_cancelled_token_unwinds_before_any_interaction() {
    let mut session = ScriptedSession::default();
    let target = target();
    let pacing = PacingConfig::zero();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut driver = SessionDriver::new(&mut session, &target, &pacing, cancel);
    let outcome = driver.drive(&item()).await;

    match outcome {
        SessionOutcome::Failed { kind, .. } => assert_eq!(kind, FailureKind::Cancelled),
        other => panic!("expected cancelled failure, got {other:?}"),
    }
    assert!(session.calls.is_empty());
}
