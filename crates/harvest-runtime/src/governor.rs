// Copyright 2026 Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Retry/rate governor — whole-session budgets, pacing, and cooldowns.
//!
//! The governor wraps each session in a wall-clock budget, runs at most
//! `max_attempts` whole-session attempts (default 1: log and move on, the
//! remote penalizes hammering), and sleeps the configured pacing delay
//! before handing control back — a jittered delay normally, the longer
//! fixed cooldown after a failure. All delays are parameters and may be
//! zero; sleeps abort early on cancellation.

use std::time::Duration;

use harvest_core::{FailureKind, RegistryItem, SessionOutcome};
use tokio_util::sync::CancellationToken;

use crate::config::{PacingConfig, TargetProfile};
use crate::driver::{jitter_ms, SessionDriver};
use crate::session::InteractiveSession;

pub struct Governor {
    pacing: PacingConfig,
    cancel: CancellationToken,
}

impl Governor {
    pub fn new(pacing: PacingConfig, cancel: CancellationToken) -> Self {
        Self { pacing, cancel }
    }

    /// Run one governed session for `item` and pace before returning, so
    /// two consecutive `run` calls are always separated by the configured
    /// delay.
    pub async fn run<S: InteractiveSession>(
        &self,
        item: &RegistryItem,
        session: &mut S,
        target: &TargetProfile,
    ) -> SessionOutcome {
        let mut outcome = self.attempt(item, session, target).await;

        let mut attempt = 1u32;
        while self.retryable(&outcome) && attempt < self.pacing.max_attempts {
            attempt += 1;
            tracing::info!(item = %item, attempt, "retrying whole session after cooldown");
            self.sleep_ms(self.pacing.failure_cooldown_ms).await;
            if self.cancel.is_cancelled() {
                break;
            }
            outcome = self.attempt(item, session, target).await;
        }

        if outcome.is_failed() {
            tracing::warn!(item = %item, "session failed, backing off");
            self.sleep_ms(self.pacing.failure_cooldown_ms).await;
        } else {
            let ms = jitter_ms(self.pacing.item_delay_min_ms, self.pacing.item_delay_max_ms);
            self.sleep_ms(ms).await;
        }

        outcome
    }

    /// A failure is worth retrying unless the run itself is shutting down.
    fn retryable(&self, outcome: &SessionOutcome) -> bool {
        matches!(
            outcome,
            SessionOutcome::Failed { kind, .. } if *kind != FailureKind::Cancelled
        )
    }

    async fn attempt<S: InteractiveSession>(
        &self,
        item: &RegistryItem,
        session: &mut S,
        target: &TargetProfile,
    ) -> SessionOutcome {
        let budget = Duration::from_millis(self.pacing.session_timeout_ms);
        let mut driver = SessionDriver::new(session, target, &self.pacing, self.cancel.clone());

        match tokio::time::timeout(budget, driver.drive(item)).await {
            Ok(outcome) => outcome,
            Err(_) => SessionOutcome::failed(
                FailureKind::Timeout,
                format!(
                    "session exceeded the {}ms wall-clock budget",
                    self.pacing.session_timeout_ms
                ),
            ),
        }
    }

    async fn sleep_ms(&self, ms: u64) {
        if ms == 0 {
            return;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(Duration::from_millis(ms)) => {}
        }
    }
}
