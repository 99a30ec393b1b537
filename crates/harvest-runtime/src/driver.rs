// Copyright 2026 Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Session driver — walks one registry item through the remote lookup
//! workflow as an explicit state machine.
//!
//! The workflow is linear: every state has exactly one successor, plus an
//! escape to a terminal `Failed` from any step and a terminal `NotFound`
//! at result evaluation. No step is retried here — retry policy belongs to
//! the governor, at whole-session granularity. Each `drive` call starts
//! with a fresh navigation, so nothing leaks between items even when the
//! underlying browser session is reused.

use harvest_core::{FailureKind, RegistryItem, SessionOutcome};
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::config::{PacingConfig, SubmitMode, TargetProfile};
use crate::session::{InteractiveSession, SessionError, SessionKey, DOCUMENT_SELECTOR};

/// Named states of the lookup workflow, in transition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveState {
    Start,
    FormLoaded,
    RealmEntered,
    NumberEntered,
    ChecksumEntered,
    Submitted,
    ResultEvaluated,
    DetailOpened,
    Extracted,
}

impl std::fmt::Display for DriveState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::FormLoaded => "form_loaded",
            Self::RealmEntered => "realm_entered",
            Self::NumberEntered => "number_entered",
            Self::ChecksumEntered => "checksum_entered",
            Self::Submitted => "submitted",
            Self::ResultEvaluated => "result_evaluated",
            Self::DetailOpened => "detail_opened",
            Self::Extracted => "extracted",
        };
        write!(f, "{name}")
    }
}

/// Pick a delay in `[min, max]` milliseconds.
pub(crate) fn jitter_ms(min: u64, max: u64) -> u64 {
    if max <= min {
        return min;
    }
    rand::thread_rng().gen_range(min..=max)
}

/// Drives one [`RegistryItem`] through the workflow against an
/// [`InteractiveSession`].
pub struct SessionDriver<'a, S: InteractiveSession> {
    session: &'a mut S,
    target: &'a TargetProfile,
    pacing: &'a PacingConfig,
    cancel: CancellationToken,
}

impl<'a, S: InteractiveSession> SessionDriver<'a, S> {
    pub fn new(
        session: &'a mut S,
        target: &'a TargetProfile,
        pacing: &'a PacingConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session,
            target,
            pacing,
            cancel,
        }
    }

    /// Run the full workflow for `item`. Always returns a terminal outcome;
    /// the item is submitted at most once per call.
    pub async fn drive(&mut self, item: &RegistryItem) -> SessionOutcome {
        let mut state = DriveState::Start;

        loop {
            if self.cancel.is_cancelled() {
                return SessionOutcome::failed(
                    FailureKind::Cancelled,
                    format!("cancelled in state {state}"),
                );
            }

            let step = match state {
                DriveState::Start => self.load_form().await.map(|_| DriveState::FormLoaded),
                DriveState::FormLoaded => {
                    self.enter_realm(item).await.map(|_| DriveState::RealmEntered)
                }
                DriveState::RealmEntered => self
                    .enter_serial(item)
                    .await
                    .map(|_| DriveState::NumberEntered),
                DriveState::NumberEntered => self
                    .enter_check_digit(item)
                    .await
                    .map(|_| DriveState::ChecksumEntered),
                DriveState::ChecksumEntered => {
                    self.submit().await.map(|_| DriveState::Submitted)
                }
                DriveState::Submitted => match self.result_has_not_found_marker().await {
                    Ok(true) => {
                        tracing::info!(item = %item, "registry reports no such record");
                        return SessionOutcome::NotFound;
                    }
                    Ok(false) => Ok(DriveState::ResultEvaluated),
                    Err(e) => Err(e),
                },
                DriveState::ResultEvaluated => {
                    self.open_detail().await.map(|_| DriveState::DetailOpened)
                }
                DriveState::DetailOpened => match self.extract().await {
                    Ok(artifact) => {
                        tracing::debug!(item = %item, from = %state, to = %DriveState::Extracted, "transition");
                        return SessionOutcome::Found { artifact };
                    }
                    Err(e) => Err(e),
                },
                // Terminal states return above; reaching here is a logic bug,
                // surfaced as an interaction failure rather than a panic.
                DriveState::Extracted => {
                    return SessionOutcome::failed(
                        FailureKind::Interaction,
                        "drive loop re-entered a terminal state",
                    )
                }
            };

            match step {
                Ok(next) => {
                    tracing::debug!(item = %item, from = %state, to = %next, "transition");
                    state = next;
                }
                Err(e) => {
                    tracing::warn!(item = %item, state = %state, "session step failed: {e}");
                    return SessionOutcome::failed(e.failure_kind(), format!("{state}: {e}"));
                }
            }
        }
    }

    /// Humanization pause between sub-steps. A no-op at zero bounds.
    async fn pause(&self) {
        let ms = jitter_ms(self.pacing.step_delay_min_ms, self.pacing.step_delay_max_ms);
        if ms == 0 {
            return;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(std::time::Duration::from_millis(ms)) => {}
        }
    }

    async fn load_form(&mut self) -> Result<(), SessionError> {
        self.session.navigate(&self.target.entry_url).await?;
        self.session
            .wait_visible(&self.target.realm_selector, self.target.wait_timeout_ms)
            .await?;
        self.pause().await;
        Ok(())
    }

    async fn enter_realm(&mut self, item: &RegistryItem) -> Result<(), SessionError> {
        self.session.click(&self.target.realm_selector).await?;
        self.pause().await;

        // Clear any residue before typing, then confirm the type-ahead
        // suggestion the site pops up.
        self.session
            .type_keys(&[SessionKey::SelectAll, SessionKey::Backspace])
            .await?;
        self.session
            .type_keys(&[SessionKey::Text(item.realm_code.clone())])
            .await?;
        self.pause().await;
        self.session.type_keys(&[SessionKey::ArrowDown]).await?;
        self.pause().await;
        self.session.type_keys(&[SessionKey::Enter]).await?;
        self.pause().await;
        Ok(())
    }

    async fn enter_serial(&mut self, item: &RegistryItem) -> Result<(), SessionError> {
        self.session.click(&self.target.serial_selector).await?;
        self.pause().await;
        self.session
            .type_keys(&[SessionKey::Text(item.serial_number.clone())])
            .await?;
        Ok(())
    }

    async fn enter_check_digit(&mut self, item: &RegistryItem) -> Result<(), SessionError> {
        self.session.click(&self.target.digit_selector).await?;
        self.pause().await;
        self.session
            .type_keys(&[SessionKey::Text(item.check_digit.clone())])
            .await?;
        Ok(())
    }

    async fn submit(&mut self) -> Result<(), SessionError> {
        match &self.target.submit {
            SubmitMode::Click { selector } => self.session.click(selector).await?,
            SubmitMode::EnterKey => self.session.type_keys(&[SessionKey::Enter]).await?,
        }
        self.pause().await;
        Ok(())
    }

    async fn result_has_not_found_marker(&mut self) -> Result<bool, SessionError> {
        let html = self.session.read_content(DOCUMENT_SELECTOR).await?;
        Ok(html.contains(&self.target.not_found_marker))
    }

    async fn open_detail(&mut self) -> Result<(), SessionError> {
        self.session
            .wait_visible(&self.target.detail_link_selector, self.target.wait_timeout_ms)
            .await?;
        self.session.click(&self.target.detail_link_selector).await?;
        self.pause().await;
        Ok(())
    }

    async fn extract(&mut self) -> Result<String, SessionError> {
        self.session
            .wait_visible(
                &self.target.detail_region_selector,
                self.target.wait_timeout_ms,
            )
            .await?;
        self.session
            .read_content(&self.target.detail_region_selector)
            .await
    }
}
