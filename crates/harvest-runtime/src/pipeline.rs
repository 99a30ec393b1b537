// Copyright 2026 Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pipeline orchestrator — drains the identifier feed, governs each
//! session, and routes outcomes.
//!
//! One logical worker processes items strictly in ascending serial order
//! against a single exclusively-owned browser session; the remote target
//! penalizes concurrent access, so laziness here is about memory and
//! cancellation, never parallelism. The generator runs as an independent
//! producer behind a depth-1 bounded channel: it can be at most one item
//! ahead of the consumer, and dies when the consumer stops pulling.

use std::collections::HashSet;
use std::time::Instant;

use harvest_core::{FailureKind, RegistryItem, SessionOutcome};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::{HarvestConfig, TargetProfile};
use crate::governor::Governor;
use crate::journal::Journal;
use crate::progress::{self, HarvestEventKind, ProgressSender};
use crate::session::InteractiveSession;
use crate::sink::ArtifactSink;

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestReport {
    /// Sessions actually driven.
    pub attempted: u64,
    pub found: u64,
    pub not_found: u64,
    pub failed: u64,
    /// Items skipped before any session ran (resume).
    pub skipped: u64,
    pub cancelled: bool,
}

/// Post-extraction verification the caller supplies; an artifact failing
/// it is recorded as not-found instead of persisted.
pub type ArtifactCheck = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Spawn the identifier producer behind a depth-1 bounded channel.
///
/// The producer reserves a slot *before* pulling the next item from the
/// generator, so at most one undelivered item ever exists. A dropped
/// receiver fails the reservation and ends the task; the cancellation
/// token ends it even while parked waiting for a slot.
pub fn spawn_item_feed<I>(mut items: I, cancel: CancellationToken) -> mpsc::Receiver<RegistryItem>
where
    I: Iterator<Item = RegistryItem> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        loop {
            let permit = tokio::select! {
                _ = cancel.cancelled() => break,
                reserved = tx.reserve() => match reserved {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            match items.next() {
                Some(item) => permit.send(item),
                None => break,
            }
        }
    });
    rx
}

/// Owns the run: session, sink, governor, and outcome routing.
pub struct Orchestrator<S, K> {
    session: S,
    sink: K,
    governor: Governor,
    target: TargetProfile,
    cancel: CancellationToken,
    progress: Option<ProgressSender>,
    journal: Option<Journal>,
    artifact_check: Option<ArtifactCheck>,
    skip: HashSet<String>,
}

impl<S: InteractiveSession, K: ArtifactSink> Orchestrator<S, K> {
    pub fn new(session: S, sink: K, config: &HarvestConfig, cancel: CancellationToken) -> Self {
        Self {
            session,
            sink,
            governor: Governor::new(config.pacing.clone(), cancel.clone()),
            target: config.target.clone(),
            cancel,
            progress: None,
            journal: None,
            artifact_check: None,
            skip: HashSet::new(),
        }
    }

    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn with_artifact_check(mut self, check: ArtifactCheck) -> Self {
        self.artifact_check = Some(check);
        self
    }

    /// Serials to skip without driving a session (resume).
    pub fn with_skip(mut self, skip: HashSet<String>) -> Self {
        self.skip = skip;
        self
    }

    /// The underlying session, for teardown after the run.
    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    /// Drain `items` to completion or cancellation.
    pub async fn run<I>(&mut self, items: I) -> HarvestReport
    where
        I: Iterator<Item = RegistryItem> + Send + 'static,
    {
        let started = Instant::now();
        let mut report = HarvestReport::default();
        let mut seq = 0u64;
        let mut rx = spawn_item_feed(items, self.cancel.clone());

        while let Some(item) = rx.recv().await {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            if self.skip.contains(&item.serial_number) {
                report.skipped += 1;
                tracing::debug!(item = %item, "skipping journaled identifier");
                progress::emit(
                    &self.progress,
                    &mut seq,
                    HarvestEventKind::ItemSkipped {
                        identifier: item.identifier(),
                        reason: "already completed".to_string(),
                    },
                );
                continue;
            }

            progress::emit(
                &self.progress,
                &mut seq,
                HarvestEventKind::ItemStarted {
                    identifier: item.identifier(),
                },
            );
            report.attempted += 1;

            let outcome = self
                .governor
                .run(&item, &mut self.session, &self.target)
                .await;

            let outcome = match outcome {
                SessionOutcome::Found { artifact } => {
                    let verified = self
                        .artifact_check
                        .as_ref()
                        .map_or(true, |check| check(&artifact));
                    if verified {
                        self.persist(&item, artifact, &mut report)
                    } else {
                        tracing::info!(item = %item, "artifact failed the verification check");
                        report.not_found += 1;
                        SessionOutcome::NotFound
                    }
                }
                SessionOutcome::NotFound => {
                    report.not_found += 1;
                    SessionOutcome::NotFound
                }
                SessionOutcome::Failed { kind, detail } => {
                    report.failed += 1;
                    tracing::warn!(item = %item, kind = %kind, "session failed: {detail}");
                    SessionOutcome::Failed { kind, detail }
                }
            };

            if let Some(journal) = &mut self.journal {
                if let Err(e) = journal.record(&item, &outcome) {
                    tracing::warn!(item = %item, "journal write failed: {e}");
                    progress::emit(
                        &self.progress,
                        &mut seq,
                        HarvestEventKind::Warning {
                            message: format!("journal write failed: {e}"),
                        },
                    );
                }
            }

            progress::emit(
                &self.progress,
                &mut seq,
                HarvestEventKind::ItemCompleted {
                    identifier: item.identifier(),
                    outcome: outcome.label().to_string(),
                    attempted: report.attempted,
                    found: report.found,
                    not_found: report.not_found,
                    failed: report.failed,
                },
            );

            if matches!(
                outcome,
                SessionOutcome::Failed {
                    kind: FailureKind::Cancelled,
                    ..
                }
            ) {
                report.cancelled = true;
                break;
            }
        }

        if self.cancel.is_cancelled() {
            report.cancelled = true;
        }

        progress::emit(
            &self.progress,
            &mut seq,
            HarvestEventKind::HarvestComplete {
                attempted: report.attempted,
                found: report.found,
                not_found: report.not_found,
                failed: report.failed,
                cancelled: report.cancelled,
                elapsed_ms: started.elapsed().as_millis() as u64,
            },
        );
        tracing::info!(
            attempted = report.attempted,
            found = report.found,
            not_found = report.not_found,
            failed = report.failed,
            skipped = report.skipped,
            cancelled = report.cancelled,
            "harvest finished"
        );

        report
    }

    fn persist(
        &self,
        item: &RegistryItem,
        artifact: String,
        report: &mut HarvestReport,
    ) -> SessionOutcome {
        match self.sink.store(item, &artifact) {
            Ok(path) => {
                report.found += 1;
                tracing::info!(item = %item, path = %path.display(), "stored artifact");
                SessionOutcome::Found { artifact }
            }
            Err(e) => {
                // Journaled as failed so a resume retries the identifier.
                report.failed += 1;
                tracing::error!(item = %item, "failed to persist artifact: {e}");
                SessionOutcome::failed(FailureKind::Interaction, format!("persistence: {e}"))
            }
        }
    }
}
