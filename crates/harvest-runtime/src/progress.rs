// Copyright 2026 Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Progress event types and broadcast channel for run telemetry.
//!
//! The pipeline emits [`HarvestEvent`]s through a `tokio::sync::broadcast`
//! channel to all subscribers (CLI progress bar, future socket clients).
//! When no subscriber exists, events are silently dropped.

use serde::{Deserialize, Serialize};

/// A progress event emitted during a harvest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestEvent {
    /// Monotonically increasing sequence number.
    pub seq: u64,
    /// The kind of progress event.
    pub event: HarvestEventKind,
}

/// The specific kind of progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HarvestEventKind {
    /// A session for an identifier is about to start.
    ItemStarted { identifier: String },
    /// An identifier was skipped before any session ran (resume).
    ItemSkipped { identifier: String, reason: String },
    /// A session reached a terminal outcome.
    ItemCompleted {
        identifier: String,
        outcome: String,
        attempted: u64,
        found: u64,
        not_found: u64,
        failed: u64,
    },
    /// The run finished (range exhausted or cancelled).
    HarvestComplete {
        attempted: u64,
        found: u64,
        not_found: u64,
        failed: u64,
        cancelled: bool,
        elapsed_ms: u64,
    },
    /// A non-fatal warning occurred.
    Warning { message: String },
}

/// Sender handle for emitting progress events.
pub type ProgressSender = tokio::sync::broadcast::Sender<HarvestEvent>;

/// Receiver handle for consuming progress events.
pub type ProgressReceiver = tokio::sync::broadcast::Receiver<HarvestEvent>;

/// Create a new progress broadcast channel with a bounded buffer.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(256)
}

/// Emit a progress event, silently ignoring send errors (which occur when
/// no receivers are listening).
pub fn emit(tx: &Option<ProgressSender>, seq: &mut u64, event: HarvestEventKind) {
    if let Some(sender) = tx {
        *seq += 1;
        let _ = sender.send(HarvestEvent { seq: *seq, event });
    }
}
