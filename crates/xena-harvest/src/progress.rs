// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Progress event types and broadcast channel for harvest telemetry.
//!
//! The harvester emits `ProgressEvent`s as each cohort moves through its
//! states, which flow through a `tokio::sync::broadcast` channel to all
//! subscribers. When no subscriber exists, events are silently dropped.

use crate::summary::SkipReason;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;

/// A progress event emitted during a harvest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// The run this event belongs to.
    pub run_id: String,
    /// Monotonically increasing sequence number.
    pub seq: u64,
    /// The kind of progress event.
    pub event: ProgressEventKind,
}

/// The specific kind of progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEventKind {
    /// The catalog page is being loaded.
    RunStarted { catalog_url: String },
    /// Cohort links were found on the catalog page.
    CohortsDiscovered { count: usize, selector: String },
    /// A cohort moved to a new state.
    CohortStateChanged { cohort: String, state: CohortState },
    /// A cohort was skipped; a `Cleaned` transition follows.
    CohortSkipped { cohort: String, reason: SkipReason },
    /// The run finished processing every cohort.
    RunComplete {
        harvested: usize,
        skipped: usize,
        elapsed_ms: u64,
    },
}

/// Lifecycle of a single cohort.
///
/// `Discovered → TabOpened → Navigated → LinkFound → Downloaded →
/// Decompressed → Cleaned`; a skip jumps straight to `Cleaned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CohortState {
    Discovered,
    TabOpened,
    Navigated,
    LinkFound,
    Downloaded,
    Decompressed,
    Cleaned,
}

impl std::fmt::Display for CohortState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discovered => write!(f, "discovered"),
            Self::TabOpened => write!(f, "tab opened"),
            Self::Navigated => write!(f, "navigated"),
            Self::LinkFound => write!(f, "link found"),
            Self::Downloaded => write!(f, "downloaded"),
            Self::Decompressed => write!(f, "decompressed"),
            Self::Cleaned => write!(f, "cleaned"),
        }
    }
}

/// Sender handle for emitting progress events.
pub type ProgressSender = tokio::sync::broadcast::Sender<ProgressEvent>;

/// Receiver handle for consuming progress events.
pub type ProgressReceiver = tokio::sync::broadcast::Receiver<ProgressEvent>;

/// Create a new progress broadcast channel with a bounded buffer.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(256)
}

/// Stamps events with a run id and sequence number before sending.
#[derive(Debug, Clone)]
pub struct ProgressEmitter {
    tx: Option<ProgressSender>,
    run_id: String,
    seq: u64,
}

impl ProgressEmitter {
    pub fn new(tx: Option<ProgressSender>, run_id: impl Into<String>) -> Self {
        Self {
            tx,
            run_id: run_id.into(),
            seq: 0,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Emit an event, silently ignoring send errors (which occur when no
    /// receivers are listening).
    pub fn emit(&mut self, event: ProgressEventKind) {
        if let Some(ref sender) = self.tx {
            self.seq += 1;
            let _ = sender.send(ProgressEvent {
                run_id: self.run_id.clone(),
                seq: self.seq,
                event,
            });
        }
    }

    pub fn state(&mut self, cohort: &str, state: CohortState) {
        self.emit(ProgressEventKind::CohortStateChanged {
            cohort: cohort.to_string(),
            state,
        });
    }
}

/// Log cohort state transitions at debug level until every sender is gone.
///
/// A subscriber that falls behind loses the overwritten events but keeps
/// logging. Returns the number of transitions logged.
pub async fn log_transitions(mut rx: ProgressReceiver) -> usize {
    let mut logged = 0;
    loop {
        match rx.recv().await {
            Ok(event) => {
                if let ProgressEventKind::CohortStateChanged { cohort, state } = event.event {
                    tracing::debug!(seq = event.seq, "{cohort}: {state}");
                    logged += 1;
                }
            }
            Err(RecvError::Lagged(missed)) => {
                tracing::debug!("progress log fell behind; {missed} events dropped");
            }
            Err(RecvError::Closed) => return logged,
        }
    }
}
