// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-cohort outcomes and the end-of-run summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Why a cohort was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SkipReason {
    /// A bounded wait expired.
    Timeout { waiting_for: String, timeout_ms: u64 },
    /// A required element or attribute was absent.
    ElementNotFound { what: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout {
                waiting_for,
                timeout_ms,
            } => write!(f, "timed out after {timeout_ms}ms waiting for {waiting_for}"),
            Self::ElementNotFound { what } => write!(f, "element not found: {what}"),
        }
    }
}

/// A cohort whose matrix landed on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestedCohort {
    pub name: String,
    pub download_url: String,
    pub table_path: PathBuf,
    pub bytes_downloaded: u64,
}

/// A cohort that was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedCohort {
    pub name: String,
    pub reason: SkipReason,
}

/// Result of processing one cohort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CohortOutcome {
    Harvested(HarvestedCohort),
    Skipped(SkippedCohort),
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestSummary {
    pub run_id: String,
    pub catalog_url: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    /// Display form of the selector that found the cohort links.
    pub discovered_with: String,
    pub harvested: Vec<HarvestedCohort>,
    pub skipped: Vec<SkippedCohort>,
    /// Set when the browser session broke before every cohort was processed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_error: Option<String>,
}

impl HarvestSummary {
    pub fn new(run_id: impl Into<String>, catalog_url: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            catalog_url: catalog_url.into(),
            started_at: Utc::now(),
            elapsed_ms: 0,
            discovered_with: String::new(),
            harvested: Vec::new(),
            skipped: Vec::new(),
            session_error: None,
        }
    }

    pub fn record(&mut self, outcome: CohortOutcome) {
        match outcome {
            CohortOutcome::Harvested(h) => self.harvested.push(h),
            CohortOutcome::Skipped(s) => self.skipped.push(s),
        }
    }

    /// Number of cohorts attempted.
    pub fn total(&self) -> usize {
        self.harvested.len() + self.skipped.len()
    }
}

impl fmt::Display for HarvestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Harvested {}/{} cohorts in {:.1}s",
            self.harvested.len(),
            self.total(),
            self.elapsed_ms as f64 / 1000.0
        )?;
        for h in &self.harvested {
            writeln!(f, "  [OK]   {} -> {}", h.name, h.table_path.display())?;
        }
        for s in &self.skipped {
            writeln!(f, "  [SKIP] {}: {}", s.name, s.reason)?;
        }
        if let Some(ref e) = self.session_error {
            writeln!(f, "  Browser session failed: {e}")?;
        }
        Ok(())
    }
}
