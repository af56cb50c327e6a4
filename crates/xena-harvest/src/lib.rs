// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Xena harvester library: drives a headless browser through the UCSC Xena
//! data pages and collects one expression matrix per cohort.
//!
//! The binary is a thin shell over [`harvest::harvest`]; everything here is
//! exposed so the workflow can be driven by a fake renderer in tests.

pub mod cohort;
pub mod config;
pub mod decompress;
pub mod download;
pub mod error;
pub mod harvest;
pub mod progress;
pub mod renderer;
pub mod summary;
pub mod wait;

pub use config::HarvestConfig;
pub use error::HarvestError;
pub use summary::HarvestSummary;
