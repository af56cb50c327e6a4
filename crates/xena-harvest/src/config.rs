// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Harvest configuration.
//!
//! Every field defaults to the value the harvester has always used, so a
//! no-argument run targets the TCGA hub. The binary layers CLI flags on top.

use crate::renderer::Selector;
use crate::wait::WaitPolicy;
use std::path::PathBuf;
use std::time::Duration;

/// Catalog page listing every TCGA cohort.
pub const DEFAULT_CATALOG_URL: &str =
    "https://xenabrowser.net/datapages/?hub=https://tcga.xenahubs.net:443";

/// Directory (relative to the working directory) receiving the matrices.
pub const DEFAULT_OUTPUT_DIR: &str = "cohorts";

/// Markup dump written when no cohort link can be found.
pub const DEFAULT_DIAGNOSTIC_PATH: &str = "page_source.html";

/// Primary selector for cohort links on the catalog page.
pub const PRIMARY_COHORT_SELECTOR: &str = "li.MuiTypography-root a";

/// Fallback selector, tried when the primary one matches nothing.
pub const FALLBACK_COHORT_XPATH: &str = "//a[contains(@href, 'cohort=TCGA')]";

/// Visible text of the dataset link on each cohort page.
pub const DEFAULT_DATASET_LINK_TEXT: &str = "IlluminaHiSeq pancan normalized";

/// Selector for the compressed download link on the dataset page.
pub const DOWNLOAD_LINK_SELECTOR: &str = "a[href$='.gz']";

/// Extension given to decompressed matrices.
pub const DEFAULT_TABLE_EXTENSION: &str = "tsv";

/// Environment override for the Chromium binary.
pub const CHROMIUM_PATH_ENV: &str = "XENA_CHROMIUM_PATH";

/// Everything the harvest workflow needs to know.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub catalog_url: String,
    pub output_dir: PathBuf,
    pub diagnostic_path: PathBuf,
    pub primary_selector: Selector,
    pub fallback_selector: Selector,
    pub dataset_link_text: String,
    pub download_selector: Selector,
    pub table_extension: String,
    /// Page-load timeout handed to the renderer on every navigation.
    pub navigation_timeout: Duration,
    /// Wait for the catalog to render its cohort list.
    pub catalog_wait: WaitPolicy,
    /// Wait for the dataset link and for the download link, each.
    pub element_wait: WaitPolicy,
    /// `None` leaves downloads unbounded.
    pub download_timeout: Option<Duration>,
    pub chromium_path: Option<PathBuf>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            diagnostic_path: PathBuf::from(DEFAULT_DIAGNOSTIC_PATH),
            primary_selector: Selector::Css(PRIMARY_COHORT_SELECTOR.to_string()),
            fallback_selector: Selector::XPath(FALLBACK_COHORT_XPATH.to_string()),
            dataset_link_text: DEFAULT_DATASET_LINK_TEXT.to_string(),
            download_selector: Selector::Css(DOWNLOAD_LINK_SELECTOR.to_string()),
            table_extension: DEFAULT_TABLE_EXTENSION.to_string(),
            navigation_timeout: Duration::from_secs(60),
            catalog_wait: WaitPolicy::with_timeout(Duration::from_secs(30)),
            element_wait: WaitPolicy::with_timeout(Duration::from_secs(20)),
            download_timeout: None,
            chromium_path: None,
        }
    }
}

impl HarvestConfig {
    /// Selector for the dataset link on a cohort page.
    pub fn dataset_link_selector(&self) -> Selector {
        Selector::PartialLinkText(self.dataset_link_text.clone())
    }
}
