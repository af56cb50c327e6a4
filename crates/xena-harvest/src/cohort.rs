// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Cohort naming: display label → cohort name → output file names.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Suffix appended to every downloaded matrix, before the extension.
pub const FILE_SUFFIX: &str = "_HiSeqV2_PANCAN";

/// Extension of the compressed download.
pub const COMPRESSED_EXT: &str = "gz";

/// A cohort link discovered on the catalog page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortLink {
    /// Visible link text, e.g. `"Breast Invasive Carcinoma (BRCA)"`.
    pub label: String,
    /// Name derived from the label, e.g. `"Breast Invasive Carcinoma"`.
    pub name: String,
    /// Detail page URL, if the anchor carried one.
    pub url: Option<String>,
}

impl CohortLink {
    pub fn new(label: impl Into<String>, url: Option<String>) -> Self {
        let label = label.into();
        let name = cohort_name(&label);
        Self { label, name, url }
    }
}

/// Derive a cohort name from its catalog label: the text before the first
/// `(`, trimmed.
pub fn cohort_name(label: &str) -> String {
    label.split('(').next().unwrap_or_default().trim().to_string()
}

/// File name of the compressed download for a cohort.
///
/// `"Breast Invasive Carcinoma"` → `"Breast_Invasive_Carcinoma_HiSeqV2_PANCAN.gz"`.
pub fn compressed_file_name(name: &str) -> String {
    format!("{}{FILE_SUFFIX}.{COMPRESSED_EXT}", name.replace(' ', "_"))
}

/// Full path of the compressed download inside `output_dir`.
pub fn compressed_path(output_dir: &Path, name: &str) -> PathBuf {
    output_dir.join(compressed_file_name(name))
}

/// Sibling of a compressed file with `.gz` swapped for `.{extension}`.
pub fn table_path(compressed: &Path, extension: &str) -> PathBuf {
    compressed.with_extension(extension)
}
