// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for a harvest run.
//!
//! `NavigationTimeout` and `ElementNotFound` only ever cost one cohort; the
//! workflow converts them into a [`SkipReason`]. Everything else ends the run.

use crate::renderer::RenderError;
use crate::summary::SkipReason;
use std::path::PathBuf;

/// All errors that can occur while harvesting.
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    #[error("no cohort links found on {url}; page source saved to {}", dump.display())]
    DiscoveryFailure { url: String, dump: PathBuf },

    #[error("timed out after {timeout_ms}ms waiting for {waiting_for}")]
    NavigationTimeout { waiting_for: String, timeout_ms: u64 },

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("browser session failed: {0:#}")]
    Session(anyhow::Error),

    #[error("download of {url} failed: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to decompress {}: {source}", path.display())]
    Decompress {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Whether this error only affects the cohort being processed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NavigationTimeout { .. } | Self::ElementNotFound(_)
        )
    }

    /// Skip reason for a recoverable error, `None` for run-ending ones.
    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            Self::NavigationTimeout {
                waiting_for,
                timeout_ms,
            } => Some(SkipReason::Timeout {
                waiting_for: waiting_for.clone(),
                timeout_ms: *timeout_ms,
            }),
            Self::ElementNotFound(what) => Some(SkipReason::ElementNotFound { what: what.clone() }),
            _ => None,
        }
    }
}

/// Renderer errors arrive as `anyhow::Error`. Typed [`RenderError`]s are
/// recovered by downcast; anything else means the browser session broke.
impl From<anyhow::Error> for HarvestError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<RenderError>() {
            Some(RenderError::NavigationTimeout { url, timeout_ms }) => Self::NavigationTimeout {
                waiting_for: format!("navigation to {url}"),
                timeout_ms: *timeout_ms,
            },
            Some(RenderError::ElementNotFound(selector)) => {
                Self::ElementNotFound(selector.to_string())
            }
            Some(RenderError::NotInteractable(selector)) => {
                Self::ElementNotFound(format!("clickable {selector}"))
            }
            None => Self::Session(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::Selector;

    #[test]
    fn test_render_timeout_is_recoverable() {
        let err: HarvestError = anyhow::Error::new(RenderError::NavigationTimeout {
            url: "https://example.org".into(),
            timeout_ms: 500,
        })
        .into();
        assert!(err.is_recoverable());
        assert_eq!(
            err.skip_reason(),
            Some(SkipReason::Timeout {
                waiting_for: "navigation to https://example.org".into(),
                timeout_ms: 500,
            })
        );
    }

    #[test]
    fn test_missing_element_is_recoverable() {
        let err: HarvestError =
            anyhow::Error::new(RenderError::ElementNotFound(Selector::Css("a.x".into()))).into();
        assert!(matches!(err, HarvestError::ElementNotFound(ref s) if s.contains("a.x")));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_other_renderer_errors_are_session_failures() {
        let err: HarvestError = anyhow::anyhow!("websocket closed").into();
        assert!(matches!(err, HarvestError::Session(_)));
        assert!(!err.is_recoverable());
        assert!(err.skip_reason().is_none());
        assert!(err.to_string().contains("websocket closed"));
    }

    #[test]
    fn test_io_is_not_recoverable() {
        let err = HarvestError::from(std::io::Error::other("disk full"));
        assert!(!err.is_recoverable());
    }
}
