// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Renderer abstraction for browser-based page rendering.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide). The harvest
//! workflow only ever talks to these traits, so tests can script a fake
//! browser.

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// How to locate elements on a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Selector {
    /// A CSS selector, e.g. `li.MuiTypography-root a`.
    Css(String),
    /// An XPath expression.
    XPath(String),
    /// Anchors whose visible text contains the given string.
    PartialLinkText(String),
}

impl Selector {
    /// The selector expressed as XPath, for engines without native
    /// link-text lookup. `None` for CSS selectors.
    pub fn to_xpath(&self) -> Option<String> {
        match self {
            Self::Css(_) => None,
            Self::XPath(xpath) => Some(xpath.clone()),
            Self::PartialLinkText(text) => Some(format!(
                "//a[contains(normalize-space(.), {})]",
                xpath_literal(text)
            )),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(css) => write!(f, "css `{css}`"),
            Self::XPath(xpath) => write!(f, "xpath `{xpath}`"),
            Self::PartialLinkText(text) => write!(f, "link text containing \"{text}\""),
        }
    }
}

/// Quote a string as an XPath 1.0 literal. XPath has no escape sequences,
/// so strings holding both quote kinds go through `concat()`.
fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        format!("'{s}'")
    } else if !s.contains('"') {
        format!("\"{s}\"")
    } else {
        let parts: Vec<String> = s.split('\'').map(|p| format!("'{p}'")).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

/// A snapshot of a matched element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkElement {
    /// Rendered text content.
    pub text: String,
    /// Resolved `href`, if the element has one.
    pub href: Option<String>,
}

impl LinkElement {
    pub fn new(text: impl Into<String>, href: Option<&str>) -> Self {
        Self {
            text: text.into(),
            href: href.map(str::to_string),
        }
    }
}

/// Classified renderer failures. Implementations raise these (wrapped in
/// `anyhow::Error`) so callers can tell a slow page from a dead browser.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("navigation to {url} timed out after {timeout_ms}ms")]
    NavigationTimeout { url: String, timeout_ms: u64 },

    #[error("no element matches {0}")]
    ElementNotFound(Selector),

    #[error("element matching {0} is not clickable")]
    NotInteractable(Selector),
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A renderer used when Chromium could not be launched.
///
/// Every context request fails, so the run ends through the same
/// browser-session failure path as a browser that dies mid-run.
pub struct NoopRenderer;

#[async_trait]
impl Renderer for NoopRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        Err(anyhow::anyhow!("browser not available"))
    }
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
    fn active_contexts(&self) -> usize {
        0
    }
}

/// A single browser context (tab) for rendering pages.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Snapshot every element currently matching `selector`, in DOM order.
    async fn find_all(&self, selector: &Selector) -> Result<Vec<LinkElement>>;
    /// Click the first element matching `selector`.
    ///
    /// Fails with [`RenderError::ElementNotFound`] when nothing matches.
    async fn click(&self, selector: &Selector) -> Result<()>;
    /// Get the full page HTML.
    async fn get_html(&self) -> Result<String>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_link_text_xpath() {
        let sel = Selector::PartialLinkText("IlluminaHiSeq pancan normalized".into());
        assert_eq!(
            sel.to_xpath().unwrap(),
            "//a[contains(normalize-space(.), 'IlluminaHiSeq pancan normalized')]"
        );
        assert!(Selector::Css("a".into()).to_xpath().is_none());
    }

    #[test]
    fn test_xpath_literal_quoting() {
        assert_eq!(xpath_literal("plain"), "'plain'");
        assert_eq!(xpath_literal("it's"), "\"it's\"");
        assert_eq!(
            xpath_literal(r#"a'b"c"#),
            r#"concat('a', "'", 'b"c')"#
        );
    }

    #[tokio::test]
    async fn test_noop_renderer_refuses_contexts() {
        let renderer = NoopRenderer;
        let err = renderer.new_context().await.err().unwrap();
        assert!(err.downcast_ref::<RenderError>().is_none());
        assert_eq!(renderer.active_contexts(), 0);
        renderer.shutdown().await.unwrap();
    }

    #[test]
    fn test_selector_display() {
        assert_eq!(
            Selector::Css("a[href$='.gz']".into()).to_string(),
            "css `a[href$='.gz']`"
        );
    }
}
