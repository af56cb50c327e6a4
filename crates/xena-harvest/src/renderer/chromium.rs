// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Chromium-based renderer using chromiumoxide.

use super::{LinkElement, NavigationResult, RenderContext, RenderError, Renderer, Selector};
use crate::config::CHROMIUM_PATH_ENV;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Find the Chromium binary path.
///
/// `explicit` (from the command line) wins, then `XENA_CHROMIUM_PATH`, then
/// the usual binary names on `PATH`.
pub fn find_chromium(explicit: Option<PathBuf>) -> Option<PathBuf> {
    // 1. Explicit or XENA_CHROMIUM_PATH
    let configured =
        explicit.or_else(|| std::env::var_os(CHROMIUM_PATH_ENV).map(PathBuf::from));
    if let Some(path) = configured {
        if path.exists() {
            return Some(path);
        }
        tracing::warn!("configured Chromium path {} does not exist", path.display());
    }

    // 2. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 3. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch a headless Chromium instance.
    pub async fn launch(chromium_path: Option<PathBuf>) -> Result<Self> {
        let chrome_path = find_chromium(chromium_path).with_context(|| {
            format!("Chromium not found. Install Chrome or set {CHROMIUM_PATH_ENV}.")
        })?;
        tracing::debug!("launching Chromium from {}", chrome_path.display());

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // Drive the CDP connection until the browser goes away
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler error: {e}");
                }
            }
        });

        Ok(Self {
            browser: Mutex::new(browser),
            handler,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumContext {
            page,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        browser.close().await.context("failed to close Chromium")?;
        let _ = browser.wait().await;
        self.handler.abort();
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumContext {
    async fn elements(&self, selector: &Selector) -> Result<Vec<Element>> {
        match selector {
            Selector::Css(css) => self
                .page
                .find_elements(css.as_str())
                .await
                .with_context(|| format!("failed to query {selector}")),
            _ => {
                let xpath = selector.to_xpath().unwrap_or_default();
                match self.page.find_xpaths(xpath).await {
                    Ok(found) => Ok(found),
                    Err(e) if is_empty_search(&e) => {
                        tracing::debug!("{selector} matched nothing: {e}");
                        Ok(Vec::new())
                    }
                    Err(e) => {
                        Err(anyhow::Error::new(e).context(format!("failed to query {selector}")))
                    }
                }
            }
        }
    }
}

/// DOM.performSearch answers an empty result with a protocol error reply.
/// Transport failures (closed socket, no response) are not empty results.
fn is_empty_search(err: &CdpError) -> bool {
    matches!(err, CdpError::Chrome(_))
}

/// Resolved `href` of an element: the DOM property gives the absolute URL,
/// the attribute is the fallback.
async fn href_of(element: &Element) -> Result<Option<String>> {
    if let Some(value) = element.property("href").await? {
        if let Some(href) = value.as_str().filter(|s| !s.is_empty()) {
            return Ok(Some(href.to_string()));
        }
    }
    Ok(element.attribute("href").await?)
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let start = Instant::now();

        let result =
            tokio::time::timeout(Duration::from_millis(timeout_ms), self.page.goto(url)).await;

        let load_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(_)) => {
                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult {
                    final_url,
                    load_time_ms,
                })
            }
            Ok(Err(e)) => bail!("navigation to {url} failed: {e}"),
            Err(_) => Err(RenderError::NavigationTimeout {
                url: url.to_string(),
                timeout_ms,
            }
            .into()),
        }
    }

    async fn find_all(&self, selector: &Selector) -> Result<Vec<LinkElement>> {
        let mut links = Vec::new();
        for element in self.elements(selector).await? {
            let text = element.inner_text().await?.unwrap_or_default();
            let href = href_of(&element).await?;
            links.push(LinkElement { text, href });
        }
        Ok(links)
    }

    async fn click(&self, selector: &Selector) -> Result<()> {
        let element = self
            .elements(selector)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RenderError::ElementNotFound(selector.clone()))?;

        // Fails while the element has no layout box yet
        if let Err(e) = element.click().await {
            tracing::debug!("click on {selector} failed: {e}");
            return Err(RenderError::NotInteractable(selector.clone()).into());
        }
        Ok(())
    }

    async fn get_html(&self) -> Result<String> {
        self.page.content().await.context("failed to get HTML")
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        self.page.close().await.context("failed to close page")?;
        Ok(())
    }
}
