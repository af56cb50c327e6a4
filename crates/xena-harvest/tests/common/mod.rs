//! Scripted in-memory browser for driving the harvest workflow in tests.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use xena_harvest::config::{HarvestConfig, DOWNLOAD_LINK_SELECTOR};
use xena_harvest::renderer::{
    LinkElement, NavigationResult, RenderContext, RenderError, Renderer, Selector,
};
use xena_harvest::wait::WaitPolicy;

pub const CATALOG_URL: &str = "fake://xena/datapages";

/// A page the fake browser can navigate to.
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub html: String,
    /// Elements present as soon as the page loads.
    pub elements: HashMap<Selector, Vec<LinkElement>>,
    /// Elements that appear after any successful click on the page.
    pub revealed: HashMap<Selector, Vec<LinkElement>>,
}

impl FakePage {
    pub fn with(mut self, selector: Selector, links: Vec<LinkElement>) -> Self {
        self.elements.insert(selector, links);
        self
    }

    pub fn revealing(mut self, selector: Selector, links: Vec<LinkElement>) -> Self {
        self.revealed.insert(selector, links);
        self
    }
}

#[derive(Default)]
struct FakeState {
    pages: HashMap<String, FakePage>,
    active: usize,
    opened: usize,
    /// `new_context` fails once this many contexts have been opened.
    break_after: Option<usize>,
    queries: Vec<Selector>,
    shutdowns: usize,
    /// `close` reports an error after releasing the tab.
    fail_close: bool,
    close_failures: usize,
}

/// Fake `Renderer` backed by a map of URL → page.
#[derive(Clone, Default)]
pub struct FakeBrowser {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, page: FakePage) -> Self {
        self.state.lock().unwrap().pages.insert(url.to_string(), page);
        self
    }

    /// Simulate the browser dying after `n` contexts.
    pub fn break_after(self, n: usize) -> Self {
        self.state.lock().unwrap().break_after = Some(n);
        self
    }

    /// Every tab close reports an error.
    pub fn failing_close(self) -> Self {
        self.state.lock().unwrap().fail_close = true;
        self
    }

    pub fn close_failures(&self) -> usize {
        self.state.lock().unwrap().close_failures
    }

    pub fn opened(&self) -> usize {
        self.state.lock().unwrap().opened
    }

    pub fn shutdowns(&self) -> usize {
        self.state.lock().unwrap().shutdowns
    }

    pub fn queries(&self) -> Vec<Selector> {
        self.state.lock().unwrap().queries.clone()
    }
}

#[async_trait]
impl Renderer for FakeBrowser {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let mut state = self.state.lock().unwrap();
        if state.break_after.is_some_and(|n| state.opened >= n) {
            anyhow::bail!("browser process exited");
        }
        state.opened += 1;
        state.active += 1;
        Ok(Box::new(FakeTab {
            state: Arc::clone(&self.state),
            url: None,
            clicked: AtomicBool::new(false),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        self.state.lock().unwrap().shutdowns += 1;
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.state.lock().unwrap().active
    }
}

struct FakeTab {
    state: Arc<Mutex<FakeState>>,
    url: Option<String>,
    clicked: AtomicBool,
}

impl FakeTab {
    fn current_page(&self, state: &FakeState) -> FakePage {
        self.url
            .as_ref()
            .and_then(|u| state.pages.get(u))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl RenderContext for FakeTab {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        if !self.state.lock().unwrap().pages.contains_key(url) {
            return Err(RenderError::NavigationTimeout {
                url: url.to_string(),
                timeout_ms,
            }
            .into());
        }
        self.url = Some(url.to_string());
        self.clicked.store(false, Ordering::SeqCst);
        Ok(NavigationResult {
            final_url: url.to_string(),
            load_time_ms: 1,
        })
    }

    async fn find_all(&self, selector: &Selector) -> Result<Vec<LinkElement>> {
        let mut state = self.state.lock().unwrap();
        state.queries.push(selector.clone());
        let page = self.current_page(&state);
        let mut found = page.elements.get(selector).cloned().unwrap_or_default();
        if self.clicked.load(Ordering::SeqCst) {
            found.extend(page.revealed.get(selector).cloned().unwrap_or_default());
        }
        Ok(found)
    }

    async fn click(&self, selector: &Selector) -> Result<()> {
        let state = self.state.lock().unwrap();
        let page = self.current_page(&state);
        if page.elements.get(selector).is_some_and(|v| !v.is_empty()) {
            self.clicked.store(true, Ordering::SeqCst);
            Ok(())
        } else {
            Err(RenderError::ElementNotFound(selector.clone()).into())
        }
    }

    async fn get_html(&self) -> Result<String> {
        let state = self.state.lock().unwrap();
        Ok(self.current_page(&state).html)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.active -= 1;
        if state.fail_close {
            state.close_failures += 1;
            anyhow::bail!("target already detached");
        }
        Ok(())
    }
}

// ── Fixtures ──

pub fn fast_wait() -> WaitPolicy {
    WaitPolicy {
        timeout: Duration::from_millis(200),
        initial_interval: Duration::from_millis(1),
        max_interval: Duration::from_millis(10),
        backoff_factor: 2.0,
    }
}

pub fn test_config(root: &Path) -> HarvestConfig {
    HarvestConfig {
        catalog_url: CATALOG_URL.to_string(),
        output_dir: root.join("cohorts"),
        diagnostic_path: root.join("page_source.html"),
        catalog_wait: fast_wait(),
        element_wait: fast_wait(),
        ..HarvestConfig::default()
    }
}

/// Catalog page listing `cohorts` (label, detail URL) under `selector`.
pub fn catalog(selector: Selector, cohorts: &[(&str, &str)]) -> FakePage {
    let links = cohorts
        .iter()
        .map(|(label, url)| LinkElement::new(*label, Some(*url)))
        .collect();
    FakePage {
        html: "<html><body>catalog</body></html>".to_string(),
        ..FakePage::default()
    }
    .with(selector, links)
}

/// Cohort page whose dataset link reveals a `.gz` download link.
pub fn cohort_page(config: &HarvestConfig, download_url: &str) -> FakePage {
    FakePage::default()
        .with(
            config.dataset_link_selector(),
            vec![LinkElement::new(
                "TCGA IlluminaHiSeq pancan normalized (n=1,218)",
                Some("fake://dataset"),
            )],
        )
        .revealing(
            Selector::Css(DOWNLOAD_LINK_SELECTOR.to_string()),
            vec![LinkElement::new("download", Some(download_url))],
        )
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

/// File names in `dir`, sorted.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|rd| {
            rd.filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
