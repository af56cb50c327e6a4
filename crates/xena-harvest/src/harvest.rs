// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! The harvest workflow.
//!
//! One catalog tab stays open for the whole run. Each cohort gets its own
//! tab, which is closed again whatever happens inside it. Timeouts and
//! missing elements turn into [`CohortOutcome::Skipped`]; every other error
//! ends the run.

use crate::cohort::{self, CohortLink};
use crate::config::HarvestConfig;
use crate::decompress::gunzip_to_table;
use crate::download::Downloader;
use crate::error::HarvestError;
use crate::progress::{CohortState, ProgressEmitter, ProgressEventKind, ProgressSender};
use crate::renderer::{LinkElement, RenderContext, RenderError, Renderer, Selector};
use crate::summary::{CohortOutcome, HarvestSummary, HarvestedCohort, SkipReason, SkippedCohort};
use crate::wait::wait_for;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Cohort links found on the catalog page.
#[derive(Debug, Clone)]
pub struct Discovery {
    /// The selector that matched.
    pub selector: Selector,
    /// Cohorts in DOM order.
    pub cohorts: Vec<CohortLink>,
}

/// Run a full harvest and always shut the browser down afterwards.
///
/// A broken browser session is logged and recorded in
/// [`HarvestSummary::session_error`], keeping whatever was harvested before
/// it broke. Discovery failures and unclassified errors are returned.
pub async fn harvest(
    renderer: &dyn Renderer,
    config: &HarvestConfig,
    progress: Option<ProgressSender>,
) -> Result<HarvestSummary, HarvestError> {
    let result = match Downloader::new(config.download_timeout) {
        Ok(downloader) => run(renderer, &downloader, config, progress).await,
        Err(e) => Err(e),
    };

    if let Err(e) = renderer.shutdown().await {
        warn!("failed to shut down browser: {e:#}");
    }

    result
}

/// Harvest every cohort listed on the catalog page.
///
/// Does not shut the renderer down; see [`harvest`].
pub async fn run(
    renderer: &dyn Renderer,
    downloader: &Downloader,
    config: &HarvestConfig,
    progress: Option<ProgressSender>,
) -> Result<HarvestSummary, HarvestError> {
    let started = Instant::now();
    let mut emitter = ProgressEmitter::new(progress, uuid::Uuid::new_v4().to_string());
    let mut summary = HarvestSummary::new(emitter.run_id(), &config.catalog_url);

    ensure_output_dir(&config.output_dir)?;

    let result = match renderer.new_context().await {
        Ok(mut catalog) => {
            let result = harvest_catalog(
                renderer,
                catalog.as_mut(),
                downloader,
                config,
                &mut emitter,
                &mut summary,
            )
            .await;
            if let Err(e) = catalog.close().await {
                warn!("failed to close catalog tab: {e:#}");
            }
            result
        }
        Err(e) => Err(HarvestError::Session(e)),
    };

    match result {
        Ok(()) => {}
        Err(HarvestError::Session(e)) => {
            error!("Browser session failed: {e:#}");
            summary.session_error = Some(format!("{e:#}"));
        }
        Err(e) => return Err(e),
    }

    summary.elapsed_ms = started.elapsed().as_millis() as u64;
    emitter.emit(ProgressEventKind::RunComplete {
        harvested: summary.harvested.len(),
        skipped: summary.skipped.len(),
        elapsed_ms: summary.elapsed_ms,
    });
    info!(
        "Finished: {} harvested, {} skipped",
        summary.harvested.len(),
        summary.skipped.len()
    );
    Ok(summary)
}

async fn harvest_catalog(
    renderer: &dyn Renderer,
    catalog: &mut dyn RenderContext,
    downloader: &Downloader,
    config: &HarvestConfig,
    emitter: &mut ProgressEmitter,
    summary: &mut HarvestSummary,
) -> Result<(), HarvestError> {
    info!("Navigating to {}", config.catalog_url);
    emitter.emit(ProgressEventKind::RunStarted {
        catalog_url: config.catalog_url.clone(),
    });
    // Unlike a cohort page, a catalog that does not load leaves nothing to do
    catalog
        .navigate(&config.catalog_url, timeout_ms(config))
        .await
        .map_err(|e| {
            HarvestError::Session(e.context(format!("catalog {} did not load", config.catalog_url)))
        })?;

    let discovery = discover_cohorts(&*catalog, config).await?;
    info!("Found {} cohort links", discovery.cohorts.len());
    summary.discovered_with = discovery.selector.to_string();
    emitter.emit(ProgressEventKind::CohortsDiscovered {
        count: discovery.cohorts.len(),
        selector: summary.discovered_with.clone(),
    });

    for link in &discovery.cohorts {
        let outcome = process_cohort(renderer, downloader, config, link, emitter).await?;
        summary.record(outcome);
    }
    Ok(())
}

/// Wait for the catalog to list its cohorts.
///
/// Each poll tries the primary selector, then the fallback. A match counts
/// once its size is the same on two consecutive polls, so a list that is
/// still rendering is not taken early. If the wait expires, one last lookup
/// decides. When nothing matches at all, the page markup is written to
/// `config.diagnostic_path` and the run fails.
pub async fn discover_cohorts(
    catalog: &dyn RenderContext,
    config: &HarvestConfig,
) -> Result<Discovery, HarvestError> {
    let previous = AtomicUsize::new(0);
    let previous = &previous;

    let settled = wait_for(&config.catalog_wait, "cohort links to render", || async move {
        let Some((selector, links)) = snapshot_links(catalog, config).await? else {
            previous.store(0, Ordering::Relaxed);
            return Ok(None);
        };
        let stable = previous.swap(links.len(), Ordering::Relaxed) == links.len();
        Ok::<_, HarvestError>(stable.then_some((selector, links)))
    })
    .await;

    let found = match settled {
        Ok(found) => Some(found),
        Err(HarvestError::NavigationTimeout { .. }) => snapshot_links(catalog, config).await?,
        Err(e) => return Err(e),
    };

    let Some((selector, links)) = found else {
        error!("Still no cohort links found. Dumping page source for debugging.");
        let html = catalog.get_html().await?;
        tokio::fs::write(&config.diagnostic_path, html).await?;
        return Err(HarvestError::DiscoveryFailure {
            url: config.catalog_url.clone(),
            dump: config.diagnostic_path.clone(),
        });
    };

    if selector != config.primary_selector {
        warn!("No cohort links matched {}; using {selector}", config.primary_selector);
    }

    Ok(Discovery {
        selector,
        cohorts: links
            .into_iter()
            .map(|el| CohortLink::new(el.text, el.href))
            .collect(),
    })
}

/// One lookup: primary selector, then fallback if the primary is empty.
async fn snapshot_links(
    catalog: &dyn RenderContext,
    config: &HarvestConfig,
) -> Result<Option<(Selector, Vec<LinkElement>)>, HarvestError> {
    for selector in [&config.primary_selector, &config.fallback_selector] {
        let links = catalog.find_all(selector).await?;
        if !links.is_empty() {
            return Ok(Some((selector.clone(), links)));
        }
        debug!("no cohort links matched {selector}");
    }
    Ok(None)
}

/// Process one cohort in its own tab.
///
/// The tab is closed before returning, on every path. Recoverable errors
/// come back as `Ok(CohortOutcome::Skipped)`.
pub async fn process_cohort(
    renderer: &dyn Renderer,
    downloader: &Downloader,
    config: &HarvestConfig,
    link: &CohortLink,
    emitter: &mut ProgressEmitter,
) -> Result<CohortOutcome, HarvestError> {
    let name = link.name.as_str();
    info!("Processing cohort: {name}");
    emitter.state(name, CohortState::Discovered);

    let Some(url) = link.url.as_deref() else {
        let reason = SkipReason::ElementNotFound {
            what: format!("href on cohort link \"{}\"", link.label),
        };
        return Ok(skip(name, reason, emitter));
    };

    let mut tab = renderer.new_context().await?;
    emitter.state(name, CohortState::TabOpened);

    let result = fetch_in_tab(tab.as_mut(), downloader, config, link, url, emitter).await;

    if let Err(e) = tab.close().await {
        warn!("failed to close tab for {name}: {e:#}");
    }

    match result {
        Ok(harvested) => {
            emitter.state(name, CohortState::Cleaned);
            Ok(CohortOutcome::Harvested(harvested))
        }
        Err(e) => match e.skip_reason() {
            Some(reason) => {
                warn!("Error occurred while processing {name}: {e}");
                Ok(skip(name, reason, emitter))
            }
            None => {
                emitter.state(name, CohortState::Cleaned);
                Err(e)
            }
        },
    }
}

fn skip(name: &str, reason: SkipReason, emitter: &mut ProgressEmitter) -> CohortOutcome {
    emitter.emit(ProgressEventKind::CohortSkipped {
        cohort: name.to_string(),
        reason: reason.clone(),
    });
    emitter.state(name, CohortState::Cleaned);
    CohortOutcome::Skipped(SkippedCohort {
        name: name.to_string(),
        reason,
    })
}

async fn fetch_in_tab(
    tab: &mut dyn RenderContext,
    downloader: &Downloader,
    config: &HarvestConfig,
    link: &CohortLink,
    url: &str,
    emitter: &mut ProgressEmitter,
) -> Result<HarvestedCohort, HarvestError> {
    let name = link.name.as_str();

    let nav = tab.navigate(url, timeout_ms(config)).await?;
    debug!("loaded {} in {}ms", nav.final_url, nav.load_time_ms);
    emitter.state(name, CohortState::Navigated);

    let tab: &dyn RenderContext = tab;
    let dataset = &config.dataset_link_selector();
    wait_for(
        &config.element_wait,
        &format!("{dataset} to be clickable"),
        || async move {
            match tab.click(dataset).await {
                Ok(()) => Ok(Some(())),
                Err(e) if click_pending(&e) => Ok(None),
                Err(e) => Err(HarvestError::from(e)),
            }
        },
    )
    .await?;

    let download_selector = &config.download_selector;
    let download_link = wait_for(
        &config.element_wait,
        &download_selector.to_string(),
        || async move {
            Ok::<_, HarvestError>(tab.find_all(download_selector).await?.into_iter().next())
        },
    )
    .await?;
    let download_url = download_link
        .href
        .ok_or_else(|| HarvestError::ElementNotFound(format!("href on {download_selector}")))?;
    emitter.state(name, CohortState::LinkFound);

    let gz_path = cohort::compressed_path(&config.output_dir, name);
    let bytes_downloaded = downloader.download(&download_url, &gz_path).await?;
    info!("Downloaded: {}", gz_path.display());
    emitter.state(name, CohortState::Downloaded);

    let extension = config.table_extension.clone();
    let table_path = tokio::task::spawn_blocking(move || gunzip_to_table(&gz_path, &extension))
        .await
        .map_err(|e| HarvestError::Io(std::io::Error::other(e)))??;
    emitter.state(name, CohortState::Decompressed);

    Ok(HarvestedCohort {
        name: name.to_string(),
        download_url,
        table_path,
        bytes_downloaded,
    })
}

/// The dataset link is not on the page yet, or not clickable yet.
fn click_pending(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<RenderError>(),
        Some(RenderError::ElementNotFound(_) | RenderError::NotInteractable(_))
    )
}

fn timeout_ms(config: &HarvestConfig) -> u64 {
    config.navigation_timeout.as_millis() as u64
}

fn ensure_output_dir(dir: &Path) -> std::io::Result<()> {
    if !dir.is_dir() {
        std::fs::create_dir_all(dir)?;
        info!("Created directory: {}", dir.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_click_pending_classification() {
        let missing = anyhow::Error::new(RenderError::ElementNotFound(Selector::Css("a".into())));
        let hidden = anyhow::Error::new(RenderError::NotInteractable(Selector::Css("a".into())));
        assert!(click_pending(&missing));
        assert!(click_pending(&hidden));
        assert!(!click_pending(&anyhow::anyhow!("target crashed")));
    }

    #[test]
    fn test_ensure_output_dir_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("cohorts");
        ensure_output_dir(&out).unwrap();
        ensure_output_dir(&out).unwrap();
        assert!(out.is_dir());
    }
}
