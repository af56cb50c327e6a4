// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use xena_harvest::config::{self, HarvestConfig};
use xena_harvest::harvest::harvest;
use xena_harvest::progress;
use xena_harvest::renderer::chromium::ChromiumRenderer;
use xena_harvest::renderer::{NoopRenderer, Renderer};
use xena_harvest::wait::WaitPolicy;

#[derive(Parser)]
#[command(
    name = "xena-harvest",
    about = "Harvest IlluminaHiSeq pan-cancer matrices for every cohort on a UCSC Xena hub",
    version
)]
struct Cli {
    /// Catalog page listing the cohorts
    #[arg(long, default_value = config::DEFAULT_CATALOG_URL)]
    catalog_url: String,

    /// Directory receiving the decompressed matrices
    #[arg(long, default_value = config::DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Visible text of the dataset link on each cohort page
    #[arg(long, default_value = config::DEFAULT_DATASET_LINK_TEXT)]
    dataset_link_text: String,

    /// Seconds to wait for the catalog to list its cohorts
    #[arg(long, default_value = "30")]
    catalog_timeout_secs: u64,

    /// Seconds to wait for each link on a cohort page
    #[arg(long, default_value = "20")]
    element_timeout_secs: u64,

    /// Abort a download after this many seconds (default: never)
    #[arg(long)]
    download_timeout_secs: Option<u64>,

    /// Chromium binary (also read from XENA_CHROMIUM_PATH)
    #[arg(long)]
    chromium_path: Option<PathBuf>,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Log every cohort state transition
    #[arg(long, short)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

impl Cli {
    fn harvest_config(&self) -> HarvestConfig {
        HarvestConfig {
            catalog_url: self.catalog_url.clone(),
            output_dir: self.output_dir.clone(),
            dataset_link_text: self.dataset_link_text.clone(),
            catalog_wait: WaitPolicy::with_timeout(Duration::from_secs(self.catalog_timeout_secs)),
            element_wait: WaitPolicy::with_timeout(Duration::from_secs(self.element_timeout_secs)),
            download_timeout: self.download_timeout_secs.map(Duration::from_secs),
            chromium_path: self.chromium_path.clone(),
            ..HarvestConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { cli.log_level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match cli.log_format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }

    let config = cli.harvest_config();

    let progress = if cli.verbose {
        let (tx, rx) = progress::channel();
        tokio::spawn(progress::log_transitions(rx));
        Some(tx)
    } else {
        None
    };

    let renderer: Box<dyn Renderer> =
        match ChromiumRenderer::launch(config.chromium_path.clone()).await {
            Ok(chromium) => Box::new(chromium),
            Err(e) => {
                tracing::warn!("Failed to initialize Chromium: {e:#}");
                Box::new(NoopRenderer)
            }
        };

    match harvest(renderer.as_ref(), &config, progress).await {
        Ok(summary) => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{summary}");
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("  Error: {:#}", anyhow::Error::from(e));
            std::process::exit(1);
        }
    }
}
