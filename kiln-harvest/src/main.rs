//! kiln-harvest - museum ceramics harvester
//!
//! Searches the collection for Iranian pottery, classifies each object into an
//! era and sub-period, downloads its primary image, and exports the dataset as
//! JSON and CSV under the root folder.

use anyhow::{Context, Result};
use kiln_common::config::config_file_path;
use kiln_harvest::export::export_dataset;
use kiln_harvest::HarvestConfig;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Step 1: Load configuration (defaults if no file)
    let config_path = config_file_path("kiln-harvest");
    let config = HarvestConfig::load(config_path.as_deref())?;

    // Step 2: Initialize tracing; RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting kiln-harvest");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &config_path {
        info!("Config file: {}", path.display());
    }

    // Step 3: Reject degenerate settings before any request is made
    config.validate()?;

    let root_folder = config.root_folder();
    tokio::fs::create_dir_all(&root_folder)
        .await
        .with_context(|| format!("Failed to create root folder {}", root_folder.display()))?;
    info!("Root folder: {}", root_folder.display());

    // Step 4: Build and run the pipeline
    let pipeline = kiln_harvest::build_pipeline(&config, &root_folder)?;

    let stop = pipeline.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight objects");
            stop.cancel();
        }
    });

    let report = pipeline.run().await?;
    for (reason, count) in report.rejections_by_reason() {
        info!(reason = %reason, count, "Rejections");
    }

    // Step 5: Export whatever was committed, even after an interrupt
    match export_dataset(pipeline.store(), &root_folder, &config.dataset_name).await {
        Ok(paths) => {
            info!("JSON: {}", paths.json.display());
            info!("CSV: {}", paths.csv.display());
        }
        Err(e) => {
            error!("Export failed: {}", e);
            return Err(e.into());
        }
    }

    info!("Harvest finished: {}", report.display_string());
    Ok(())
}
