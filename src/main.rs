use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use hog_trainer::utils::init_logging;
use hog_trainer::{pipeline, RunConfig};

fn main() -> Result<()> {
    let config = RunConfig::parse();
    init_logging(config.log_level);
    info!("OpenCV version: {}", opencv::core::get_version_string()?);

    match pipeline::run(&config).context("detector run failed")? {
        Some(outcome) => info!(
            "trained on {} positive / {} negative samples; detector has {} weights",
            outcome.positive_count,
            outcome.negative_count,
            outcome.model.weights.len()
        ),
        None => info!("test-only run finished"),
    }
    Ok(())
}
