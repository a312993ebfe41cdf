use std::path::PathBuf;

use anyhow::{Context, Result};
use clinops_synth::{Summary, SyntheticGenerator, export, load};
use clinops_warehouse::{Compute, SqlApiWarehouse, Warehouse};
use yansi::Paint;

use crate::config::Config;

/// Schema of the raw CDC tables.
pub const RAW_SCHEMA: &str = "RAW";

/// Generates the synthetic data set, saves it as CSV and optionally loads it into the warehouse.
pub async fn generate(config: Config, load: bool) -> Result<()> {
    let generator = generate_files(&config)?;
    if !load {
        return Ok(());
    }

    let warehouse = SqlApiWarehouse::connect_with_schema(&config.warehouse, Compute::Init, RAW_SCHEMA)
        .await
        .context("failed to connect to the init warehouse")?;

    let loaded = load_into(&warehouse, &generator, config.synth.batch_size).await;
    if let Err(err) = warehouse.close().await {
        tracing::warn!(error = &err as &dyn std::error::Error, "failed to close session");
    }

    let loaded = loaded?;
    println!();
    println!("{}", "## LOADED".bold());
    println!("{loaded}");
    Ok(())
}

/// Runs all generation phases and writes the CSV files to the configured directory.
pub fn generate_files(config: &Config) -> Result<SyntheticGenerator> {
    let mut generator = config
        .synth
        .generator()
        .context("invalid generator settings")?;

    let summary = generator.generate_all().context("generation failed")?;
    let written = export::save_csv(&config.synth.output_dir, &generator)
        .context("failed to save generated data")?;

    print_summary(&summary, &written);
    Ok(generator)
}

/// Loads all generated records into the raw CDC tables, stamped with the generator's anchor.
pub async fn load_into(
    warehouse: &dyn Warehouse,
    generator: &SyntheticGenerator,
    batch_size: usize,
) -> Result<Summary> {
    load::load_generated(warehouse, generator, generator.as_of(), batch_size)
        .await
        .context("failed to load generated data")
}

fn print_summary(summary: &Summary, written: &[PathBuf]) {
    println!();
    println!("{}", "## SYNTHETIC DATA".bold());
    println!("{summary}");

    println!();
    for path in written {
        println!("  saved {}", path.display().dim());
    }
}
