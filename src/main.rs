use anyhow::{Context, Result};
use rapport_analysis::{Pipeline, PipelineConfig};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber (`RUST_LOG` overrides the `info` default)
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();

    let config = PipelineConfig::discover(".").context("loading configuration")?;
    let outcome = Pipeline::new(config)?.run().context("analysis run failed")?;

    tracing::info!(
        run_id = outcome.manifest.run_id(),
        usable = outcome.tables.full.num_rows(),
        "done"
    );
    Ok(())
}
