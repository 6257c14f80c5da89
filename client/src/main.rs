use anyhow::Result;
use tracing_subscriber::EnvFilter;

mod cli;

/// Filtro por defecto si RUST_LOG no está definida.
const DEFAULT_LOG_FILTER: &str = "tracedag=info,common=info";

fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // logs a stderr; stdout queda para los resúmenes
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    cli::run()
}
