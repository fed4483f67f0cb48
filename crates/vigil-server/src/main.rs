use anyhow::Result;
use clap::Parser;

use vigil_core::config::VigilConfig;
use vigil_server::bootstrap::ServerBootstrapper;

#[derive(Parser)]
#[command(name = "vigil-server")]
#[command(about = "Vigil master - fleet monitoring control plane")]
#[command(version)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let cfg = VigilConfig::load(args.config.as_deref())?;

    vigil_core::telemetry::init_tracing_with(&vigil_core::telemetry::LogConfig {
        level: cfg.telemetry.log_level.clone(),
        format: cfg.telemetry.log_format.clone(),
        no_ansi: false,
    });

    if let Some(path) = args.config.as_deref() {
        tracing::info!("Loaded config file: {}", path);
    } else {
        tracing::info!("Config: using default search (current dir)");
    }
    tracing::info!("Effective NATS URL: {}", cfg.nats.url);
    tracing::info!("Effective HTTP listen: {}", cfg.http.listen_addr);

    let bootstrapper = ServerBootstrapper::new(cfg);
    let running_server = bootstrapper.start().await?;

    running_server.wait_for_shutdown().await
}
