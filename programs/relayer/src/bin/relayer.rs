use clap::Parser;
use lz_devkit_relayer::cli::{Commands, RelayerCli};
use lz_devkit_relayer::observability::init_observability;
use lz_devkit_relayer_core::{builder::RelayerBuilder, config::RelayerConfig};

use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = RelayerCli::parse();
    match cli.command {
        Commands::Start(args) => {
            let config = RelayerConfig::from_file(&args.config)?;
            run(config).await
        }
        Commands::Relay(args) => {
            let mut config = RelayerConfig::from_file(&args.config)?;
            config.relayers = vec![args.entry()];
            run(config).await
        }
        Commands::DecodePacket(args) => {
            println!("{}", serde_json::to_string_pretty(&args.decode()?)?);
            Ok(())
        }
    }
}

async fn run(config: RelayerConfig) -> anyhow::Result<()> {
    let builder = RelayerBuilder::new(config);
    let config = builder.config();
    let _guard = init_observability(&config.observability)?;

    info!(
        "Observability initialized with level: {}",
        config.observability.level()
    );

    // Start the metrics server.
    if let Some(metrics) = &config.metrics {
        let addr = metrics.socket_addr()?;
        tokio::spawn(lz_devkit_relayer::metrics::serve(addr));
    }

    builder.start().await
}
