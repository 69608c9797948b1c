use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use newsmap::config::AppConfig;
use newsmap::logging;
use newsmap::pipeline::{ClusterService, Pipeline};
use newsmap::rss::FeedSource;
use newsmap::{app, TARGET_PIPELINE};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[clap(name = "newsmap", about = "Map Singapore news by place and constituency")]
struct Cli {
    /// Port to listen on (overrides PORT)
    #[clap(short, long, global = true)]
    port: Option<u16>,

    #[clap(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the clusters API (default)
    Serve,

    /// Run the pipeline once and print the clusters as JSON
    Once,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::configure_logging();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env();
    if let Some(port) = cli.port {
        config.port = port;
    }

    info!(
        target: TARGET_PIPELINE,
        "Starting with {} feeds, boundaries from {}",
        config.feeds.len(),
        config.boundaries_path.display()
    );

    // Configuration problems stop the service before it can serve anything.
    let pipeline = Pipeline::initialize(&config).await.map_err(|err| {
        error!(target: TARGET_PIPELINE, "Failed to initialize pipeline: {}", err);
        err
    })?;
    let source = FeedSource::new(config.feeds.clone())?;
    let service = Arc::new(ClusterService::new(
        Arc::new(source),
        Arc::new(pipeline),
        config.cluster_cache_ttl,
    ));

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => app::serve(service, &config.bind_address()).await,
        Commands::Once => {
            let clusters = service.compute_clusters().await?;
            let json = serde_json::to_string_pretty(&clusters)
                .context("Failed to serialize clusters")?;
            println!("{}", json);
            Ok(())
        }
    }
}
