//! Web App Catalog CLI
//!
//! `catalog-web analyze <url>` prints one record as JSON;
//! `catalog-web serve` runs the HTTP API.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use webapp_catalog::catalog::{AccessPolicy, AppAnalyzer, Catalog, MemoryStore};
use webapp_catalog::{handlers, CatalogConfig};

/// Web App Catalog
#[derive(Parser, Debug)]
#[command(name = "catalog-web")]
#[command(version)]
#[command(about = "Turn web app URLs into display-ready catalog records")]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze one URL and print the record as JSON
    Analyze {
        /// URL to analyze
        url: String,

        /// Fetch timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Skip enrichment even when GEMINI_API_KEY is set
        #[arg(long)]
        no_enrich: bool,
    },

    /// Run the HTTP API
    Serve {
        /// Host to bind to (overrides CATALOG_BIND_ALL)
        #[arg(short = 'H', long)]
        host: Option<IpAddr>,

        /// Port to listen on (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    let mut config = CatalogConfig::from_env().context("invalid configuration")?;

    match args.command {
        Command::Analyze {
            url,
            timeout_ms,
            no_enrich,
        } => {
            if let Some(ms) = timeout_ms {
                config.fetch_timeout_ms = ms;
                config.validate().context("invalid --timeout-ms")?;
            }
            let mut analyzer = AppAnalyzer::from_config(&config)?;
            if no_enrich {
                analyzer = analyzer.without_enricher();
            }

            let app = analyzer.analyze(&url).await?;
            println!("{}", serde_json::to_string_pretty(&app)?);
        }
        Command::Serve { host, port } => {
            if let Some(port) = port {
                config.port = port;
            }
            let addr = match host {
                Some(ip) => SocketAddr::new(ip, config.port),
                None => config.bind_addr(),
            };

            let analyzer = Arc::new(AppAnalyzer::from_config(&config)?);
            let catalog = Arc::new(Catalog::new(
                analyzer,
                Arc::new(MemoryStore::new()),
                AccessPolicy::from_config(&config),
            ));

            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            tracing::info!("Web App Catalog listening on http://{}", addr);

            axum::serve(listener, handlers::router(catalog))
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                    tracing::info!("Shutting down");
                })
                .await
                .context("server error")?;
        }
    }

    Ok(())
}
