pub mod types;
pub mod config;
pub mod data;
pub mod processing;
pub mod map;
pub mod render;
pub mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the heat risk and vulnerability dashboard page
    Generate {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Serve the dashboard and the neighborhood lookup API
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

/// Runs both map flows and renders the page. Returns the joined neighborhoods alongside.
fn build_dashboard(app_config: &config::AppConfig) -> Result<(String, Vec<types::Neighborhood>)> {
    // Flow A
    let heat_risk = map::heat_risk_map(&app_config.heat_risk);

    // Flow B
    let (neighborhoods, _summary) = processing::load_neighborhoods(app_config)?;
    let hvi = map::hvi_map(&app_config.hvi, &neighborhoods);

    let page = render::render_dashboard(&[heat_risk, hvi])?;
    Ok((page, neighborhoods))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Generate { config } => {
            info!("Generating dashboard with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;

            let (page, _) = build_dashboard(&app_config)?;
            render::write_dashboard(&app_config.output.page, &page)?;

            info!("Generation complete!");
        }
        Commands::Serve { config } => {
            info!("Serving dashboard with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;

            let (page, neighborhoods) = build_dashboard(&app_config)?;
            server::start_server(app_config, page, neighborhoods).await?;
        }
    }

    Ok(())
}
