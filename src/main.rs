pub mod aggregate;
pub mod config;
pub mod data;
pub mod normalize;
pub mod order;
pub mod palette;
pub mod project;
pub mod render;
pub mod report;
pub mod server;
pub mod types;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the marker map, the printable report and the count export
    Generate {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Print beneficiary counts per comuna and barrio
    Summary {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Serve the counts, markers and generated files over HTTP
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Generate { config } => {
            info!("Generating outputs with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;

            let records = data::load_records(&app_config)?;

            let aggregation = aggregate::aggregate(&records);
            info!(
                "Counted {} beneficiaries in {} comunas ({} without comuna)",
                aggregation.total(),
                aggregation.len(),
                records.len() - aggregation.total() as usize
            );

            let markers = project::markers(
                &records,
                &app_config.projection.bounds(),
                &app_config.projection.canvas(),
            );
            render::generate_map(&app_config, &markers)?;

            report::write_report(&app_config, &aggregation)?;
            report::write_export_file(&app_config, &aggregation)?;

            info!("Generation complete!");
        }
        Commands::Summary { config } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            let records = data::load_records(&app_config)?;
            let aggregation = aggregate::aggregate(&records);

            for district in aggregation.ordered() {
                println!("{} ({})", district.comuna, district.total);
                for barrio in district.barrios {
                    println!("    {}: {}", barrio.barrio, barrio.count);
                }
            }
            println!("Total: {}", aggregation.total());
        }
        Commands::Serve { config } => {
            info!("Serving with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;
            let records = data::load_records(&app_config)?;

            server::start_server(app_config, records).await?;
        }
    }

    Ok(())
}
