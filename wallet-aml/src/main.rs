use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use wallet_aml_lib::api::types::{ScreenAddressRequest, ScreeningLookupRequest};
use wallet_aml_lib::api::{export_screening_report, screen_address};
use wallet_aml_lib::{Environment, ScreeningConfig, ScreeningContext, SharedScreeningContext};

/// Command-line interface for address screening
#[derive(Parser)]
#[command(name = "wallet-aml")]
#[command(about = "Screen wallet counterparties for AML risk")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Overrides AML_ENVIRONMENT
    #[arg(short, long)]
    environment: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Screen one or more addresses and print the results as JSON
    Screen {
        #[arg(required = true)]
        addresses: Vec<String>,
    },

    /// Print the plain-text AML report for an address
    Report { address: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.environment.as_deref() {
        Some(env) => ScreeningConfig::from_environment(Environment::parse(env)),
        None => ScreeningConfig::from_env(),
    }
    .context("failed to load screening configuration")?;
    let settings = config
        .settings()
        .context("invalid screening configuration")?;

    let default_level = if cli.verbose {
        "debug".to_string()
    } else {
        settings.log_level.to_lowercase()
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let context = ScreeningContext::initialize(&settings)
        .context("failed to initialize screening context")?;
    let state = SharedScreeningContext::new(context);
    info!("Using {} environment", format!("{:?}", state.environment()).to_lowercase());

    match cli.command {
        Commands::Screen { addresses } => {
            let mut failures = 0usize;
            for address in addresses {
                let request = ScreenAddressRequest {
                    address: address.clone(),
                };
                match screen_address(&state, request).await {
                    Ok(response) => println!("{}", serde_json::to_string_pretty(&response)?),
                    Err(e) => {
                        warn!("Screening {} failed", address);
                        eprintln!("{}: {}", address, e);
                        failures += 1;
                    }
                }
            }

            if failures > 0 {
                bail!("{} address(es) could not be screened", failures);
            }
        }

        Commands::Report { address } => {
            let export = export_screening_report(&state, ScreeningLookupRequest { address })
                .await
                .map_err(anyhow::Error::msg)?;
            print!("{}", export.report);
        }
    }

    Ok(())
}
