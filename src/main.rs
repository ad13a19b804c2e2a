//! haos-agent - main entry point

use anyhow::{Context, Result};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use haos_agent::cli::{Cli, Commands};
use haos_agent::config::{AgentConfig, BusKind};
use haos_agent::{dbus, kernel_module, sanity};

/// Initialize the logger: `info` by default, `RUST_LOG` overrides
fn init_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Load the configuration file if one was given, apply CLI overrides, validate
fn effective_config(cli: &Cli) -> Result<AgentConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from: {:?}", path);
            AgentConfig::load_from_file(path)?
        }
        None => AgentConfig::default(),
    };
    if cli.session {
        config.bus = BusKind::Session;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    init_logger();
    info!("haos-agent {} starting up", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse_args();
    debug!("CLI arguments parsed: {:?}", cli);

    match cli.command {
        Some(Commands::Validate { ref config }) => {
            info!("Validating configuration file: {:?}", config);
            match AgentConfig::load_from_file(config).and_then(|c| c.validate()) {
                Ok(()) => {
                    info!("Configuration validation successful");
                    println!("Configuration file is valid: {}", config.display());
                }
                Err(e) => {
                    error!("Configuration validation failed: {:#}", e);
                    eprintln!("Configuration validation failed: {:#}", e);
                    std::process::exit(1);
                }
            }
        }
        Some(Commands::Status) => {
            let config = effective_config(&cli)?;
            let loaded = kernel_module::is_loaded(&config.proc_modules, &config.kernel_module)?;
            let status = serde_json::json!({
                "config": config,
                "module_loaded": loaded,
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Some(Commands::Serve) | None => {
            let config = effective_config(&cli)?;
            if !cli.skip_preflight {
                sanity::run_preflight_checks(&config);
            }
            dbus::serve(&config).context("Agent stopped with an error")?;
            info!("haos-agent stopped");
        }
    }

    Ok(())
}
