//! Config validation CLI tool
//!
//! Validates a narval configuration file, with the environment overlay
//! applied, and reports any errors.

use narval_config::{ConfigError, StoreConfig, CURRENT_CONFIG_VERSION};
use narval_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) if path == "-h" || path == "--help" => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a narval configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            eprintln!("  BUCKET=saves validate-config narval.toml");
            return ExitCode::from(2);
        }
        Some(path) => PathBuf::from(path),
        None => default_config_path(),
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match narval_config::load_config(Some(&config_path)) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", CURRENT_CONFIG_VERSION);
            println!("  Game:           {}", config.game);
            println!("  Game directory: {}", config.game_dir.display());
            match &config.store {
                StoreConfig::S3 {
                    bucket,
                    prefix,
                    region,
                } => {
                    println!("  Store:          s3://{}/{}", bucket, prefix);
                    if let Some(region) = region {
                        println!("  Region:         {}", region);
                    }
                }
                StoreConfig::Dir { path } => {
                    println!("  Store:          {}", path.display());
                }
            }
            println!();
            println!("Server:");
            println!("  Version:        {}", config.server.version);
            println!(
                "  Startup grace:  {}",
                humantime_display(config.server.startup_grace)
            );
            println!(
                "  Max session:    {}",
                humantime_display(config.server.max_session)
            );
            println!(
                "  Shutdown grace: {}",
                humantime_display(config.server.shutdown_grace)
            );
            println!(
                "  Stop timeout:   {}",
                humantime_display(config.server.stop_timeout)
            );
            println!(
                "  Notifications:  {}",
                if config.notify.webhook_url.is_some() {
                    "webhook"
                } else {
                    "log only"
                }
            );

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver, CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}

fn humantime_display(duration: std::time::Duration) -> String {
    humantime::format_duration(duration).to_string()
}
