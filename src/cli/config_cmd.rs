use anyhow::Result;

use crate::cli::output::OutputOptions;
use crate::core::config::{AppConfig, StoreBackend};
use crate::core::cost::store::default_state_path;

pub fn init(_opts: &OutputOptions) -> Result<()> {
    let path = AppConfig::config_path();
    if path.exists() {
        eprintln!("Config file already exists at {}", path.display());
        eprintln!("Remove it first if you want to regenerate.");
        return Ok(());
    }

    match AppConfig::default().save() {
        Ok(path) => {
            println!("Generated config at {}", path.display());
            println!("  Set [clock] utc_offset (e.g. \"-03:00\") to pin the operator's time zone.");
        }
        Err(e) => {
            eprintln!("Failed to generate config: {}", e);
            std::process::exit(1);
        }
    }
    Ok(())
}

pub fn check(_opts: &OutputOptions) -> Result<()> {
    let path = AppConfig::config_path();
    if !path.exists() {
        eprintln!("No config file found at {}", path.display());
        eprintln!("Run `dialcost config init` to create one.");
        return Ok(());
    }

    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let issues = config.validate();
    if issues.is_empty() {
        println!("Config is valid: {}", path.display());
        println!("  Server: {}:{}", config.server.host, config.server.port);
        match config.store.backend {
            StoreBackend::Memory => println!("  Store:  memory (not persisted)"),
            StoreBackend::File => {
                let state_path = config.store.path.clone().unwrap_or_else(default_state_path);
                println!("  Store:  {}", state_path.display());
            }
        }
        println!(
            "  Offset: {}",
            config.clock.utc_offset.as_deref().unwrap_or("host local time")
        );
    } else {
        eprintln!("Config issues found in {}:", path.display());
        for issue in &issues {
            eprintln!("  - {}", issue);
        }
        std::process::exit(1);
    }
    Ok(())
}
