use anyhow::Result;
use std::path::Path;

use super::load_effective_config;

pub fn handle_config(show: bool, validate: bool, config_path: Option<&Path>, quiet: bool) -> Result<()> {
    if !show && !validate {
        if !quiet {
            eprintln!("Use --show or --validate");
        }
        std::process::exit(1);
    }

    let config = match load_effective_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            if !quiet {
                eprintln!("❌ Configuration validation failed: {:#}", e);
            }
            std::process::exit(1);
        }
    };

    if show && !quiet {
        println!("{}", toml::to_string_pretty(&config)?);
    }

    if validate && !quiet {
        println!("✅ Configuration is valid");
    }

    Ok(())
}
