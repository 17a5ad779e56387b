use anyhow::Result;
use std::path::Path;

use super::load_effective_config;

pub fn handle_build_number(version: &str, semantic: bool, config_path: Option<&Path>) -> Result<()> {
    let policy = load_effective_config(config_path)?.version;

    if semantic {
        println!("{}", policy.extract_semantic_version(version)?);
    } else {
        println!("{}", policy.extract_build_number(version)?);
    }
    Ok(())
}
