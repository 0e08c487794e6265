//! Config command - show or write the configuration file

use anyhow::{anyhow, Result};
use std::path::PathBuf;

use crate::config::Config;

pub fn execute(config: &Config, example: bool, write: Option<PathBuf>) -> Result<()> {
    if let Some(path) = write {
        if path.exists() {
            return Err(anyhow!("Refusing to overwrite existing file: {}", path.display()));
        }
        Config::default().save_to_file(&path)?;
        log::info!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let content = if example {
        Config::example_toml()?
    } else {
        toml::to_string_pretty(config)?
    };
    println!("{}", content);
    Ok(())
}
