use std::{error::Error, path::PathBuf};

use clap::Parser;

use crate::config::{CONFIG_FILE, TomlConfig};

#[derive(Parser, Debug, Clone)]
#[command(about = "Write a starter configuration")]
#[must_use]
pub struct Initialize {
    path: Option<PathBuf>,
}

impl Initialize {
    pub fn run(self) -> Result<(), Box<dyn Error>> {
        let path = self.path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
        if std::fs::exists(&path)? {
            eprintln!("{} already exists.\nExiting...", path.display());
            return Ok(());
        }
        let toml = toml::to_string_pretty(&TomlConfig::starter())?;
        std::fs::write(&path, toml)?;
        eprintln!("Written config to {}!", path.display());
        Ok(())
    }
}
