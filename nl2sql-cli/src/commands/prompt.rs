use std::{error::Error, path::PathBuf};

use clap::Parser;
use nl2sql_core::{GenerationRequest, dialect::SqlDialect, prompt::PromptBuilder};

use crate::config::Nl2SqlConfig;

#[derive(Parser, Debug, Clone)]
#[command(about = "Print the prompt that would be sent for a request")]
#[must_use]
pub struct Prompt {
    request: String,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    dialect: Option<SqlDialect>,
}

impl Prompt {
    pub fn run(self) -> Result<(), Box<dyn Error>> {
        let config = Nl2SqlConfig::load(self.config.as_deref())?;
        let request =
            GenerationRequest::new(self.request, self.dialect.unwrap_or(config.dialect))?;
        println!(
            "{}",
            PromptBuilder::build(&config.schema, request.dialect(), request.text())
        );
        Ok(())
    }
}
