use std::{error::Error, path::PathBuf};

use clap::{Parser, ValueEnum};
use nl2sql_core::{
    ContractBuilder, ContractController, GenerationRequest, dialect::SqlDialect,
    engine::GenerationEngine,
};

use crate::{
    commands::init_tracing,
    config::{self, Nl2SqlConfig},
    engine::{CliEngine, HttpEngine, ReplayEngine},
    report::{GeneratedQuery, Report, json::JsonReport, sql::SqlReport},
};

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum Format {
    #[default]
    Json,
    Sql,
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Translate requests into SQL")]
#[must_use]
pub struct Generate {
    requests: Vec<String>,
    #[arg(long, help = "Read one request per line from a file")]
    from_file: Option<PathBuf>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, help = "Override the configured dialect")]
    dialect: Option<SqlDialect>,
    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,
    #[arg(long, help = "Write the report to a file instead of stdout")]
    output: Option<PathBuf>,
    #[arg(
        long,
        help = "Answer every prompt with the contents of this file instead of calling the model"
    )]
    replay: Option<PathBuf>,
    #[arg(long, help = "Show debug information")]
    debug: bool,
}

impl Generate {
    fn requests(&self) -> Result<Vec<String>, Box<dyn Error>> {
        let mut requests = self.requests.clone();
        if let Some(path) = &self.from_file {
            let contents = std::fs::read_to_string(path)?;
            requests.extend(
                contents
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_owned),
            );
        }
        if requests.is_empty() {
            return Err("No requests given, pass them as arguments or with --from-file".into());
        }
        Ok(requests)
    }

    fn engine(&self, config: &Nl2SqlConfig) -> Result<CliEngine, Box<dyn Error>> {
        Ok(match &self.replay {
            Some(path) => CliEngine::Replay(ReplayEngine::from_file(path)?),
            None => CliEngine::Http(HttpEngine::new(config.engine.clone(), config::api_key()?)?),
        })
    }

    pub fn run(self) -> Result<(), Box<dyn Error>> {
        init_tracing(self.debug)?;
        let config = Nl2SqlConfig::load(self.config.as_deref())?;
        let dialect = self.dialect.unwrap_or(config.dialect);
        let requests = self.requests()?;

        let controller = controller(&config, dialect, self.engine(&config)?);

        let mut report: Box<dyn Report> = match self.format {
            Format::Json => Box::new(JsonReport::default()),
            Format::Sql => Box::new(SqlReport::default()),
        };
        translate(&controller, requests, report.as_mut())?;

        let rendered = report.finalize()?;
        match self.output {
            Some(path) => std::fs::write(path, rendered)?,
            None => println!("{rendered}"),
        }
        Ok(())
    }
}

fn controller<E: GenerationEngine>(
    config: &Nl2SqlConfig,
    dialect: SqlDialect,
    engine: E,
) -> ContractController<E> {
    let mut builder = ContractBuilder::new(config.schema.clone());
    builder
        .dialect(dialect)
        .postcondition(config.postcondition.clone())
        .remedy_attempts(config.remedy_attempts);
    builder.build(engine)
}

/// Runs every request through the contract and pushes the outcome to `report`.
fn translate<E: GenerationEngine>(
    controller: &ContractController<E>,
    requests: Vec<String>,
    report: &mut dyn Report,
) -> Result<(), Box<dyn Error>> {
    for text in requests {
        let request = GenerationRequest::new(text.as_str(), controller.dialect())?;
        let outcome = controller.run(&request);
        match outcome.is_accepted() {
            true => tracing::info!("Generated SQL for {text:?}"),
            false => tracing::error!("Generation for {text:?} failed"),
        }
        report.push(GeneratedQuery {
            request: text,
            accepted: outcome.is_accepted(),
            attempts: outcome.attempts(),
            query: outcome.query(),
        })?;
    }
    Ok(())
}
