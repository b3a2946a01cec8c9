use std::{
    env,
    error::Error,
    path::{Path, PathBuf},
    sync::Arc,
};

use dotenvy::dotenv;
use nl2sql_core::{
    contract::{DEFAULT_MIN_LENGTH, DEFAULT_REMEDY_ATTEMPTS, Postcondition},
    dialect::SqlDialect,
    extract::SQL_VERBS,
    schema::{SchemaContext, TableSchema},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const API_KEY: &str = "NL2SQL_API_KEY";
pub const CONFIG_FILE: &str = "nl2sql.toml";

#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("API key not found, please set the {API_KEY} environment variable.")]
    ApiKeyNotFound,
    #[error("encountered '{error}' attempting to read {path}")]
    Unreadable { path: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct EngineSettings {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            max_tokens: 150,
            temperature: 0.0,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ContractSettings {
    remedy_attempts: usize,
    min_length: usize,
    allowed_verbs: Vec<String>,
}

impl Default for ContractSettings {
    fn default() -> Self {
        Self {
            remedy_attempts: DEFAULT_REMEDY_ATTEMPTS,
            min_length: DEFAULT_MIN_LENGTH,
            allowed_verbs: SQL_VERBS.iter().map(|verb| verb.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[must_use]
pub struct TomlConfig {
    #[serde(default)]
    pub dialect: SqlDialect,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub contract: ContractSettings,
    pub tables: Vec<TableSchema>,
}

impl TomlConfig {
    /// Configuration written by `init`: a small HR schema.
    pub fn starter() -> Self {
        Self {
            dialect: SqlDialect::Sqlite,
            engine: EngineSettings::default(),
            contract: ContractSettings::default(),
            tables: vec![
                TableSchema::new(
                    "employees",
                    ["id", "name", "role", "salary", "hire_date", "department_id"],
                ),
                TableSchema::new("departments", ["id", "name", "location", "region_id"]),
                TableSchema::new("regions", ["id", "name"]),
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Nl2SqlConfig {
    pub dialect: SqlDialect,
    pub schema: Arc<SchemaContext>,
    pub engine: EngineSettings,
    pub postcondition: Postcondition,
    pub remedy_attempts: usize,
}

impl Nl2SqlConfig {
    pub fn from_toml_config(config: TomlConfig) -> Result<Self, Box<dyn Error>> {
        let schema = SchemaContext::new(config.tables)?;
        let postcondition =
            Postcondition::new(config.contract.min_length, &config.contract.allowed_verbs)?;
        Ok(Self {
            dialect: config.dialect,
            schema: Arc::new(schema),
            engine: config.engine,
            postcondition,
            remedy_attempts: config.contract.remedy_attempts,
        })
    }

    pub fn from_toml_str(toml: &str) -> Result<Self, Box<dyn Error>> {
        let config: TomlConfig = toml::from_str(toml)?;
        Self::from_toml_config(config)
    }

    pub fn load(path: Option<&Path>) -> Result<Self, Box<dyn Error>> {
        let path = path.map_or_else(|| PathBuf::from(CONFIG_FILE), Path::to_path_buf);
        let contents =
            std::fs::read_to_string(&path).map_err(|error| ConfigError::Unreadable {
                path: path.display().to_string(),
                error: error.to_string(),
            })?;
        Self::from_toml_str(&contents)
    }
}

pub fn api_key() -> Result<String, Box<dyn Error>> {
    tolerate_missing(dotenv())?;
    Ok(env::var(API_KEY).map_err(|_| ConfigError::ApiKeyNotFound)?)
}

/// A missing `.env` is fine, the variable may come from the environment. A
/// malformed one is reported.
fn tolerate_missing<T>(loaded: dotenvy::Result<T>) -> Result<(), dotenvy::Error> {
    if let Err(error) = loaded
        && !error.not_found()
    {
        return Err(error);
    }
    Ok(())
}
