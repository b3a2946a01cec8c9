use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlparser::dialect::{
    AnsiDialect, BigQueryDialect, ClickHouseDialect, DatabricksDialect, Dialect, DuckDbDialect,
    GenericDialect, HiveDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect,
    RedshiftSqlDialect, SQLiteDialect, SnowflakeDialect,
};

use crate::error::ConfigError;

/// SQL dialects a pipeline can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SqlDialect {
    Generic,
    Ansi,
    BigQuery,
    ClickHouse,
    Databricks,
    DuckDb,
    Hive,
    MsSql,
    MySql,
    Postgres,
    Redshift,
    Snowflake,
    #[default]
    Sqlite,
}

impl SqlDialect {
    pub const ALL: &'static [SqlDialect] = &[
        SqlDialect::Generic,
        SqlDialect::Ansi,
        SqlDialect::BigQuery,
        SqlDialect::ClickHouse,
        SqlDialect::Databricks,
        SqlDialect::DuckDb,
        SqlDialect::Hive,
        SqlDialect::MsSql,
        SqlDialect::MySql,
        SqlDialect::Postgres,
        SqlDialect::Redshift,
        SqlDialect::Snowflake,
        SqlDialect::Sqlite,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SqlDialect::Generic => "generic",
            SqlDialect::Ansi => "ansi",
            SqlDialect::BigQuery => "bigquery",
            SqlDialect::ClickHouse => "clickhouse",
            SqlDialect::Databricks => "databricks",
            SqlDialect::DuckDb => "duckdb",
            SqlDialect::Hive => "hive",
            SqlDialect::MsSql => "mssql",
            SqlDialect::MySql => "mysql",
            SqlDialect::Postgres => "postgres",
            SqlDialect::Redshift => "redshift",
            SqlDialect::Snowflake => "snowflake",
            SqlDialect::Sqlite => "sqlite",
        }
    }

    /// Grammar used to parse and tokenize statements of this dialect.
    pub fn grammar(self) -> Box<dyn Dialect> {
        match self {
            SqlDialect::Generic => Box::new(GenericDialect {}),
            SqlDialect::Ansi => Box::new(AnsiDialect {}),
            SqlDialect::BigQuery => Box::new(BigQueryDialect {}),
            SqlDialect::ClickHouse => Box::new(ClickHouseDialect {}),
            SqlDialect::Databricks => Box::new(DatabricksDialect {}),
            SqlDialect::DuckDb => Box::new(DuckDbDialect {}),
            SqlDialect::Hive => Box::new(HiveDialect {}),
            SqlDialect::MsSql => Box::new(MsSqlDialect {}),
            SqlDialect::MySql => Box::new(MySqlDialect {}),
            SqlDialect::Postgres => Box::new(PostgreSqlDialect {}),
            SqlDialect::Redshift => Box::new(RedshiftSqlDialect {}),
            SqlDialect::Snowflake => Box::new(SnowflakeDialect {}),
            SqlDialect::Sqlite => Box::new(SQLiteDialect {}),
        }
    }
}

impl FromStr for SqlDialect {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Ok(match name.trim().to_lowercase().as_str() {
            "generic" => Self::Generic,
            "ansi" => Self::Ansi,
            "bigquery" => Self::BigQuery,
            "clickhouse" => Self::ClickHouse,
            "databricks" => Self::Databricks,
            "duckdb" => Self::DuckDb,
            "hive" => Self::Hive,
            "mssql" | "tsql" => Self::MsSql,
            "mysql" => Self::MySql,
            "postgres" | "postgresql" => Self::Postgres,
            "redshift" => Self::Redshift,
            "snowflake" => Self::Snowflake,
            "sqlite" => Self::Sqlite,
            _ => Err(ConfigError::UnsupportedDialect {
                name: name.to_string(),
            })?,
        })
    }
}

impl TryFrom<String> for SqlDialect {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SqlDialect> for String {
    fn from(value: SqlDialect) -> Self {
        value.name().to_owned()
    }
}

impl Display for SqlDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
