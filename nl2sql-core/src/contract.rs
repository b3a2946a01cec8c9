use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dialect::SqlDialect;
use crate::engine::GenerationEngine;
use crate::error::ConfigError;
use crate::extract::{SQL_VERBS, extract_sql};
use crate::normalize::{DialectError, DialectNormalizer};
use crate::prompt::PromptBuilder;
use crate::schema::SchemaContext;
use crate::validate::StatementValidator;

/// Prefix of every failed generation. Output carrying it is never SQL.
pub const ERROR_MARKER: &str = "-- ERROR:";
pub const DEFAULT_MIN_LENGTH: usize = 20;
pub const DEFAULT_REMEDY_ATTEMPTS: usize = 1;

static LEADING_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\w+)").expect("Leading word pattern is a valid regular expression.")
});

#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct GenerationRequest {
    text: String,
    dialect: SqlDialect,
}

impl GenerationRequest {
    pub fn new(text: impl Into<String>, dialect: SqlDialect) -> Result<Self, ConfigError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ConfigError::EmptyRequest);
        }
        Ok(Self { text, dialect })
    }

    pub fn parse(text: impl Into<String>, dialect: &str) -> Result<Self, ConfigError> {
        Self::new(text, dialect.parse()?)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlResponse {
    pub query: String,
}

impl SqlResponse {
    pub fn is_error(&self) -> bool {
        self.query.trim_start().starts_with(ERROR_MARKER)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PostconditionFailure {
    #[error("SQL too short ({length} < {min_length} characters)")]
    TooShort { length: usize, min_length: usize },
    #[error("statement has no leading keyword")]
    MissingVerb,
    #[error("statement verb {verb} is not allowed")]
    DisallowedVerb { verb: String },
}

/// Shape check applied to the final statement of an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Postcondition {
    min_length: usize,
    allowed_verbs: Vec<String>,
}

impl Default for Postcondition {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_LENGTH,
            allowed_verbs: SQL_VERBS.iter().map(|verb| verb.to_string()).collect(),
        }
    }
}

impl Postcondition {
    pub fn new(
        min_length: usize,
        allowed_verbs: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Result<Self, ConfigError> {
        let allowed_verbs: Vec<String> = allowed_verbs
            .into_iter()
            .map(|verb| verb.as_ref().trim().to_lowercase())
            .filter(|verb| !verb.is_empty())
            .collect();
        if allowed_verbs.is_empty() {
            return Err(ConfigError::NoAllowedVerbs);
        }
        Ok(Self {
            min_length,
            allowed_verbs,
        })
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    pub fn allowed_verbs(&self) -> &[String] {
        &self.allowed_verbs
    }

    pub fn check(&self, sql: &str) -> Result<(), PostconditionFailure> {
        let sql = sql.trim();
        let length = sql.chars().count();
        if length < self.min_length {
            return Err(PostconditionFailure::TooShort {
                length,
                min_length: self.min_length,
            });
        }
        let verb = LEADING_WORD
            .captures(sql)
            .and_then(|captures| captures.get(1))
            .ok_or(PostconditionFailure::MissingVerb)?
            .as_str()
            .to_lowercase();
        match self.allowed_verbs.contains(&verb) {
            true => Ok(()),
            false => Err(PostconditionFailure::DisallowedVerb { verb }),
        }
    }
}

/// Why a single attempt did not produce an acceptable statement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("generation engine failed - {message}")]
    Engine { message: String },
    #[error("no SQL statement found in model output")]
    Extraction,
    #[error("SQL dialect validation failed - {0}")]
    Dialect(#[from] DialectError),
    #[error("SQL generation failed - statement was not recognised")]
    Validation,
    #[error("post-validation failed - {0}")]
    Postcondition(#[from] PostconditionFailure),
}

impl Rejection {
    pub fn to_query(&self) -> String {
        format!("{ERROR_MARKER} {self}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted(String),
    Rejected(Rejection),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractOutcome {
    Accepted {
        sql: String,
        attempts: usize,
        rejections: Vec<Rejection>,
    },
    Rejected {
        rejections: Vec<Rejection>,
    },
}

impl ContractOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ContractOutcome::Accepted { .. })
    }

    pub fn attempts(&self) -> usize {
        match self {
            ContractOutcome::Accepted { attempts, .. } => *attempts,
            ContractOutcome::Rejected { rejections } => rejections.len(),
        }
    }

    /// Rejections of every failed attempt, oldest first.
    pub fn rejections(&self) -> &[Rejection] {
        match self {
            ContractOutcome::Accepted { rejections, .. }
            | ContractOutcome::Rejected { rejections } => rejections,
        }
    }

    pub fn query(&self) -> String {
        match self {
            ContractOutcome::Accepted { sql, .. } => sql.clone(),
            ContractOutcome::Rejected { rejections } => match rejections.last() {
                Some(rejection) => rejection.to_query(),
                None => format!("{ERROR_MARKER} no generation attempt was made"),
            },
        }
    }

    pub fn into_response(self) -> SqlResponse {
        SqlResponse {
            query: self.query(),
        }
    }
}

/// Runs generation attempts against the postcondition, feeding each
/// rejection into the next prompt until the remedy budget is spent.
pub struct ContractController<E> {
    schema: Arc<SchemaContext>,
    dialect: SqlDialect,
    engine: E,
    postcondition: Postcondition,
    remedy_attempts: usize,
}

impl<E: GenerationEngine> ContractController<E> {
    pub(crate) fn from_parts(
        schema: Arc<SchemaContext>,
        dialect: SqlDialect,
        engine: E,
        postcondition: Postcondition,
        remedy_attempts: usize,
    ) -> Self {
        Self {
            schema,
            dialect,
            engine,
            postcondition,
            remedy_attempts,
        }
    }

    /// Controller with default contract settings for a dialect given by name.
    pub fn new(
        schema: impl Into<Arc<SchemaContext>>,
        dialect: &str,
        engine: E,
    ) -> Result<Self, ConfigError> {
        Ok(Self::from_parts(
            schema.into(),
            dialect.parse()?,
            engine,
            Postcondition::default(),
            DEFAULT_REMEDY_ATTEMPTS,
        ))
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Translates `text` in the controller's dialect.
    pub fn generate(&self, text: &str) -> Result<SqlResponse, ConfigError> {
        let request = GenerationRequest::new(text, self.dialect)?;
        Ok(self.run(&request).into_response())
    }

    pub fn run(&self, request: &GenerationRequest) -> ContractOutcome {
        let mut rejections: Vec<Rejection> = vec![];
        for attempt in 1..=self.remedy_attempts + 1 {
            match self.attempt(request, rejections.last()) {
                Verdict::Accepted(sql) => {
                    info!(attempt, "Accepted generated statement");
                    return ContractOutcome::Accepted {
                        sql,
                        attempts: attempt,
                        rejections,
                    };
                }
                Verdict::Rejected(rejection) => {
                    warn!(attempt, "Attempt rejected: {rejection}");
                    rejections.push(rejection);
                }
            }
        }
        ContractOutcome::Rejected { rejections }
    }

    /// One generate, extract, normalize, validate and postcondition cycle.
    pub fn attempt(&self, request: &GenerationRequest, feedback: Option<&Rejection>) -> Verdict {
        let dialect = request.dialect();
        let feedback = feedback.map(ToString::to_string);
        let prompt = PromptBuilder::build_with_feedback(
            &self.schema,
            dialect,
            request.text(),
            feedback.as_deref(),
        );
        debug!(remedy = feedback.is_some(), "Prompting engine with {} bytes", prompt.len());

        let raw = match self.engine.generate(&prompt) {
            Ok(raw) => raw,
            Err(error) => {
                return Verdict::Rejected(Rejection::Engine {
                    message: error.to_string(),
                });
            }
        };
        debug!("Generated raw output:\n{raw}");

        let candidate = extract_sql(&raw);
        if candidate.is_empty() {
            return Verdict::Rejected(Rejection::Extraction);
        }
        debug!("Extracted candidate:\n{candidate}");

        let sql = match DialectNormalizer::new(dialect).normalize(&candidate) {
            Ok(sql) => sql,
            Err(error) => return Verdict::Rejected(error.into()),
        };
        debug!("Normalized statement: {sql}");

        if !StatementValidator::new(dialect).validate(&sql) {
            return Verdict::Rejected(Rejection::Validation);
        }
        match self.postcondition.check(&sql) {
            Ok(()) => Verdict::Accepted(sql),
            Err(failure) => Verdict::Rejected(failure.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use super::{
        ContractController, ContractOutcome, ERROR_MARKER, GenerationRequest, Postcondition,
        PostconditionFailure, Rejection, SqlResponse,
    };
    use crate::dialect::SqlDialect;
    use crate::engine::{EngineError, GenerationEngine};
    use crate::error::ConfigError;
    use crate::extract::SQL_VERBS;
    use crate::normalize::DialectError;
    use crate::prompt::OUTPUT_MARKER;
    use crate::schema::{SchemaContext, TableSchema};

    /// Replays canned outputs in order and records every prompt it saw.
    #[derive(Default)]
    struct ScriptedEngine {
        outputs: Mutex<VecDeque<Result<String, String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedEngine {
        fn new(outputs: &[&str]) -> Self {
            Self::with_results(outputs.iter().map(|output| Ok(output.to_string())))
        }

        fn with_results(outputs: impl IntoIterator<Item = Result<String, String>>) -> Self {
            Self {
                outputs: Mutex::new(outputs.into_iter().collect()),
                prompts: Mutex::default(),
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    impl GenerationEngine for ScriptedEngine {
        fn generate(&self, prompt: &str) -> Result<String, EngineError> {
            self.prompts.lock().unwrap().push(prompt.to_owned());
            match self.outputs.lock().unwrap().pop_front() {
                Some(Ok(output)) => Ok(output),
                Some(Err(error)) => Err(error.into()),
                None => Err("script exhausted".into()),
            }
        }
    }

    fn schema() -> SchemaContext {
        SchemaContext::new([
            TableSchema::new(
                "employees",
                ["id", "name", "role", "salary", "hire_date", "department_id"],
            ),
            TableSchema::new("departments", ["id", "name", "location", "region_id"]),
            TableSchema::new("regions", ["id", "name"]),
        ])
        .unwrap()
    }

    fn controller(outputs: &[&str]) -> ContractController<ScriptedEngine> {
        ContractController::new(schema(), "sqlite", ScriptedEngine::new(outputs)).unwrap()
    }

    fn request(text: &str) -> GenerationRequest {
        GenerationRequest::new(text, SqlDialect::Sqlite).unwrap()
    }

    #[test]
    fn accepts_on_first_attempt() {
        let controller = controller(&[
            "```sql\nSELECT * FROM employees WHERE hire_date > '2020-01-01';\n```",
        ]);
        let outcome = controller.run(&request("List employees hired after 2020"));
        assert_eq!(
            outcome,
            ContractOutcome::Accepted {
                sql: "SELECT * FROM employees WHERE hire_date > '2020-01-01'".into(),
                attempts: 1,
                rejections: vec![],
            }
        );
        assert_eq!(controller.engine().prompts().len(), 1);
    }

    #[test]
    fn echoed_prompt_output() {
        let raw = format!(
            "You are a SQL generation assistant.\nRequest: List regions\n{OUTPUT_MARKER}\n\
             SELECT name FROM regions ORDER BY name\nRequest: again\n{OUTPUT_MARKER}\n\
             DROP TABLE regions"
        );
        let controller = controller(&[&raw]);
        let response = controller.generate("List regions").unwrap();
        assert_eq!(
            response,
            SqlResponse {
                query: "SELECT name FROM regions ORDER BY name".into()
            }
        );
        assert!(!response.is_error());
    }

    #[test]
    fn missing_sql_is_remedied_once_then_rejected() {
        let controller = controller(&["I am not sure.", "Still no idea."]);
        let outcome = controller.run(&request("Tell me a joke"));
        assert_eq!(
            outcome,
            ContractOutcome::Rejected {
                rejections: vec![Rejection::Extraction, Rejection::Extraction],
            }
        );
        let prompts = controller.engine().prompts();
        assert_eq!(prompts.len(), 2);
        assert!(!prompts[0].contains("previous answer was rejected"));
        assert!(prompts[1].contains("rejected: no SQL statement found in model output"));

        let response = outcome.into_response();
        assert!(response.is_error());
        assert_eq!(
            response.query,
            format!("{ERROR_MARKER} no SQL statement found in model output")
        );
    }

    #[test]
    fn unparseable_statement_becomes_an_error_marker() {
        let controller = controller(&[
            "SELECT * FROM nonexistent_syntax(((",
            "SELECT * FROM nonexistent_syntax(((",
        ]);
        let outcome = controller.run(&request("Break the parser"));
        assert!(!outcome.is_accepted());
        assert!(
            outcome
                .rejections()
                .iter()
                .all(|rejection| matches!(
                    rejection,
                    Rejection::Dialect(DialectError::Unparseable { .. })
                ))
        );
        let query = outcome.query();
        assert!(query.starts_with("-- ERROR: SQL dialect validation failed - "));
    }

    #[test]
    fn remedy_recovers_from_short_output() {
        let controller = controller(&["SELECT 1", "SELECT name FROM employees"]);
        let outcome = controller.run(&request("List employee names"));
        assert_eq!(
            outcome,
            ContractOutcome::Accepted {
                sql: "SELECT name FROM employees".into(),
                attempts: 2,
                rejections: vec![Rejection::Postcondition(PostconditionFailure::TooShort {
                    length: 8,
                    min_length: 20,
                })],
            }
        );
        let prompts = controller.engine().prompts();
        assert!(prompts[1].contains("SQL too short (8 < 20 characters)"));
    }

    #[test]
    fn engine_failures_are_remedied() {
        let engine = ScriptedEngine::with_results([
            Err("connection reset".to_string()),
            Ok("DELETE FROM employees WHERE hire_date < '2020-01-01'".to_string()),
        ]);
        let controller = ContractController::new(schema(), "sqlite", engine).unwrap();
        let outcome = controller.run(&request("Drop all employees hired before 2020"));
        assert!(outcome.is_accepted());
        assert_eq!(
            outcome.rejections(),
            [Rejection::Engine {
                message: "connection reset".into()
            }]
        );
    }

    #[test]
    fn disallowed_verb_is_rejected() {
        let mut builder = crate::ContractBuilder::new(schema());
        builder.postcondition(Postcondition::new(20, ["select"]).unwrap());
        let controller = builder.build(ScriptedEngine::new(&[
            "DELETE FROM employees WHERE hire_date < '2020-01-01'",
            "DELETE FROM employees WHERE hire_date < '2020-01-01'",
        ]));
        let outcome = controller.run(&request("Remove early hires"));
        assert_eq!(outcome.attempts(), 2);
        assert_eq!(
            outcome.query(),
            format!("{ERROR_MARKER} post-validation failed - statement verb delete is not allowed")
        );
    }

    #[test]
    fn remedy_budget_is_configurable() {
        let mut builder = crate::ContractBuilder::new(schema());
        builder.remedy_attempts(0);
        let controller =
            builder.build(ScriptedEngine::new(&["nothing", "SELECT name FROM employees"]));
        assert!(!controller.run(&request("List names")).is_accepted());
        assert_eq!(controller.engine().prompts().len(), 1);

        let mut builder = crate::ContractBuilder::new(schema());
        builder.remedy_attempts(3);
        let controller = builder.build(ScriptedEngine::new(&["a", "b", "c", "d", "e"]));
        let outcome = controller.run(&request("List names"));
        assert_eq!(outcome.attempts(), 4);
        assert_eq!(controller.engine().prompts().len(), 4);
    }

    #[test]
    fn request_dialect_drives_normalization() {
        let controller = controller(&["SELECT `name` FROM employees LIMIT 5"]);
        let request = GenerationRequest::parse("Five names", "mysql").unwrap();
        let outcome = controller.run(&request);
        assert_eq!(outcome.query(), "SELECT `name` FROM employees LIMIT 5");
        assert!(controller.engine().prompts()[0].contains("Use the MYSQL SQL dialect."));
    }

    #[test]
    fn construction_checks_the_dialect() {
        for dialect in SqlDialect::ALL {
            let engine = ScriptedEngine::default();
            assert!(ContractController::new(schema(), dialect.name(), engine).is_ok());
        }
        for name in ["klingon", "oracle", ""] {
            let result = ContractController::new(schema(), name, ScriptedEngine::default());
            assert!(matches!(
                result,
                Err(ConfigError::UnsupportedDialect { .. })
            ));
        }
    }

    #[test]
    fn empty_requests_are_refused() {
        assert_eq!(
            GenerationRequest::new("  \n", SqlDialect::Sqlite),
            Err(ConfigError::EmptyRequest)
        );
        let controller = controller(&[]);
        assert_eq!(controller.generate(""), Err(ConfigError::EmptyRequest));
        assert!(controller.engine().prompts().is_empty());
    }

    #[test]
    fn closures_are_engines() {
        let engine = |_: &str| -> Result<String, EngineError> {
            Ok("SELECT id, name FROM departments".into())
        };
        let controller = ContractController::new(schema(), "postgres", engine).unwrap();
        assert_eq!(
            controller.generate("List departments").unwrap().query,
            "SELECT id, name FROM departments"
        );
    }

    #[test]
    fn shared_controller_across_threads() {
        let engine = |prompt: &str| -> Result<String, EngineError> {
            let table = match prompt.contains("Request: regions") {
                true => "regions",
                false => "departments",
            };
            Ok(format!("SELECT id, name FROM {table}"))
        };
        let controller = Arc::new(ContractController::new(schema(), "sqlite", engine).unwrap());
        std::thread::scope(|scope| {
            let handles: Vec<_> = ["regions", "departments", "regions"]
                .into_iter()
                .map(|text| {
                    let controller = Arc::clone(&controller);
                    scope.spawn(move || (text, controller.generate(text).unwrap().query))
                })
                .collect();
            for handle in handles {
                let (text, query) = handle.join().unwrap();
                assert_eq!(query, format!("SELECT id, name FROM {text}"));
            }
        });
    }

    #[test]
    fn short_statements_always_fail() {
        let postcondition = Postcondition::default();
        for sql in ["", "SELECT", "select * from t", "DROP TABLE regions", "  delete from x;  "] {
            assert!(matches!(
                postcondition.check(sql),
                Err(PostconditionFailure::TooShort { .. })
            ));
        }
        let nineteen = "SELECT id FROM abcd";
        assert_eq!(nineteen.len(), 19);
        assert!(postcondition.check(nineteen).is_err());
        assert!(postcondition.check("SELECT id FROM abcde").is_ok());
    }

    #[test]
    fn every_allowed_verb_passes() {
        let postcondition = Postcondition::default();
        for verb in SQL_VERBS {
            let sql = format!("{verb} something long enough to pass");
            assert_eq!(postcondition.check(&sql), Ok(()));
            assert_eq!(postcondition.check(&sql.to_uppercase()), Ok(()));
        }
    }

    #[test]
    fn other_leading_tokens_fail() {
        let postcondition = Postcondition::default();
        for (sql, verb) in [
            ("WITH x AS (SELECT 1) SELECT * FROM x", "with"),
            ("EXPLAIN SELECT * FROM employees", "explain"),
            ("selection of employees from the table", "selection"),
            ("grant all privileges on employees to bob", "grant"),
        ] {
            assert_eq!(
                postcondition.check(sql),
                Err(PostconditionFailure::DisallowedVerb { verb: verb.into() })
            );
        }
        assert_eq!(
            postcondition.check("-- ERROR: SQL dialect validation failed - oops"),
            Err(PostconditionFailure::MissingVerb)
        );
    }

    #[test]
    fn custom_postcondition() {
        let postcondition = Postcondition::new(5, [" SELECT "]).unwrap();
        assert_eq!(postcondition.allowed_verbs(), ["select"]);
        assert_eq!(postcondition.check("select 1"), Ok(()));
        assert!(postcondition.check("DELETE FROM employees").is_err());
        assert_eq!(
            Postcondition::new(5, Vec::<String>::new()),
            Err(ConfigError::NoAllowedVerbs)
        );
    }
}
