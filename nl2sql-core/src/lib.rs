use std::sync::Arc;

use crate::contract::DEFAULT_REMEDY_ATTEMPTS;
use crate::dialect::SqlDialect;
use crate::engine::GenerationEngine;
use crate::schema::SchemaContext;

pub mod contract;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod prompt;
pub mod schema;
pub mod validate;

pub use contract::{
    ContractController, ContractOutcome, ERROR_MARKER, GenerationRequest, Postcondition,
    SqlResponse,
};
pub use error::ConfigError;

#[must_use]
pub struct ContractBuilder {
    schema: Arc<SchemaContext>,
    dialect: SqlDialect,
    postcondition: Postcondition,
    remedy_attempts: usize,
}

impl ContractBuilder {
    pub fn new(schema: impl Into<Arc<SchemaContext>>) -> Self {
        Self {
            schema: schema.into(),
            dialect: SqlDialect::default(),
            postcondition: Postcondition::default(),
            remedy_attempts: DEFAULT_REMEDY_ATTEMPTS,
        }
    }

    pub fn dialect(&mut self, dialect: SqlDialect) -> &mut Self {
        self.dialect = dialect;
        self
    }

    pub fn postcondition(&mut self, postcondition: Postcondition) -> &mut Self {
        self.postcondition = postcondition;
        self
    }

    /// Number of regenerations allowed after the first rejected attempt.
    pub fn remedy_attempts(&mut self, remedy_attempts: usize) -> &mut Self {
        self.remedy_attempts = remedy_attempts;
        self
    }

    pub fn build<E: GenerationEngine>(self, engine: E) -> ContractController<E> {
        ContractController::from_parts(
            self.schema,
            self.dialect,
            engine,
            self.postcondition,
            self.remedy_attempts,
        )
    }
}
