pub mod json;
pub mod sql;

use std::error::Error;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedQuery {
    pub request: String,
    pub query: String,
    pub accepted: bool,
    pub attempts: usize,
}

pub trait Report {
    fn push(&mut self, query: GeneratedQuery) -> Result<(), Box<dyn Error>>;

    fn finalize(&self) -> Result<String, Box<dyn Error>>;
}
