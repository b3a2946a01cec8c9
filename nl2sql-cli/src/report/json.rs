use std::error::Error;

use super::{GeneratedQuery, Report};

#[derive(Default)]
pub struct JsonReport {
    queries: Vec<GeneratedQuery>,
}

impl Report for JsonReport {
    fn push(&mut self, query: GeneratedQuery) -> Result<(), Box<dyn Error>> {
        self.queries.push(query);
        Ok(())
    }

    fn finalize(&self) -> Result<String, Box<dyn Error>> {
        Ok(serde_json::to_string_pretty(&self.queries)?)
    }
}
