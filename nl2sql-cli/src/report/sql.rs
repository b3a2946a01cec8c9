use std::error::Error;

use super::{GeneratedQuery, Report};

/// Plain SQL script: each statement preceded by its request as a comment.
/// Failed generations keep their error comment and get no terminator.
#[derive(Default)]
pub struct SqlReport {
    script: String,
}

impl Report for SqlReport {
    fn push(&mut self, query: GeneratedQuery) -> Result<(), Box<dyn Error>> {
        let request = query.request.lines().collect::<Vec<_>>().join(" ");
        self.script.push_str(&format!("-- {}\n", request.trim()));
        match query.accepted {
            true => self.script.push_str(&format!("{};\n\n", query.query)),
            false => self.script.push_str(&format!("{}\n\n", query.query)),
        }
        Ok(())
    }

    fn finalize(&self) -> Result<String, Box<dyn Error>> {
        Ok(self.script.trim_end().to_owned())
    }
}
