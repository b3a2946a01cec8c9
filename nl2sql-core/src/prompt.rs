use crate::dialect::SqlDialect;
use crate::schema::SchemaContext;

/// Last line of every prompt. The extractor splits model output on it.
pub const OUTPUT_MARKER: &str = "Output a valid SQL query:";

const DIRECTIVES: &[&str] = &[
    "For destructive or deletion requests, assume you are removing rows, not dropping tables.",
    "For requests that create a table, first try to build it from existing tables with CREATE TABLE ... AS SELECT.",
    "Keep the ORDER BY part clean.",
    "Close all open brackets, for example in nested SELECT statements.",
    "Keep the SQL statement as simple, short and concise as possible and avoid unnecessary WHERE clauses.",
    "Use HAVING instead of WHERE for aggregate filtering.",
    "Return exactly one SQL statement.",
];

pub struct PromptBuilder;

impl PromptBuilder {
    pub fn build(schema: &SchemaContext, dialect: SqlDialect, request: &str) -> String {
        Self::build_with_feedback(schema, dialect, request, None)
    }

    /// Same prompt as [`PromptBuilder::build`], with a note about the previous
    /// rejected answer placed right before the request.
    pub fn build_with_feedback(
        schema: &SchemaContext,
        dialect: SqlDialect,
        request: &str,
        feedback: Option<&str>,
    ) -> String {
        let mut prompt = String::new();
        prompt.push_str("You are a SQL generation assistant.\n");
        prompt.push_str(&format!(
            "Use the {} SQL dialect.\n",
            dialect.name().to_uppercase()
        ));
        prompt.push_str("The schema contains related tables with foreign keys.\n");
        prompt.push_str(&format!("Schema:\n{schema}"));
        for directive in DIRECTIVES {
            prompt.push_str(directive);
            prompt.push('\n');
        }
        if let Some(feedback) = feedback {
            prompt.push_str(&format!(
                "Your previous answer was rejected: {feedback}.\nFix this problem in your answer.\n"
            ));
        }
        prompt.push_str(&format!("Request: {}\n", request.trim()));
        prompt.push_str(OUTPUT_MARKER);
        prompt
    }
}
