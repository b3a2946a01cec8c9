use std::sync::LazyLock;

use regex::Regex;

use crate::prompt::OUTPUT_MARKER;

/// Statement verbs that open a SQL statement.
pub const SQL_VERBS: &[&str] = &[
    "select", "insert", "update", "delete", "create", "drop", "alter", "truncate",
];

/// Markers after which a model has drifted into commentary.
const CUTOFF_PHRASES: &[&str] = &[
    "Reasoning:",
    "Explanation:",
    "Justification:",
    "Answer:",
    "Output:",
    "Request:",
];

static SQL_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```sql(.*?)```").expect("Fence pattern is a valid regular expression.")
});

/// Recovers a single candidate statement from raw model output.
///
/// An empty string means nothing statement-like was found.
pub fn extract_sql(output: &str) -> String {
    if let Some(fenced) = SQL_FENCE.captures(output).and_then(|captures| captures.get(1)) {
        return fenced.as_str().trim().to_owned();
    }

    let mut candidate = after_marker(output).trim();
    for phrase in CUTOFF_PHRASES {
        if let Some((head, _)) = candidate.split_once(phrase) {
            candidate = head.trim();
        }
    }

    let lines: Vec<&str> = candidate
        .lines()
        .skip_while(|line| !starts_with_verb(line))
        .collect();
    lines.join("\n").trim().to_owned()
}

fn after_marker(output: &str) -> &str {
    // With an echoed prompt the first answer sits between the first two markers.
    output.split(OUTPUT_MARKER).nth(1).unwrap_or(output)
}

fn starts_with_verb(line: &str) -> bool {
    let line = line.trim().to_lowercase();
    SQL_VERBS.iter().any(|verb| line.starts_with(verb))
}
