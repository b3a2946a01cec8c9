use std::collections::HashSet;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<String>,
}

impl TableSchema {
    pub fn new(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }
}

/// The relational schema generation is grounded on.
///
/// Tables keep their declaration order. A context is only obtainable through
/// [`SchemaContext::new`], so every instance has unique table names and
/// non-empty column lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[must_use]
pub struct SchemaContext {
    tables: Vec<TableSchema>,
}

impl SchemaContext {
    pub fn new(tables: impl IntoIterator<Item = TableSchema>) -> Result<Self, ConfigError> {
        let tables: Vec<TableSchema> = tables.into_iter().collect();
        let mut seen = HashSet::new();
        for table in &tables {
            if table.name.trim().is_empty() {
                return Err(ConfigError::UnnamedTable);
            }
            if !seen.insert(table.name.as_str()) {
                return Err(ConfigError::DuplicateTable {
                    table: table.name.clone(),
                });
            }
            if table.columns.is_empty() {
                return Err(ConfigError::EmptyTable {
                    table: table.name.clone(),
                });
            }
        }
        Ok(Self { tables })
    }

    pub fn tables(&self) -> &[TableSchema] {
        &self.tables
    }
}

impl Display for SchemaContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for table in &self.tables {
            writeln!(f, "{}({})", table.name, table.columns.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{SchemaContext, TableSchema};
    use crate::error::ConfigError;

    fn employees() -> TableSchema {
        TableSchema::new("employees", ["id", "name", "salary"])
    }

    #[test]
    fn keeps_declaration_order() {
        let schema = SchemaContext::new([
            TableSchema::new("regions", ["id", "name"]),
            employees(),
        ])
        .unwrap();
        let names: Vec<_> = schema.tables().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["regions", "employees"]);
        assert_eq!(
            schema.to_string(),
            "regions(id, name)\nemployees(id, name, salary)\n"
        );
    }

    #[test]
    fn rejects_duplicate_tables() {
        let result = SchemaContext::new([employees(), employees()]);
        assert_eq!(
            result,
            Err(ConfigError::DuplicateTable {
                table: "employees".into()
            })
        );
    }

    #[test]
    fn rejects_empty_column_lists() {
        let result = SchemaContext::new([TableSchema::new("empty", Vec::<String>::new())]);
        assert_eq!(
            result,
            Err(ConfigError::EmptyTable {
                table: "empty".into()
            })
        );
    }

    #[test]
    fn rejects_unnamed_tables() {
        let result = SchemaContext::new([TableSchema::new(" ", ["id"])]);
        assert_eq!(result, Err(ConfigError::UnnamedTable));
    }
}
