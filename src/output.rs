//! Row output for the `run` command.
//!
//! Rows are printed one per line, either as text:
//!
//! ```text
//! line 2: name=Ada, town=LONDON
//! ```
//!
//! or as a JSON object whose `values` keep the program's column order:
//!
//! ```text
//! {"line":2,"values":{"name":"Ada","town":"LONDON"}}
//! ```

use crate::value::Value;
use crate::vm::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub struct RowPrinter<'c> {
    format: OutputFormat,
    /// Column order; empty means every field, sorted by name
    columns: Vec<&'c str>,
}

impl<'c> RowPrinter<'c> {
    pub fn new(format: OutputFormat, columns: Vec<&'c str>) -> Self {
        RowPrinter { format, columns }
    }

    pub fn print(&self, line: u64, row: &Row) -> Result<String, serde_json::Error> {
        let names = if self.columns.is_empty() {
            row.names()
        } else {
            self.columns.clone()
        };
        let fields = names
            .into_iter()
            .map(|name| (name, row.get(name).unwrap_or(&Value::Null)));

        match self.format {
            OutputFormat::Text => {
                let fields: Vec<String> = fields
                    .map(|(name, value)| format!("{}={}", name, value))
                    .collect();
                Ok(format!("line {}: {}", line, fields.join(", ")))
            }
            OutputFormat::Json => {
                let mut items = Vec::new();
                for (name, value) in fields {
                    items.push(format!(
                        "{}:{}",
                        serde_json::to_string(name)?,
                        serde_json::to_string(value)?
                    ));
                }
                Ok(format!("{{\"line\":{},\"values\":{{{}}}}}", line, items.join(",")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> Row {
        let mut row = Row::new();
        row.insert("b", "x\"y");
        row.insert("a", 1.5);
        row
    }

    #[test]
    fn test_text_sorted_when_unordered() {
        let printer = RowPrinter::new(OutputFormat::Text, vec![]);
        assert_eq!(printer.print(3, &row()).unwrap(), "line 3: a=1.5, b=x\"y");
    }

    #[test]
    fn test_json_keeps_column_order() {
        let printer = RowPrinter::new(OutputFormat::Json, vec!["b", "a", "missing"]);
        assert_eq!(
            printer.print(1, &row()).unwrap(),
            r#"{"line":1,"values":{"b":"x\"y","a":1.5,"missing":null}}"#
        );
    }
}
