//! Syntax checks for queries

use super::{CliError, DialectOptions, Query, parse_sql};
use crate::ast::{Program, Request};
use crate::vm::Vm;

/// Result of a check operation
#[derive(Debug)]
pub enum CheckResult {
    /// The statement parsed; holds the request
    Sql(Request),
    /// The expression program compiled
    Expr(Program),
}

impl CheckResult {
    /// One-line description for the terminal.
    pub fn summary(&self) -> String {
        match self {
            CheckResult::Sql(request) => format!("Syntax is valid: {}", request),
            CheckResult::Expr(program) => format!(
                "Syntax is valid: {} statements, outputs [{}]",
                program.statements.len(),
                program.outputs().join(", ")
            ),
        }
    }
}

/// Parses or compiles `query` without reading any input.
pub fn execute_check(query: &Query, options: DialectOptions) -> Result<CheckResult, CliError> {
    match query {
        Query::Sql(sql) => Ok(CheckResult::Sql(parse_sql(sql, options)?)),
        Query::Expr(expr) => Ok(CheckResult::Expr(Vm::new().compile(expr)?)),
    }
}
