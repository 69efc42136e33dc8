//! CLI support for rowql
//!
//! Everything the `rowql` binary does is reachable from here, so the
//! commands can be embedded and tested without spawning a process.

mod bench;
mod check;
mod pipeline;
mod records;

pub use bench::{BenchOptions, BenchReport, run_bench};
pub use check::{CheckResult, execute_check};
pub use pipeline::{PipelineOptions, PipelineStats, QUEUE_CAPACITY, run_pipeline, write_profile};
pub use records::{Record, RecordError, RecordReader};

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::ast::{Program, Request};
use crate::dialect::{self, Dialect, GrammarError, PredicateCapture};
use crate::kv::StoreError;
use crate::parser::{self, ParseError};
use crate::registry::KindRegistry;
use crate::vm::{CompileError, ExecutionError, Vm};

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Grammar(#[from] GrammarError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The input ended before a header row
    #[error("input has no header row")]
    MissingHeader,

    #[error("one of --sql or --expr is required")]
    NoQuery,

    #[error("no input provided; pipe delimited records to stdin")]
    NoInput,

    #[error("a {0} thread panicked")]
    Panicked(&'static str),
}

/// The query given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// A statement in the SQL dialect
    Sql(String),
    /// An expression program
    Expr(String),
}

/// Dialect switches exposed as flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DialectOptions {
    /// Ignore input after the statement instead of failing
    pub lenient: bool,
    /// Store a predicate's field text instead of its operand
    pub legacy_predicates: bool,
}

/// Builds the SQL dialect with the given switches over a fresh registry.
pub fn sql_dialect(options: DialectOptions) -> Result<Dialect, CliError> {
    let capture = if options.legacy_predicates {
        PredicateCapture::FieldText
    } else {
        PredicateCapture::RightHandSide
    };
    let dialect = dialect::sql_spec()
        .strict_trailing(!options.lenient)
        .predicate_capture(capture)
        .init(&Arc::new(KindRegistry::new()))?;
    Ok(dialect)
}

/// Parses a SQL statement with the given switches.
pub fn parse_sql(sql: &str, options: DialectOptions) -> Result<Request, CliError> {
    let dialect = sql_dialect(options)?;
    Ok(parser::parse(&dialect, sql)?)
}

/// Turns a command-line query into a program for `vm`.
pub fn prepare(vm: &Vm, query: &Query, options: DialectOptions) -> Result<Program, CliError> {
    match query {
        Query::Sql(sql) => Ok(vm.compile_request(&parse_sql(sql, options)?)?),
        Query::Expr(expr) => Ok(vm.compile(expr)?),
    }
}
