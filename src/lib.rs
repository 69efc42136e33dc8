pub mod ast;
pub mod cli;
pub mod dialect;
pub mod kv;
pub mod lexer;
pub mod metrics;
pub mod output;
pub mod parser;
pub mod registry;
pub mod strategy;
pub mod value;
pub mod vm;

pub use ast::{BinOp, Expr, Program, Request, Statement, Token, TokenKind};
pub use dialect::{Dialect, DialectSpec, GrammarError, PredicateCapture};
pub use lexer::Cursor;
pub use output::{OutputFormat, RowPrinter};
pub use parser::{ParseError, Parser, parse, parse_script};
pub use registry::KindRegistry;
pub use strategy::{LexStrategy, Next};
pub use value::Value;
pub use vm::{CompileError, ExecutionError, Outcome, Row, Vm};
