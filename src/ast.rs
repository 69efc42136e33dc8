//! # rowql - Abstract Syntax Tree
//!
//! This module defines every tree the crate builds: the tokens produced by the
//! clause lexing strategies, the [`Request`] produced by the statement parser,
//! and the [`Expr`]/[`Program`] forms executed by the VM.
//!
//! ## Architecture Overview
//!
//! - **[tokens]** - `TokenKind` and `Token`, the lexical layer
//! - **[request]** - `Request`, `Column`, `ExprNode`, `TableRef`, the parser output
//! - **[expressions]** - VM expression nodes
//! - **[operators]** - Binary operators (comparison, arithmetic, logical)
//! - **[program]** - Compiled statements (filters and assignments)
//!
//! ## Quick Start
//!
//! ```text
//! SELECT name, upper(city) AS town FROM people WHERE country = 'NL' LIMIT 10
//! ```
//!
//! parses into a [`Request`] with two columns, the source `people`, the
//! predicate map `{country: NL}` and a limit of 10.
//!
//! ## Requests and Programs
//!
//! A [`Request`] is descriptive: it records what the query said, clause by
//! clause. A [`Program`] is executable: the VM lowers each predicate to a
//! filter and each column to an assignment named after its display name.
//!
//! The expression-only path skips the request entirely:
//!
//! ```text
//! total := price * quantity; ?(total > 100)
//! ```
pub mod expressions;
pub mod operators;
pub mod program;
pub mod request;
pub mod tokens;

pub use expressions::Expr;
pub use operators::BinOp;
pub use program::{Program, Statement};
pub use request::{Column, ExprNode, NodeKind, Request, RequestBuilder, StatementKind, TableRef};
pub use tokens::{Token, TokenKind};
