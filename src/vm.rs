//! # rowql - Execution engine
//!
//! The VM compiles expression programs or parsed requests into a [`Program`]
//! and runs programs against a [`ReadContext`] (the input row) and a
//! [`WriteContext`] (the output row).
//!
//! ```
//! use rowql::vm::{Outcome, Row, Vm};
//!
//! let vm = Vm::new();
//! let program = vm.compile("total := price * qty; ?(total > 100)").unwrap();
//!
//! let input: Row = [("price", 30i64), ("qty", 4i64)].into_iter().collect();
//! let mut output = Row::new();
//! assert_eq!(vm.execute(&program, &mut output, &input).unwrap(), Outcome::Passed);
//! assert_eq!(output.get("total"), Some(&120i64.into()));
//! ```
//!
//! Field references resolve against values the program already wrote
//! first, then against the read context; missing fields are `null`.

pub mod compiler;
pub mod context;
pub mod functions;

use log::debug;
use rust_decimal::{Decimal, prelude::FromPrimitive, prelude::ToPrimitive};
use thiserror::Error;

use crate::ast::{BinOp, Expr, ExprNode, NodeKind, Program, Request, Statement};
use crate::parser::ParseError;
use crate::value::Value;

pub use compiler::{Compiler, RESULT};
pub use context::{ReadContext, Row, WriteContext};
pub use functions::{Function, Functions, NativeFn};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Syntax(#[from] ParseError),

    #[error("expected {expected}, found {found} at position {position}")]
    UnexpectedToken {
        expected: String,
        found: String,
        position: usize,
    },

    #[error("unknown function {name:?}")]
    UnknownFunction { name: String },

    #[error("{name}() takes {expected} arguments, got {found}")]
    Arity {
        name: String,
        expected: String,
        found: usize,
    },

    #[error("invalid number {text:?}")]
    InvalidNumber { text: String },

    #[error("program has no statements")]
    EmptyProgram,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    /// Type mismatch or invalid operation for the given type
    #[error("type error: {0}")]
    TypeError(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow in {0}")]
    Overflow(BinOp),

    #[error("unknown function {0:?}")]
    UnknownFunction(String),

    #[error("{name}(): {message}")]
    Function { name: String, message: String },
}

/// How a program run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every filter held; all assignments ran
    Passed,
    /// A filter failed; later statements did not run
    Filtered,
}

/// The execution engine. Read-only once built, so one VM can serve many
/// threads.
#[derive(Debug, Clone)]
pub struct Vm {
    functions: Functions,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    /// A VM with the built-in functions.
    pub fn new() -> Self {
        Self::with_functions(Functions::builtin())
    }

    pub fn with_functions(functions: Functions) -> Self {
        Vm { functions }
    }

    pub fn functions(&self) -> &Functions {
        &self.functions
    }

    /// Compiles an expression program.
    pub fn compile(&self, source: &str) -> Result<Program, CompileError> {
        Compiler::new(source, &self.functions)?.compile_program()
    }

    /// Lowers a parsed request: each predicate becomes a filter comparing the
    /// field with its operand, and each column an assignment named by its
    /// display name.
    ///
    /// Operands are literals. `WHERE x = y` compares `x` with the text `y`,
    /// not with the field `y`.
    pub fn compile_request(&self, request: &Request) -> Result<Program, CompileError> {
        let mut statements = Vec::new();

        let mut predicates: Vec<_> = request.predicates.iter().collect();
        predicates.sort();
        for (field, value) in predicates {
            statements.push(Statement::Filter(Expr::BinaryOp {
                op: request.operator(field),
                left: Box::new(Expr::Field(field.clone())),
                right: Box::new(literal(Value::from_field(value))),
            }));
        }

        for column in &request.columns {
            statements.push(Statement::Assign {
                target: column.display_name.clone(),
                value: self.lower(&column.source_expression())?,
            });
        }

        if let Some(source) = &request.source {
            debug!("Compiled request over source {}", source);
        }
        Ok(Program {
            statements,
            limit: request.limit,
        })
    }

    fn lower(&self, node: &ExprNode) -> Result<Expr, CompileError> {
        match node.kind {
            NodeKind::Field => Ok(Expr::Field(node.value.clone())),
            NodeKind::Number => compiler::number(&node.value),
            NodeKind::Text => Ok(Expr::String(node.value.clone())),
            NodeKind::Call => {
                compiler::check_call(&self.functions, &node.value, node.arguments.len())?;
                let args = node
                    .arguments
                    .iter()
                    .map(|arg| self.lower(arg))
                    .collect::<Result<_, _>>()?;
                Ok(Expr::Call {
                    name: node.value.clone(),
                    args,
                })
            }
        }
    }

    /// Runs `program` statement by statement.
    ///
    /// A failing filter stops the run with [`Outcome::Filtered`]. An error
    /// stops the run too; values written before it stay in `write`.
    pub fn execute(
        &self,
        program: &Program,
        write: &mut dyn WriteContext,
        read: &dyn ReadContext,
    ) -> Result<Outcome, ExecutionError> {
        for statement in &program.statements {
            match statement {
                Statement::Filter(condition) => {
                    if !self.eval(condition, &*write, read)?.as_bool() {
                        return Ok(Outcome::Filtered);
                    }
                }
                Statement::Assign { target, value } => {
                    let value = self.eval(value, &*write, read)?;
                    write.set(target, value);
                }
            }
        }
        Ok(Outcome::Passed)
    }

    fn eval(
        &self,
        expr: &Expr,
        write: &dyn WriteContext,
        read: &dyn ReadContext,
    ) -> Result<Value, ExecutionError> {
        match expr {
            Expr::Float(n) => Ok(Value::Float(*n)),
            Expr::Integer(n) => Ok(Value::Integer(*n)),
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::Boolean(b) => Ok(Value::Boolean(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Field(name) => Ok(write
                .get(name)
                .or_else(|| read.get(name))
                .unwrap_or(Value::Null)),
            Expr::Not(operand) => Ok(Value::Boolean(!self.eval(operand, write, read)?.as_bool())),
            Expr::BinaryOp {
                op: op @ (BinOp::And | BinOp::Or),
                left,
                right,
            } => {
                let left = self.eval(left, write, read)?.as_bool();
                // Short-circuit
                if (*op == BinOp::And) != left {
                    return Ok(Value::Boolean(left));
                }
                Ok(Value::Boolean(self.eval(right, write, read)?.as_bool()))
            }
            Expr::BinaryOp { op, left, right } => {
                let left = self.eval(left, write, read)?;
                let right = self.eval(right, write, read)?;
                apply_binop(*op, &left, &right)
            }
            Expr::Call { name, args } => {
                let function = self
                    .functions
                    .get(name)
                    .ok_or_else(|| ExecutionError::UnknownFunction(name.clone()))?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, write, read))
                    .collect::<Result<Vec<_>, _>>()?;
                if !function.accepts(args.len()) {
                    return Err(ExecutionError::Function {
                        name: name.clone(),
                        message: format!("takes {} arguments, got {}", function.arity(), args.len()),
                    });
                }
                (function.call)(&args).map_err(|message| ExecutionError::Function {
                    name: name.clone(),
                    message,
                })
            }
        }
    }
}

fn literal(value: Value) -> Expr {
    match value {
        Value::Null => Expr::Null,
        Value::Boolean(b) => Expr::Boolean(b),
        Value::Integer(n) => Expr::Integer(n),
        Value::Float(n) => Expr::Float(n),
        Value::String(s) => Expr::String(s),
    }
}

fn apply_binop(op: BinOp, left: &Value, right: &Value) -> Result<Value, ExecutionError> {
    match op {
        BinOp::Add | BinOp::Subtract | BinOp::Multiply | BinOp::Divide | BinOp::Modulo => {
            arithmetic(op, left, right)
        }
        BinOp::Equal => Ok(Value::Boolean(left == right)),
        BinOp::NotEqual => Ok(Value::Boolean(left != right)),
        BinOp::LessThan | BinOp::GreaterThan | BinOp::LessEqual | BinOp::GreaterEqual => {
            compare(op, left, right)
        }
        BinOp::And => Ok(Value::Boolean(left.as_bool() && right.as_bool())),
        BinOp::Or => Ok(Value::Boolean(left.as_bool() || right.as_bool())),
    }
}

fn arithmetic(op: BinOp, left: &Value, right: &Value) -> Result<Value, ExecutionError> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => integer_arithmetic(op, *a, *b),
        (Value::Float(a), Value::Float(b)) => float_arithmetic(op, *a, *b),
        (Value::Integer(_), Value::Float(_)) | (Value::Float(_), Value::Integer(_)) => {
            mixed_arithmetic(op, left, right)
        }
        (Value::String(a), Value::String(b)) if op == BinOp::Add => {
            Ok(Value::String(format!("{}{}", a, b)))
        }
        (a, b) => Err(ExecutionError::TypeError(format!(
            "cannot apply {} to {} and {}",
            op,
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn integer_arithmetic(op: BinOp, a: i64, b: i64) -> Result<Value, ExecutionError> {
    if matches!(op, BinOp::Divide | BinOp::Modulo) && b == 0 {
        return Err(ExecutionError::DivisionByZero);
    }
    let result = match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Subtract => a.checked_sub(b),
        BinOp::Multiply => a.checked_mul(b),
        // Inexact division yields a float
        BinOp::Divide if a % b != 0 => return Ok(Value::Float(a as f64 / b as f64)),
        BinOp::Divide => a.checked_div(b),
        BinOp::Modulo => a.checked_rem(b),
        _ => None,
    };
    result.map(Value::Integer).ok_or(ExecutionError::Overflow(op))
}

fn float_arithmetic(op: BinOp, a: f64, b: f64) -> Result<Value, ExecutionError> {
    if matches!(op, BinOp::Divide | BinOp::Modulo) && b == 0.0 {
        return Err(ExecutionError::DivisionByZero);
    }
    Ok(Value::Float(match op {
        BinOp::Add => a + b,
        BinOp::Subtract => a - b,
        BinOp::Multiply => a * b,
        BinOp::Divide => a / b,
        _ => a % b,
    }))
}

/// Integer/float mixes go through `Decimal` so that, e.g., `2 * 1.5` is the
/// integer 3.
fn mixed_arithmetic(op: BinOp, left: &Value, right: &Value) -> Result<Value, ExecutionError> {
    let a = left.as_float().unwrap_or_default();
    let b = right.as_float().unwrap_or_default();
    if matches!(op, BinOp::Divide | BinOp::Modulo) && b == 0.0 {
        return Err(ExecutionError::DivisionByZero);
    }
    if let Some(ad) = decimal(left)
        && let Some(bd) = decimal(right)
        && let Some(rd) = decimal_op(op, ad, bd)
    {
        if rd.is_integer()
            && let Some(r) = rd.to_i64()
        {
            return Ok(Value::Integer(r));
        } else if let Some(r) = rd.to_f64() {
            return Ok(Value::Float(r));
        }
    }
    float_arithmetic(op, a, b)
}

fn decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Integer(n) => Decimal::from_i64(*n),
        Value::Float(n) => Decimal::from_f64(*n),
        _ => None,
    }
}

fn decimal_op(op: BinOp, a: Decimal, b: Decimal) -> Option<Decimal> {
    match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Subtract => a.checked_sub(b),
        BinOp::Multiply => a.checked_mul(b),
        BinOp::Divide => a.checked_div(b),
        BinOp::Modulo => a.checked_rem(b),
        _ => None,
    }
}

fn compare(op: BinOp, left: &Value, right: &Value) -> Result<Value, ExecutionError> {
    let ordering = match (left, right) {
        // Missing values order against nothing
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Integer(a), Value::Integer(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => a.partial_cmp(b),
        (a, b) => match (a.as_float(), b.as_float()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => {
                return Err(ExecutionError::TypeError(format!(
                    "cannot compare {} {} {}",
                    a.type_name(),
                    op,
                    b.type_name()
                )));
            }
        },
    };
    let Some(ordering) = ordering else {
        // Null and NaN compare false either way
        return Ok(Value::Boolean(false));
    };
    Ok(Value::Boolean(match op {
        BinOp::LessThan => ordering.is_lt(),
        BinOp::GreaterThan => ordering.is_gt(),
        BinOp::LessEqual => ordering.is_le(),
        _ => ordering.is_ge(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str, input: &Row) -> Result<(Outcome, Row), ExecutionError> {
        let vm = Vm::new();
        let program = vm.compile(source).unwrap();
        let mut output = Row::new();
        let outcome = vm.execute(&program, &mut output, input)?;
        Ok((outcome, output))
    }

    fn result(source: &str) -> Value {
        let (_, output) = run(source, &Row::new()).unwrap();
        output.get(RESULT).cloned().unwrap()
    }

    #[test]
    fn test_arithmetic_preserves_types() {
        assert_eq!(result("7 / 2"), Value::Float(3.5));
        assert_eq!(result("8 / 2"), Value::Integer(4));
        assert_eq!(result("2 * 1.5"), Value::Integer(3));
        assert_eq!(result("0.1 + 0.2"), Value::Float(0.1 + 0.2));
        assert_eq!(result("1 + 0.5"), Value::Float(1.5));
        assert_eq!(result("'a' + 'b'"), Value::from("ab"));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(run("1 / 0", &Row::new()).unwrap_err(), ExecutionError::DivisionByZero);
        assert_eq!(run("1.5 % 0", &Row::new()).unwrap_err(), ExecutionError::DivisionByZero);
    }

    #[test]
    fn test_short_circuit() {
        assert_eq!(result("false and 1 / 0"), Value::Boolean(false));
        assert_eq!(result("true or 1 / 0"), Value::Boolean(true));
    }

    #[test]
    fn test_filter_stops_program() {
        let input: Row = [("n", 1i64)].into_iter().collect();
        let (outcome, output) = run("a := n; ?(n > 5); b := n", &input).unwrap();
        assert_eq!(outcome, Outcome::Filtered);
        assert_eq!(output.names(), vec!["a"]);
    }

    #[test]
    fn test_error_keeps_earlier_writes() {
        let vm = Vm::new();
        let program = vm.compile("a := 1; b := 1 / 0; c := 2").unwrap();
        let mut output = Row::new();
        assert!(vm.execute(&program, &mut output, &Row::new()).is_err());
        assert_eq!(output.names(), vec!["a"]);
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(result("2 < 2.5"), Value::Boolean(true));
        assert_eq!(result("'b' >= 'a'"), Value::Boolean(true));
        assert!(run("'b' > 1", &Row::new()).is_err());
    }

    #[test]
    fn test_missing_field_is_null() {
        assert_eq!(result("missing"), Value::Null);
        assert_eq!(result("coalesce(missing, 'x')"), Value::from("x"));
    }
}
