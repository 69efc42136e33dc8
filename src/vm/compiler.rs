//! The expression compiler.
//!
//! ```text
//! program    := statement { ';' statement } [';']
//! statement  := '?' '(' expression ')'
//!             | name ':=' expression
//!             | expression                      (assigned to "result")
//! expression := or
//! or         := and { 'or' and }
//! and        := not { 'and' not }
//! not        := 'not' not | comparison
//! comparison := additive [ ('==' | '=' | '!=' | '<' | '<=' | '>' | '>=') additive ]
//! additive   := multiplicative { ('+' | '-') multiplicative }
//! multiplicative := unary { ('*' | '/' | '%') unary }
//! unary      := '-' unary | primary
//! primary    := number | string | 'true' | 'false' | 'null'
//!             | name '(' [ expression { ',' expression } ] ')'
//!             | name
//!             | '(' expression ')'
//! ```

use crate::ast::{BinOp, Expr, Program, Statement, Token, TokenKind};
use crate::lexer::Cursor;
use crate::vm::{CompileError, Functions};

/// Name given to the value of a bare expression statement.
pub const RESULT: &str = "result";

pub struct Compiler<'f> {
    tokens: Vec<Token>,
    pos: usize,
    functions: &'f Functions,
}

impl<'f> Compiler<'f> {
    pub fn new(source: &str, functions: &'f Functions) -> Result<Self, CompileError> {
        let tokens = Cursor::new(source)
            .tokenize()?
            .into_iter()
            .filter(|t| !t.is(TokenKind::COMMENT))
            .collect();
        Ok(Compiler {
            tokens,
            pos: 0,
            functions,
        })
    }

    fn current(&self) -> &Token {
        // tokenize() always ends the stream with EOF
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map_or(TokenKind::EOF, |t| t.kind)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current().is(kind)
    }

    /// Words like `and` are scanned as identities; match them by spelling.
    fn check_word(&self, word: &str) -> bool {
        let token = self.current();
        token.is(TokenKind::IDENTITY) && token.text.eq_ignore_ascii_case(word)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token, CompileError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn unexpected(&self, expected: &str) -> CompileError {
        let token = self.current();
        CompileError::UnexpectedToken {
            expected: expected.to_string(),
            found: token.to_string(),
            position: token.position,
        }
    }

    pub fn compile_program(mut self) -> Result<Program, CompileError> {
        let mut program = Program::default();
        loop {
            while self.check(TokenKind::EOS) {
                self.advance();
            }
            if self.check(TokenKind::EOF) {
                break;
            }
            program.statements.push(self.compile_statement()?);
            if !self.check(TokenKind::EOF) {
                self.expect(TokenKind::EOS, "';' or the end of the program")?;
            }
        }
        if program.statements.is_empty() {
            return Err(CompileError::EmptyProgram);
        }
        Ok(program)
    }

    fn compile_statement(&mut self) -> Result<Statement, CompileError> {
        if self.check(TokenKind::QUESTION) {
            self.advance();
            self.expect(TokenKind::LEFT_PAREN, "'(' after '?'")?;
            let condition = self.compile_expression()?;
            self.expect(TokenKind::RIGHT_PAREN, "')'")?;
            return Ok(Statement::Filter(condition));
        }
        if self.check(TokenKind::IDENTITY) && self.peek_kind(1) == TokenKind::ASSIGN {
            let target = self.advance().text;
            self.advance(); // :=
            let value = self.compile_expression()?;
            return Ok(Statement::Assign { target, value });
        }
        let value = self.compile_expression()?;
        Ok(Statement::Assign {
            target: RESULT.to_string(),
            value,
        })
    }

    pub fn compile_expression(&mut self) -> Result<Expr, CompileError> {
        self.compile_or()
    }

    fn compile_or(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.compile_and()?;

        while self.check_word("or") {
            self.advance();
            let right = self.compile_and()?;

            left = Expr::BinaryOp {
                op: BinOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn compile_and(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.compile_not()?;

        while self.check_word("and") {
            self.advance();
            let right = self.compile_not()?;

            left = Expr::BinaryOp {
                op: BinOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn compile_not(&mut self) -> Result<Expr, CompileError> {
        if self.check_word("not") {
            self.advance();
            let operand = self.compile_not()?;
            return Ok(Expr::Not(Box::new(operand)));
        }
        self.compile_comparison()
    }

    fn compile_comparison(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.compile_additive()?;

        if let Some(op) = BinOp::comparison(self.current().kind) {
            self.advance();
            let right = self.compile_additive()?;

            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn compile_additive(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.compile_multiplicative()?;

        loop {
            let op = match self.current().kind {
                TokenKind::PLUS => BinOp::Add,
                TokenKind::MINUS => BinOp::Subtract,
                _ => break,
            };

            self.advance();
            let right = self.compile_multiplicative()?;

            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn compile_multiplicative(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.compile_unary()?;

        loop {
            let op = match self.current().kind {
                TokenKind::STAR => BinOp::Multiply,
                TokenKind::SLASH => BinOp::Divide,
                TokenKind::PERCENT => BinOp::Modulo,
                _ => break,
            };

            self.advance();
            let right = self.compile_unary()?;

            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn compile_unary(&mut self) -> Result<Expr, CompileError> {
        if !self.check(TokenKind::MINUS) {
            return self.compile_primary();
        }
        self.advance();
        Ok(match self.compile_unary()? {
            Expr::Integer(n) => Expr::Integer(-n),
            Expr::Float(n) => Expr::Float(-n),
            operand => Expr::BinaryOp {
                op: BinOp::Subtract,
                left: Box::new(Expr::Integer(0)),
                right: Box::new(operand),
            },
        })
    }

    fn compile_primary(&mut self) -> Result<Expr, CompileError> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::VALUE => {
                self.advance();
                number(&token.text)
            }
            TokenKind::STRING => {
                self.advance();
                Ok(Expr::String(token.text))
            }
            TokenKind::LEFT_PAREN => {
                self.advance();
                let expr = self.compile_expression()?;
                self.expect(TokenKind::RIGHT_PAREN, "')'")?;
                Ok(expr)
            }
            TokenKind::IDENTITY => {
                self.advance();
                if self.check(TokenKind::LEFT_PAREN) {
                    return self.compile_call(token.text);
                }
                Ok(match token.text.to_ascii_lowercase().as_str() {
                    "true" => Expr::Boolean(true),
                    "false" => Expr::Boolean(false),
                    "null" => Expr::Null,
                    _ => Expr::Field(token.text),
                })
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn compile_call(&mut self, name: String) -> Result<Expr, CompileError> {
        self.expect(TokenKind::LEFT_PAREN, "'('")?;
        let mut args = Vec::new();
        if !self.check(TokenKind::RIGHT_PAREN) {
            loop {
                args.push(self.compile_expression()?);
                if self.check(TokenKind::COMMA) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RIGHT_PAREN, "',' or ')'")?;
        check_call(self.functions, &name, args.len())?;
        Ok(Expr::Call { name, args })
    }
}

/// Parses a numeric literal, keeping integers and floats apart.
pub(crate) fn number(text: &str) -> Result<Expr, CompileError> {
    if let Ok(n) = text.parse::<i64>() {
        return Ok(Expr::Integer(n));
    }
    text.parse::<f64>()
        .map(Expr::Float)
        .map_err(|_| CompileError::InvalidNumber {
            text: text.to_string(),
        })
}

/// Fails unless `name` is a registered function accepting `count` arguments.
pub(crate) fn check_call(functions: &Functions, name: &str, count: usize) -> Result<(), CompileError> {
    let function = functions
        .get(name)
        .ok_or_else(|| CompileError::UnknownFunction {
            name: name.to_string(),
        })?;
    if !function.accepts(count) {
        return Err(CompileError::Arity {
            name: name.to_string(),
            expected: function.arity(),
            found: count,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(source: &str) -> Result<Program, CompileError> {
        Compiler::new(source, &Functions::builtin())?.compile_program()
    }

    #[test]
    fn test_precedence() {
        let program = compile("1 + 2 * 3").unwrap();
        assert_eq!(
            program.statements,
            vec![Statement::Assign {
                target: RESULT.to_string(),
                value: Expr::BinaryOp {
                    op: BinOp::Add,
                    left: Box::new(Expr::Integer(1)),
                    right: Box::new(Expr::BinaryOp {
                        op: BinOp::Multiply,
                        left: Box::new(Expr::Integer(2)),
                        right: Box::new(Expr::Integer(3)),
                    }),
                },
            }]
        );
    }

    #[test]
    fn test_filter_and_assign() {
        let program = compile("total := a * b; ?(total > 10 and not done)").unwrap();
        assert_eq!(program.outputs(), vec!["total"]);
        assert!(matches!(program.statements[1], Statement::Filter(_)));
    }

    #[test]
    fn test_negative_literals_fold() {
        let program = compile("-2.5").unwrap();
        assert_eq!(
            program.statements,
            vec![Statement::Assign {
                target: RESULT.to_string(),
                value: Expr::Float(-2.5),
            }]
        );
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            compile("nope(1)"),
            Err(CompileError::UnknownFunction { .. })
        ));
        assert!(matches!(compile("upper(a, b)"), Err(CompileError::Arity { found: 2, .. })));
        assert!(matches!(compile("(1 + 2"), Err(CompileError::UnexpectedToken { .. })));
        assert!(matches!(compile("a b"), Err(CompileError::UnexpectedToken { .. })));
        assert!(matches!(compile(" ; "), Err(CompileError::EmptyProgram)));
        assert!(matches!(compile("'open"), Err(CompileError::Syntax(_))));
    }
}
