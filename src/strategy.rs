//! Clause lexing strategies.
//!
//! Lexing is a trampoline. The driver in [`Scan::run`] holds a "current"
//! strategy, calls [`LexStrategy::advance`], and replaces the current strategy
//! with whatever [`Next`] names, until a strategy reports
//! [`Next::EndOfInput`]. A strategy never calls another strategy; it returns
//! it.
//!
//! ```text
//! StatementLexer ──SELECT──▶ ListLexer ──ClauseDone──▶ StatementLexer ──FROM──▶ ...
//! ```
//!
//! The root strategy of every dialect is [`StatementLexer`]. It emits keyword
//! tokens and hands control to the active statement's clause strategy as soon
//! as it has emitted that clause's keyword. Clause strategies emit the tokens
//! of their clause and return [`Next::ClauseDone`] at the clause boundary,
//! without consuming the token that ends the clause.

use std::sync::Arc;

use crate::ast::{Token, TokenKind};
use crate::dialect::{Dialect, StatementSpec};
use crate::lexer::Cursor;
use crate::parser::ParseError;

/// Consecutive iterations without progress tolerated before the driver gives up.
pub const MAX_IDLE_STEPS: usize = 8;

/// A unit of continuation-style scanning logic.
pub trait LexStrategy: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Emits zero or more tokens into `scan` and names the strategy to run next.
    fn advance(&self, scan: &mut Scan<'_>) -> Result<Next, ParseError>;
}

/// What the driver should run after a strategy returns.
pub enum Next {
    /// Run the same strategy again
    Stay,
    /// Run another strategy
    Run(Arc<dyn LexStrategy>),
    /// The clause is complete; return to the dialect's root strategy
    ClauseDone,
    /// Stop scanning
    EndOfInput,
}

/// Scan state shared by the strategies of one tokenization.
pub struct Scan<'a> {
    dialect: &'a Dialect,
    cursor: Cursor<'a>,
    tokens: Vec<Token>,
    /// The statement whose entry keyword has been seen, if any
    statement: Option<&'a StatementSpec>,
}

impl<'a> Scan<'a> {
    pub fn new(dialect: &'a Dialect, source: &'a str) -> Self {
        Scan {
            dialect,
            cursor: Cursor::new(source),
            tokens: Vec::new(),
            statement: None,
        }
    }

    pub fn dialect(&self) -> &'a Dialect {
        self.dialect
    }

    pub fn cursor(&mut self) -> &mut Cursor<'a> {
        &mut self.cursor
    }

    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    pub fn emit(&mut self, token: Token) {
        self.tokens.push(token);
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }

    /// Classifies a word through the dialect's keyword table.
    pub fn keyword(&self, word: &str) -> Option<TokenKind> {
        self.dialect.keyword(word)
    }

    /// Returns true when the next significant input ends the current clause:
    /// end of input, `;`, or a word spelling one of the dialect's clause
    /// keywords. Does not consume anything.
    pub fn at_clause_boundary(&self) -> bool {
        let mut probe = self.cursor.clone();
        probe.skip_whitespace();
        if probe.is_eof() || probe.current_char() == Some(';') {
            return true;
        }
        probe
            .peek_word()
            .and_then(|word| self.dialect.keyword(word))
            .is_some_and(|kind| self.dialect.is_clause_keyword(kind))
    }

    /// Tracks statement entry and returns the clause strategy bound to
    /// `keyword` in the active statement, if any.
    fn enter(&mut self, keyword: TokenKind) -> Option<Arc<dyn LexStrategy>> {
        if self.statement.is_none() {
            self.statement = self.dialect.statement(keyword);
        }
        self.statement
            .and_then(|statement| statement.find_clause(keyword))
            .map(|clause| clause.strategy.clone())
    }

    fn end_statement(&mut self) {
        self.statement = None;
    }

    /// Drives the strategies from the dialect's root until end of input.
    ///
    /// The returned stream always ends with an `EOF` token.
    pub fn run(mut self) -> Result<Vec<Token>, ParseError> {
        let mut current = self.dialect.root();
        let mut idle = 0;

        loop {
            // Only consumed input counts; emitting alone is not progress.
            let mark = self.cursor.position();
            let next = current.advance(&mut self)?;
            let progressed = self.cursor.position() != mark;
            idle = if progressed { 0 } else { idle + 1 };

            match next {
                Next::EndOfInput => break,
                Next::Stay if !progressed => return Err(self.stalled(current.as_ref())),
                Next::Stay => {}
                Next::Run(strategy) => current = strategy,
                Next::ClauseDone => current = self.dialect.root(),
            }
            if idle > MAX_IDLE_STEPS {
                return Err(self.stalled(current.as_ref()));
            }
        }

        if !self.tokens.last().is_some_and(|t| t.is(TokenKind::EOF)) {
            let position = self.cursor.position();
            self.tokens.push(Token::new(TokenKind::EOF, "", position));
        }
        Ok(self.tokens)
    }

    fn stalled(&self, strategy: &dyn LexStrategy) -> ParseError {
        ParseError::LexerStalled {
            strategy: strategy.name().to_string(),
            position: self.cursor.position(),
        }
    }
}

/// The root strategy: statement keywords, `;` and end of input.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatementLexer;

impl LexStrategy for StatementLexer {
    fn name(&self) -> &str {
        "statement"
    }

    fn advance(&self, scan: &mut Scan<'_>) -> Result<Next, ParseError> {
        let mut token = scan.cursor().next_token()?;
        match token.kind {
            TokenKind::EOF => {
                scan.emit(token);
                Ok(Next::EndOfInput)
            }
            TokenKind::EOS => {
                scan.end_statement();
                scan.emit(token);
                Ok(Next::Stay)
            }
            TokenKind::IDENTITY => {
                let Some(kind) = scan.keyword(&token.text) else {
                    scan.emit(token);
                    return Ok(Next::Stay);
                };
                token.kind = kind;
                scan.emit(token);
                Ok(match scan.enter(kind) {
                    Some(clause) => Next::Run(clause),
                    None => Next::Stay,
                })
            }
            _ => {
                scan.emit(token);
                Ok(Next::Stay)
            }
        }
    }
}

/// The default clause strategy: one token per step until the clause boundary.
///
/// Words followed directly by `(` become `FUNCTION` tokens; other words are
/// classified as keywords or left as `IDENTITY`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListLexer;

impl LexStrategy for ListLexer {
    fn name(&self) -> &str {
        "list"
    }

    fn advance(&self, scan: &mut Scan<'_>) -> Result<Next, ParseError> {
        if scan.at_clause_boundary() {
            return Ok(Next::ClauseDone);
        }
        let mut token = scan.cursor().next_token()?;
        if token.is(TokenKind::IDENTITY) {
            if scan.cursor().current_char() == Some('(') {
                token.kind = TokenKind::FUNCTION;
            } else if let Some(kind) = scan.keyword(&token.text) {
                token.kind = kind;
            }
        }
        scan.emit(token);
        Ok(Next::Stay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect;
    use crate::registry::KindRegistry;

    fn sql() -> Dialect {
        dialect::sql(&Arc::new(KindRegistry::new())).unwrap()
    }

    #[test]
    fn test_list_lexer_stops_at_clause_keyword() {
        let dialect = sql();
        let mut scan = Scan::new(&dialect, " a, upper(b) FROM t");
        while let Next::Stay = ListLexer.advance(&mut scan).unwrap() {}

        let kinds: Vec<_> = scan.tokens().iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::IDENTITY,
                TokenKind::COMMA,
                TokenKind::FUNCTION,
                TokenKind::LEFT_PAREN,
                TokenKind::IDENTITY,
                TokenKind::RIGHT_PAREN,
            ]
        );
        assert_eq!(scan.cursor().rest(), " FROM t");
    }

    #[test]
    fn test_list_lexer_classifies_keywords() {
        let dialect = sql();
        let mut scan = Scan::new(&dialect, "a AS b");
        while let Next::Stay = ListLexer.advance(&mut scan).unwrap() {}
        assert_eq!(scan.tokens()[1].kind, TokenKind::AS);
    }

    #[test]
    fn test_statement_lexer_hands_off() {
        let dialect = sql();
        let mut scan = Scan::new(&dialect, "select a");
        let next = StatementLexer.advance(&mut scan).unwrap();
        assert!(matches!(next, Next::Run(ref s) if s.name() == "list"));
        assert_eq!(scan.tokens(), &[Token::new(TokenKind::SELECT, "select", 0)]);
    }

    #[test]
    fn test_run_appends_eof() {
        let dialect = sql();
        let tokens = Scan::new(&dialect, "SELECT a FROM t;").run().unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::SELECT,
                TokenKind::IDENTITY,
                TokenKind::FROM,
                TokenKind::IDENTITY,
                TokenKind::EOS,
                TokenKind::EOF,
            ]
        );
    }
}
