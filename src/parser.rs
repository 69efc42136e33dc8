//! The generic statement parser.
//!
//! [`Parser`] knows no statement by name. It tokenizes through a [`Dialect`],
//! picks the statement whose entry keyword opens the input, and walks that
//! statement's clauses in order, handing each clause body to the clause's
//! [`ClauseRule`](crate::dialect::ClauseRule). The rules for the stock SQL
//! clauses live here too: [`parse_columns`], [`parse_source`],
//! [`parse_predicates`] and [`parse_limit`].

use log::{debug, warn};
use thiserror::Error;

use crate::ast::{
    BinOp, Column, ExprNode, Request, RequestBuilder, TableRef, Token, TokenKind,
};
use crate::dialect::{Dialect, PredicateCapture};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unexpected character {ch:?} at position {position}")]
    UnexpectedCharacter { ch: char, position: usize },

    #[error("unterminated string starting at position {position}")]
    UnterminatedString { position: usize },

    #[error("unterminated comment starting at position {position}")]
    UnterminatedComment { position: usize },

    #[error("lexer stalled in strategy {strategy:?} at position {position}")]
    LexerStalled { strategy: String, position: usize },

    #[error("unrecognized statement starting with {found} at position {position}")]
    UnrecognizedStatement { found: String, position: usize },

    #[error("missing {expected} clause at position {position}")]
    MissingClause { expected: TokenKind, position: usize },

    #[error("expected {expected}, found {found} at position {position}")]
    UnexpectedToken {
        expected: String,
        found: String,
        position: usize,
    },

    #[error("{feature} is not implemented (position {position})")]
    NotImplemented {
        feature: &'static str,
        position: usize,
    },

    #[error("unexpected {found} after the statement at position {position}")]
    TrailingInput { found: String, position: usize },
}

impl ParseError {
    fn unexpected(expected: &str, found: &Token) -> Self {
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: found.to_string(),
            position: found.position,
        }
    }
}

/// A read position over a token stream.
///
/// `COMMENT` tokens are never returned; their text is collected and handed
/// out through [`take_comments`](Self::take_comments).
#[derive(Debug)]
pub struct TokenCursor<'t> {
    tokens: &'t [Token],
    pos: usize,
    comments: Vec<String>,
    /// Returned once the stream is exhausted
    eof: Token,
}

impl<'t> TokenCursor<'t> {
    /// A cursor whose end-of-stream position is the start of the last token.
    ///
    /// Token text is not the source text (string quotes are stripped), so
    /// the true end offset cannot be derived from it. Use
    /// [`with_end`](Self::with_end) when the source length is known.
    pub fn new(tokens: &'t [Token]) -> Self {
        Self::with_end(tokens, tokens.last().map_or(0, |t| t.position))
    }

    /// A cursor that reports `end` once the stream is exhausted.
    pub fn with_end(tokens: &'t [Token], end: usize) -> Self {
        let mut cursor = TokenCursor {
            tokens,
            pos: 0,
            comments: Vec::new(),
            eof: Token::new(TokenKind::EOF, "", end),
        };
        cursor.skip_comments();
        cursor
    }

    pub fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&self.eof)
    }

    pub fn check(&self, kind: TokenKind) -> bool {
        self.peek().is(kind)
    }

    pub fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        self.skip_comments();
        token
    }

    /// Consumes the current token if it has the given kind.
    pub fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    /// Consumes the current token, which must have the given kind.
    pub fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token, ParseError> {
        self.eat(kind)
            .ok_or_else(|| ParseError::unexpected(expected, self.peek()))
    }

    pub fn take_comments(&mut self) -> Vec<String> {
        std::mem::take(&mut self.comments)
    }

    fn skip_comments(&mut self) {
        while let Some(token) = self.tokens.get(self.pos) {
            if !token.is(TokenKind::COMMENT) {
                break;
            }
            self.comments.push(token.text.clone());
            self.pos += 1;
        }
    }
}

/// Parses one statement of `source`.
pub fn parse(dialect: &Dialect, source: &str) -> Result<Request, ParseError> {
    Parser::new(dialect).parse(source)
}

/// Parses every `;`-separated statement of `source`.
pub fn parse_script(dialect: &Dialect, source: &str) -> Result<Vec<Request>, ParseError> {
    Parser::new(dialect).parse_script(source)
}

pub struct Parser<'d> {
    dialect: &'d Dialect,
}

impl<'d> Parser<'d> {
    pub fn new(dialect: &'d Dialect) -> Self {
        Parser { dialect }
    }

    /// Parses the first statement of `source`. Anything after its `;` is
    /// not examined.
    pub fn parse(&self, source: &str) -> Result<Request, ParseError> {
        let tokens = self.dialect.tokenize(source)?;
        let mut cursor = TokenCursor::with_end(&tokens, source.len());
        let request = self.parse_statement(&mut cursor)?;
        self.finish_statement(&mut cursor)?;
        Ok(request)
    }

    pub fn parse_script(&self, source: &str) -> Result<Vec<Request>, ParseError> {
        let tokens = self.dialect.tokenize(source)?;
        let mut cursor = TokenCursor::with_end(&tokens, source.len());
        let mut requests = Vec::new();
        loop {
            while cursor.eat(TokenKind::EOS).is_some() {}
            if cursor.check(TokenKind::EOF) {
                break;
            }
            requests.push(self.parse_statement(&mut cursor)?);
            self.finish_statement(&mut cursor)?;
        }
        Ok(requests)
    }

    fn parse_statement(&self, cursor: &mut TokenCursor<'_>) -> Result<Request, ParseError> {
        let first = cursor.peek();
        let Some(statement) = self.dialect.statement(first.kind) else {
            return Err(ParseError::UnrecognizedStatement {
                found: first.to_string(),
                position: first.position,
            });
        };
        debug!(
            "Parsing {} statement in dialect {:?}",
            statement.kind,
            self.dialect.name()
        );

        let mut builder = RequestBuilder::new(statement.kind);
        for clause in &statement.clauses {
            if !cursor.check(clause.keyword) {
                if clause.optional {
                    continue;
                }
                return Err(ParseError::MissingClause {
                    expected: clause.keyword,
                    position: cursor.peek().position,
                });
            }
            cursor.advance();
            (clause.rule)(self.dialect, cursor, &mut builder)?;
        }
        builder.comments = cursor.take_comments();
        Ok(builder.build())
    }

    fn finish_statement(&self, cursor: &mut TokenCursor<'_>) -> Result<(), ParseError> {
        let token = cursor.peek();
        if !token.is_end() {
            if self.dialect.strict_trailing() {
                return Err(ParseError::TrailingInput {
                    found: token.to_string(),
                    position: token.position,
                });
            }
            warn!(
                "Ignoring input after the statement from position {}",
                token.position
            );
            while !cursor.peek().is_end() {
                cursor.advance();
            }
        }
        cursor.eat(TokenKind::EOS);
        Ok(())
    }
}

fn terminates_clause(dialect: &Dialect, token: &Token) -> bool {
    token.is_end() || dialect.is_clause_keyword(token.kind)
}

/// `column [AS alias] {, column [AS alias]}` where a column is a field name
/// or a function call.
pub fn parse_columns(
    dialect: &Dialect,
    cursor: &mut TokenCursor<'_>,
    builder: &mut RequestBuilder,
) -> Result<(), ParseError> {
    loop {
        let token = cursor.peek().clone();
        let mut column = match token.kind {
            TokenKind::STAR => {
                return Err(ParseError::NotImplemented {
                    feature: "SELECT *",
                    position: token.position,
                });
            }
            TokenKind::IDENTITY => {
                cursor.advance();
                Column::field(token.text)
            }
            TokenKind::FUNCTION => {
                cursor.advance();
                let call = parse_call(cursor, token.text)?;
                Column {
                    display_name: call.to_string(),
                    expression: Some(call),
                }
            }
            _ => return Err(ParseError::unexpected("a column", &token)),
        };

        if cursor.eat(TokenKind::AS).is_some() {
            let alias = cursor.expect(TokenKind::IDENTITY, "a column alias")?;
            column = Column {
                expression: Some(column.source_expression()),
                display_name: alias.text,
            };
        }
        builder.columns.push(column);

        if cursor.eat(TokenKind::COMMA).is_some() {
            continue;
        }
        let next = cursor.peek();
        if terminates_clause(dialect, next) {
            return Ok(());
        }
        return Err(ParseError::unexpected("',' or the end of the column list", next));
    }
}

/// `( [arg {, arg}] )` after a function name.
fn parse_call(cursor: &mut TokenCursor<'_>, name: String) -> Result<ExprNode, ParseError> {
    cursor.expect(TokenKind::LEFT_PAREN, "'('")?;
    let mut arguments = Vec::new();
    if cursor.eat(TokenKind::RIGHT_PAREN).is_none() {
        loop {
            arguments.push(parse_argument(cursor)?);
            if cursor.eat(TokenKind::COMMA).is_some() {
                continue;
            }
            cursor.expect(TokenKind::RIGHT_PAREN, "',' or ')'")?;
            break;
        }
    }
    Ok(ExprNode::call(name, arguments))
}

fn parse_argument(cursor: &mut TokenCursor<'_>) -> Result<ExprNode, ParseError> {
    let token = cursor.peek().clone();
    match token.kind {
        TokenKind::FUNCTION | TokenKind::IDENTITY => {
            cursor.advance();
            if cursor.check(TokenKind::LEFT_PAREN) {
                parse_call(cursor, token.text)
            } else {
                Ok(ExprNode::field(token.text))
            }
        }
        TokenKind::VALUE => {
            cursor.advance();
            Ok(ExprNode::number(token.text))
        }
        TokenKind::STRING => {
            cursor.advance();
            Ok(ExprNode::text(token.text))
        }
        TokenKind::MINUS => {
            cursor.advance();
            let number = cursor.expect(TokenKind::VALUE, "a number")?;
            Ok(ExprNode::number(format!("-{}", number.text)))
        }
        _ => Err(ParseError::unexpected("a function argument", &token)),
    }
}

/// `name [( args )] [AS alias]`
pub fn parse_source(
    _dialect: &Dialect,
    cursor: &mut TokenCursor<'_>,
    builder: &mut RequestBuilder,
) -> Result<(), ParseError> {
    let token = cursor.peek().clone();
    if !matches!(token.kind, TokenKind::IDENTITY | TokenKind::FUNCTION) {
        return Err(ParseError::unexpected("a source name", &token));
    }
    cursor.advance();

    let mut source = TableRef::named(token.text);
    if cursor.check(TokenKind::LEFT_PAREN) {
        let call = parse_call(cursor, source.name.clone())?;
        source.arguments = call.arguments;
    }
    if cursor.eat(TokenKind::AS).is_some() {
        let alias = cursor.expect(TokenKind::IDENTITY, "a source alias")?;
        source.alias = Some(alias.text);
    }
    builder.source = Some(source);
    Ok(())
}

/// `field op operand {AND field op operand}`
///
/// The operator must be a comparison. The predicate and operator maps keep
/// one entry per field; a later predicate on the same field replaces both.
pub fn parse_predicates(
    dialect: &Dialect,
    cursor: &mut TokenCursor<'_>,
    builder: &mut RequestBuilder,
) -> Result<(), ParseError> {
    loop {
        let field = cursor.expect(TokenKind::IDENTITY, "a field name")?;

        let token = cursor.peek().clone();
        let op = BinOp::comparison(token.kind)
            .ok_or_else(|| ParseError::unexpected("a comparison operator", &token))?;
        cursor.advance();

        let operand = cursor.peek().clone();
        let operand = match operand.kind {
            TokenKind::IDENTITY | TokenKind::VALUE | TokenKind::STRING => {
                cursor.advance();
                operand.text
            }
            TokenKind::MINUS => {
                cursor.advance();
                let number = cursor.expect(TokenKind::VALUE, "a number")?;
                format!("-{}", number.text)
            }
            _ => return Err(ParseError::unexpected("a value", &operand)),
        };

        let value = match dialect.predicate_capture() {
            PredicateCapture::RightHandSide => operand,
            PredicateCapture::FieldText => field.text.clone(),
        };
        builder.operators.insert(field.text.clone(), op);
        if let Some(previous) = builder.predicates.insert(field.text.clone(), value) {
            debug!(
                "Predicate on {:?} replaces earlier value {:?}",
                field.text, previous
            );
        }

        let next = cursor.peek().clone();
        match next.kind {
            TokenKind::AND => {
                cursor.advance();
            }
            TokenKind::OR => {
                return Err(ParseError::NotImplemented {
                    feature: "OR predicates",
                    position: next.position,
                });
            }
            _ if terminates_clause(dialect, &next) => return Ok(()),
            _ => return Err(ParseError::unexpected("AND or the end of the predicates", &next)),
        }
    }
}

/// `LIMIT n`
pub fn parse_limit(
    _dialect: &Dialect,
    cursor: &mut TokenCursor<'_>,
    builder: &mut RequestBuilder,
) -> Result<(), ParseError> {
    let token = cursor.expect(TokenKind::VALUE, "a row count")?;
    let limit = token
        .text
        .parse::<u64>()
        .map_err(|_| ParseError::unexpected("a whole row count", &token))?;
    builder.limit = Some(limit);
    Ok(())
}
