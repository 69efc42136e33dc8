//! Character-level scanning.
//!
//! [`Cursor`] walks the source text and recognizes one raw token at a time:
//! words, numbers, quoted strings, comments and punctuation. It knows nothing
//! about keywords or clauses; classifying words is the job of the lexing
//! strategies in [`strategy`](crate::strategy), which drive a cursor.

use crate::ast::{Token, TokenKind};
use crate::parser::ParseError;

#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    input: &'a str,
    /// Byte offset of the next unread character
    position: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(input: &'a str) -> Self {
        Cursor { input, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_eof(&self) -> bool {
        self.position >= self.input.len()
    }

    /// The unread remainder of the input.
    pub fn rest(&self) -> &'a str {
        &self.input[self.position..]
    }

    pub fn current_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub fn peek_char(&self, offset: usize) -> Option<char> {
        self.rest().chars().nth(offset)
    }

    pub fn advance(&mut self) -> Option<char> {
        let ch = self.current_char()?;
        self.position += ch.len_utf8();
        Some(ch)
    }

    /// Consumes `expected` if it is the current character.
    pub fn eat(&mut self, expected: char) -> bool {
        if self.current_char() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Returns the word starting at the current position without consuming it.
    pub fn peek_word(&self) -> Option<&'a str> {
        let rest = self.rest();
        let first = rest.chars().next()?;
        if !is_word_start(first) {
            return None;
        }
        let end = rest
            .char_indices()
            .find(|(_, ch)| !is_word_char(*ch))
            .map_or(rest.len(), |(i, _)| i);
        Some(&rest[..end])
    }

    /// Consumes the word starting at the current position.
    pub fn read_word(&mut self) -> Option<&'a str> {
        let word = self.peek_word()?;
        self.position += word.len();
        Some(word)
    }

    fn read_string(&mut self, quote: char) -> Result<String, ParseError> {
        let start = self.position;
        let mut result = String::new();
        self.advance(); // Consume opening quote

        while let Some(ch) = self.advance() {
            match ch {
                c if c == quote => {
                    // SQL-style doubled quote
                    if self.current_char() == Some(quote) {
                        self.advance();
                        result.push(quote);
                    } else {
                        return Ok(result);
                    }
                }
                '\\' => match self.advance() {
                    Some('n') => result.push('\n'),
                    Some('t') => result.push('\t'),
                    Some('r') => result.push('\r'),
                    Some(other) => result.push(other),
                    None => break,
                },
                _ => result.push(ch),
            }
        }

        Err(ParseError::UnterminatedString { position: start })
    }

    fn read_number(&mut self) -> &'a str {
        let start = self.position;
        let mut is_float = false;

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                self.advance();
            } else if ch == '.'
                && !is_float
                && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
            {
                is_float = true;
                self.advance();
            } else {
                break;
            }
        }

        &self.input[start..self.position]
    }

    fn read_line_comment(&mut self) -> &'a str {
        let start = self.position;
        while let Some(ch) = self.current_char() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
        self.input[start..self.position].trim()
    }

    fn read_block_comment(&mut self, open: usize) -> Result<&'a str, ParseError> {
        let start = self.position;
        match self.rest().find("*/") {
            Some(end) => {
                self.position += end + 2;
                Ok(self.input[start..start + end].trim())
            }
            None => Err(ParseError::UnterminatedComment { position: open }),
        }
    }

    /// Scans the next raw token, skipping leading whitespace.
    ///
    /// Words always come back as `IDENTITY`; at end of input the token is
    /// `EOF` and the cursor does not move.
    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_whitespace();
        let start = self.position;

        let Some(ch) = self.current_char() else {
            return Ok(Token::new(TokenKind::EOF, "", start));
        };

        let single = |cursor: &mut Self, kind: TokenKind| {
            cursor.advance();
            Token::new(kind, &cursor.input[start..cursor.position], start)
        };
        let pair = |cursor: &mut Self, kind: TokenKind| {
            cursor.advance();
            cursor.advance();
            Token::new(kind, &cursor.input[start..cursor.position], start)
        };

        let token = match ch {
            ',' => single(self, TokenKind::COMMA),
            '*' => single(self, TokenKind::STAR),
            '(' => single(self, TokenKind::LEFT_PAREN),
            ')' => single(self, TokenKind::RIGHT_PAREN),
            '.' => single(self, TokenKind::DOT),
            '?' => single(self, TokenKind::QUESTION),
            ';' => single(self, TokenKind::EOS),
            '+' => single(self, TokenKind::PLUS),
            '%' => single(self, TokenKind::PERCENT),
            '-' if self.peek_char(1) == Some('-') => {
                self.advance();
                self.advance();
                let text = self.read_line_comment();
                Token::new(TokenKind::COMMENT, text, start)
            }
            '-' => single(self, TokenKind::MINUS),
            '/' if self.peek_char(1) == Some('*') => {
                self.advance();
                self.advance();
                let text = self.read_block_comment(start)?;
                Token::new(TokenKind::COMMENT, text, start)
            }
            '/' => single(self, TokenKind::SLASH),
            '=' if self.peek_char(1) == Some('=') => pair(self, TokenKind::EQUAL_EQUAL),
            '=' => single(self, TokenKind::EQUAL),
            '!' if self.peek_char(1) == Some('=') => pair(self, TokenKind::NOT_EQUAL),
            '<' if self.peek_char(1) == Some('=') => pair(self, TokenKind::LESS_EQUAL),
            '<' if self.peek_char(1) == Some('>') => pair(self, TokenKind::NOT_EQUAL),
            '<' => single(self, TokenKind::LESS),
            '>' if self.peek_char(1) == Some('=') => pair(self, TokenKind::GREATER_EQUAL),
            '>' => single(self, TokenKind::GREATER),
            ':' if self.peek_char(1) == Some('=') => pair(self, TokenKind::ASSIGN),
            '\'' | '"' => {
                let text = self.read_string(ch)?;
                Token::new(TokenKind::STRING, text, start)
            }
            c if c.is_ascii_digit() => {
                let text = self.read_number();
                Token::new(TokenKind::VALUE, text, start)
            }
            c if is_word_start(c) => {
                let text = self.read_word().unwrap_or_default();
                Token::new(TokenKind::IDENTITY, text, start)
            }
            other => {
                return Err(ParseError::UnexpectedCharacter {
                    ch: other,
                    position: start,
                });
            }
        };
        Ok(token)
    }

    /// Scans every remaining token, up to and including `EOF`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.is(TokenKind::EOF);
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }
}

fn is_word_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Cursor::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_words_are_identities() {
        assert_eq!(
            kinds("select a from"),
            vec![
                TokenKind::IDENTITY,
                TokenKind::IDENTITY,
                TokenKind::IDENTITY,
                TokenKind::EOF
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("= == != <> < <= > >= :="),
            vec![
                TokenKind::EQUAL,
                TokenKind::EQUAL_EQUAL,
                TokenKind::NOT_EQUAL,
                TokenKind::NOT_EQUAL,
                TokenKind::LESS,
                TokenKind::LESS_EQUAL,
                TokenKind::GREATER,
                TokenKind::GREATER_EQUAL,
                TokenKind::ASSIGN,
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        let tokens = Cursor::new(r#"'it''s' "a\"b""#).tokenize().unwrap();
        assert_eq!(tokens[0].text, "it's");
        assert_eq!(tokens[1].text, "a\"b");
        assert_eq!(tokens[1].position, 8);
    }

    #[test]
    fn test_comments() {
        let tokens = Cursor::new("-- hello\n/* block */ x").tokenize().unwrap();
        assert_eq!(tokens[0], Token::new(TokenKind::COMMENT, "hello", 0));
        assert_eq!(tokens[1], Token::new(TokenKind::COMMENT, "block", 9));
        assert_eq!(tokens[2], Token::new(TokenKind::IDENTITY, "x", 21));
    }

    #[test]
    fn test_numbers() {
        let tokens = Cursor::new("42 3.14 7.").tokenize().unwrap();
        assert_eq!(tokens[0].text, "42");
        assert_eq!(tokens[1].text, "3.14");
        assert_eq!(tokens[2].text, "7");
        assert_eq!(tokens[3].kind, TokenKind::DOT);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            Cursor::new("'open").tokenize(),
            Err(ParseError::UnterminatedString { position: 0 })
        ));
        assert!(matches!(
            Cursor::new("a /* b").tokenize(),
            Err(ParseError::UnterminatedComment { position: 2 })
        ));
        assert!(matches!(
            Cursor::new("a # b").tokenize(),
            Err(ParseError::UnexpectedCharacter { ch: '#', position: 2 })
        ));
    }

    #[test]
    fn test_eof_does_not_advance() {
        let mut cursor = Cursor::new("  ");
        assert_eq!(cursor.next_token().unwrap().kind, TokenKind::EOF);
        assert_eq!(cursor.next_token().unwrap().kind, TokenKind::EOF);
        assert_eq!(cursor.position(), 2);
    }
}
