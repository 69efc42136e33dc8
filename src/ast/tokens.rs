use std::fmt;

/// The classification tag of a token.
///
/// A kind is a small integer. Every value below [`TokenKind::CUSTOM_BASE`] is
/// reserved for the built-in kinds declared here; dialects register their own
/// kinds at or above it through [`KindRegistry`](crate::registry::KindRegistry).
///
/// # Examples
///
/// ```
/// use rowql::ast::TokenKind;
///
/// const MAYBE: TokenKind = TokenKind::new(TokenKind::CUSTOM_BASE + 1);
/// assert!(TokenKind::SELECT.is_reserved());
/// assert!(!MAYBE.is_reserved());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenKind(u16);

impl TokenKind {
    /// First value available to dialect-registered kinds.
    pub const CUSTOM_BASE: u16 = 1000;

    // Special
    /// An unknown character
    pub const ILLEGAL: TokenKind = TokenKind(0);
    /// End of input
    pub const EOF: TokenKind = TokenKind(1);
    /// End of statement (`;`)
    pub const EOS: TokenKind = TokenKind(2);
    /// Line (`-- ...`) or block (`/* ... */`) comment
    pub const COMMENT: TokenKind = TokenKind(3);

    // Literals and names
    /// Field, table or other bare name
    pub const IDENTITY: TokenKind = TokenKind(4);
    /// Numeric literal
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 3.14
    /// ```
    pub const VALUE: TokenKind = TokenKind(5);
    /// Quoted string literal, quotes removed
    ///
    /// # Examples
    /// ```text
    /// 'open'
    /// "closed"
    /// ```
    pub const STRING: TokenKind = TokenKind(6);
    /// A name directly followed by `(` inside a column list
    ///
    /// # Examples
    /// ```text
    /// SELECT upper(name) FROM people
    /// ```
    pub const FUNCTION: TokenKind = TokenKind(7);

    // Punctuation
    pub const COMMA: TokenKind = TokenKind(8);
    pub const STAR: TokenKind = TokenKind(9);
    pub const LEFT_PAREN: TokenKind = TokenKind(10);
    pub const RIGHT_PAREN: TokenKind = TokenKind(11);
    pub const DOT: TokenKind = TokenKind(12);
    pub const QUESTION: TokenKind = TokenKind(13);
    /// Assignment (`:=`)
    pub const ASSIGN: TokenKind = TokenKind(14);

    // Comparison
    /// `=`
    pub const EQUAL: TokenKind = TokenKind(20);
    /// `==`
    pub const EQUAL_EQUAL: TokenKind = TokenKind(21);
    /// `!=` or `<>`
    pub const NOT_EQUAL: TokenKind = TokenKind(22);
    pub const LESS: TokenKind = TokenKind(23);
    pub const LESS_EQUAL: TokenKind = TokenKind(24);
    pub const GREATER: TokenKind = TokenKind(25);
    pub const GREATER_EQUAL: TokenKind = TokenKind(26);

    // Arithmetic
    pub const PLUS: TokenKind = TokenKind(30);
    pub const MINUS: TokenKind = TokenKind(31);
    pub const SLASH: TokenKind = TokenKind(32);
    pub const PERCENT: TokenKind = TokenKind(33);

    // Keywords
    pub const SELECT: TokenKind = TokenKind(100);
    pub const FROM: TokenKind = TokenKind(101);
    pub const WHERE: TokenKind = TokenKind(102);
    pub const LIMIT: TokenKind = TokenKind(103);
    pub const AND: TokenKind = TokenKind(104);
    pub const OR: TokenKind = TokenKind(105);
    pub const NOT: TokenKind = TokenKind(106);
    pub const AS: TokenKind = TokenKind(107);

    /// Every built-in kind with its description.
    pub const BUILTIN: &'static [(TokenKind, &'static str)] = &[
        (TokenKind::ILLEGAL, "ILLEGAL"),
        (TokenKind::EOF, "EOF"),
        (TokenKind::EOS, "EOS"),
        (TokenKind::COMMENT, "COMMENT"),
        (TokenKind::IDENTITY, "IDENTITY"),
        (TokenKind::VALUE, "VALUE"),
        (TokenKind::STRING, "STRING"),
        (TokenKind::FUNCTION, "FUNCTION"),
        (TokenKind::COMMA, "COMMA"),
        (TokenKind::STAR, "STAR"),
        (TokenKind::LEFT_PAREN, "LEFT_PAREN"),
        (TokenKind::RIGHT_PAREN, "RIGHT_PAREN"),
        (TokenKind::DOT, "DOT"),
        (TokenKind::QUESTION, "QUESTION"),
        (TokenKind::ASSIGN, "ASSIGN"),
        (TokenKind::EQUAL, "EQUAL"),
        (TokenKind::EQUAL_EQUAL, "EQUAL_EQUAL"),
        (TokenKind::NOT_EQUAL, "NOT_EQUAL"),
        (TokenKind::LESS, "LESS"),
        (TokenKind::LESS_EQUAL, "LESS_EQUAL"),
        (TokenKind::GREATER, "GREATER"),
        (TokenKind::GREATER_EQUAL, "GREATER_EQUAL"),
        (TokenKind::PLUS, "PLUS"),
        (TokenKind::MINUS, "MINUS"),
        (TokenKind::SLASH, "SLASH"),
        (TokenKind::PERCENT, "PERCENT"),
        (TokenKind::SELECT, "SELECT"),
        (TokenKind::FROM, "FROM"),
        (TokenKind::WHERE, "WHERE"),
        (TokenKind::LIMIT, "LIMIT"),
        (TokenKind::AND, "AND"),
        (TokenKind::OR, "OR"),
        (TokenKind::NOT, "NOT"),
        (TokenKind::AS, "AS"),
    ];

    /// Built-in keywords and their (lowercase) spelling.
    pub const KEYWORDS: &'static [(&'static str, TokenKind)] = &[
        ("select", TokenKind::SELECT),
        ("from", TokenKind::FROM),
        ("where", TokenKind::WHERE),
        ("limit", TokenKind::LIMIT),
        ("and", TokenKind::AND),
        ("or", TokenKind::OR),
        ("not", TokenKind::NOT),
        ("as", TokenKind::AS),
    ];

    pub const fn new(value: u16) -> Self {
        TokenKind(value)
    }

    pub const fn value(self) -> u16 {
        self.0
    }

    /// Returns true for values in the built-in range.
    pub const fn is_reserved(self) -> bool {
        self.0 < Self::CUSTOM_BASE
    }

    /// The description of a built-in kind, if this is one.
    pub fn builtin_name(self) -> Option<&'static str> {
        Self::BUILTIN
            .iter()
            .find(|(kind, _)| *kind == self)
            .map(|(_, name)| *name)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.builtin_name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "kind({})", self.0),
        }
    }
}

/// One classified lexical unit.
///
/// Tokens are produced by clause lexing strategies and consumed once by the
/// parser. `position` is the byte offset of the first character in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub position: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, position: usize) -> Self {
        Token {
            kind,
            text: text.into(),
            position,
        }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// Returns true for `EOS` and `EOF`.
    pub fn is_end(&self) -> bool {
        self.kind == TokenKind::EOS || self.kind == TokenKind::EOF
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::EOF => write!(f, "end of input"),
            TokenKind::EOS => write!(f, "';'"),
            _ => write!(f, "'{}'", self.text),
        }
    }
}
