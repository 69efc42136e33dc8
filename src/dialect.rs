//! Dialect declarations and the validated grammar.
//!
//! A dialect is declared with [`DialectSpec`] and turned into a read-only
//! [`Dialect`] by [`DialectSpec::init`], which checks the declarations against
//! a shared [`KindRegistry`] before registering anything.
//!
//! ```
//! use rowql::ast::{StatementKind, TokenKind};
//! use rowql::dialect::{ClauseSpec, DialectSpec, StatementSpec};
//! use rowql::parser;
//! use rowql::registry::KindRegistry;
//! use std::sync::Arc;
//!
//! let show = TokenKind::new(TokenKind::CUSTOM_BASE + 10);
//! let dialect = DialectSpec::new("tiny")
//!     .custom_kind(show, "SHOW")
//!     .keyword("show", show)
//!     .statement(
//!         StatementSpec::new(show, StatementKind::Select)
//!             .clause(ClauseSpec::required(show, parser::parse_columns)),
//!     )
//!     .init(&Arc::new(KindRegistry::new()))
//!     .unwrap();
//!
//! let request = parser::parse(&dialect, "show a, b").unwrap();
//! assert_eq!(request.column_list(), "a, b");
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use log::debug;
use thiserror::Error;

use crate::ast::{RequestBuilder, StatementKind, Token, TokenKind};
use crate::parser::{self, ParseError, TokenCursor};
use crate::registry::KindRegistry;
use crate::strategy::{LexStrategy, ListLexer, Scan, StatementLexer};

/// A clause's parse rule: consumes the clause body (the keyword is already
/// consumed) and records what it found in the builder.
pub type ClauseRule =
    fn(&Dialect, &mut TokenCursor<'_>, &mut RequestBuilder) -> Result<(), ParseError>;

/// Conflicts found while validating a dialect. Fatal to that dialect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("grammar conflict: token {kind} is registered as {registered:?}, not {requested:?}")]
    DuplicateKind {
        kind: TokenKind,
        registered: String,
        requested: String,
    },

    #[error("grammar conflict: token {kind} ({description:?}) is in the reserved range")]
    ReservedKind { kind: TokenKind, description: String },

    #[error("grammar conflict: dialect {dialect:?} uses unregistered token {kind}")]
    UnregisteredKind { dialect: String, kind: TokenKind },

    #[error("grammar conflict: keyword {word:?} maps to both {first} and {second}")]
    DuplicateKeyword {
        word: String,
        first: TokenKind,
        second: TokenKind,
    },

    #[error("grammar conflict: dialect {dialect:?} declares two statements starting with {entry}")]
    DuplicateStatement { dialect: String, entry: TokenKind },

    #[error("grammar conflict: dialect {dialect:?} has no keyword spelling for clause {kind}")]
    UnspelledClause { dialect: String, kind: TokenKind },

    #[error("grammar conflict: statement {entry} declares no clauses")]
    EmptyStatement { entry: TokenKind },

    #[error("grammar conflict: statement {entry} must open with its entry clause, not {first}")]
    EntryMismatch { entry: TokenKind, first: TokenKind },
}

/// How a `WHERE` predicate records its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PredicateCapture {
    /// `x = y` stores `y`
    #[default]
    RightHandSide,
    /// `x = y` stores `x`, as older front ends did
    FieldText,
}

/// One keyword-driven clause of a statement.
#[derive(Clone)]
pub struct ClauseSpec {
    pub keyword: TokenKind,
    pub strategy: Arc<dyn LexStrategy>,
    pub rule: ClauseRule,
    pub optional: bool,
}

impl ClauseSpec {
    /// A required clause lexed by [`ListLexer`].
    pub fn required(keyword: TokenKind, rule: ClauseRule) -> Self {
        ClauseSpec {
            keyword,
            strategy: Arc::new(ListLexer),
            rule,
            optional: false,
        }
    }

    /// An optional clause lexed by [`ListLexer`].
    pub fn optional(keyword: TokenKind, rule: ClauseRule) -> Self {
        ClauseSpec {
            optional: true,
            ..Self::required(keyword, rule)
        }
    }

    /// Replaces the clause's lexing strategy.
    pub fn with_strategy(mut self, strategy: impl LexStrategy + 'static) -> Self {
        self.strategy = Arc::new(strategy);
        self
    }
}

impl fmt::Debug for ClauseSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClauseSpec")
            .field("keyword", &self.keyword)
            .field("strategy", &self.strategy.name())
            .field("optional", &self.optional)
            .finish()
    }
}

/// A statement: an entry keyword and its ordered clauses.
#[derive(Debug, Clone)]
pub struct StatementSpec {
    pub entry: TokenKind,
    pub kind: StatementKind,
    pub clauses: Vec<ClauseSpec>,
}

impl StatementSpec {
    pub fn new(entry: TokenKind, kind: StatementKind) -> Self {
        StatementSpec {
            entry,
            kind,
            clauses: Vec::new(),
        }
    }

    pub fn clause(mut self, clause: ClauseSpec) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn find_clause(&self, keyword: TokenKind) -> Option<&ClauseSpec> {
        self.clauses.iter().find(|c| c.keyword == keyword)
    }
}

/// The declarations of a dialect, before validation.
#[derive(Debug, Clone)]
pub struct DialectSpec {
    name: String,
    custom_kinds: Vec<(TokenKind, String)>,
    keywords: Vec<(String, TokenKind)>,
    statements: Vec<StatementSpec>,
    strict_trailing: bool,
    predicate_capture: PredicateCapture,
}

impl DialectSpec {
    pub fn new(name: impl Into<String>) -> Self {
        DialectSpec {
            name: name.into(),
            custom_kinds: Vec::new(),
            keywords: Vec::new(),
            statements: Vec::new(),
            strict_trailing: true,
            predicate_capture: PredicateCapture::default(),
        }
    }

    pub fn custom_kind(mut self, kind: TokenKind, description: impl Into<String>) -> Self {
        self.custom_kinds.push((kind, description.into()));
        self
    }

    /// Maps a spelling (matched case-insensitively) to a kind.
    pub fn keyword(mut self, word: &str, kind: TokenKind) -> Self {
        self.keywords.push((word.to_lowercase(), kind));
        self
    }

    pub fn statement(mut self, statement: StatementSpec) -> Self {
        self.statements.push(statement);
        self
    }

    /// Whether tokens left after the last clause are an error (the default)
    /// or ignored.
    pub fn strict_trailing(mut self, strict: bool) -> Self {
        self.strict_trailing = strict;
        self
    }

    pub fn predicate_capture(mut self, capture: PredicateCapture) -> Self {
        self.predicate_capture = capture;
        self
    }

    /// Validates the declarations and registers the custom kinds.
    ///
    /// Nothing is registered unless every check passes. Calling `init` again
    /// with the same declarations and registry succeeds.
    pub fn init(&self, registry: &Arc<KindRegistry>) -> Result<Dialect, GrammarError> {
        for (kind, description) in &self.custom_kinds {
            registry.check(*kind, description)?;
        }
        let known = |kind: TokenKind| {
            registry.contains(kind) || self.custom_kinds.iter().any(|(k, _)| *k == kind)
        };
        let unregistered = |kind| GrammarError::UnregisteredKind {
            dialect: self.name.clone(),
            kind,
        };

        let mut keywords: HashMap<String, TokenKind> = HashMap::new();
        let builtin = TokenKind::KEYWORDS
            .iter()
            .map(|(word, kind)| (word.to_string(), *kind));
        for (word, kind) in builtin.chain(self.keywords.iter().cloned()) {
            if !known(kind) {
                return Err(unregistered(kind));
            }
            match keywords.get(&word) {
                Some(first) if *first != kind => {
                    return Err(GrammarError::DuplicateKeyword {
                        word,
                        first: *first,
                        second: kind,
                    });
                }
                _ => {
                    keywords.insert(word, kind);
                }
            }
        }

        let spelled: HashSet<TokenKind> = keywords.values().copied().collect();
        let mut entries = HashSet::new();
        let mut clause_keywords = HashSet::new();
        for statement in &self.statements {
            let Some(first) = statement.clauses.first() else {
                return Err(GrammarError::EmptyStatement {
                    entry: statement.entry,
                });
            };
            if first.keyword != statement.entry {
                return Err(GrammarError::EntryMismatch {
                    entry: statement.entry,
                    first: first.keyword,
                });
            }
            for clause in &statement.clauses {
                if !known(clause.keyword) {
                    return Err(unregistered(clause.keyword));
                }
                // The root lexer only emits keywords it can spell.
                if !spelled.contains(&clause.keyword) {
                    return Err(GrammarError::UnspelledClause {
                        dialect: self.name.clone(),
                        kind: clause.keyword,
                    });
                }
                clause_keywords.insert(clause.keyword);
            }
            if !entries.insert(statement.entry) {
                return Err(GrammarError::DuplicateStatement {
                    dialect: self.name.clone(),
                    entry: statement.entry,
                });
            }
        }

        for (kind, description) in &self.custom_kinds {
            registry.register(*kind, description)?;
        }
        debug!(
            "Initialized dialect {:?} with {} statements and {} keywords",
            self.name,
            self.statements.len(),
            keywords.len()
        );

        Ok(Dialect {
            name: self.name.clone(),
            statements: self.statements.clone(),
            keywords,
            clause_keywords,
            registry: registry.clone(),
            root: Arc::new(StatementLexer),
            strict_trailing: self.strict_trailing,
            predicate_capture: self.predicate_capture,
        })
    }
}

/// A validated dialect. Read-only and shareable across threads.
pub struct Dialect {
    name: String,
    statements: Vec<StatementSpec>,
    keywords: HashMap<String, TokenKind>,
    clause_keywords: HashSet<TokenKind>,
    registry: Arc<KindRegistry>,
    root: Arc<dyn LexStrategy>,
    strict_trailing: bool,
    predicate_capture: PredicateCapture,
}

impl Dialect {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn statements(&self) -> &[StatementSpec] {
        &self.statements
    }

    /// The statement opened by `entry`, if any.
    pub fn statement(&self, entry: TokenKind) -> Option<&StatementSpec> {
        self.statements.iter().find(|s| s.entry == entry)
    }

    /// Classifies a word, case-insensitively.
    pub fn keyword(&self, word: &str) -> Option<TokenKind> {
        if let Some(kind) = self.keywords.get(word) {
            return Some(*kind);
        }
        self.keywords.get(&word.to_lowercase()).copied()
    }

    pub fn is_clause_keyword(&self, kind: TokenKind) -> bool {
        self.clause_keywords.contains(&kind)
    }

    pub fn registry(&self) -> &Arc<KindRegistry> {
        &self.registry
    }

    /// The registered description of `kind`, falling back to its number.
    pub fn describe(&self, kind: TokenKind) -> String {
        self.registry
            .describe(kind)
            .unwrap_or_else(|| kind.to_string())
    }

    pub fn root(&self) -> Arc<dyn LexStrategy> {
        self.root.clone()
    }

    pub fn strict_trailing(&self) -> bool {
        self.strict_trailing
    }

    pub fn predicate_capture(&self) -> PredicateCapture {
        self.predicate_capture
    }

    /// Tokenizes `source` with the root strategy and the clause strategies.
    pub fn tokenize(&self, source: &str) -> Result<Vec<Token>, ParseError> {
        Scan::new(self, source).run()
    }
}

impl fmt::Debug for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dialect")
            .field("name", &self.name)
            .field("statements", &self.statements)
            .field("strict_trailing", &self.strict_trailing)
            .field("predicate_capture", &self.predicate_capture)
            .finish()
    }
}

/// Declarations of the stock SQL dialect:
/// `SELECT columns FROM source [WHERE predicates] [LIMIT n]`.
pub fn sql_spec() -> DialectSpec {
    DialectSpec::new("sql").statement(
        StatementSpec::new(TokenKind::SELECT, StatementKind::Select)
            .clause(ClauseSpec::required(TokenKind::SELECT, parser::parse_columns))
            .clause(ClauseSpec::required(TokenKind::FROM, parser::parse_source))
            .clause(ClauseSpec::optional(TokenKind::WHERE, parser::parse_predicates))
            .clause(ClauseSpec::optional(TokenKind::LIMIT, parser::parse_limit)),
    )
}

/// Initializes the stock SQL dialect against `registry`.
pub fn sql(registry: &Arc<KindRegistry>) -> Result<Dialect, GrammarError> {
    sql_spec().init(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOW: TokenKind = TokenKind::new(TokenKind::CUSTOM_BASE + 20);

    fn registry() -> Arc<KindRegistry> {
        Arc::new(KindRegistry::new())
    }

    #[test]
    fn test_sql_dialect() {
        let dialect = sql(&registry()).unwrap();
        assert_eq!(dialect.name(), "sql");
        assert_eq!(dialect.keyword("SeLeCt"), Some(TokenKind::SELECT));
        assert!(dialect.is_clause_keyword(TokenKind::WHERE));
        assert!(!dialect.is_clause_keyword(TokenKind::AND));
        assert_eq!(dialect.describe(TokenKind::FROM), "FROM");
    }

    #[test]
    fn test_empty_statement() {
        let err = DialectSpec::new("bad")
            .statement(StatementSpec::new(TokenKind::SELECT, StatementKind::Select))
            .init(&registry())
            .unwrap_err();
        assert_eq!(
            err,
            GrammarError::EmptyStatement {
                entry: TokenKind::SELECT
            }
        );
    }

    #[test]
    fn test_entry_mismatch() {
        let err = DialectSpec::new("bad")
            .statement(
                StatementSpec::new(TokenKind::SELECT, StatementKind::Select)
                    .clause(ClauseSpec::required(TokenKind::FROM, parser::parse_source)),
            )
            .init(&registry())
            .unwrap_err();
        assert!(matches!(err, GrammarError::EntryMismatch { .. }));
    }

    #[test]
    fn test_unregistered_keyword_kind() {
        let err = DialectSpec::new("bad")
            .keyword("show", SHOW)
            .init(&registry())
            .unwrap_err();
        assert!(matches!(err, GrammarError::UnregisteredKind { kind, .. } if kind == SHOW));
    }

    #[test]
    fn test_failed_init_registers_nothing() {
        let registry = registry();
        let err = DialectSpec::new("bad")
            .custom_kind(SHOW, "SHOW")
            .keyword("select", SHOW)
            .init(&registry)
            .unwrap_err();
        assert!(matches!(err, GrammarError::DuplicateKeyword { .. }));
        assert!(!registry.contains(SHOW));
    }

    #[test]
    fn test_error_display() {
        let err = GrammarError::EmptyStatement {
            entry: TokenKind::SELECT,
        };
        assert!(err.to_string().starts_with("grammar conflict: "));
    }
}
