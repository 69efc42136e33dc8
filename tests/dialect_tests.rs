// tests/dialect_tests.rs

use std::sync::Arc;

use pretty_assertions::assert_eq;
use rowql::ast::{StatementKind, TokenKind};
use rowql::dialect::{self, ClauseSpec, DialectSpec, GrammarError, StatementSpec};
use rowql::parser;
use rowql::registry::KindRegistry;

const SHOW: TokenKind = TokenKind::new(TokenKind::CUSTOM_BASE + 1);
const TABLES: TokenKind = TokenKind::new(TokenKind::CUSTOM_BASE + 2);

fn show_spec(description: &str) -> DialectSpec {
    DialectSpec::new("show")
        .custom_kind(SHOW, description)
        .keyword("show", SHOW)
        .statement(
            StatementSpec::new(SHOW, StatementKind::Select)
                .clause(ClauseSpec::required(SHOW, parser::parse_columns)),
        )
}

// ============================================================================
// Initialization
// ============================================================================

#[test]
fn test_init_is_idempotent() {
    let registry = Arc::new(KindRegistry::new());
    let spec = show_spec("SHOW");

    let first = spec.init(&registry).unwrap();
    let registered = registry.len();
    let second = spec.init(&registry).unwrap();

    assert_eq!(registry.len(), registered);
    assert_eq!(first.keyword("show"), second.keyword("show"));
    assert_eq!(first.statements().len(), second.statements().len());
    assert_eq!(first.describe(SHOW), "SHOW");
    assert_eq!(second.describe(SHOW), "SHOW");
    assert_eq!(
        parser::parse(&first, "show a, b").unwrap(),
        parser::parse(&second, "show a, b").unwrap()
    );
}

#[test]
fn test_sql_dialect_init_twice() {
    let registry = Arc::new(KindRegistry::new());
    dialect::sql(&registry).unwrap();
    dialect::sql(&registry).unwrap();
}

#[test]
fn test_builtin_kinds_registered() {
    let registry = KindRegistry::new();
    for (kind, name) in TokenKind::BUILTIN {
        assert_eq!(registry.describe(*kind).as_deref(), Some(*name));
    }
    assert!(!registry.contains(SHOW));
}

// ============================================================================
// Conflicts
// ============================================================================

#[test]
fn test_conflicting_description_across_dialects() {
    let registry = Arc::new(KindRegistry::new());
    show_spec("SHOW").init(&registry).unwrap();

    let err = show_spec("DISPLAY").init(&registry).unwrap_err();
    assert_eq!(
        err,
        GrammarError::DuplicateKind {
            kind: SHOW,
            registered: "SHOW".to_string(),
            requested: "DISPLAY".to_string(),
        }
    );
    assert!(err.to_string().starts_with("grammar conflict: "));
    assert_eq!(registry.describe(SHOW).as_deref(), Some("SHOW"));
}

#[test]
fn test_separate_registries_do_not_conflict() {
    show_spec("SHOW").init(&Arc::new(KindRegistry::new())).unwrap();
    show_spec("DISPLAY").init(&Arc::new(KindRegistry::new())).unwrap();
}

#[test]
fn test_reserved_kind() {
    let err = DialectSpec::new("bad")
        .custom_kind(TokenKind::new(42), "ANSWER")
        .init(&Arc::new(KindRegistry::new()))
        .unwrap_err();
    assert!(matches!(err, GrammarError::ReservedKind { .. }));
}

#[test]
fn test_builtin_keyword_collision() {
    let err = DialectSpec::new("bad")
        .custom_kind(SHOW, "SHOW")
        .keyword("from", SHOW)
        .init(&Arc::new(KindRegistry::new()))
        .unwrap_err();
    assert_eq!(
        err,
        GrammarError::DuplicateKeyword {
            word: "from".to_string(),
            first: TokenKind::FROM,
            second: SHOW,
        }
    );
}

#[test]
fn test_duplicate_statement() {
    let statement = StatementSpec::new(TokenKind::SELECT, StatementKind::Select)
        .clause(ClauseSpec::required(TokenKind::SELECT, parser::parse_columns));
    let err = DialectSpec::new("twice")
        .statement(statement.clone())
        .statement(statement)
        .init(&Arc::new(KindRegistry::new()))
        .unwrap_err();
    assert!(matches!(
        err,
        GrammarError::DuplicateStatement { entry, .. } if entry == TokenKind::SELECT
    ));
}

#[test]
fn test_unregistered_clause_kind() {
    let err = DialectSpec::new("bad")
        .statement(
            StatementSpec::new(TokenKind::SELECT, StatementKind::Select)
                .clause(ClauseSpec::required(TokenKind::SELECT, parser::parse_columns))
                .clause(ClauseSpec::optional(TABLES, parser::parse_source)),
        )
        .init(&Arc::new(KindRegistry::new()))
        .unwrap_err();
    assert_eq!(
        err,
        GrammarError::UnregisteredKind {
            dialect: "bad".to_string(),
            kind: TABLES,
        }
    );
}

#[test]
fn test_clause_keyword_without_spelling() {
    let err = DialectSpec::new("mute")
        .custom_kind(SHOW, "SHOW")
        .statement(
            StatementSpec::new(SHOW, StatementKind::Select)
                .clause(ClauseSpec::required(SHOW, parser::parse_columns)),
        )
        .init(&Arc::new(KindRegistry::new()))
        .unwrap_err();
    assert_eq!(
        err,
        GrammarError::UnspelledClause {
            dialect: "mute".to_string(),
            kind: SHOW,
        }
    );
}

#[test]
fn test_unspelled_clause_registers_nothing() {
    let registry = Arc::new(KindRegistry::new());
    let result = DialectSpec::new("mute")
        .custom_kind(SHOW, "SHOW")
        .statement(
            StatementSpec::new(SHOW, StatementKind::Select)
                .clause(ClauseSpec::required(SHOW, parser::parse_columns)),
        )
        .init(&registry);
    assert!(result.is_err());
    assert!(!registry.contains(SHOW));
}

// ============================================================================
// Custom Statements
// ============================================================================

#[test]
fn test_custom_clause_keyword() {
    let dialect = DialectSpec::new("show")
        .custom_kind(SHOW, "SHOW")
        .custom_kind(TABLES, "TABLES")
        .keyword("show", SHOW)
        .keyword("in", TABLES)
        .statement(
            StatementSpec::new(SHOW, StatementKind::Select)
                .clause(ClauseSpec::required(SHOW, parser::parse_columns))
                .clause(ClauseSpec::optional(TABLES, parser::parse_source)),
        )
        .init(&Arc::new(KindRegistry::new()))
        .unwrap();

    let request = parser::parse(&dialect, "SHOW tables IN main").unwrap();
    assert_eq!(request.column_list(), "tables");
    assert_eq!(request.source.unwrap().name, "main");

    let request = parser::parse(&dialect, "show tables").unwrap();
    assert_eq!(request.source, None);
}

#[test]
fn test_dialects_share_registry() {
    let registry = Arc::new(KindRegistry::new());
    let sql = dialect::sql(&registry).unwrap();
    let show = show_spec("SHOW").init(&registry).unwrap();

    assert!(Arc::ptr_eq(sql.registry(), show.registry()));
    assert_eq!(sql.describe(SHOW), "SHOW");
    // Keywords stay per dialect.
    assert_eq!(sql.keyword("show"), None);
}
