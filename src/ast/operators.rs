use std::fmt;

use crate::ast::TokenKind;

/// Binary operators of the expression language.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinOp {
    /// `==`, or `=` as in SQL
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessEqual,
    GreaterEqual,

    /// Also concatenates strings
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,

    /// Short-circuits
    And,
    Or,
}

impl BinOp {
    /// The comparison spelled by `kind`, if any.
    pub fn comparison(kind: TokenKind) -> Option<BinOp> {
        match kind {
            TokenKind::EQUAL | TokenKind::EQUAL_EQUAL => Some(BinOp::Equal),
            TokenKind::NOT_EQUAL => Some(BinOp::NotEqual),
            TokenKind::LESS => Some(BinOp::LessThan),
            TokenKind::GREATER => Some(BinOp::GreaterThan),
            TokenKind::LESS_EQUAL => Some(BinOp::LessEqual),
            TokenKind::GREATER_EQUAL => Some(BinOp::GreaterEqual),
            _ => None,
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinOp::Equal => "==",
            BinOp::NotEqual => "!=",
            BinOp::LessThan => "<",
            BinOp::GreaterThan => ">",
            BinOp::LessEqual => "<=",
            BinOp::GreaterEqual => ">=",
            BinOp::Add => "+",
            BinOp::Subtract => "-",
            BinOp::Multiply => "*",
            BinOp::Divide => "/",
            BinOp::Modulo => "%",
            BinOp::And => "and",
            BinOp::Or => "or",
        };
        write!(f, "{}", symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_tokens() {
        assert_eq!(BinOp::comparison(TokenKind::EQUAL), Some(BinOp::Equal));
        assert_eq!(BinOp::comparison(TokenKind::EQUAL_EQUAL), Some(BinOp::Equal));
        assert_eq!(BinOp::comparison(TokenKind::PLUS), None);
    }
}
