use crate::ast::BinOp;

/// Expression node evaluated by the VM.
///
/// Produced by the expression compiler, or lowered from a parsed
/// [`Request`](crate::ast::Request).
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // Literals
    /// Literal floating point number
    ///
    /// # Example
    /// ```text
    /// 42.5
    /// ```
    Float(f64),

    /// Literal integer
    Integer(i64),

    /// String literal
    ///
    /// # Example
    /// ```text
    /// "hello"
    /// 'hello'
    /// ```
    String(String),

    /// Boolean literal (`true`, `false`)
    Boolean(bool),

    /// Null literal
    Null,

    // References
    /// Named value read from the read context
    ///
    /// # Examples
    /// ```text
    /// price
    /// first_name
    /// ```
    Field(String),

    // Operations
    /// Binary operation (arithmetic, comparison, logical)
    BinaryOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Logical negation (`not`)
    Not(Box<Expr>),

    /// Built-in function call
    ///
    /// # Examples
    /// ```text
    /// upper(name)
    /// coalesce(nickname, name, "anonymous")
    /// ```
    Call { name: String, args: Vec<Expr> },
}
