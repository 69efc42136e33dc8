use std::collections::HashMap;
use std::fmt;

use crate::ast::BinOp;

/// The kind of statement a request was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum StatementKind {
    Select,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementKind::Select => write!(f, "SELECT"),
        }
    }
}

/// The parsed form of one query.
///
/// Requests are assembled clause by clause through a [`RequestBuilder`] and
/// handed out whole; a failed parse never yields a partial request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub kind: StatementKind,

    /// Projected columns, in declaration order
    pub columns: Vec<Column>,

    /// The `FROM` source, when the statement has one
    pub source: Option<TableRef>,

    /// `WHERE` predicates keyed by field name
    pub predicates: HashMap<String, String>,

    /// The comparison of each predicate, keyed like `predicates`. A field
    /// without an entry compares with `=`.
    pub operators: HashMap<String, BinOp>,

    /// Row limit from `LIMIT n`
    pub limit: Option<u64>,

    /// Comment text seen while parsing, without the comment markers
    pub comments: Vec<String>,
}

impl Request {
    /// Joins the column display names with `", "`.
    ///
    /// # Examples
    ///
    /// ```
    /// use rowql::{dialect, parser, registry::KindRegistry};
    /// use std::sync::Arc;
    ///
    /// let dialect = dialect::sql(&Arc::new(KindRegistry::new())).unwrap();
    /// let request = parser::parse(&dialect, "SELECT a, b FROM t").unwrap();
    /// assert_eq!(request.column_list(), "a, b");
    /// ```
    pub fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.display_name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// The comparison applied to the predicate on `field`.
    pub fn operator(&self, field: &str) -> BinOp {
        self.operators.get(field).copied().unwrap_or(BinOp::Equal)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.kind)?;
        let columns: Vec<String> = self.columns.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", columns.join(", "))?;
        if let Some(source) = &self.source {
            write!(f, " FROM {}", source)?;
        }
        if !self.predicates.is_empty() {
            let mut fields: Vec<_> = self.predicates.iter().collect();
            fields.sort();
            let predicates: Vec<String> = fields
                .into_iter()
                .map(|(field, value)| match self.operator(field) {
                    BinOp::Equal => format!("{} = {}", field, value),
                    op => format!("{} {} {}", field, op, value),
                })
                .collect();
            write!(f, " WHERE {}", predicates.join(" AND "))?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {}", limit)?;
        }
        Ok(())
    }
}

/// A projected column.
///
/// `expression` is `None` for a bare field projected under its own name.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub display_name: String,
    pub expression: Option<ExprNode>,
}

impl Column {
    pub fn field(name: impl Into<String>) -> Self {
        Column {
            display_name: name.into(),
            expression: None,
        }
    }

    /// The expression to evaluate for this column.
    pub fn source_expression(&self) -> ExprNode {
        match &self.expression {
            Some(expr) => expr.clone(),
            None => ExprNode::field(self.display_name.clone()),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.expression {
            None => write!(f, "{}", self.display_name),
            Some(expr) if expr.to_string() == self.display_name => write!(f, "{}", expr),
            Some(expr) => write!(f, "{} AS {}", expr, self.display_name),
        }
    }
}

/// What an [`ExprNode`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A reference to a record field
    Field,
    /// A numeric literal
    Number,
    /// A string literal
    Text,
    /// A function call; `arguments` holds the call arguments
    Call,
}

/// A function-call-like expression tree used in column lists and sources.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprNode {
    pub kind: NodeKind,
    pub value: String,
    pub arguments: Vec<ExprNode>,
}

impl ExprNode {
    pub fn field(name: impl Into<String>) -> Self {
        Self::leaf(NodeKind::Field, name)
    }

    pub fn number(text: impl Into<String>) -> Self {
        Self::leaf(NodeKind::Number, text)
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::leaf(NodeKind::Text, text)
    }

    pub fn call(name: impl Into<String>, arguments: Vec<ExprNode>) -> Self {
        ExprNode {
            kind: NodeKind::Call,
            value: name.into(),
            arguments,
        }
    }

    fn leaf(kind: NodeKind, value: impl Into<String>) -> Self {
        ExprNode {
            kind,
            value: value.into(),
            arguments: Vec::new(),
        }
    }
}

impl fmt::Display for ExprNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            NodeKind::Field | NodeKind::Number => write!(f, "{}", self.value),
            NodeKind::Text => write!(f, "'{}'", self.value.replace('\'', "''")),
            NodeKind::Call => {
                let args: Vec<String> = self.arguments.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", self.value, args.join(", "))
            }
        }
    }
}

/// The source named in a `FROM` clause, e.g. `events` or `maybe(stuff)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub name: String,
    pub arguments: Vec<ExprNode>,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn named(name: impl Into<String>) -> Self {
        TableRef {
            name: name.into(),
            arguments: Vec::new(),
            alias: None,
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.arguments.is_empty() {
            let args: Vec<String> = self.arguments.iter().map(|a| a.to_string()).collect();
            write!(f, "({})", args.join(", "))?;
        }
        if let Some(alias) = &self.alias {
            write!(f, " AS {}", alias)?;
        }
        Ok(())
    }
}

/// Accumulates a [`Request`] while its clauses are parsed.
///
/// Clause rules receive the builder mutably; the parser calls
/// [`RequestBuilder::build`] only once every clause has succeeded.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    pub kind: StatementKind,
    pub columns: Vec<Column>,
    pub source: Option<TableRef>,
    pub predicates: HashMap<String, String>,
    pub operators: HashMap<String, BinOp>,
    pub limit: Option<u64>,
    pub comments: Vec<String>,
}

impl RequestBuilder {
    pub fn new(kind: StatementKind) -> Self {
        RequestBuilder {
            kind,
            columns: Vec::new(),
            source: None,
            predicates: HashMap::new(),
            operators: HashMap::new(),
            limit: None,
            comments: Vec::new(),
        }
    }

    pub fn build(self) -> Request {
        Request {
            kind: self.kind,
            columns: self.columns,
            source: self.source,
            predicates: self.predicates,
            operators: self.operators,
            limit: self.limit,
            comments: self.comments,
        }
    }
}
