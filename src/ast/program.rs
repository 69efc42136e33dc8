use crate::ast::Expr;

/// One step of a compiled program.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Filter
    ///
    /// Stops the program when the condition is not truthy.
    ///
    /// # Example
    /// ```text
    /// ?(price > 100)
    /// ```
    Filter(Expr),

    /// Assignment
    ///
    /// Writes the value under `target` in the write context.
    ///
    /// # Example
    /// ```text
    /// total := price * quantity
    /// ```
    Assign { target: String, value: Expr },
}

/// A compiled, executable program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    /// Statements, run in order
    pub statements: Vec<Statement>,

    /// Maximum number of rows the caller should emit, if bounded
    pub limit: Option<u64>,
}

impl Program {
    /// Names written by the program's assignments, in order.
    pub fn outputs(&self) -> Vec<&str> {
        self.statements
            .iter()
            .filter_map(|stmt| match stmt {
                Statement::Assign { target, .. } => Some(target.as_str()),
                Statement::Filter(_) => None,
            })
            .collect()
    }
}
