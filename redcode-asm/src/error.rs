use thiserror::Error;

/// The kinds of error the assembler reports.  Assembly stops at the first
/// one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum AsmErrorKind {
    /// The line did not match the Redcode grammar
    #[error("syntax error: {0}")]
    Syntax(String),

    /// An expression referenced a label that is never defined
    #[error("unknown symbol `{0}`")]
    UnknownSymbol(String),

    /// An `EQU` constant was defined twice
    #[error("constant `{0}` is already defined")]
    RedefinedConstant(String),

    /// An instruction is missing its A operand
    #[error("missing operand")]
    MissingOperand,

    /// A `.modifier` suffix outside `A B AB BA F X I`
    #[error("unrecognized modifier `.{0}`")]
    BadModifier(String),

    /// Division or modulo by zero while evaluating an expression
    #[error("division by zero in expression")]
    DivByZeroInExpr,

    /// A `FOR` whose body is never closed by `ROF`
    #[error("FOR without matching ROF")]
    ForWithoutRof,

    /// The same label was defined at two different offsets
    #[error("label `{0}` is already defined")]
    LabelCollision(String),
}

/// An assembly error, located at a file, line, and column.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{file}:{line}:{column}: {kind}")]
pub struct AsmError {
    /// Name of the source being assembled, for diagnostics only
    pub file: String,
    /// 1-indexed source line
    pub line: u32,
    /// 1-indexed column within the line
    pub column: u32,
    /// What went wrong
    pub kind: AsmErrorKind,
}

impl AsmError {
    /// Locate an error kind at a file, line, and column.
    #[must_use]
    pub fn new(
        file: impl Into<String>,
        line: u32,
        column: u32,
        kind: AsmErrorKind,
    ) -> Self {
        Self {
            file: file.into(),
            line,
            column,
            kind,
        }
    }

    /// Renders the offending source line with a caret under the error
    /// column, for human display.
    ///
    /// Columns refer to the line after constant substitution, so the caret
    /// is clamped into the original line when substitution changed its
    /// length.
    #[must_use]
    pub fn render(&self, source: &str) -> String {
        let Some(line) = crate::scanner::source_lines(source)
            .nth(self.line.saturating_sub(1) as usize)
        else {
            return self.to_string();
        };
        let caret_col =
            (self.column.saturating_sub(1) as usize).min(line.len());
        format!("{self}\n{line}\n{:caret_col$}^", "")
    }
}
