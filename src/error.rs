use std::fmt;

/// A 0-based position inside a single expression's source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// 0-based column (character offset within the expression)
    pub column: usize,
    /// 0-based byte offset from the start of the expression
    pub offset: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "column {}", self.column + 1)
    }
}

/// A failure while parsing or evaluating the body of a `^{...}` line.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    #[error("{message} at {position}")]
    Syntax { message: String, position: Position },

    #[error("name '{0}' is not defined")]
    UnknownName(String),

    #[error("'{0}' is not callable")]
    NotCallable(String),

    #[error("{0}")]
    Type(String),

    #[error("{0}")]
    Index(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow")]
    Overflow,

    /// A configured resource limit was hit (nesting depth, sequence length).
    #[error("{0}")]
    Limit(String),
}

impl ExprError {
    pub fn syntax(message: impl Into<String>, position: Position) -> Self {
        ExprError::Syntax {
            message: message.into(),
            position,
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        ExprError::Type(message.into())
    }
}

/// Any error that aborts the translation of a document.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// A line that is neither a declaration, an expression nor an assignment.
    #[error("malformed line: {line}")]
    Format { line: String },

    #[error("invalid key name: {key}")]
    InvalidKey { key: String },

    #[error("unknown value: {value}")]
    UnknownValue { value: String },

    #[error("integer literal out of range: {value}")]
    IntegerOutOfRange { value: String },

    #[error("list literal is nested more than {max_depth} levels deep")]
    ListTooDeep { max_depth: usize },

    #[error("failed to evaluate expression {expression}: {source}")]
    Expression {
        expression: String,
        #[source]
        source: ExprError,
    },
}

impl ConfigError {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Format { .. } => "format-error",
            ConfigError::InvalidKey { .. } => "invalid-key",
            ConfigError::UnknownValue { .. } => "unknown-value",
            ConfigError::IntegerOutOfRange { .. } => "integer-out-of-range",
            ConfigError::ListTooDeep { .. } => "limit-exceeded",
            ConfigError::Expression { .. } => "expression-error",
        }
    }
}
