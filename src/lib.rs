//! Translator for a small configuration language into a flat TOML table.
//!
//! A document is a sequence of lines:
//!
//! ```text
//! {- block comments may span lines -}
//! 5 -> x              constant: bound, never emitted
//! y = list(1, 2, 3)   assignment: bound and emitted (lists are dropped)
//! z = "hi"
//! ^{x + 1}            expression: evaluated after the whole file is read
//! ^{sort(y)[0]}       list results of expressions are dropped too
//! ```
//!
//! ```
//! let doc = arrowconf::translate("5 -> x\n^{x * 2}\nname = \"demo\"").unwrap();
//! assert_eq!(doc.get("x * 2"), Some(&arrowconf::Value::Integer(10)));
//! assert_eq!(doc.get("name"), Some(&arrowconf::Value::Text("demo".into())));
//! ```

pub mod ast;
pub mod builtins;
pub mod comments;
pub mod document;
pub mod env;
pub mod error;
pub mod interpreter;
pub mod limits;
pub mod literal;
pub mod output;
pub mod parser;
pub mod value;

pub use document::Translator;
pub use env::Environment;
pub use error::{ConfigError, ExprError, Position};
pub use limits::Limits;
pub use output::Document;
pub use value::Value;

// ── Core API ───────────────────────────────────────────────────────

/// Translate a document with the default limits.
pub fn translate(input: &str) -> Result<Document, ConfigError> {
    Translator::new().translate(input)
}

/// Translate a document with custom expression limits.
pub fn translate_with_limits(input: &str, limits: Limits) -> Result<Document, ConfigError> {
    Translator::with_limits(limits).translate(input)
}
