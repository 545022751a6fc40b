use crate::comments::strip_comments;
use crate::env::Environment;
use crate::error::ConfigError;
use crate::interpreter::evaluate;
use crate::limits::Limits;
use crate::literal::parse_value;
use crate::output::{Document, OutputMapping};
use crate::parser::parse_expression;
use crate::value::Value;
use regex::Regex;
use std::sync::LazyLock;

const CONSTANT_ARROW: &str = "->";
const EXPRESSION_OPEN: &str = "^{";
const EXPRESSION_CLOSE: &str = "}";

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap_or_else(|e| unreachable!("static pattern: {e}"))
});

/// How a single trimmed, non-empty line is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    /// `value -> name`
    Constant { value: &'a str, name: &'a str },
    /// `^{expression}`, queued until the whole document has been scanned
    Expression(&'a str),
    /// `key = value`, or anything else (which then fails as malformed)
    Assignment(&'a str),
}

/// Classify a trimmed line. A `->` anywhere wins over every other form.
pub fn classify(line: &str) -> Line<'_> {
    if let Some((value, name)) = line.split_once(CONSTANT_ARROW) {
        return Line::Constant {
            value: value.trim(),
            name: name.trim(),
        };
    }
    if line.starts_with(EXPRESSION_OPEN) && line.ends_with(EXPRESSION_CLOSE) {
        return Line::Expression(line);
    }
    Line::Assignment(line)
}

/// Text of an expression line without its `^{` and `}` markers.
pub fn expression_text(line: &str) -> &str {
    line.strip_prefix(EXPRESSION_OPEN)
        .and_then(|rest| rest.strip_suffix(EXPRESSION_CLOSE))
        .unwrap_or(line)
        .trim()
}

/// Line boundaries: `\n`, `\r`, the vertical tab and form feed, the ASCII
/// file/group/record separators, NEL and the Unicode line and paragraph
/// separators. `\r\n` yields an empty line in between, which is skipped.
fn is_line_break(ch: char) -> bool {
    matches!(
        ch,
        '\n' | '\r'
            | '\x0b'
            | '\x0c'
            | '\x1c'
            | '\x1d'
            | '\x1e'
            | '\u{85}'
            | '\u{2028}'
            | '\u{2029}'
    )
}

pub fn is_identifier(key: &str) -> bool {
    IDENTIFIER.is_match(key)
}

/// Translation state for one document.
///
/// A translator is consumed by [`Translator::translate`], so bindings never
/// leak from one document into the next.
#[derive(Debug, Default)]
pub struct Translator {
    env: Environment,
    output: OutputMapping,
    deferred: Vec<String>,
    limits: Limits,
}

impl Translator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: Limits) -> Self {
        Translator {
            limits,
            ..Self::default()
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Translate a whole document.
    ///
    /// Every declaration and assignment is bound first; `^{...}` lines are
    /// evaluated afterwards in document order, so they may refer to names
    /// defined anywhere in the file. The first error aborts the translation.
    pub fn translate(mut self, input: &str) -> Result<Document, ConfigError> {
        let text = strip_comments(input);
        for raw in text.split(is_line_break) {
            self.process_line(raw)?;
        }
        self.evaluate_deferred()?;
        Ok(self.output.finish())
    }

    /// Handle one line of de-commented text during the scanning pass.
    pub fn process_line(&mut self, raw: &str) -> Result<(), ConfigError> {
        let line = raw.trim();
        if line.is_empty() {
            return Ok(());
        }
        match classify(line) {
            Line::Constant { value, name } => {
                tracing::debug!(name, "constant declaration");
                self.declare_constant(value, name)
            }
            Line::Expression(text) => {
                tracing::debug!(line = text, "deferring expression");
                self.deferred.push(text.to_string());
                Ok(())
            }
            Line::Assignment(text) => {
                tracing::debug!(line = text, "assignment");
                self.assign(text).map(|_| ())
            }
        }
    }

    /// Bind `name` to the parsed `value` text. The name is not validated and
    /// never reaches the output directly.
    pub fn declare_constant(&mut self, value: &str, name: &str) -> Result<(), ConfigError> {
        let value = parse_value(value, &self.env, &self.limits)?;
        self.env.bind(name, value);
        Ok(())
    }

    /// Handle a `key = value` line, binding the key in both the environment
    /// and the output.
    pub fn assign(&mut self, line: &str) -> Result<(String, Value), ConfigError> {
        let (key, value) = line.split_once('=').ok_or_else(|| ConfigError::Format {
            line: line.to_string(),
        })?;
        let (key, value) = (key.trim(), value.trim());

        if !is_identifier(key) {
            return Err(ConfigError::InvalidKey {
                key: key.to_string(),
            });
        }

        let value = parse_value(value, &self.env, &self.limits)?;
        self.env.bind(key, value.clone());
        self.output.insert(key, value.clone());
        Ok((key.to_string(), value))
    }

    fn evaluate_deferred(&mut self) -> Result<(), ConfigError> {
        for line in std::mem::take(&mut self.deferred) {
            let (expression, value) = self.evaluate_line(&line)?;
            self.output.insert(expression, value);
        }
        Ok(())
    }

    /// Evaluate one queued `^{...}` line, returning its key and result.
    pub fn evaluate_line(&self, line: &str) -> Result<(String, Value), ConfigError> {
        let expression = expression_text(line);
        let wrap = |source| ConfigError::Expression {
            expression: expression.to_string(),
            source,
        };
        let expr = parse_expression(expression, self.limits.max_depth).map_err(wrap)?;
        let value = evaluate(&expr, &self.env, &self.limits).map_err(wrap)?;
        tracing::debug!(expression, result = %value, "evaluated expression");
        Ok((expression.to_string(), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_priority() {
        assert_eq!(
            classify("5 -> x"),
            Line::Constant {
                value: "5",
                name: "x"
            }
        );
        // `->` wins even inside an expression or a string.
        assert!(matches!(classify("^{a -> b}"), Line::Constant { .. }));
        assert!(matches!(classify(r#"s = "->""#), Line::Constant { .. }));
        assert_eq!(classify("^{x + 1}"), Line::Expression("^{x + 1}"));
        assert_eq!(classify("^{x"), Line::Assignment("^{x"));
        assert_eq!(classify("a = 1"), Line::Assignment("a = 1"));
    }

    #[test]
    fn constant_splits_on_first_arrow() {
        assert_eq!(
            classify("1 -> a -> b"),
            Line::Constant {
                value: "1",
                name: "a -> b"
            }
        );
    }

    #[test]
    fn expression_markers_are_stripped() {
        assert_eq!(expression_text("^{ x + 1 }"), "x + 1");
        assert_eq!(expression_text("^{}"), "");
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("_a1"));
        assert!(is_identifier("Name"));
        assert!(!is_identifier("1bad"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a\n"));
    }

    #[test]
    fn assignment_splits_on_first_equals() {
        let mut t = Translator::new();
        assert_eq!(
            t.assign(r#"s = "a=b""#),
            Ok(("s".to_string(), Value::Text("a=b".into())))
        );
    }

    #[test]
    fn every_line_break_separates_lines() {
        for sep in ["\n", "\r\n", "\r", "\x0b", "\x0c", "\u{2028}", "\u{2029}", "\u{85}"] {
            let doc = Translator::new()
                .translate(&format!("a = 1{sep}b = 2"))
                .unwrap_or_else(|e| panic!("separator {sep:?}: {e}"));
            assert_eq!(doc.get("a"), Some(&Value::Integer(1)), "separator {sep:?}");
            assert_eq!(doc.get("b"), Some(&Value::Integer(2)), "separator {sep:?}");
        }
    }

    #[test]
    fn assignment_errors() {
        let mut t = Translator::new();
        assert_eq!(
            t.assign("just words"),
            Err(ConfigError::Format {
                line: "just words".into()
            })
        );
        assert_eq!(
            t.assign("1bad = 1"),
            Err(ConfigError::InvalidKey { key: "1bad".into() })
        );
        assert_eq!(
            t.assign("a = b"),
            Err(ConfigError::UnknownValue { value: "b".into() })
        );
    }

    #[test]
    fn constants_bind_environment_only() {
        let mut t = Translator::new();
        t.declare_constant("list(1, 2)", "not a name!").unwrap();
        assert!(t.environment().contains("not a name!"));
        assert!(t.output.is_empty());
    }

    #[test]
    fn expression_errors_name_the_expression() {
        let t = Translator::new();
        let err = t.evaluate_line("^{ missing * 2 }").unwrap_err();
        assert_eq!(
            err,
            ConfigError::Expression {
                expression: "missing * 2".into(),
                source: crate::error::ExprError::UnknownName("missing".into()),
            }
        );
    }
}
