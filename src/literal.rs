//! Parsing of value text on the right of `=` and the left of `->`.

use crate::env::Environment;
use crate::error::ConfigError;
use crate::limits::Limits;
use crate::value::Value;

const LIST_OPEN: &str = "list(";

/// Parse a trimmed value fragment.
///
/// Recognition order is fixed: integer, quoted string, `list(...)`, then a
/// reference to an already bound name. References resolve to a copy of the
/// current value, so rebinding the source later does not affect it.
///
/// `list(...)` literals nested deeper than `limits.max_depth` are rejected.
pub fn parse_value(text: &str, env: &Environment, limits: &Limits) -> Result<Value, ConfigError> {
    parse_nested(text, env, limits.max_depth, 0)
}

fn parse_nested(
    text: &str,
    env: &Environment,
    max_depth: usize,
    depth: usize,
) -> Result<Value, ConfigError> {
    if is_integer_literal(text) {
        return text
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| ConfigError::IntegerOutOfRange {
                value: text.to_string(),
            });
    }

    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        return Ok(Value::Text(text[1..text.len() - 1].to_string()));
    }

    if text.starts_with(LIST_OPEN) && text.ends_with(')') {
        if depth >= max_depth {
            return Err(ConfigError::ListTooDeep { max_depth });
        }
        let inner = &text[LIST_OPEN.len()..text.len() - 1];
        if inner.trim().is_empty() {
            return Ok(Value::List(Vec::new()));
        }
        return split_items(inner)
            .into_iter()
            .map(|item| parse_nested(item.trim(), env, max_depth, depth + 1))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List);
    }

    if let Some(value) = env.get(text) {
        return Ok(value.clone());
    }

    Err(ConfigError::UnknownValue {
        value: text.to_string(),
    })
}

fn is_integer_literal(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

/// Split list items on commas that are outside nested `(...)` and outside
/// double-quoted strings.
fn split_items(inner: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut start = 0;

    for (i, ch) in inner.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => depth = depth.saturating_sub(1),
            ',' if !in_string && depth == 0 => {
                items.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(&inner[start..]);
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Value, ConfigError> {
        parse_value(text, &Environment::new(), &Limits::default())
    }

    #[test]
    fn integers() {
        assert_eq!(parse("42"), Ok(Value::Integer(42)));
        assert_eq!(parse("007"), Ok(Value::Integer(7)));
        assert!(matches!(parse("-3"), Err(ConfigError::UnknownValue { .. })));
        assert!(matches!(parse("1.5"), Err(ConfigError::UnknownValue { .. })));
    }

    #[test]
    fn integer_overflow_is_reported() {
        assert_eq!(
            parse("99999999999999999999"),
            Err(ConfigError::IntegerOutOfRange {
                value: "99999999999999999999".into()
            })
        );
    }

    #[test]
    fn strings_keep_inner_text_verbatim() {
        assert_eq!(parse(r#""abc""#), Ok(Value::Text("abc".into())));
        assert_eq!(parse(r#""a\nb""#), Ok(Value::Text(r"a\nb".into())));
        assert_eq!(parse(r#""""#), Ok(Value::Text(String::new())));
        assert!(parse("\"").is_err());
    }

    #[test]
    fn nested_lists() {
        assert_eq!(
            parse("list(1, 2, list(3,4))"),
            Ok(Value::List(vec![
                Value::Integer(1),
                Value::Integer(2),
                Value::List(vec![Value::Integer(3), Value::Integer(4)]),
            ]))
        );
    }

    #[test]
    fn commas_inside_strings_do_not_split() {
        assert_eq!(
            parse(r#"list("a,b", "c")"#),
            Ok(Value::List(vec![Value::Text("a,b".into()), Value::Text("c".into())]))
        );
    }

    #[test]
    fn empty_list() {
        assert_eq!(parse("list()"), Ok(Value::List(vec![])));
        assert_eq!(parse("list(  )"), Ok(Value::List(vec![])));
    }

    #[test]
    fn trailing_comma_is_an_unknown_value() {
        assert_eq!(
            parse("list(1,)"),
            Err(ConfigError::UnknownValue { value: String::new() })
        );
    }

    #[test]
    fn references_copy_current_value() {
        let mut env = Environment::new();
        env.bind("base", Value::Integer(10));
        assert_eq!(parse_value("base", &env, &Limits::default()), Ok(Value::Integer(10)));
        assert_eq!(
            parse_value("list(base, 1)", &env, &Limits::default()),
            Ok(Value::List(vec![Value::Integer(10), Value::Integer(1)]))
        );
    }

    #[test]
    fn list_nesting_is_limited() {
        let nested = |depth: usize| format!("{}1{}", "list(".repeat(depth), ")".repeat(depth));
        let limits = Limits::default().with_max_depth(3);
        let env = Environment::new();
        assert!(parse_value(&nested(3), &env, &limits).is_ok());
        assert_eq!(
            parse_value(&nested(4), &env, &limits),
            Err(ConfigError::ListTooDeep { max_depth: 3 })
        );
        assert_eq!(
            parse(&nested(50_000)),
            Err(ConfigError::ListTooDeep { max_depth: 128 })
        );
    }

    #[test]
    fn unknown_bare_word() {
        assert_eq!(
            parse("nothing"),
            Err(ConfigError::UnknownValue {
                value: "nothing".into()
            })
        );
    }
}
