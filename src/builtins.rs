//! The fixed set of functions callable from `^{...}` expressions.

use crate::error::ExprError;
use crate::interpreter::ordering;
use crate::value::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// `sort(seq)`: stable ascending sort into a new list
    Sort,
    /// `ord(ch)`: code point of a one-character string
    Ord,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Builtin> {
        match name {
            "sort" => Some(Builtin::Sort),
            "ord" => Some(Builtin::Ord),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Sort => "sort",
            Builtin::Ord => "ord",
        }
    }
}

pub fn call(builtin: Builtin, args: Vec<Value>) -> Result<Value, ExprError> {
    let arg = single_argument(builtin, args)?;
    match builtin {
        Builtin::Sort => sort(arg),
        Builtin::Ord => ord(arg),
    }
}

fn single_argument(builtin: Builtin, args: Vec<Value>) -> Result<Value, ExprError> {
    let given = args.len();
    let mut args = args.into_iter();
    match (args.next(), args.next()) {
        (Some(arg), None) => Ok(arg),
        _ => Err(ExprError::type_error(format!(
            "{}() takes exactly one argument ({} given)",
            builtin.name(),
            given
        ))),
    }
}

fn sort(arg: Value) -> Result<Value, ExprError> {
    let items = match arg {
        Value::List(items) => items,
        Value::Text(s) => s.chars().map(|ch| Value::Text(ch.to_string())).collect(),
        other => {
            return Err(ExprError::type_error(format!(
                "'{}' object is not iterable",
                other.type_name()
            )))
        }
    };
    merge_sort(items).map(Value::List)
}

/// Stable merge sort with a comparison that may fail on mixed types.
/// An element moves ahead of an earlier one only when strictly less.
fn merge_sort(mut items: Vec<Value>) -> Result<Vec<Value>, ExprError> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(items)?;
    let right = merge_sort(right)?;

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let take_right = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => ordering(r, l, "<")? == Some(Ordering::Less),
            (Some(_), None) => false,
            (None, Some(_)) => true,
            (None, None) => break,
        };
        let next = if take_right { right.next() } else { left.next() };
        merged.extend(next);
    }
    Ok(merged)
}

fn ord(arg: Value) -> Result<Value, ExprError> {
    match &arg {
        Value::Text(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) => Ok(Value::Integer(i64::from(u32::from(ch)))),
                _ => Err(ExprError::type_error(format!(
                    "ord() expected a character, but string of length {} found",
                    s.chars().count()
                ))),
            }
        }
        other => Err(ExprError::type_error(format!(
            "ord() expected string of length 1, but {} found",
            other.type_name()
        ))),
    }
}
