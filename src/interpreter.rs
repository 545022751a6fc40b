use crate::ast::*;
use crate::builtins::{self, Builtin};
use crate::env::Environment;
use crate::error::ExprError;
use crate::limits::Limits;
use crate::value::Value;
use std::cmp::Ordering;

/// Evaluate an expression tree against the bound variables.
///
/// Only `env` and the built-ins are visible. Evaluation never mutates the
/// environment.
pub fn evaluate(expr: &Expr, env: &Environment, limits: &Limits) -> Result<Value, ExprError> {
    Evaluator { env, limits }.eval(expr)
}

struct Evaluator<'a> {
    env: &'a Environment,
    limits: &'a Limits,
}

impl Evaluator<'_> {
    fn eval(&self, expr: &Expr) -> Result<Value, ExprError> {
        match expr {
            Expr::Integer(n) => Ok(Value::Integer(*n)),
            Expr::Float(x) => Ok(Value::Float(*x)),
            Expr::Str(s) => Ok(Value::Text(s.clone())),
            Expr::Bool(b) => Ok(Value::Boolean(*b)),
            Expr::List(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Expr::Name(name) => self.lookup(name),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                unary_op(*op, value)
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                self.binary_op(*op, left, right)
            }
            Expr::Compare { first, rest } => {
                let mut left = self.eval(first)?;
                for (op, operand) in rest {
                    let right = self.eval(operand)?;
                    if !compare(*op, &left, &right)? {
                        return Ok(Value::Boolean(false));
                    }
                    left = right;
                }
                Ok(Value::Boolean(true))
            }
            Expr::And(left, right) => {
                let left = self.eval(left)?;
                if left.is_truthy() {
                    self.eval(right)
                } else {
                    Ok(left)
                }
            }
            Expr::Or(left, right) => {
                let left = self.eval(left)?;
                if left.is_truthy() {
                    Ok(left)
                } else {
                    self.eval(right)
                }
            }
            Expr::Call { callee, args } => self.call(callee, args),
            Expr::Index { target, index } => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                index_value(&target, &index)
            }
            Expr::Slice {
                target,
                start,
                stop,
            } => {
                let target = self.eval(target)?;
                let start = self.eval_bound(start.as_deref())?;
                let stop = self.eval_bound(stop.as_deref())?;
                slice_value(&target, start, stop)
            }
        }
    }

    /// Built-in names shadow variables, and are not values themselves.
    fn lookup(&self, name: &str) -> Result<Value, ExprError> {
        if Builtin::from_name(name).is_some() {
            return Err(ExprError::type_error(format!(
                "built-in function '{}' can only be called",
                name
            )));
        }
        self.env
            .get(name)
            .cloned()
            .ok_or_else(|| ExprError::UnknownName(name.to_string()))
    }

    fn call(&self, callee: &Expr, args: &[Expr]) -> Result<Value, ExprError> {
        let builtin = match callee {
            Expr::Name(name) => match Builtin::from_name(name) {
                Some(builtin) => builtin,
                None => {
                    let value = self.lookup(name)?;
                    return Err(ExprError::NotCallable(value.type_name().to_string()));
                }
            },
            other => {
                let value = self.eval(other)?;
                return Err(ExprError::NotCallable(value.type_name().to_string()));
            }
        };
        let args = args
            .iter()
            .map(|arg| self.eval(arg))
            .collect::<Result<Vec<_>, _>>()?;
        builtins::call(builtin, args)
    }

    fn eval_bound(&self, bound: Option<&Expr>) -> Result<Option<i64>, ExprError> {
        match bound {
            None => Ok(None),
            Some(expr) => match self.eval(expr)? {
                Value::Integer(n) => Ok(Some(n)),
                Value::Boolean(b) => Ok(Some(i64::from(b))),
                other => Err(ExprError::type_error(format!(
                    "slice indices must be integers, not {}",
                    other.type_name()
                ))),
            },
        }
    }

    fn binary_op(&self, op: BinaryOp, left: Value, right: Value) -> Result<Value, ExprError> {
        match (op, left, right) {
            (BinaryOp::Add, Value::Text(mut a), Value::Text(b)) => {
                self.check_len(a.chars().count().saturating_add(b.chars().count()))?;
                a.push_str(&b);
                Ok(Value::Text(a))
            }
            (BinaryOp::Add, Value::List(mut a), Value::List(b)) => {
                self.check_len(items_weight(&a).saturating_add(items_weight(&b)))?;
                a.extend(b);
                Ok(Value::List(a))
            }
            (BinaryOp::Mul, Value::Text(s), count) | (BinaryOp::Mul, count, Value::Text(s))
                if as_count(&count).is_some() =>
            {
                let n = repeat_count(&count);
                if s.is_empty() {
                    return Ok(Value::Text(s));
                }
                self.check_len(s.chars().count().saturating_mul(n))?;
                Ok(Value::Text(s.repeat(n)))
            }
            (BinaryOp::Mul, Value::List(items), count)
            | (BinaryOp::Mul, count, Value::List(items))
                if as_count(&count).is_some() =>
            {
                let n = repeat_count(&count);
                if items.is_empty() {
                    return Ok(Value::List(items));
                }
                self.check_len(items_weight(&items).saturating_mul(n))?;
                let mut out = Vec::with_capacity(items.len() * n);
                for _ in 0..n {
                    out.extend(items.iter().cloned());
                }
                Ok(Value::List(out))
            }
            (op, left, right) => match (Num::of(&left), Num::of(&right)) {
                (Some(a), Some(b)) => arithmetic(op, a, b),
                _ => Err(ExprError::type_error(format!(
                    "unsupported operand type(s) for {}: '{}' and '{}'",
                    op.symbol(),
                    left.type_name(),
                    right.type_name()
                ))),
            },
        }
    }

    /// `len` is the total weight of the result, see [`weight`].
    fn check_len(&self, len: usize) -> Result<(), ExprError> {
        if len > self.limits.max_sequence_len {
            return Err(ExprError::Limit(format!(
                "result of size {} exceeds the limit of {}",
                len, self.limits.max_sequence_len
            )));
        }
        Ok(())
    }
}

/// Elements and characters held by a value, counting every nested level.
fn weight(value: &Value) -> usize {
    match value {
        Value::Text(s) => s.chars().count(),
        Value::List(items) => items_weight(items),
        _ => 0,
    }
}

fn items_weight(items: &[Value]) -> usize {
    items
        .iter()
        .fold(items.len(), |total, item| total.saturating_add(weight(item)))
}

// ── Numbers ─────────────────────────────────────────────────────────

/// Numeric view of a value. Booleans count as integers.
#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(value: &Value) -> Option<Num> {
        match value {
            Value::Integer(n) => Some(Num::Int(*n)),
            Value::Boolean(b) => Some(Num::Int(i64::from(*b))),
            Value::Float(x) => Some(Num::Float(*x)),
            _ => None,
        }
    }

    fn to_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(x) => x,
        }
    }
}

fn as_count(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(n) => Some(*n),
        Value::Boolean(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Negative repeat counts behave like zero.
fn repeat_count(value: &Value) -> usize {
    as_count(value)
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0)
}

fn arithmetic(op: BinaryOp, a: Num, b: Num) -> Result<Value, ExprError> {
    if let (Num::Int(a), Num::Int(b)) = (a, b) {
        return int_arithmetic(op, a, b);
    }
    let (a, b) = (a.to_f64(), b.to_f64());
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            a / b
        }
        BinaryOp::FloorDiv => {
            if b == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            (a / b).floor()
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            let r = a % b;
            if r != 0.0 && (r < 0.0) != (b < 0.0) {
                r + b
            } else {
                r
            }
        }
        BinaryOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            a.powf(b)
        }
    };
    Ok(Value::Float(result))
}

fn int_arithmetic(op: BinaryOp, a: i64, b: i64) -> Result<Value, ExprError> {
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => {
            if b == 0 {
                return Err(ExprError::DivisionByZero);
            }
            return Ok(Value::Float(a as f64 / b as f64));
        }
        BinaryOp::FloorDiv => {
            if b == 0 {
                return Err(ExprError::DivisionByZero);
            }
            floor_div(a, b)
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(ExprError::DivisionByZero);
            }
            floor_mod(a, b)
        }
        BinaryOp::Pow => {
            if b < 0 {
                if a == 0 {
                    return Err(ExprError::DivisionByZero);
                }
                return Ok(Value::Float((a as f64).powf(b as f64)));
            }
            u32::try_from(b).ok().and_then(|exp| a.checked_pow(exp))
        }
    };
    result.map(Value::Integer).ok_or(ExprError::Overflow)
}

/// Division rounding toward negative infinity.
fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    let r = a.checked_rem(b)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

/// Remainder taking the sign of the divisor.
fn floor_mod(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        r.checked_add(b)
    } else {
        Some(r)
    }
}

fn unary_op(op: UnaryOp, value: Value) -> Result<Value, ExprError> {
    match (op, Num::of(&value)) {
        (UnaryOp::Not, _) => Ok(Value::Boolean(!value.is_truthy())),
        (UnaryOp::Neg, Some(Num::Int(n))) => {
            n.checked_neg().map(Value::Integer).ok_or(ExprError::Overflow)
        }
        (UnaryOp::Neg, Some(Num::Float(x))) => Ok(Value::Float(-x)),
        (UnaryOp::Pos, Some(Num::Int(n))) => Ok(Value::Integer(n)),
        (UnaryOp::Pos, Some(Num::Float(x))) => Ok(Value::Float(x)),
        (op, None) => Err(ExprError::type_error(format!(
            "bad operand type for unary {}: '{}'",
            if op == UnaryOp::Neg { "-" } else { "+" },
            value.type_name()
        ))),
    }
}

// ── Comparisons ─────────────────────────────────────────────────────

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, ExprError> {
    match op {
        CompareOp::Eq => Ok(values_equal(left, right)),
        CompareOp::NotEq => Ok(!values_equal(left, right)),
        CompareOp::In => contains(right, left),
        CompareOp::NotIn => contains(right, left).map(|found| !found),
        CompareOp::Lt | CompareOp::LtEq | CompareOp::Gt | CompareOp::GtEq => {
            Ok(match ordering(left, right, op.symbol())? {
                // NaN compares false with everything.
                None => false,
                Some(ord) => match op {
                    CompareOp::Lt => ord == Ordering::Less,
                    CompareOp::LtEq => ord != Ordering::Greater,
                    CompareOp::Gt => ord == Ordering::Greater,
                    _ => ord != Ordering::Less,
                },
            })
        }
    }
}

/// Equality across types is false, except that numbers compare by value.
pub(crate) fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Text(a), Value::Text(b)) => a == b,
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        _ => match (Num::of(left), Num::of(right)) {
            (Some(Num::Int(a)), Some(Num::Int(b))) => a == b,
            (Some(a), Some(b)) => a.to_f64() == b.to_f64(),
            _ => false,
        },
    }
}

/// Order two values. `Ok(None)` means unordered (a NaN was involved).
pub(crate) fn ordering(
    left: &Value,
    right: &Value,
    symbol: &str,
) -> Result<Option<Ordering>, ExprError> {
    match (left, right) {
        (Value::Text(a), Value::Text(b)) => Ok(Some(a.cmp(b))),
        (Value::List(a), Value::List(b)) => {
            for (x, y) in a.iter().zip(b) {
                if !values_equal(x, y) {
                    return ordering(x, y, symbol);
                }
            }
            Ok(Some(a.len().cmp(&b.len())))
        }
        _ => match (Num::of(left), Num::of(right)) {
            (Some(Num::Int(a)), Some(Num::Int(b))) => Ok(Some(a.cmp(&b))),
            (Some(a), Some(b)) => Ok(a.to_f64().partial_cmp(&b.to_f64())),
            _ => Err(ExprError::type_error(format!(
                "'{}' not supported between instances of '{}' and '{}'",
                symbol,
                left.type_name(),
                right.type_name()
            ))),
        },
    }
}

fn contains(container: &Value, item: &Value) -> Result<bool, ExprError> {
    match container {
        Value::List(items) => Ok(items.iter().any(|x| values_equal(x, item))),
        Value::Text(haystack) => match item {
            Value::Text(needle) => Ok(haystack.contains(needle.as_str())),
            other => Err(ExprError::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        other => Err(ExprError::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

// ── Subscripts ──────────────────────────────────────────────────────

fn index_value(target: &Value, index: &Value) -> Result<Value, ExprError> {
    let i = match index {
        Value::Integer(n) => *n,
        Value::Boolean(b) => i64::from(*b),
        other => {
            return Err(ExprError::type_error(format!(
                "{} indices must be integers, not {}",
                target.type_name(),
                other.type_name()
            )))
        }
    };
    match target {
        Value::List(items) => resolve_index(i, items.len())
            .map(|at| items[at].clone())
            .ok_or_else(|| ExprError::Index("list index out of range".to_string())),
        Value::Text(s) => {
            let len = s.chars().count();
            resolve_index(i, len)
                .and_then(|at| s.chars().nth(at))
                .map(|ch| Value::Text(ch.to_string()))
                .ok_or_else(|| ExprError::Index("string index out of range".to_string()))
        }
        other => Err(ExprError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

/// Map a possibly negative index onto `0..len`.
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let at = if index < 0 { index + len } else { index };
    if (0..len).contains(&at) {
        usize::try_from(at).ok()
    } else {
        None
    }
}

fn slice_value(target: &Value, start: Option<i64>, stop: Option<i64>) -> Result<Value, ExprError> {
    match target {
        Value::List(items) => {
            let (from, to) = clamp_slice(start, stop, items.len());
            Ok(Value::List(items[from..to].to_vec()))
        }
        Value::Text(s) => {
            let (from, to) = clamp_slice(start, stop, s.chars().count());
            Ok(Value::Text(s.chars().skip(from).take(to - from).collect()))
        }
        other => Err(ExprError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

/// Slice bounds never fail: out-of-range bounds clamp to the sequence.
fn clamp_slice(start: Option<i64>, stop: Option<i64>, len: usize) -> (usize, usize) {
    let clamp = |bound: i64| -> usize {
        let len_i = i64::try_from(len).unwrap_or(i64::MAX);
        let at = if bound < 0 {
            bound.saturating_add(len_i).max(0)
        } else {
            bound.min(len_i)
        };
        usize::try_from(at).unwrap_or(0)
    };
    let from = start.map_or(0, clamp);
    let to = stop.map_or(len, clamp);
    (from, to.max(from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expression;

    fn eval_in(src: &str, env: &Environment) -> Result<Value, ExprError> {
        let limits = Limits::default();
        let expr = parse_expression(src, limits.max_depth)?;
        evaluate(&expr, env, &limits)
    }

    fn eval(src: &str) -> Result<Value, ExprError> {
        eval_in(src, &Environment::new())
    }

    fn ints(ns: &[i64]) -> Value {
        Value::List(ns.iter().map(|n| Value::Integer(*n)).collect())
    }

    #[test]
    fn integer_arithmetic() {
        assert_eq!(eval("1 + 2 * 3"), Ok(Value::Integer(7)));
        assert_eq!(eval("(1 + 2) * 3"), Ok(Value::Integer(9)));
        assert_eq!(eval("2 ** 10"), Ok(Value::Integer(1024)));
        assert_eq!(eval("-2 ** 2"), Ok(Value::Integer(-4)));
        assert_eq!(eval("7 // 2"), Ok(Value::Integer(3)));
        assert_eq!(eval("-7 // 2"), Ok(Value::Integer(-4)));
        assert_eq!(eval("-7 % 3"), Ok(Value::Integer(2)));
        assert_eq!(eval("7 % -3"), Ok(Value::Integer(-2)));
    }

    #[test]
    fn true_division_yields_float() {
        assert_eq!(eval("7 / 2"), Ok(Value::Float(3.5)));
        assert_eq!(eval("4 / 2"), Ok(Value::Float(2.0)));
        assert_eq!(eval("2 ** -1"), Ok(Value::Float(0.5)));
    }

    #[test]
    fn arithmetic_errors() {
        assert_eq!(eval("1 / 0"), Err(ExprError::DivisionByZero));
        assert_eq!(eval("1 % 0"), Err(ExprError::DivisionByZero));
        assert_eq!(eval("9223372036854775807 + 1"), Err(ExprError::Overflow));
        assert!(matches!(eval("1 + 'a'"), Err(ExprError::Type(_))));
        assert!(matches!(eval("-'a'"), Err(ExprError::Type(_))));
    }

    #[test]
    fn sequences() {
        assert_eq!(eval("'ab' + 'cd'"), Ok(Value::Text("abcd".into())));
        assert_eq!(eval("'ab' * 3"), Ok(Value::Text("ababab".into())));
        assert_eq!(eval("[1, 2] + [3]"), Ok(ints(&[1, 2, 3])));
        assert_eq!(eval("2 * [0]"), Ok(ints(&[0, 0])));
        assert_eq!(eval("[1] * -1"), Ok(ints(&[])));
    }

    #[test]
    fn sequence_limit() {
        let limits = Limits::default().with_max_sequence_len(4);
        let expr = parse_expression("'ab' * 3", limits.max_depth).unwrap();
        assert!(matches!(
            evaluate(&expr, &Environment::new(), &limits),
            Err(ExprError::Limit(_))
        ));
    }

    #[test]
    fn sequence_limit_counts_nested_elements() {
        let limits = Limits::default().with_max_sequence_len(10);
        let run = |src: &str| {
            let expr = parse_expression(src, limits.max_depth).unwrap();
            evaluate(&expr, &Environment::new(), &limits)
        };
        assert!(run("[0] * 10").is_ok());
        assert!(matches!(run("[[0] * 10] * 10"), Err(ExprError::Limit(_))));
        assert!(matches!(run("['abcde'] * 2"), Err(ExprError::Limit(_))));
        assert!(matches!(run("[[0] * 6] + [[0] * 6]"), Err(ExprError::Limit(_))));
        assert!(matches!(
            run("[[[0] * 1000000] * 1000000] * 1"),
            Err(ExprError::Limit(_))
        ));
    }

    #[test]
    fn booleans_and_comparisons() {
        assert_eq!(eval("1 < 2 < 3"), Ok(Value::Boolean(true)));
        assert_eq!(eval("1 < 3 < 2"), Ok(Value::Boolean(false)));
        assert_eq!(eval("1 == 1.0"), Ok(Value::Boolean(true)));
        assert_eq!(eval("1 == '1'"), Ok(Value::Boolean(false)));
        assert_eq!(eval("'abc' < 'abd'"), Ok(Value::Boolean(true)));
        assert_eq!(eval("[1, 2] < [1, 3]"), Ok(Value::Boolean(true)));
        assert_eq!(eval("True + 1"), Ok(Value::Integer(2)));
        assert_eq!(eval("0 or 'x'"), Ok(Value::Text("x".into())));
        assert_eq!(eval("0 and 1 / 0"), Ok(Value::Integer(0)));
        assert_eq!(eval("not []"), Ok(Value::Boolean(true)));
        assert!(matches!(eval("1 < 'a'"), Err(ExprError::Type(_))));
    }

    #[test]
    fn membership() {
        assert_eq!(eval("2 in [1, 2]"), Ok(Value::Boolean(true)));
        assert_eq!(eval("'b' in 'abc'"), Ok(Value::Boolean(true)));
        assert_eq!(eval("3 not in [1, 2]"), Ok(Value::Boolean(true)));
        assert!(matches!(eval("1 in 5"), Err(ExprError::Type(_))));
    }

    #[test]
    fn indexing_and_slicing() {
        assert_eq!(eval("[10, 20, 30][-1]"), Ok(Value::Integer(30)));
        assert_eq!(eval("'hello'[1]"), Ok(Value::Text("e".into())));
        assert_eq!(eval("[1, 2, 3, 4][1:3]"), Ok(ints(&[2, 3])));
        assert_eq!(eval("[1, 2, 3][-2:]"), Ok(ints(&[2, 3])));
        assert_eq!(eval("[1, 2, 3][5:]"), Ok(ints(&[])));
        assert_eq!(eval("'hello'[:2]"), Ok(Value::Text("he".into())));
        assert!(matches!(eval("[1][3]"), Err(ExprError::Index(_))));
        assert!(matches!(eval("5[0]"), Err(ExprError::Type(_))));
    }

    #[test]
    fn names_resolve_against_environment() {
        let mut env = Environment::new();
        env.bind("x", Value::Integer(5));
        env.bind("y", ints(&[3, 1, 2]));
        assert_eq!(eval_in("x + 1", &env), Ok(Value::Integer(6)));
        assert_eq!(eval_in("sort(y)", &env), Ok(ints(&[1, 2, 3])));
        assert_eq!(eval_in("y[0] * x", &env), Ok(Value::Integer(15)));
        assert_eq!(
            eval_in("missing", &env),
            Err(ExprError::UnknownName("missing".into()))
        );
    }

    #[test]
    fn builtins_shadow_variables() {
        let mut env = Environment::new();
        env.bind("ord", Value::Integer(1));
        assert_eq!(eval_in("ord('A')", &env), Ok(Value::Integer(65)));
        assert!(matches!(eval_in("ord", &env), Err(ExprError::Type(_))));
    }

    #[test]
    fn calling_a_value_fails() {
        let mut env = Environment::new();
        env.bind("x", Value::Integer(5));
        assert_eq!(
            eval_in("x(1)", &env),
            Err(ExprError::NotCallable("int".into()))
        );
        assert_eq!(eval_in("nope(1)", &env), Err(ExprError::UnknownName("nope".into())));
    }
}
