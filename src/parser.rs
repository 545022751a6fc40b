use crate::ast::*;
use crate::error::{ExprError, Position};

/// Parser state: tracks position in the expression text and how deep the
/// tree being built has grown.
struct Parser<'a> {
    input: &'a str,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

/// Parse the body of a `^{...}` line into an expression tree.
///
/// Trees deeper than `max_depth` (nesting plus operator chains) are
/// rejected with `ExprError::Limit`, which also bounds evaluation depth.
pub fn parse_expression(input: &str, max_depth: usize) -> Result<Expr, ExprError> {
    let mut parser = Parser {
        input,
        pos: 0,
        depth: 0,
        max_depth,
    };

    parser.skip_ws();
    let expr = parser.parse_or()?;
    parser.skip_ws();
    if let Some(ch) = parser.peek_char() {
        return Err(parser.error_point(format!("Unexpected '{}'", ch)));
    }
    Ok(expr)
}

impl<'a> Parser<'a> {
    // ── Helpers ──────────────────────────────────────────────────────

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.remaining().chars().nth(1)
    }

    fn advance(&mut self, n: usize) {
        self.pos += n;
    }

    fn starts_with(&self, s: &str) -> bool {
        self.remaining().starts_with(s)
    }

    fn eat_char(&mut self, ch: char) -> bool {
        if self.peek_char() == Some(ch) {
            self.advance(ch.len_utf8());
            true
        } else {
            false
        }
    }

    fn eat_str(&mut self, s: &str) -> bool {
        if self.starts_with(s) {
            self.advance(s.len());
            true
        } else {
            false
        }
    }

    fn expect_char(&mut self, ch: char) -> Result<(), ExprError> {
        self.skip_ws();
        if self.eat_char(ch) {
            Ok(())
        } else {
            Err(self.error_point(format!("Expected '{}'", ch)))
        }
    }

    /// Consume `kw` only when it is a whole word.
    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.starts_with(kw) && !self.remaining()[kw.len()..].starts_with(is_ident_char) {
            self.advance(kw.len());
            true
        } else {
            false
        }
    }

    fn position(&self) -> Position {
        Position {
            column: self.input[..self.pos].chars().count(),
            offset: self.pos,
        }
    }

    fn error_point(&self, message: String) -> ExprError {
        ExprError::syntax(message, self.position())
    }

    fn skip_ws(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.advance(ch.len_utf8());
            } else {
                break;
            }
        }
    }

    /// Account for one more level of tree height.
    fn enter(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ExprError::Limit(format!(
                "expression is nested more than {} levels deep",
                self.max_depth
            )));
        }
        Ok(())
    }

    // ── Boolean operators ───────────────────────────────────────────

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let saved = self.depth;
        let mut left = self.parse_and()?;
        loop {
            self.skip_ws();
            if !self.eat_keyword("or") {
                break;
            }
            self.enter()?;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        self.depth = saved;
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let saved = self.depth;
        let mut left = self.parse_not()?;
        loop {
            self.skip_ws();
            if !self.eat_keyword("and") {
                break;
            }
            self.enter()?;
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        self.depth = saved;
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ExprError> {
        self.skip_ws();
        if self.eat_keyword("not") {
            let saved = self.depth;
            self.enter()?;
            let operand = self.parse_not()?;
            self.depth = saved;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    // ── Comparisons ─────────────────────────────────────────────────

    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let saved = self.depth;
        let first = self.parse_arith()?;
        let mut rest = Vec::new();
        while let Some(op) = self.parse_compare_op() {
            self.enter()?;
            let operand = self.parse_arith()?;
            rest.push((op, operand));
        }
        self.depth = saved;

        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn parse_compare_op(&mut self) -> Option<CompareOp> {
        self.skip_ws();
        for (token, op) in [
            ("==", CompareOp::Eq),
            ("!=", CompareOp::NotEq),
            ("<=", CompareOp::LtEq),
            (">=", CompareOp::GtEq),
            ("<", CompareOp::Lt),
            (">", CompareOp::Gt),
        ] {
            if self.eat_str(token) {
                return Some(op);
            }
        }
        if self.eat_keyword("in") {
            return Some(CompareOp::In);
        }
        let saved = self.pos;
        if self.eat_keyword("not") {
            self.skip_ws();
            if self.eat_keyword("in") {
                return Some(CompareOp::NotIn);
            }
            self.pos = saved;
        }
        None
    }

    // ── Arithmetic ──────────────────────────────────────────────────

    fn parse_arith(&mut self) -> Result<Expr, ExprError> {
        let saved = self.depth;
        let mut left = self.parse_term()?;
        loop {
            self.skip_ws();
            let op = if self.eat_char('+') {
                BinaryOp::Add
            } else if self.eat_char('-') {
                BinaryOp::Sub
            } else {
                break;
            };
            self.enter()?;
            let right = self.parse_term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.depth = saved;
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, ExprError> {
        let saved = self.depth;
        let mut left = self.parse_factor()?;
        loop {
            self.skip_ws();
            let op = if self.starts_with("**") {
                break;
            } else if self.eat_str("//") {
                BinaryOp::FloorDiv
            } else if self.eat_char('*') {
                BinaryOp::Mul
            } else if self.eat_char('/') {
                BinaryOp::Div
            } else if self.eat_char('%') {
                BinaryOp::Mod
            } else {
                break;
            };
            self.enter()?;
            let right = self.parse_factor()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.depth = saved;
        Ok(left)
    }

    /// Unary sign binds looser than `**`: `-2 ** 2` is `-(2 ** 2)`.
    fn parse_factor(&mut self) -> Result<Expr, ExprError> {
        self.skip_ws();
        let op = if self.eat_char('-') {
            UnaryOp::Neg
        } else if self.eat_char('+') {
            UnaryOp::Pos
        } else {
            return self.parse_power();
        };
        let saved = self.depth;
        self.enter()?;
        let operand = self.parse_factor()?;
        self.depth = saved;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    /// `**` is right-associative and its right operand may carry a sign.
    fn parse_power(&mut self) -> Result<Expr, ExprError> {
        let base = self.parse_postfix()?;
        self.skip_ws();
        if !self.eat_str("**") {
            return Ok(base);
        }
        let saved = self.depth;
        self.enter()?;
        let exponent = self.parse_factor()?;
        self.depth = saved;
        Ok(Expr::Binary {
            op: BinaryOp::Pow,
            left: Box::new(base),
            right: Box::new(exponent),
        })
    }

    // ── Calls and subscripts ────────────────────────────────────────

    fn parse_postfix(&mut self) -> Result<Expr, ExprError> {
        let saved = self.depth;
        let mut expr = self.parse_atom()?;
        loop {
            self.skip_ws();
            if self.eat_char('(') {
                self.enter()?;
                let args = self.parse_sequence(')')?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else if self.eat_char('[') {
                self.enter()?;
                expr = self.parse_subscript(expr)?;
            } else {
                break;
            }
        }
        self.depth = saved;
        Ok(expr)
    }

    /// Parse `[index]` or `[start:stop]`; the opening bracket is consumed.
    fn parse_subscript(&mut self, target: Expr) -> Result<Expr, ExprError> {
        self.skip_ws();
        let start = if self.peek_char() == Some(':') {
            None
        } else {
            Some(Box::new(self.parse_or()?))
        };

        self.skip_ws();
        if !self.eat_char(':') {
            self.expect_char(']')?;
            return match start {
                Some(index) => Ok(Expr::Index {
                    target: Box::new(target),
                    index,
                }),
                None => Err(self.error_point("Expected an index".to_string())),
            };
        }

        self.skip_ws();
        let stop = if self.peek_char() == Some(']') {
            None
        } else {
            Some(Box::new(self.parse_or()?))
        };
        self.expect_char(']')?;
        Ok(Expr::Slice {
            target: Box::new(target),
            start,
            stop,
        })
    }

    /// Comma-separated expressions up to `close`; a trailing comma is allowed.
    fn parse_sequence(&mut self, close: char) -> Result<Vec<Expr>, ExprError> {
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.eat_char(close) {
                return Ok(items);
            }
            items.push(self.parse_or()?);
            self.skip_ws();
            if self.eat_char(',') {
                continue;
            }
            self.expect_char(close)?;
            return Ok(items);
        }
    }

    // ── Atoms ───────────────────────────────────────────────────────

    fn parse_atom(&mut self) -> Result<Expr, ExprError> {
        self.skip_ws();
        match self.peek_char() {
            Some(ch) if ch.is_ascii_digit() => self.parse_number(),
            Some('.') if self.peek_second().map_or(false, |c| c.is_ascii_digit()) => {
                self.parse_number()
            }
            Some(quote @ ('"' | '\'')) => self.parse_string(quote).map(Expr::Str),
            Some('(') => {
                self.advance(1);
                let saved = self.depth;
                self.enter()?;
                let inner = self.parse_or()?;
                self.expect_char(')')?;
                self.depth = saved;
                Ok(inner)
            }
            Some('[') => {
                self.advance(1);
                let saved = self.depth;
                self.enter()?;
                let items = self.parse_sequence(']')?;
                self.depth = saved;
                Ok(Expr::List(items))
            }
            Some(ch) if is_ident_start(ch) => self.parse_name(),
            Some(ch) => Err(self.error_point(format!("Unexpected '{}'", ch))),
            None => Err(self.error_point("Expected an expression".to_string())),
        }
    }

    fn parse_name(&mut self) -> Result<Expr, ExprError> {
        let start = self.pos;
        let begin = self.position();
        while let Some(ch) = self.peek_char() {
            if is_ident_char(ch) {
                self.advance(ch.len_utf8());
            } else {
                break;
            }
        }
        let name = &self.input[start..self.pos];
        match name {
            "True" => Ok(Expr::Bool(true)),
            "False" => Ok(Expr::Bool(false)),
            "and" | "or" | "not" | "in" => Err(ExprError::syntax(
                format!("Unexpected keyword '{}'", name),
                begin,
            )),
            _ => Ok(Expr::Name(name.to_string())),
        }
    }

    // ── Numbers ─────────────────────────────────────────────────────

    fn parse_number(&mut self) -> Result<Expr, ExprError> {
        let start = self.pos;
        let begin = self.position();
        let mut is_float = false;

        self.consume_digits();
        if self.peek_char() == Some('.') {
            is_float = true;
            self.advance(1);
            self.consume_digits();
        }

        if let Some('e' | 'E') = self.peek_char() {
            let saved = self.pos;
            self.advance(1);
            if let Some('+' | '-') = self.peek_char() {
                self.advance(1);
            }
            if self.consume_digits() == 0 {
                self.pos = saved;
            } else {
                is_float = true;
            }
        }

        if let Some(ch) = self.peek_char() {
            if is_ident_char(ch) {
                return Err(self.error_point(format!("Invalid character '{}' in number", ch)));
            }
        }

        let text = &self.input[start..self.pos];
        if is_float {
            text.parse::<f64>()
                .map(Expr::Float)
                .map_err(|_| ExprError::syntax(format!("Invalid number: {}", text), begin))
        } else {
            text.parse::<i64>().map(Expr::Integer).map_err(|_| {
                ExprError::syntax(format!("Integer literal out of range: {}", text), begin)
            })
        }
    }

    fn consume_digits(&mut self) -> usize {
        let start = self.pos;
        while let Some(ch) = self.peek_char() {
            if ch.is_ascii_digit() {
                self.advance(1);
            } else {
                break;
            }
        }
        self.pos - start
    }

    // ── Strings ─────────────────────────────────────────────────────

    fn parse_string(&mut self, quote: char) -> Result<String, ExprError> {
        let begin = self.position();
        self.advance(quote.len_utf8());
        let mut result = String::new();
        loop {
            match self.peek_char() {
                None => {
                    return Err(ExprError::syntax("Unterminated string", begin));
                }
                Some(ch) if ch == quote => {
                    self.advance(ch.len_utf8());
                    return Ok(result);
                }
                Some('\\') => {
                    self.advance(1);
                    let esc = self
                        .peek_char()
                        .ok_or_else(|| ExprError::syntax("Unterminated string", begin))?;
                    self.advance(esc.len_utf8());
                    match esc {
                        'n' => result.push('\n'),
                        't' => result.push('\t'),
                        'r' => result.push('\r'),
                        '0' => result.push('\0'),
                        '\\' | '\'' | '"' => result.push(esc),
                        other => {
                            // Unknown escapes stay literal.
                            result.push('\\');
                            result.push(other);
                        }
                    }
                }
                Some(ch) => {
                    self.advance(ch.len_utf8());
                    result.push(ch);
                }
            }
        }
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}
