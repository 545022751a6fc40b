use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

/// `{- ... -}`, spanning lines, closed by the first `-}`.
static BLOCK_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\{-.*?-\}").unwrap_or_else(|e| unreachable!("static pattern: {e}"))
});

/// Remove every block comment from `input`.
///
/// Comments do not nest. An opening `{-` with no closing `-}` is left in
/// the text untouched.
pub fn strip_comments(input: &str) -> Cow<'_, str> {
    BLOCK_COMMENT.replace_all(input, "")
}
