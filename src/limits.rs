/// Bounds on the work a single `^{...}` expression may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum height of an expression tree (nesting plus operator chains).
    pub max_depth: usize,
    /// Maximum length of a list or string built by `+` or `*`.
    pub max_sequence_len: usize,
}

impl Limits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_sequence_len(mut self, max_sequence_len: usize) -> Self {
        self.max_sequence_len = max_sequence_len;
        self
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_depth: 128,
            max_sequence_len: 1 << 20,
        }
    }
}
