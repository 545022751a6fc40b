use crate::value::Value;
use indexmap::IndexMap;

/// The flat variable namespace of one document.
///
/// Both constant declarations and assignments bind here. A later binding
/// to the same name replaces the earlier value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    vars: IndexMap<String, Value>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        tracing::trace!(name = %name, value = %value, "bind");
        self.vars.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }
}
