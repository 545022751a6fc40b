use crate::value::Value;
use indexmap::IndexMap;
use serde::Serialize;

/// The output being accumulated while a document is translated.
#[derive(Debug, Clone, Default)]
pub struct OutputMapping {
    entries: IndexMap<String, Value>,
}

impl OutputMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `key`. An overwritten key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every list-valued entry and produce the final document.
    ///
    /// This runs after deferred expressions have been merged in, so list
    /// results of `^{...}` lines are dropped along with list assignments.
    pub fn finish(self) -> Document {
        let entries = self
            .entries
            .into_iter()
            .filter(|(key, value)| {
                if value.is_list() {
                    tracing::trace!(key = %key, "dropping list-valued entry");
                }
                !value.is_list()
            })
            .collect();
        Document { entries }
    }
}

/// The translated document: one flat, ordered table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Document {
    entries: IndexMap<String, Value>,
}

impl Document {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Serialize as a TOML document.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    /// Serialize to pretty-printed JSON (2-space indent).
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Document {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_drops_every_list() {
        let mut out = OutputMapping::new();
        out.insert("a", Value::Integer(1));
        out.insert("l", Value::List(vec![Value::Integer(1)]));
        out.insert("sort(l)", Value::List(vec![Value::Integer(1)]));
        out.insert("l[0]", Value::Integer(1));
        let doc = out.finish();
        assert_eq!(doc.keys().collect::<Vec<_>>(), ["a", "l[0]"]);
    }

    #[test]
    fn overwrite_keeps_first_position() {
        let mut out = OutputMapping::new();
        out.insert("a", Value::Integer(1));
        out.insert("b", Value::Integer(2));
        out.insert("a", Value::Integer(3));
        let doc = out.finish();
        assert_eq!(doc.keys().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(doc.get("a"), Some(&Value::Integer(3)));
    }

    #[test]
    fn toml_quotes_expression_keys() {
        let doc: Document = [
            ("z".to_string(), Value::Text("hi".into())),
            ("x + 1".to_string(), Value::Integer(6)),
            (
                "sort(y)".to_string(),
                Value::List(vec![Value::Integer(1), Value::Integer(2)]),
            ),
        ]
        .into_iter()
        .collect();
        let text = doc.to_toml().unwrap();
        let parsed: toml::Table = text.parse().unwrap();
        assert_eq!(parsed["z"].as_str(), Some("hi"));
        assert_eq!(parsed["x + 1"].as_integer(), Some(6));
        assert_eq!(parsed["sort(y)"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn json_keeps_order() {
        let doc: Document = [
            ("b".to_string(), Value::Integer(1)),
            ("a".to_string(), Value::Boolean(true)),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            doc.to_json_pretty().unwrap(),
            "{\n  \"b\": 1,\n  \"a\": true\n}"
        );
    }
}
