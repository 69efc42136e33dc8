use std::collections::HashMap;

use serde::Serialize;

use crate::value::Value;

/// Named values a program may read.
pub trait ReadContext {
    fn get(&self, name: &str) -> Option<Value>;
    fn all(&self) -> HashMap<String, Value>;
}

/// Named values a program writes its results into.
pub trait WriteContext {
    fn set(&mut self, name: &str, value: Value);
    fn get(&self, name: &str) -> Option<Value>;
    fn all(&self) -> HashMap<String, Value>;
}

/// A HashMap-backed row. Serves as both read and write context.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row {
    values: HashMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pairs header names with record fields, interpreting each field with
    /// [`Value::from_field`].
    pub fn from_record(header: &[String], fields: &[String]) -> Self {
        let values = header
            .iter()
            .zip(fields)
            .map(|(name, field)| (name.clone(), Value::from_field(field)))
            .collect();
        Row { values }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Field names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.values.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl ReadContext for Row {
    fn get(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }

    fn all(&self) -> HashMap<String, Value> {
        self.values.clone()
    }
}

impl WriteContext for Row {
    fn set(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    fn get(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }

    fn all(&self) -> HashMap<String, Value> {
        self.values.clone()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Row {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_record_short_record() {
        let header = vec!["a".to_string(), "b".to_string()];
        let row = Row::from_record(&header, &["1".to_string()]);
        assert_eq!(row.get("a"), Some(&Value::Integer(1)));
        assert_eq!(row.get("b"), None);
    }

    #[test]
    fn test_names_sorted() {
        let row: Row = [("b", 1i64), ("a", 2i64)].into_iter().collect();
        assert_eq!(row.names(), vec!["a", "b"]);
    }
}
