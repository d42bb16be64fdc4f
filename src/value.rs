//! Conversions from page data into template [`Value`]s.

use crate::nav::NavEntry;
use gtmpl::Value;
use serde_yaml::{Mapping, Number};
use std::collections::HashMap;

/// Converts a YAML value into a template value. Mapping keys that are not
/// scalars are dropped.
pub fn from_yaml(yaml: &serde_yaml::Value) -> Value {
    match yaml {
        serde_yaml::Value::Null => Value::Nil,
        serde_yaml::Value::Bool(b) => Value::Bool(*b),
        serde_yaml::Value::Number(n) => from_number(n),
        serde_yaml::Value::String(s) => Value::String(s.clone()),
        serde_yaml::Value::Sequence(seq) => Value::Array(seq.iter().map(from_yaml).collect()),
        serde_yaml::Value::Mapping(m) => Value::Object(object(m)),
    }
}

/// Converts a YAML mapping into the entries of a template object.
pub fn object(mapping: &Mapping) -> HashMap<String, Value> {
    mapping
        .iter()
        .filter_map(|(k, v)| key(k).map(|k| (k, from_yaml(v))))
        .collect()
}

fn key(k: &serde_yaml::Value) -> Option<String> {
    match k {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn from_number(n: &Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::from(i)
    } else if let Some(u) = n.as_u64() {
        Value::from(u)
    } else {
        Value::from(n.as_f64().unwrap_or(0.0))
    }
}

impl From<&NavEntry> for Value {
    fn from(entry: &NavEntry) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), Value::String(entry.title.clone()));
        m.insert(
            "dest".to_owned(),
            Value::String(entry.dest.to_string_lossy().into_owned()),
        );
        m.insert("order".to_owned(), from_number(&entry.order));
        if let Some(subtitle) = &entry.subtitle {
            m.insert("subtitle".to_owned(), Value::String(subtitle.clone()));
        }
        Value::Object(m)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_nested_mapping() {
        let yaml: serde_yaml::Value = serde_yaml::from_str("a: {b: [1, true, x]}").unwrap();
        let outer = match from_yaml(&yaml) {
            Value::Object(outer) => outer,
            _ => panic!("expected an object"),
        };
        let items = match outer.get("a") {
            Some(Value::Object(inner)) => match inner.get("b") {
                Some(Value::Array(items)) => items.clone(),
                _ => panic!("expected an array"),
            },
            _ => panic!("expected an object"),
        };
        assert_eq!(3, items.len());
        assert!(matches!(items[0], Value::Number(_)));
        assert!(matches!(items[1], Value::Bool(true)));
        assert!(matches!(&items[2], Value::String(s) if s == "x"));
    }

    #[test]
    fn test_null_is_nil() {
        assert!(matches!(from_yaml(&serde_yaml::Value::Null), Value::Nil));
    }

    #[test]
    fn test_nav_entry_omits_missing_subtitle() {
        let entry = NavEntry {
            title: "About".into(),
            subtitle: None,
            dest: "about.html".into(),
            order: Number::from(1),
        };
        match Value::from(&entry) {
            Value::Object(m) => {
                assert!(matches!(m.get("dest"), Some(Value::String(s)) if s == "about.html"));
                assert!(!m.contains_key("subtitle"));
            }
            _ => panic!("expected an object"),
        }
    }
}
