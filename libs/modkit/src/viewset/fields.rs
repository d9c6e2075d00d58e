use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Distinguish an absent field (`None`) from an explicit `null`
/// (`Some(None)`) in partial updates.
///
/// Use with `#[serde(default, deserialize_with = "deserialize_some")]`.
pub fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// Reference to a related object: a primary key, or a set of attributes
/// identifying exactly one object (`{"slug": "parent"}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelatedRef {
    Id(i64),
    Attrs(BTreeMap<String, Value>),
}

impl RelatedRef {
    pub fn attr(&self, name: &str) -> Option<&str> {
        match self {
            Self::Id(_) => None,
            Self::Attrs(attrs) => attrs.get(name).and_then(Value::as_str),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "deserialize_some")]
        parent: Option<Option<RelatedRef>>,
    }

    #[test]
    fn absent_null_and_value() {
        let p: Patch = serde_json::from_str("{}").unwrap();
        assert!(p.parent.is_none());
        let p: Patch = serde_json::from_str(r#"{"parent": null}"#).unwrap();
        assert_eq!(p.parent, Some(None));
        let p: Patch = serde_json::from_str(r#"{"parent": 3}"#).unwrap();
        assert_eq!(p.parent, Some(Some(RelatedRef::Id(3))));
        let p: Patch = serde_json::from_str(r#"{"parent": {"slug": "root"}}"#).unwrap();
        assert_eq!(p.parent.unwrap().unwrap().attr("slug"), Some("root"));
    }
}
