use serde_json::Value;

use super::ModelViewSet;

/// `brief` is honored only on GET and only for truthy values.
pub fn brief_requested(is_get: bool, raw: Option<&str>) -> bool {
    is_get
        && raw.is_some_and(|v| {
            matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "true" | "1" | "yes" | "on"
            )
        })
}

/// What the serializer computes for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPlan {
    pub brief: bool,
    pub annotations: Vec<&'static str>,
    pub prefetch: Vec<&'static str>,
}

impl QueryPlan {
    /// Everything the full representation needs.
    pub fn full<V: ModelViewSet>(vs: &V) -> Self {
        Self {
            brief: false,
            annotations: vs.annotations().to_vec(),
            prefetch: vs.prefetch_fields().to_vec(),
        }
    }

    /// Plan for a read request. In brief mode, annotations not among the
    /// brief fields are dropped and prefetching falls back to the brief list.
    pub fn for_request<V: ModelViewSet>(vs: &V, brief: bool) -> Self {
        if !brief {
            return Self::full(vs);
        }
        let Some(fields) = vs.brief_fields() else {
            tracing::debug!(
                object_type = %vs.content_type(),
                "no nested representation, serving the full one"
            );
            return Self::full(vs);
        };
        Self {
            brief: true,
            annotations: vs
                .annotations()
                .iter()
                .copied()
                .filter(|a| fields.contains(a))
                .collect(),
            prefetch: vs.brief_prefetch_fields().to_vec(),
        }
    }

    pub fn annotates(&self, name: &str) -> bool {
        self.annotations.iter().any(|a| *a == name)
    }

    pub fn prefetches(&self, name: &str) -> bool {
        self.prefetch.iter().any(|p| *p == name)
    }
}

/// Keep only `fields` of a serialized object, in their declared order.
pub fn project(value: Value, fields: &[&str]) -> Value {
    match value {
        Value::Object(mut map) => {
            let mut out = serde_json::Map::with_capacity(fields.len());
            for f in fields {
                if let Some(v) = map.remove(*f) {
                    out.insert((*f).to_string(), v);
                }
            }
            Value::Object(out)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthy_values_only_on_get() {
        for v in ["true", "1", "yes", "on", "TRUE", " On "] {
            assert!(brief_requested(true, Some(v)), "{v}");
        }
        for v in ["false", "0", "", "maybe"] {
            assert!(!brief_requested(true, Some(v)), "{v}");
        }
        assert!(!brief_requested(true, None));
        assert!(!brief_requested(false, Some("true")));
    }

    #[test]
    fn projection_is_a_subset() {
        let full = json!({"id": 1, "url": "/x/1/", "name": "a", "slug": "a", "comments": "c"});
        let brief = project(full, &["id", "url", "name", "slug"]);
        assert_eq!(brief, json!({"id": 1, "url": "/x/1/", "name": "a", "slug": "a"}));
    }
}
