//! Unified filter expressions, shared by bus subscription predicates and
//! episodic store queries so both surfaces speak the same filter shape.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    Contains,
    In,
    Regex,
    And,
    Or,
    Not,
}

/// A filter expression over a JSON-ish document (an event's `meta`, or an
/// episodic row). Composite operators (`And`/`Or`/`Not`) ignore `field` and
/// read their operands from `value` as an array of encoded `FilterExpr`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterExpr {
    pub field: String,
    pub operator: FilterOperator,
    pub value: serde_json::Value,
}

impl FilterExpr {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: serde_json::Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    pub fn eq(field: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(field, FilterOperator::Eq, value)
    }

    pub fn contains(field: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(field, FilterOperator::Contains, value)
    }

    pub fn and(exprs: Vec<FilterExpr>) -> Self {
        Self::new(
            "",
            FilterOperator::And,
            serde_json::to_value(exprs).expect("FilterExpr is serializable"),
        )
    }

    pub fn or(exprs: Vec<FilterExpr>) -> Self {
        Self::new(
            "",
            FilterOperator::Or,
            serde_json::to_value(exprs).expect("FilterExpr is serializable"),
        )
    }

    /// Evaluate this filter against a document represented as a JSON value,
    /// reading dotted field paths (e.g. `"actor.person_id"`).
    pub fn matches(&self, doc: &serde_json::Value) -> bool {
        match self.operator {
            FilterOperator::And => self.operands().iter().all(|e| e.matches(doc)),
            FilterOperator::Or => self.operands().iter().any(|e| e.matches(doc)),
            FilterOperator::Not => !self.operands().first().is_some_and(|e| e.matches(doc)),
            _ => {
                let field_value = lookup_path(doc, &self.field);
                match field_value {
                    Some(v) => self.compare(v),
                    None => false,
                }
            }
        }
    }

    fn operands(&self) -> Vec<FilterExpr> {
        serde_json::from_value(self.value.clone()).unwrap_or_default()
    }

    fn compare(&self, field_value: &serde_json::Value) -> bool {
        use serde_json::Value;
        match self.operator {
            FilterOperator::Eq => field_value == &self.value,
            FilterOperator::Ne => field_value != &self.value,
            FilterOperator::Gt | FilterOperator::Lt | FilterOperator::Gte | FilterOperator::Lte => {
                match (field_value.as_f64(), self.value.as_f64()) {
                    (Some(a), Some(b)) => match self.operator {
                        FilterOperator::Gt => a > b,
                        FilterOperator::Lt => a < b,
                        FilterOperator::Gte => a >= b,
                        FilterOperator::Lte => a <= b,
                        _ => unreachable!(),
                    },
                    _ => false,
                }
            }
            FilterOperator::Contains => match (field_value.as_str(), self.value.as_str()) {
                (Some(haystack), Some(needle)) => haystack.contains(needle),
                _ => false,
            },
            FilterOperator::In => match self.value.as_array() {
                Some(values) => values.contains(field_value),
                None => false,
            },
            FilterOperator::Regex => match (field_value.as_str(), self.value.as_str()) {
                (Some(s), Some(pattern)) => regex::Regex::new(pattern)
                    .map(|re| re.is_match(s))
                    .unwrap_or(false),
                _ => false,
            },
            FilterOperator::And | FilterOperator::Or | FilterOperator::Not => {
                let _: Value = Value::Null;
                unreachable!("composite operators handled in matches()")
            }
        }
    }
}

fn lookup_path<'a>(doc: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    path.split('.').try_fold(doc, |acc, seg| acc.get(seg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn eq_matches_nested_field() {
        let doc = json!({"actor": {"person_id": "p1"}});
        let f = FilterExpr::eq("actor.person_id", json!("p1"));
        assert!(f.matches(&doc));
    }

    #[test]
    fn and_requires_all_operands() {
        let doc = json!({"band": "GREEN", "ts": 100});
        let f = FilterExpr::and(vec![
            FilterExpr::eq("band", json!("GREEN")),
            FilterExpr::new("ts", FilterOperator::Gte, json!(50)),
        ]);
        assert!(f.matches(&doc));
        let f2 = FilterExpr::and(vec![
            FilterExpr::eq("band", json!("GREEN")),
            FilterExpr::new("ts", FilterOperator::Gte, json!(500)),
        ]);
        assert!(!f2.matches(&doc));
    }

    #[test]
    fn contains_checks_substring() {
        let doc = json!({"topic": "episodic.segment.closed"});
        let f = FilterExpr::contains("topic", json!("segment"));
        assert!(f.matches(&doc));
    }

    #[test]
    fn missing_field_never_matches() {
        let doc = json!({});
        let f = FilterExpr::eq("nope", json!(1));
        assert!(!f.matches(&doc));
    }
}
