// src/models/event.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single scalar attribute value carried by an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Number(f64),
    Time(DateTime<Utc>),
    String(String),
}

impl AttrValue {
    /// Canonical string form used by filter comparisons.
    pub fn as_match_str(&self) -> String {
        match self {
            AttrValue::String(s) => s.clone(),
            AttrValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            AttrValue::Bool(b) => b.to_string(),
            AttrValue::Time(t) => t.to_rfc3339(),
        }
    }
}

/// An event describing a call or transaction: an opaque bag of key/value
/// attributes. The admission engine never inspects the attributes itself,
/// only the filter evaluator does.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Event {
    /// Optional declared event time, used instead of "now" when checking
    /// pool activation windows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttrValue>,
}

impl Event {
    pub fn attribute(&self, field: &str) -> Option<&AttrValue> {
        self.attributes.get(field)
    }

    pub fn reference_time(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.time.unwrap_or(now)
    }
}
