//! Status conditions read from untyped objects

use serde_json::Value;

use super::error::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ConditionStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "True" => ConditionStatus::True,
            "False" => ConditionStatus::False,
            _ => ConditionStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub type_: String,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
}

/// Read `status.conditions` from an object's data.
///
/// A missing status or condition list yields an empty list; a condition list
/// that is not an array of objects with a string `type` is malformed.
pub fn read_conditions(data: &Value) -> Result<Vec<Condition>, FetchError> {
    let Some(raw) = data.get("status").and_then(|s| s.get("conditions")) else {
        return Ok(Vec::new());
    };
    if raw.is_null() {
        return Ok(Vec::new());
    }
    let items = raw
        .as_array()
        .ok_or_else(|| FetchError::Malformed("status.conditions is not a list".to_string()))?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let type_ = item.get("type").and_then(Value::as_str).ok_or_else(|| {
                FetchError::Malformed(format!("status.conditions[{}].type is missing", i))
            })?;
            let text = |field: &str| {
                item.get(field)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            Ok(Condition {
                type_: type_.to_string(),
                status: ConditionStatus::parse(&text("status")),
                reason: text("reason"),
                message: text("message"),
            })
        })
        .collect()
}

/// Find the first condition of the given type
pub fn find<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}
