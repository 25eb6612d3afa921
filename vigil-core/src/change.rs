//! Change descriptions passed to subscribers on notification.
//!
//! These are diagnostic metadata for tooling. Nothing in the engine makes a
//! decision based on them.

use serde::Serialize;

use crate::value::Value;

/// What kind of mutation triggered a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// An existing field was assigned a different value.
    Set,
    /// A field was added through the structural `set` helper.
    Add,
    /// A field was removed through the structural `del` helper.
    Delete,
    /// A list was mutated in place by one of its intercepted operations.
    ListMutation,
}

/// The in-place list operations that are intercepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListOp {
    Push,
    Pop,
    Shift,
    Unshift,
    Splice,
    Sort,
    Reverse,
}

impl ListOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListOp::Push => "push",
            ListOp::Pop => "pop",
            ListOp::Shift => "shift",
            ListOp::Unshift => "unshift",
            ListOp::Splice => "splice",
            ListOp::Sort => "sort",
            ListOp::Reverse => "reverse",
        }
    }
}

/// A single change record.
#[derive(Debug, Clone, Serialize)]
pub struct Change {
    pub kind: ChangeKind,
    /// The affected field, or the operation name for list mutations.
    pub key: Option<String>,
    #[serde(skip)]
    pub old_value: Option<Value>,
    #[serde(skip)]
    pub new_value: Option<Value>,
}

impl Change {
    pub fn set(key: impl Into<String>, old_value: Option<Value>, new_value: Option<Value>) -> Self {
        Self {
            kind: ChangeKind::Set,
            key: Some(key.into()),
            old_value,
            new_value,
        }
    }

    pub fn add(key: impl Into<String>, new_value: Value) -> Self {
        Self {
            kind: ChangeKind::Add,
            key: Some(key.into()),
            old_value: None,
            new_value: Some(new_value),
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Delete,
            key: Some(key.into()),
            old_value: None,
            new_value: None,
        }
    }

    pub fn list_mutation(op: ListOp) -> Self {
        Self {
            kind: ChangeKind::ListMutation,
            key: Some(op.as_str().to_string()),
            old_value: None,
            new_value: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_serializes_for_tooling() {
        let change = Change::set("count", Some(Value::from(1)), Some(Value::from(2)));
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "set", "key": "count" }));

        let mutation = serde_json::to_value(Change::list_mutation(ListOp::Unshift)).unwrap();
        assert_eq!(mutation["kind"], "list_mutation");
        assert_eq!(mutation["key"], "unshift");
    }
}
