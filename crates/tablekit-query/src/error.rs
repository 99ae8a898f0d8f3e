use thiserror::Error;

/// Why a filter, order or delta entry was left out of the compiled SQL.
///
/// The compilers never surface these as failures; they drop the entry and
/// move on. The typed reason exists for logging and for callers that parse
/// entries directly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarMiss {
    /// The key does not contain a usable field name.
    #[error("malformed key '{0}'")]
    MalformedKey(String),

    /// The operator token matched the grammar but maps to no operator.
    #[error("unknown operator '{op}' in key '{key}'")]
    UnknownOperator { key: String, op: String },

    /// `IN` / `NOT IN` without a non-empty array or comma-separated string.
    #[error("{op} on `{field}` needs a non-empty list, got {got}")]
    EmptyList {
        field: String,
        op: &'static str,
        got: String,
    },

    /// `BETWEEN` / `NOT BETWEEN` without exactly two bounds.
    #[error("{op} on `{field}` needs exactly two values, got {got}")]
    BetweenArity {
        field: String,
        op: &'static str,
        got: String,
    },

    /// An order direction other than `ASC` / `DESC`.
    #[error("order direction for `{field}` must be ASC or DESC, got {got}")]
    Direction { field: String, got: String },
}

/// Short human description of a JSON value's shape, used in miss reasons.
pub(crate) fn describe(value: &serde_json::Value) -> String {
    use serde_json::Value;
    match value {
        Value::Null => "null".into(),
        Value::Bool(_) => "a boolean".into(),
        Value::Number(_) => "a number".into(),
        Value::String(s) if s.trim().is_empty() => "a blank string".into(),
        Value::String(_) => "a string".into(),
        Value::Array(items) => format!("an array of {}", items.len()),
        Value::Object(_) => "an object".into(),
    }
}
