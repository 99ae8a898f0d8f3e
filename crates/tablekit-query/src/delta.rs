//! Update-delta compiler: `{"name": "x", "score +=": 5}` → `SET` body.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::GrammarMiss;
use crate::fragment::{quote_ident, Fragment};
use crate::parser::parse_delta_key;

/// Arithmetic applied to the current column value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    /// Parse a compound-assignment suffix (`"+="`, `"-="`, `"*="`, `"/="`).
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "+=" => Some(ArithOp::Add),
            "-=" => Some(ArithOp::Sub),
            "*=" => Some(ArithOp::Mul),
            "/=" => Some(ArithOp::Div),
            _ => None,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
        }
    }
}

/// One parsed `SET` assignment. `op == None` is a direct assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateDelta {
    pub field: String,
    pub op: Option<ArithOp>,
    pub value: Value,
}

impl UpdateDelta {
    pub fn parse(key: &str, value: &Value) -> Result<Self, GrammarMiss> {
        let (field, suffix) = parse_delta_key(key)?;
        let op = match suffix {
            None => None,
            Some(s) => Some(ArithOp::from_suffix(s).ok_or_else(|| {
                GrammarMiss::UnknownOperator {
                    key: key.to_string(),
                    op: s.to_string(),
                }
            })?),
        };
        Ok(Self {
            field: field.to_string(),
            op,
            value: value.clone(),
        })
    }

    pub fn to_fragment(&self) -> Fragment {
        let field = quote_ident(&self.field);
        let sql = match self.op {
            None => format!("{field} = ?"),
            Some(op) => format!("{field} = {field} {} ?", op.as_sql()),
        };
        Fragment::new(sql, vec![self.value.clone()])
    }
}

/// Compile one assignment; an unparseable key yields an empty fragment.
pub fn compile_delta(key: &str, value: &Value) -> Fragment {
    match UpdateDelta::parse(key, value) {
        Ok(delta) => delta.to_fragment(),
        Err(miss) => {
            debug!(key = %key, reason = %miss, "dropping update entry");
            Fragment::empty()
        }
    }
}

/// Compile a data map into a `SET` body joined by `", "`.
///
/// An empty result means no assignment survived; an `UPDATE` must not be
/// issued in that case.
pub fn compile_delta_map(data: &Map<String, Value>) -> Fragment {
    Fragment::join(
        data.iter().map(|(key, value)| compile_delta(key, value)),
        ", ",
    )
}
