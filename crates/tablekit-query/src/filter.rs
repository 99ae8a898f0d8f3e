//! Filter-key compiler: `{"age >": 18, "id IN": [1, 2]}` → `WHERE` body.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{describe, GrammarMiss};
use crate::fragment::{placeholders, quote_ident, Fragment};
use crate::parser::parse_filter_key;

/// Comparison operators accepted as a trailing filter-key token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
    /// Written as `<>` or `!=`; always emitted as `<>`.
    Ne,
    Like,
    NotLike,
    RLike,
    NotRLike,
    In,
    NotIn,
    Between,
    NotBetween,
}

impl Operator {
    /// Map a normalized (upper-cased, single-spaced) token to an operator.
    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "=" => Operator::Eq,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            "<>" | "!=" => Operator::Ne,
            "LIKE" => Operator::Like,
            "NOT LIKE" => Operator::NotLike,
            "RLIKE" => Operator::RLike,
            "NOT RLIKE" => Operator::NotRLike,
            "IN" => Operator::In,
            "NOT IN" => Operator::NotIn,
            "BETWEEN" => Operator::Between,
            "NOT BETWEEN" => Operator::NotBetween,
            _ => return None,
        })
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Ne => "<>",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::RLike => "RLIKE",
            Operator::NotRLike => "NOT RLIKE",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::Between => "BETWEEN",
            Operator::NotBetween => "NOT BETWEEN",
        }
    }

    fn is_list(self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }

    fn is_range(self) -> bool {
        matches!(self, Operator::Between | Operator::NotBetween)
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One parsed filter entry.
///
/// `values` holds exactly what will be bound: one value for scalar
/// comparisons, N for `IN`, two for `BETWEEN`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpression {
    pub field: String,
    pub operator: Operator,
    pub values: Vec<Value>,
}

impl FilterExpression {
    /// Parse a `(key, value)` pair, reporting why it cannot be compiled.
    pub fn parse(key: &str, value: &Value) -> Result<Self, GrammarMiss> {
        let (field, token) = parse_filter_key(key)?;
        let operator = match token {
            None => Operator::Eq,
            Some(op) => Operator::from_token(&op).ok_or_else(|| GrammarMiss::UnknownOperator {
                key: key.to_string(),
                op,
            })?,
        };

        let values = if operator.is_list() {
            let list = list_values(value);
            if list.is_empty() {
                return Err(GrammarMiss::EmptyList {
                    field: field.to_string(),
                    op: operator.as_sql(),
                    got: describe(value),
                });
            }
            list
        } else if operator.is_range() {
            match value {
                Value::Array(bounds) if bounds.len() == 2 => bounds.clone(),
                other => {
                    return Err(GrammarMiss::BetweenArity {
                        field: field.to_string(),
                        op: operator.as_sql(),
                        got: describe(other),
                    })
                }
            }
        } else {
            vec![value.clone()]
        };

        Ok(Self {
            field: field.to_string(),
            operator,
            values,
        })
    }

    pub fn to_fragment(&self) -> Fragment {
        let field = quote_ident(&self.field);
        let op = self.operator.as_sql();
        let sql = if self.operator.is_list() {
            format!("{field} {op} ({})", placeholders(self.values.len()))
        } else if self.operator.is_range() {
            format!("{field} {op} ? AND ?")
        } else {
            format!("{field} {op} ?")
        };
        Fragment::new(sql, self.values.clone())
    }
}

/// Values for `IN` / `NOT IN`: an array as-is, or a string split on commas
/// with each element trimmed. Anything else yields an empty list.
fn list_values(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::String(s) if !s.trim().is_empty() => s
            .split(',')
            .map(|item| Value::String(item.trim().to_string()))
            .collect(),
        _ => Vec::new(),
    }
}

/// Compile one filter entry. Entries that do not fit the grammar yield an
/// empty fragment.
pub fn compile_key(key: &str, value: &Value) -> Fragment {
    match FilterExpression::parse(key, value) {
        Ok(expr) => expr.to_fragment(),
        Err(miss) => {
            debug!(key = %key, reason = %miss, "dropping filter entry");
            Fragment::empty()
        }
    }
}

/// Compile a filter map into an `AND`-joined condition, in map order.
/// Returns an empty fragment when nothing survives (no `WHERE` at all).
pub fn compile_map(filter: &Map<String, Value>) -> Fragment {
    Fragment::join(
        filter.iter().map(|(key, value)| compile_key(key, value)),
        " AND ",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn equality_without_operator() {
        let frag = compile_key("name", &json!("ada"));
        assert_eq!(frag.sql, "`name` = ?");
        assert_eq!(frag.params, vec![json!("ada")]);
    }

    #[test]
    fn scalar_comparison() {
        let frag = compile_key("age >", &json!(18));
        assert_eq!(frag.sql, "`age` > ?");
        assert_eq!(frag.params, vec![json!(18)]);

        assert_eq!(compile_key("age<=", &json!(3)).sql, "`age` <= ?");
        assert_eq!(compile_key("age !=", &json!(3)).sql, "`age` <> ?");
        assert_eq!(compile_key("age <>", &json!(3)).sql, "`age` <> ?");
        assert_eq!(compile_key("name like", &json!("a%")).sql, "`name` LIKE ?");
        assert_eq!(
            compile_key("name NOT  LIKE", &json!("a%")).sql,
            "`name` NOT LIKE ?"
        );
        assert_eq!(compile_key("bio rlike", &json!("^x")).sql, "`bio` RLIKE ?");
    }

    #[test]
    fn every_scalar_operator_binds_one_placeholder() {
        let keys = [
            "a <", "a <=", "a >", "a >=", "a <>", "a !=", "a LIKE", "a NOT LIKE", "a RLIKE",
            "a NOT RLIKE",
        ];
        for key in keys {
            let frag = compile_key(key, &json!(1));
            assert_eq!(frag.sql.matches('?').count(), 1, "{key}");
            assert_eq!(frag.params.len(), 1, "{key}");
        }
    }

    #[test]
    fn in_from_csv_string_keeps_strings() {
        let frag = compile_key("id IN", &json!("1,2,3"));
        assert_eq!(frag.sql, "`id` IN (?, ?, ?)");
        assert_eq!(frag.params, vec![json!("1"), json!("2"), json!("3")]);
    }

    #[test]
    fn in_csv_elements_are_trimmed() {
        let frag = compile_key("tag not in", &json!(" a ,b,  c "));
        assert_eq!(frag.sql, "`tag` NOT IN (?, ?, ?)");
        assert_eq!(frag.params, vec![json!("a"), json!("b"), json!("c")]);
    }

    #[test]
    fn in_from_array_has_one_placeholder_per_item() {
        for n in 1..6 {
            let list: Vec<Value> = (0..n).map(|i| json!(i)).collect();
            let frag = compile_key("id IN", &Value::Array(list.clone()));
            assert_eq!(frag.sql.matches('?').count(), n);
            assert_eq!(frag.params, list);
        }
    }

    #[test]
    fn in_without_usable_list_is_dropped() {
        assert!(compile_key("id IN", &json!([])).is_empty());
        assert!(compile_key("id IN", &json!("  ")).is_empty());
        assert!(compile_key("id IN", &json!(5)).is_empty());
        assert!(compile_key("id IN", &json!(null)).is_empty());

        let miss = FilterExpression::parse("id IN", &json!([])).unwrap_err();
        assert!(matches!(miss, GrammarMiss::EmptyList { .. }));
    }

    #[test]
    fn between_requires_two_values() {
        let frag = compile_key("score BETWEEN", &json!([10, 20]));
        assert_eq!(frag.sql, "`score` BETWEEN ? AND ?");
        assert_eq!(frag.params, vec![json!(10), json!(20)]);

        let frag = compile_key("score not between", &json!([1, 2]));
        assert_eq!(frag.sql, "`score` NOT BETWEEN ? AND ?");

        assert!(compile_key("score BETWEEN", &json!([10])).is_empty());
        assert!(compile_key("score BETWEEN", &json!([1, 2, 3])).is_empty());
        assert!(compile_key("score BETWEEN", &json!("1,2")).is_empty());
        assert!(matches!(
            FilterExpression::parse("score BETWEEN", &json!([10])),
            Err(GrammarMiss::BetweenArity { .. })
        ));
    }

    #[test]
    fn field_names_are_quoted_not_interpolated() {
        let frag = compile_key("x` = 1 OR `y", &json!(1));
        assert_eq!(frag.sql, "`x`` = 1 OR ``y` = ?");
    }

    #[test]
    fn field_ending_in_keyword_is_plain_equality() {
        let frag = compile_key("domain", &json!("example.org"));
        assert_eq!(frag.sql, "`domain` = ?");
    }

    #[test]
    fn malformed_key_is_dropped() {
        assert!(compile_key("", &json!(1)).is_empty());
        assert!(compile_key(" > ", &json!(1)).is_empty());
    }

    #[test]
    fn map_joins_with_and_in_order() {
        let clause = compile_map(&obj(json!({
            "age >=": 18,
            "status": "active",
            "score BETWEEN": [1],
            "id IN": [1, 2],
        })));
        assert_eq!(clause.sql, "`age` >= ? AND `status` = ? AND `id` IN (?, ?)");
        assert_eq!(
            clause.params,
            vec![json!(18), json!("active"), json!(1), json!(2)]
        );
    }

    #[test]
    fn map_with_nothing_surviving_is_empty() {
        assert!(compile_map(&Map::new()).is_empty());
        let clause = compile_map(&obj(json!({"id IN": [], "a BETWEEN": 1})));
        assert!(clause.is_empty());
        assert!(clause.params.is_empty());
    }
}
