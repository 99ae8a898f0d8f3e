//! Order compiler: `{"name": "asc", "age": "DESC"}` → `` `name` ASC, `age` DESC ``.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{describe, GrammarMiss};
use crate::fragment::quote_ident;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    /// Case-insensitive `ASC` / `DESC`.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("ASC") {
            Some(Direction::Asc)
        } else if raw.eq_ignore_ascii_case("DESC") {
            Some(Direction::Desc)
        } else {
            None
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Validated sort order, in map order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderSpec {
    pub entries: Vec<(String, Direction)>,
}

impl OrderSpec {
    /// Build from a column → direction map, dropping invalid directions.
    pub fn from_map(order: &Map<String, Value>) -> Self {
        let mut entries = Vec::with_capacity(order.len());
        for (field, value) in order {
            match value.as_str().and_then(Direction::parse) {
                Some(dir) => entries.push((field.clone(), dir)),
                None => {
                    let miss = GrammarMiss::Direction {
                        field: field.clone(),
                        got: describe(value),
                    };
                    debug!(reason = %miss, "dropping order entry");
                }
            }
        }
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `ORDER BY` body, or an empty string.
    pub fn to_sql(&self) -> String {
        self.entries
            .iter()
            .map(|(field, dir)| format!("{} {}", quote_ident(field), dir.as_sql()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Compile an order map into an `ORDER BY` body; empty when nothing is valid.
pub fn compile_order(order: &Map<String, Value>) -> String {
    OrderSpec::from_map(order).to_sql()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn invalid_directions_are_dropped() {
        assert_eq!(
            compile_order(&obj(json!({"name": "asc", "age": "BOGUS"}))),
            "`name` ASC"
        );
    }

    #[test]
    fn keeps_map_order() {
        assert_eq!(
            compile_order(&obj(json!({"b": "Desc", "a": "ASC"}))),
            "`b` DESC, `a` ASC"
        );
    }

    #[test]
    fn non_string_directions_are_dropped() {
        let spec = OrderSpec::from_map(&obj(json!({"a": 1, "b": null, "c": ["asc"]})));
        assert!(spec.is_empty());
        assert_eq!(spec.to_sql(), "");
    }

    #[test]
    fn empty_map_compiles_to_nothing() {
        assert_eq!(compile_order(&Map::new()), "");
    }
}
