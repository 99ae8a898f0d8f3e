//! Assembles complete statements from compiled fragments.
//!
//! ```text
//! SELECT <field> FROM `t` [WHERE ...] [ORDER BY ...] [LIMIT o, n]
//! SELECT COUNT(*) AS total FROM `t` [WHERE ...]
//! INSERT INTO `t` (`c1`, ...) VALUES (?, ...)
//! UPDATE `t` SET ... [WHERE ...] [ORDER BY ...] [LIMIT n]
//! DELETE FROM `t` [WHERE ...] [ORDER BY ...] [LIMIT n]
//! ```
//!
//! SQLite builds without `SQLITE_ENABLE_UPDATE_DELETE_LIMIT` reject
//! `ORDER BY`/`LIMIT` on mutations, so for [`Dialect::Sqlite`] a limited
//! mutation selects its target rows through a [`RowKey`]:
//!
//! ```text
//! DELETE FROM `t` WHERE rowid IN (SELECT rowid FROM `t` [WHERE ...] [ORDER BY ...] LIMIT n)
//! DELETE FROM `t` WHERE (`a`, `b`) IN (SELECT `a`, `b` FROM `t` ... LIMIT n)
//! ```
//!
//! The second form is used for `WITHOUT ROWID` tables, keyed by their
//! primary-key columns.

use serde_json::{Map, Value};
use tablekit_query::{quote_ident, Fragment};

use crate::gateway::Dialect;

/// Name of the column produced by [`count`].
pub const COUNT_COLUMN: &str = "total";

/// Schema text of one SQLite table; binds the table name.
pub const SQLITE_TABLE_SQL: &str =
    "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?";

/// Primary-key columns of one SQLite table, in key order; binds the table name.
pub const SQLITE_PK_COLUMNS: &str =
    "SELECT name FROM pragma_table_info(?) WHERE pk > 0 ORDER BY pk";

/// How a limited SQLite mutation addresses the rows it selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKey {
    /// Ordinary tables: the implicit `rowid`.
    Rowid,
    /// `WITHOUT ROWID` tables: the primary-key columns.
    PrimaryKey(Vec<String>),
}

impl RowKey {
    fn select_list(&self) -> String {
        match self {
            RowKey::Rowid => "rowid".to_string(),
            RowKey::PrimaryKey(columns) => columns
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    fn target(&self) -> String {
        match self {
            RowKey::PrimaryKey(columns) if columns.len() > 1 => {
                format!("({})", self.select_list())
            }
            _ => self.select_list(),
        }
    }
}

/// Whether a `CREATE TABLE` statement ends in `WITHOUT ROWID`.
pub fn declares_without_rowid(create_sql: &str) -> bool {
    create_sql
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase()
        .contains("WITHOUT ROWID")
}

pub fn select(
    table: &str,
    field: &str,
    filter: &Fragment,
    order: &str,
    offset: u64,
    limit: u64,
) -> Fragment {
    let mut sql = format!("SELECT {field} FROM {}", quote_ident(table));
    push_where(&mut sql, filter);
    push_order(&mut sql, order);
    if limit > 0 {
        sql.push_str(&format!(" LIMIT {offset}, {limit}"));
    }
    Fragment::new(sql, filter.params.clone())
}

pub fn count(table: &str, filter: &Fragment) -> Fragment {
    let mut sql = format!("SELECT COUNT(*) AS {COUNT_COLUMN} FROM {}", quote_ident(table));
    push_where(&mut sql, filter);
    Fragment::new(sql, filter.params.clone())
}

/// Columns in map order. The caller guarantees `data` is non-empty.
pub fn insert(table: &str, data: &Map<String, Value>) -> Fragment {
    let columns: Vec<String> = data.keys().map(|c| quote_ident(c)).collect();
    let places = vec!["?"; columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        columns.join(", "),
        places
    );
    Fragment::new(sql, data.values().cloned().collect())
}

/// `set` must be non-empty. `key` is only consulted for a limited SQLite
/// mutation.
pub fn update(
    dialect: Dialect,
    table: &str,
    key: &RowKey,
    set: Fragment,
    filter: Fragment,
    order: &str,
    limit: u64,
) -> Fragment {
    let head = format!("UPDATE {} SET {}", quote_ident(table), set.sql);
    let mut params = set.params;
    let mutation = mutation_tail(dialect, table, key, head, filter, order, limit);
    params.extend(mutation.params);
    Fragment::new(mutation.sql, params)
}

pub fn delete(
    dialect: Dialect,
    table: &str,
    key: &RowKey,
    filter: Fragment,
    order: &str,
    limit: u64,
) -> Fragment {
    let head = format!("DELETE FROM {}", quote_ident(table));
    mutation_tail(dialect, table, key, head, filter, order, limit)
}

fn mutation_tail(
    dialect: Dialect,
    table: &str,
    key: &RowKey,
    mut sql: String,
    filter: Fragment,
    order: &str,
    limit: u64,
) -> Fragment {
    if dialect.supports_mutation_limit() {
        push_where(&mut sql, &filter);
        push_order(&mut sql, order);
        if limit > 0 {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
    } else if limit > 0 {
        let mut target = format!("SELECT {} FROM {}", key.select_list(), quote_ident(table));
        push_where(&mut target, &filter);
        push_order(&mut target, order);
        target.push_str(&format!(" LIMIT {limit}"));
        sql.push_str(&format!(" WHERE {} IN ({target})", key.target()));
    } else {
        // Without a limit the order has no effect.
        push_where(&mut sql, &filter);
    }
    Fragment::new(sql, filter.params)
}

fn push_where(sql: &mut String, filter: &Fragment) {
    if !filter.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&filter.sql);
    }
}

fn push_order(sql: &mut String, order: &str) {
    if !order.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(order);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filter() -> Fragment {
        Fragment::new("`id` > ?", vec![json!(3)])
    }

    #[test]
    fn select_shapes() {
        let s = select("users", "*", &Fragment::empty(), "", 0, 0);
        assert_eq!(s.sql, "SELECT * FROM `users`");
        assert!(s.params.is_empty());

        let s = select("users", "id, name", &filter(), "`id` DESC", 20, 10);
        assert_eq!(
            s.sql,
            "SELECT id, name FROM `users` WHERE `id` > ? ORDER BY `id` DESC LIMIT 20, 10"
        );
        assert_eq!(s.params, vec![json!(3)]);
    }

    #[test]
    fn count_shape() {
        let s = count("users", &filter());
        assert_eq!(s.sql, "SELECT COUNT(*) AS total FROM `users` WHERE `id` > ?");
    }

    #[test]
    fn insert_shape() {
        let data = json!({"name": "ada", "age": 36});
        let s = insert("users", data.as_object().unwrap());
        assert_eq!(s.sql, "INSERT INTO `users` (`name`, `age`) VALUES (?, ?)");
        assert_eq!(s.params, vec![json!("ada"), json!(36)]);
    }

    #[test]
    fn mysql_mutations_use_order_and_limit() {
        let set = Fragment::new("`a` = ?", vec![json!(1)]);
        let s = update(Dialect::MySql, "t", &RowKey::Rowid, set, filter(), "`id` ASC", 2);
        assert_eq!(s.sql, "UPDATE `t` SET `a` = ? WHERE `id` > ? ORDER BY `id` ASC LIMIT 2");
        assert_eq!(s.params, vec![json!(1), json!(3)]);

        let s = delete(Dialect::MySql, "t", &RowKey::Rowid, Fragment::empty(), "", 0);
        assert_eq!(s.sql, "DELETE FROM `t`");
    }

    #[test]
    fn sqlite_limited_mutations_go_through_rowid() {
        let s = delete(Dialect::Sqlite, "t", &RowKey::Rowid, filter(), "`id` DESC", 1);
        assert_eq!(
            s.sql,
            "DELETE FROM `t` WHERE rowid IN (SELECT rowid FROM `t` WHERE `id` > ? ORDER BY `id` DESC LIMIT 1)"
        );
        assert_eq!(s.params, vec![json!(3)]);

        let set = Fragment::new("`a` = ?", vec![json!(1)]);
        let s = update(Dialect::Sqlite, "t", &RowKey::Rowid, set, filter(), "`id` DESC", 0);
        assert_eq!(s.sql, "UPDATE `t` SET `a` = ? WHERE `id` > ?");
        assert_eq!(s.params, vec![json!(1), json!(3)]);
    }

    #[test]
    fn sqlite_without_rowid_mutations_go_through_primary_key() {
        let single = RowKey::PrimaryKey(vec!["k".into()]);
        let s = delete(Dialect::Sqlite, "kv", &single, Fragment::empty(), "`k` ASC", 1);
        assert_eq!(
            s.sql,
            "DELETE FROM `kv` WHERE `k` IN (SELECT `k` FROM `kv` ORDER BY `k` ASC LIMIT 1)"
        );

        let pair = RowKey::PrimaryKey(vec!["a".into(), "b".into()]);
        let set = Fragment::new("`v` = ?", vec![json!(9)]);
        let s = update(Dialect::Sqlite, "ab", &pair, set, filter(), "", 2);
        assert_eq!(
            s.sql,
            "UPDATE `ab` SET `v` = ? WHERE (`a`, `b`) IN (SELECT `a`, `b` FROM `ab` WHERE `id` > ? LIMIT 2)"
        );
        assert_eq!(s.params, vec![json!(9), json!(3)]);
    }

    #[test]
    fn detects_without_rowid_declarations() {
        assert!(declares_without_rowid("CREATE TABLE kv (k TEXT PRIMARY KEY) WITHOUT ROWID"));
        assert!(declares_without_rowid("CREATE TABLE kv (k PRIMARY KEY)\n  without\trowid, STRICT"));
        assert!(!declares_without_rowid("CREATE TABLE users (id INTEGER PRIMARY KEY)"));
    }
}
