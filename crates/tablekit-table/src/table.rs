use std::slice;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde_json::{Map, Value};
use tablekit_query::{compile_delta_map, compile_map, compile_order, Fragment};
use tracing::{debug, instrument, warn};

use crate::error::TableError;
use crate::gateway::{Dialect, Gateway, Row};
use crate::statement::{self, RowKey};

/// A filter, order or data map: keys in insertion order.
pub type Params = Map<String, Value>;

/// What [`Table::try_upsert`] ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    /// No row matched; a row was inserted, with its generated id if any.
    Inserted(Option<i64>),
    /// A row matched; this many rows were updated.
    Updated(u64),
}

/// CRUD façade over one table of one gateway.
///
/// Every operation comes in two forms:
///
/// - `try_*` returns `Result<_, TableError>` so callers can tell "nothing
///   matched" from "the backend failed".
/// - The plain form never fails: backend errors are logged and mapped to a
///   neutral value (`None`, `[]`, `false`, `0`).
///
/// `remove` and `update` report success only when at least one row was
/// affected.
///
/// ## Concurrency
/// Calls against the same `Table` are independent statements with no
/// ordering guarantee. [`Table::last_insert_id`] is shared by every caller:
/// with concurrent inserts it may hold another caller's id. Use
/// [`Table::add_returning_id`] or [`Table::try_add`] to get the id of your
/// own insert.
///
/// On SQLite the handle looks up once whether its table is `WITHOUT ROWID`.
/// Such tables report no generated id, and their limited mutations address
/// rows by primary key.
pub struct Table {
    name: String,
    gateway: Arc<dyn Gateway>,
    /// 0 = no id recorded yet.
    last_insert_id: AtomicI64,
    key_cache: OnceCell<RowKey>,
}

impl Table {
    pub fn new(name: impl Into<String>, gateway: Arc<dyn Gateway>) -> Self {
        Self {
            name: name.into(),
            gateway,
            last_insert_id: AtomicI64::new(0),
            key_cache: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    /// Id generated by the most recent successful `add` on this handle,
    /// from any caller.
    pub fn last_insert_id(&self) -> Option<i64> {
        match self.last_insert_id.load(Ordering::Acquire) {
            0 => None,
            id => Some(id),
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// First row matching `filter`, or `None`.
    pub async fn try_get(
        &self,
        filter: Option<&Params>,
        order: Option<&Params>,
        field: &str,
    ) -> Result<Option<Row>, TableError> {
        let rows = self.try_gets(filter, order, 0, 1, field).await?;
        Ok(rows.into_iter().next())
    }

    /// Rows matching `filter`. `limit == 0` fetches everything from `offset`
    /// on; the `LIMIT` clause is omitted entirely in that case.
    #[instrument(skip_all, fields(table = %self.name))]
    pub async fn try_gets(
        &self,
        filter: Option<&Params>,
        order: Option<&Params>,
        offset: u64,
        limit: u64,
        field: &str,
    ) -> Result<Vec<Row>, TableError> {
        let stmt = statement::select(
            &self.name,
            field,
            &where_clause(filter),
            &order_clause(order),
            offset,
            limit,
        );
        let rows = self.gateway.query(&stmt.sql, &stmt.params).await?;
        debug!("Selected {} rows from {}", rows.len(), self.name);
        Ok(rows)
    }

    #[instrument(skip_all, fields(table = %self.name))]
    pub async fn try_count(&self, filter: Option<&Params>) -> Result<u64, TableError> {
        let stmt = statement::count(&self.name, &where_clause(filter));
        let rows = self.gateway.query(&stmt.sql, &stmt.params).await?;
        let total = rows
            .first()
            .and_then(|row| row.get(statement::COUNT_COLUMN))
            .map(count_value)
            .transpose()?
            .unwrap_or(0);
        Ok(total)
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Insert one row and return its generated id, if the backend reports a
    /// positive one. Anything other than exactly one affected row is an
    /// error.
    #[instrument(skip_all, fields(table = %self.name))]
    pub async fn try_add(&self, data: &Params) -> Result<Option<i64>, TableError> {
        if data.is_empty() {
            return Err(TableError::EmptyRow);
        }
        // SQLite's last rowid is per connection and left untouched by inserts
        // into WITHOUT ROWID tables.
        let has_rowid = self.row_key().await? == RowKey::Rowid;
        let stmt = statement::insert(&self.name, data);
        let result = self.gateway.execute(&stmt.sql, &stmt.params).await?;
        if result.affected_rows != 1 {
            return Err(TableError::InsertMismatch(result.affected_rows));
        }
        let id = result.last_insert_id.filter(|_| has_rowid);
        if let Some(id) = id {
            self.last_insert_id.store(id, Ordering::Release);
        }
        debug!("Inserted row into {} with id {:?}", self.name, id);
        Ok(id)
    }

    /// Delete matching rows and return how many were removed.
    #[instrument(skip_all, fields(table = %self.name))]
    pub async fn try_remove(
        &self,
        filter: Option<&Params>,
        order: Option<&Params>,
        limit: u64,
    ) -> Result<u64, TableError> {
        let key = self.mutation_key(limit).await?;
        let stmt = statement::delete(
            self.gateway.dialect(),
            &self.name,
            &key,
            where_clause(filter),
            &order_clause(order),
            limit,
        );
        let result = self.gateway.execute(&stmt.sql, &stmt.params).await?;
        debug!("Deleted {} rows from {}", result.affected_rows, self.name);
        Ok(result.affected_rows)
    }

    /// Apply `data` (plain or `+=`/`-=`/`*=`/`/=` keys) to matching rows and
    /// return how many were changed. Fails with
    /// [`TableError::NoAssignments`] before touching the backend when no key
    /// of `data` is usable.
    #[instrument(skip_all, fields(table = %self.name))]
    pub async fn try_update(
        &self,
        data: &Params,
        filter: Option<&Params>,
        order: Option<&Params>,
        limit: u64,
    ) -> Result<u64, TableError> {
        let set = compile_delta_map(data);
        if set.is_empty() {
            return Err(TableError::NoAssignments);
        }
        let key = self.mutation_key(limit).await?;
        let stmt = statement::update(
            self.gateway.dialect(),
            &self.name,
            &key,
            set,
            where_clause(filter),
            &order_clause(order),
            limit,
        );
        let result = self.gateway.execute(&stmt.sql, &stmt.params).await?;
        debug!("Updated {} rows in {}", result.affected_rows, self.name);
        Ok(result.affected_rows)
    }

    /// Update the rows matching `filter`, or insert `data` when none match.
    ///
    /// A missing filter, or one where every entry is dropped, always
    /// inserts. This is a read followed by a write: two concurrent callers
    /// can both see "no match" and both insert.
    pub async fn try_upsert(
        &self,
        data: &Params,
        filter: Option<&Params>,
    ) -> Result<Upserted, TableError> {
        let filter = filter.filter(|f| !compile_map(f).is_empty());
        let Some(filter) = filter else {
            return Ok(Upserted::Inserted(self.try_add(data).await?));
        };
        match self.try_get(Some(filter), None, "*").await? {
            None => Ok(Upserted::Inserted(self.try_add(data).await?)),
            Some(_) => Ok(Upserted::Updated(
                self.try_update(data, Some(filter), None, 0).await?,
            )),
        }
    }

    // -----------------------------------------------------------------------
    // Soft forms
    // -----------------------------------------------------------------------

    pub async fn get(
        &self,
        filter: Option<&Params>,
        order: Option<&Params>,
        field: &str,
    ) -> Option<Row> {
        self.try_get(filter, order, field)
            .await
            .unwrap_or_else(|e| self.neutral("get", e, None))
    }

    pub async fn gets(
        &self,
        filter: Option<&Params>,
        order: Option<&Params>,
        offset: u64,
        limit: u64,
        field: &str,
    ) -> Vec<Row> {
        self.try_gets(filter, order, offset, limit, field)
            .await
            .unwrap_or_else(|e| self.neutral("gets", e, Vec::new()))
    }

    pub async fn count(&self, filter: Option<&Params>) -> u64 {
        self.try_count(filter)
            .await
            .unwrap_or_else(|e| self.neutral("count", e, 0))
    }

    /// `true` when exactly one row was inserted.
    pub async fn add(&self, data: &Params) -> bool {
        self.try_add(data)
            .await
            .map(|_| true)
            .unwrap_or_else(|e| self.neutral("add", e, false))
    }

    /// Insert and hand back this insert's generated id.
    pub async fn add_returning_id(&self, data: &Params) -> Option<i64> {
        self.try_add(data)
            .await
            .unwrap_or_else(|e| self.neutral("add", e, None))
    }

    pub async fn remove(&self, filter: Option<&Params>, order: Option<&Params>, limit: u64) -> bool {
        self.try_remove(filter, order, limit)
            .await
            .map(|n| n > 0)
            .unwrap_or_else(|e| self.neutral("remove", e, false))
    }

    pub async fn update(
        &self,
        data: &Params,
        filter: Option<&Params>,
        order: Option<&Params>,
        limit: u64,
    ) -> bool {
        self.try_update(data, filter, order, limit)
            .await
            .map(|n| n > 0)
            .unwrap_or_else(|e| self.neutral("update", e, false))
    }

    pub async fn upsert(&self, data: &Params, filter: Option<&Params>) -> bool {
        match self.try_upsert(data, filter).await {
            Ok(Upserted::Inserted(_)) => true,
            Ok(Upserted::Updated(n)) => n > 0,
            Err(e) => self.neutral("upsert", e, false),
        }
    }

    // -----------------------------------------------------------------------
    // Row addressing
    // -----------------------------------------------------------------------

    /// Key for a mutation; only a limited one needs the real lookup.
    async fn mutation_key(&self, limit: u64) -> Result<RowKey, TableError> {
        if limit == 0 {
            return Ok(RowKey::Rowid);
        }
        self.row_key().await
    }

    /// How this table addresses single rows. Looked up on SQLite only and
    /// cached once the table exists; other dialects always get `Rowid`.
    async fn row_key(&self) -> Result<RowKey, TableError> {
        if self.gateway.dialect() != Dialect::Sqlite {
            return Ok(RowKey::Rowid);
        }
        if let Some(key) = self.key_cache.get() {
            return Ok(key.clone());
        }
        match self.lookup_row_key().await? {
            Some(key) => Ok(self.key_cache.get_or_init(|| key).clone()),
            // Unknown table: the statement itself will report it.
            None => Ok(RowKey::Rowid),
        }
    }

    async fn lookup_row_key(&self) -> Result<Option<RowKey>, TableError> {
        let name = Value::String(self.name.clone());
        let rows = self
            .gateway
            .query(statement::SQLITE_TABLE_SQL, slice::from_ref(&name))
            .await?;
        let Some(create_sql) = rows.first().and_then(|r| r.get("sql")).and_then(Value::as_str)
        else {
            return Ok(None);
        };
        if !statement::declares_without_rowid(create_sql) {
            return Ok(Some(RowKey::Rowid));
        }

        let rows = self
            .gateway
            .query(statement::SQLITE_PK_COLUMNS, slice::from_ref(&name))
            .await?;
        let columns: Vec<String> = rows
            .iter()
            .filter_map(|r| r.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        if columns.is_empty() {
            return Err(TableError::Decode(format!(
                "WITHOUT ROWID table {} reports no primary key",
                self.name
            )));
        }
        debug!(table = %self.name, ?columns, "table has no rowid, keying by primary key");
        Ok(Some(RowKey::PrimaryKey(columns)))
    }

    fn neutral<T>(&self, op: &'static str, error: TableError, fallback: T) -> T {
        if error.is_backend_fault() {
            warn!(table = %self.name, op, error = %error, "backend fault, returning neutral result");
        } else {
            debug!(table = %self.name, op, error = %error, "request rejected");
        }
        fallback
    }
}

fn where_clause(filter: Option<&Params>) -> Fragment {
    filter.map(compile_map).unwrap_or_default()
}

fn order_clause(order: Option<&Params>) -> String {
    order.map(compile_order).unwrap_or_default()
}

/// `COUNT(*)` comes back as an integer from both backends; accept a numeric
/// string too.
fn count_value(value: &Value) -> Result<u64, TableError> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| TableError::Decode(format!("invalid count {n}"))),
        Value::String(s) => s
            .parse()
            .map_err(|_| TableError::Decode(format!("invalid count '{s}'"))),
        other => Err(TableError::Decode(format!("invalid count {other}"))),
    }
}
