//! The local store: an embedded SQLite database behind a single worker
//! thread.
//!
//! The database file is exclusively owned by the desktop process; all
//! statements execute on one dedicated thread so async callers never block
//! an executor worker and writes are naturally serialized. `exec` ships a
//! closure to that thread and awaits the result.

use log::{debug, info};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tokio::sync::oneshot;

use pulperia_core::gateway::{FilterOp, Row, RunResult, Select, WriteOp};
use pulperia_core::sync::primary_key_column;

use crate::error::{Result, StorageError};

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Default on-disk location during development. Packaged builds resolve a
/// per-user application-data directory in the shell and pass it to
/// [`LocalStore::open`].
pub fn default_database_path() -> PathBuf {
    PathBuf::from("data").join("pulperia.db")
}

type Job = Box<dyn FnOnce(&mut Connection) + Send>;

/// Handle to the embedded database. Cheap to clone; the worker thread stops
/// when the last handle is dropped.
#[derive(Clone)]
pub struct LocalStore {
    jobs: mpsc::Sender<Job>,
}

impl LocalStore {
    /// Open (creating if needed) the database at `path` and apply the
    /// bundled schema. Errors here are fatal to startup: without a local
    /// store there is no offline operation at all.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        info!("local store opened at {}", path.display());
        Self::from_connection(conn)
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        apply_pragmas(&conn)?;
        bootstrap(&mut conn)?;

        let (jobs, receiver) = mpsc::channel::<Job>();
        std::thread::Builder::new()
            .name("local-store".into())
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    job(&mut conn);
                }
                debug!("local store worker stopped");
            })?;
        Ok(Self { jobs })
    }

    /// Run a closure on the store's worker thread.
    pub async fn exec<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let (reply, on_reply) = oneshot::channel();
        let job: Job = Box::new(move |conn| {
            let _ = reply.send(f(conn));
        });
        self.jobs.send(job).map_err(|_| StorageError::Closed)?;
        on_reply.await.map_err(|_| StorageError::Closed)?
    }

    /// Parameterized read returning rows as column-name → JSON-value maps.
    pub async fn query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>> {
        let sql = sql.to_string();
        self.exec(move |conn| query_rows(conn, &sql, &params)).await
    }

    /// Structured single-table read.
    pub async fn select(&self, select: Select) -> Result<Vec<Row>> {
        let (sql, params) = select_to_sql(&select);
        self.exec(move |conn| query_rows(conn, &sql, &params)).await
    }

    /// Parameterized statement.
    pub async fn run(&self, sql: &str, params: Vec<Value>) -> Result<RunResult> {
        let sql = sql.to_string();
        self.exec(move |conn| {
            let changes = conn.execute(&sql, rusqlite::params_from_iter(params.iter().map(json_to_sql)))?;
            Ok(RunResult {
                changes: changes as u64,
                last_insert_rowid: Some(conn.last_insert_rowid()),
            })
        })
        .await
    }

    /// Apply a write batch inside one transaction.
    pub async fn apply_batch(&self, ops: Vec<WriteOp>) -> Result<()> {
        self.exec(move |conn| {
            let tx = conn.transaction()?;
            for op in &ops {
                match op {
                    WriteOp::Insert { table, record } => insert_row(&tx, table, record)?,
                    WriteOp::Update { table, id, patch } => {
                        update_row(&tx, table, primary_key_column(table), id, patch)?
                    }
                    WriteOp::Delete { table, id } => {
                        delete_row(&tx, table, primary_key_column(table), id)?
                    }
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Plain insert; surfaces constraint violations.
    pub async fn insert(&self, table: &str, record: Row) -> Result<()> {
        let table = table.to_string();
        self.exec(move |conn| insert_row(conn, &table, &record)).await
    }

    /// `INSERT OR REPLACE` by primary key; used by the pull phase so
    /// reapplying a remote row is harmless.
    pub async fn upsert(&self, table: &str, record: Row) -> Result<()> {
        let table = table.to_string();
        self.exec(move |conn| upsert_row(conn, &table, &record)).await
    }

    pub async fn update(&self, table: &str, id: &str, patch: Row) -> Result<()> {
        let table = table.to_string();
        let id = id.to_string();
        self.exec(move |conn| update_row(conn, &table, primary_key_column(&table), &id, &patch))
            .await
    }

    /// Idempotent delete by primary key.
    pub async fn delete(&self, table: &str, id: &str) -> Result<()> {
        let table = table.to_string();
        let id = id.to_string();
        self.exec(move |conn| delete_row(conn, &table, primary_key_column(&table), &id))
            .await
    }
}

fn apply_pragmas(conn: &Connection) -> Result<()> {
    // WAL keeps readers available during writes; NORMAL trades the last few
    // milliseconds of durability on crash for not fsyncing every commit.
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )?;
    Ok(())
}

fn bootstrap(conn: &mut Connection) -> Result<()> {
    let already: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'products'",
            [],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|err| match err {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;
    if already.is_some() {
        debug!("schema already present, skipping bootstrap");
        return Ok(());
    }
    conn.execute_batch(SCHEMA_SQL)
        .map_err(|e| StorageError::Bootstrap(e.to_string()))?;
    info!("schema applied");
    Ok(())
}

fn quote_identifier(value: &str) -> String {
    format!("`{}`", value.replace('`', "``"))
}

fn select_to_sql(select: &Select) -> (String, Vec<Value>) {
    let projection = match &select.columns {
        Some(columns) => columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", "),
        None => "*".to_string(),
    };
    let mut sql = format!("SELECT {} FROM {}", projection, quote_identifier(&select.table));
    let mut params = Vec::new();
    let mut clauses = Vec::new();
    for filter in &select.filters {
        match filter.op {
            FilterOp::Eq => {
                params.push(filter.value.clone());
                clauses.push(format!("{} = ?{}", quote_identifier(&filter.column), params.len()));
            }
            FilterOp::Gt => {
                params.push(filter.value.clone());
                clauses.push(format!("{} > ?{}", quote_identifier(&filter.column), params.len()));
            }
            FilterOp::IsNull => {
                clauses.push(format!("{} IS NULL", quote_identifier(&filter.column)));
            }
        }
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    if let Some((column, descending)) = &select.order_by {
        sql.push_str(&format!(
            " ORDER BY {} {}",
            quote_identifier(column),
            if *descending { "DESC" } else { "ASC" }
        ));
    }
    if let Some(limit) = select.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    (sql, params)
}

pub(crate) fn json_to_sql(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Bool(v) => rusqlite::types::Value::Integer(i64::from(*v)),
        Value::Number(v) => {
            if let Some(i) = v.as_i64() {
                rusqlite::types::Value::Integer(i)
            } else {
                rusqlite::types::Value::Real(v.as_f64().unwrap_or_default())
            }
        }
        Value::String(v) => rusqlite::types::Value::Text(v.clone()),
        // Nested structures are stored as their JSON text.
        other => rusqlite::types::Value::Text(other.to_string()),
    }
}

fn sql_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => {
            Value::String(b.iter().map(|byte| format!("{:02x}", byte)).collect())
        }
    }
}

pub(crate) fn query_rows(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
    let mut statement = conn.prepare(sql)?;
    let columns: Vec<String> = statement
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let mut rows = statement.query(rusqlite::params_from_iter(params.iter().map(json_to_sql)))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut map = Row::new();
        for (index, column) in columns.iter().enumerate() {
            map.insert(column.clone(), sql_to_json(row.get_ref(index)?));
        }
        out.push(map);
    }
    Ok(out)
}

pub(crate) fn insert_row(conn: &Connection, table: &str, record: &Row) -> Result<()> {
    if record.is_empty() {
        return Err(StorageError::InvalidArgument("empty record".into()));
    }
    let columns: Vec<&String> = record.keys().collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_identifier(table),
        columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", "),
        placeholders.join(", ")
    );
    conn.execute(
        &sql,
        rusqlite::params_from_iter(record.values().map(json_to_sql)),
    )?;
    Ok(())
}

pub(crate) fn upsert_row(conn: &Connection, table: &str, record: &Row) -> Result<()> {
    if record.is_empty() {
        return Err(StorageError::InvalidArgument("empty record".into()));
    }
    let columns: Vec<&String> = record.keys().collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
        quote_identifier(table),
        columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", "),
        placeholders.join(", ")
    );
    conn.execute(
        &sql,
        rusqlite::params_from_iter(record.values().map(json_to_sql)),
    )?;
    Ok(())
}

pub(crate) fn update_row(
    conn: &Connection,
    table: &str,
    key_column: &str,
    id: &str,
    patch: &Row,
) -> Result<()> {
    if patch.is_empty() {
        return Err(StorageError::InvalidArgument("empty patch".into()));
    }
    let assignments: Vec<String> = patch
        .keys()
        .enumerate()
        .map(|(i, column)| format!("{} = ?{}", quote_identifier(column), i + 1))
        .collect();
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?{}",
        quote_identifier(table),
        assignments.join(", "),
        quote_identifier(key_column),
        patch.len() + 1
    );
    let mut params: Vec<rusqlite::types::Value> = patch.values().map(json_to_sql).collect();
    params.push(rusqlite::types::Value::Text(id.to_string()));
    conn.execute(&sql, rusqlite::params_from_iter(params))?;
    Ok(())
}

pub(crate) fn delete_row(conn: &Connection, table: &str, key_column: &str, id: &str) -> Result<()> {
    let sql = format!(
        "DELETE FROM {} WHERE {} = ?1",
        quote_identifier(table),
        quote_identifier(key_column)
    );
    conn.execute(&sql, [id])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product_row(id: &str, name: &str, price: &str) -> Row {
        let mut row = Row::new();
        row.insert("id".into(), id.into());
        row.insert("name".into(), name.into());
        row.insert("price".into(), price.into());
        row.insert("stock".into(), "0".into());
        row.insert("tax_rate".into(), "general".into());
        row.insert("active".into(), json!(1));
        row.insert("updated_at".into(), "2026-03-01T00:00:00+00:00".into());
        row
    }

    #[tokio::test]
    async fn bootstrap_is_idempotent_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pos.db");
        {
            let store = LocalStore::open(&path).unwrap();
            store
                .insert("products", product_row("p1", "Cafe", "1800"))
                .await
                .unwrap();
        }
        // Second open must keep existing data and not re-run the schema.
        let store = LocalStore::open(&path).unwrap();
        let rows = store
            .query("SELECT id, name FROM products", vec![])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&json!("Cafe")));
    }

    #[tokio::test]
    async fn query_and_run_round_trip_parameters() {
        let store = LocalStore::open_in_memory().unwrap();
        let result = store
            .run(
                "INSERT INTO config (key, value, updated_at) VALUES (?1, ?2, ?3)",
                vec![json!("exchange_rate"), json!("512.35"), json!("2026-03-01")],
            )
            .await
            .unwrap();
        assert_eq!(result.changes, 1);

        let rows = store
            .query(
                "SELECT value FROM config WHERE key = ?1",
                vec![json!("exchange_rate")],
            )
            .await
            .unwrap();
        assert_eq!(rows[0].get("value"), Some(&json!("512.35")));
    }

    #[tokio::test]
    async fn upsert_by_primary_key_replaces() {
        let store = LocalStore::open_in_memory().unwrap();
        store
            .upsert("products", product_row("p1", "Cafe", "1800"))
            .await
            .unwrap();
        store
            .upsert("products", product_row("p1", "Cafe Molido", "1900"))
            .await
            .unwrap();
        let rows = store
            .query("SELECT name, price FROM products", vec![])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("price"), Some(&json!("1900")));
    }

    #[tokio::test]
    async fn batch_rolls_back_on_failure() {
        let store = LocalStore::open_in_memory().unwrap();
        let bad = vec![
            WriteOp::Insert {
                table: "products".into(),
                record: product_row("p1", "Cafe", "1800"),
            },
            // Same primary key: constraint violation aborts the batch.
            WriteOp::Insert {
                table: "products".into(),
                record: product_row("p1", "Cafe otra vez", "1900"),
            },
        ];
        assert!(store.apply_batch(bad).await.is_err());
        let rows = store.query("SELECT id FROM products", vec![]).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn structured_select_filters_and_orders() {
        let store = LocalStore::open_in_memory().unwrap();
        store
            .insert("products", product_row("p1", "Azucar", "900"))
            .await
            .unwrap();
        store
            .insert("products", product_row("p2", "Arroz", "1250"))
            .await
            .unwrap();

        let rows = store
            .select(
                pulperia_core::gateway::Select::from("products")
                    .columns(vec!["id".into(), "name".into()])
                    .filter(pulperia_core::gateway::Filter::eq("active", 1))
                    .order_by("name", false),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("name"), Some(&json!("Arroz")));
        assert!(rows[0].get("price").is_none());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = LocalStore::open_in_memory().unwrap();
        store
            .insert("products", product_row("p1", "Cafe", "1800"))
            .await
            .unwrap();
        store.delete("products", "p1").await.unwrap();
        store.delete("products", "p1").await.unwrap();
        let rows = store.query("SELECT id FROM products", vec![]).await.unwrap();
        assert!(rows.is_empty());
    }
}
