//! The store contract feature services program against.
//!
//! Feature code never touches either store directly and never branches on
//! environment or connectivity; it holds an `Arc<dyn StoreGateway>` and the
//! adapter behind it decides where each operation lands.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::Result;

/// An opaque row: ordered column-name to JSON-value map.
pub type Row = serde_json::Map<String, Value>;

/// Result of a mutating statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunResult {
    pub changes: u64,
    pub last_insert_rowid: Option<i64>,
}

/// Comparison operators supported by structured reads.
///
/// The remote store answers these with its row-filter API; anything richer
/// is composed client-side from multiple round-trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gt,
    /// `value` is ignored.
    IsNull,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Gt,
            value: value.into(),
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::IsNull,
            value: Value::Null,
        }
    }
}

/// A structured read against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub table: String,
    /// Projection; `None` selects every column.
    pub columns: Option<Vec<String>>,
    pub filters: Vec<Filter>,
    /// `(column, descending)`
    pub order_by: Option<(String, bool)>,
    pub limit: Option<u32>,
}

impl Select {
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: None,
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, descending: bool) -> Self {
        self.order_by = Some((column.into(), descending));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One write inside a batch. Batches execute atomically against whichever
/// store is primary; they never span both stores.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Insert { table: String, record: Row },
    Update { table: String, id: String, patch: Row },
    Delete { table: String, id: String },
}

/// Routing façade contract. Implemented by the adapter crate; service tests
/// substitute an in-memory double.
#[async_trait]
pub trait StoreGateway: Send + Sync {
    /// Raw parameterized read. Routed to the local store verbatim; the remote
    /// store answers only the bounded statement shapes its filter API can
    /// express.
    async fn query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>>;

    /// Raw parameterized statement against the primary store. Writes issued
    /// through `run` are NOT recorded for replay; feature code uses the typed
    /// operations below for anything that must survive reconnection.
    async fn run(&self, sql: &str, params: Vec<Value>) -> Result<RunResult>;

    /// Structured single-table read.
    async fn select(&self, select: Select) -> Result<Vec<Row>>;

    async fn insert(&self, table: &str, record: Row) -> Result<()>;

    async fn update(&self, table: &str, id: &str, patch: Row) -> Result<()>;

    async fn delete(&self, table: &str, id: &str) -> Result<()>;

    /// Apply a write batch atomically against the primary store.
    async fn transaction(&self, ops: Vec<WriteOp>) -> Result<()>;
}
