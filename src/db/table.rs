//! Generic key/value table abstraction shared by every persisted record.
//!
//! Records carry an [`EntityMeta`] (partition key, row key, last-write timestamp and
//! an etag used for optimistic concurrency). Reads are expressed with a [`Filter`],
//! a conjunction of column conditions that both the SQLite backend and the
//! in-memory test table can evaluate.

use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

pub const META_COLUMNS: [&str; 4] = ["partition_key", "row_key", "timestamp", "etag"];

/// Keys and write bookkeeping common to all records.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow)]
pub struct EntityMeta {
    pub partition_key: String,
    pub row_key: String,
    /// Milliseconds since the Unix epoch of the last write, `0` for unsaved records.
    pub timestamp: i64,
    pub etag: String,
}

impl EntityMeta {
    pub fn is_saved(&self) -> bool {
        !self.etag.is_empty()
    }

    /// Fill the row key when missing and record a new write.
    pub(crate) fn stamp_write(&mut self) {
        if self.row_key.is_empty() {
            self.row_key = Uuid::new_v4().to_string();
        }
        self.timestamp = next_timestamp();
        self.etag = Uuid::new_v4().to_string();
    }
}

static LAST_TIMESTAMP: AtomicI64 = AtomicI64::new(0);

/// Wall-clock milliseconds, forced to be strictly increasing within the process so
/// that "most recently written" is never a tie.
fn next_timestamp() -> i64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default();

    match LAST_TIMESTAMP.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
        Some(now.max(last + 1))
    }) {
        Ok(prev) | Err(prev) => now.max(prev + 1),
    }
}

/// Column value used for filtering and parameter binding.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    EqIgnoreCase,
    Ge,
    Lt,
    Le,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: &'static str,
    pub op: Op,
    pub value: Value,
}

impl Condition {
    fn matches(&self, actual: &Value) -> bool {
        match self.op {
            Op::Eq => actual == &self.value,
            Op::EqIgnoreCase => match (actual, &self.value) {
                (Value::Text(a), Value::Text(b)) => a.to_lowercase() == b.to_lowercase(),
                (a, b) => a == b,
            },
            Op::Ge => same_kind(actual, &self.value) && actual >= &self.value,
            Op::Lt => same_kind(actual, &self.value) && actual < &self.value,
            Op::Le => same_kind(actual, &self.value) && actual <= &self.value,
        }
    }

    fn to_sql(&self) -> String {
        match self.op {
            Op::Eq => format!("{} = ?", self.column),
            Op::EqIgnoreCase => format!("LOWER({}) = LOWER(?)", self.column),
            Op::Ge => format!("{} >= ?", self.column),
            Op::Lt => format!("{} < ?", self.column),
            Op::Le => format!("{} <= ?", self.column),
        }
    }
}

fn same_kind(a: &Value, b: &Value) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

/// Conjunction of column conditions. An empty filter selects every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    fn with(mut self, column: &'static str, op: Op, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition {
            column,
            op,
            value: value.into(),
        });
        self
    }

    pub fn eq(self, column: &'static str, value: impl Into<Value>) -> Self {
        self.with(column, Op::Eq, value)
    }

    pub fn eq_ignore_case(self, column: &'static str, value: impl Into<Value>) -> Self {
        self.with(column, Op::EqIgnoreCase, value)
    }

    pub fn ge(self, column: &'static str, value: impl Into<Value>) -> Self {
        self.with(column, Op::Ge, value)
    }

    pub fn lt(self, column: &'static str, value: impl Into<Value>) -> Self {
        self.with(column, Op::Lt, value)
    }

    pub fn le(self, column: &'static str, value: impl Into<Value>) -> Self {
        self.with(column, Op::Le, value)
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn matches<T: Entity>(&self, entity: &T) -> bool {
        self.conditions
            .iter()
            .all(|c| c.matches(&entity.value_of(c.column)))
    }

    /// `WHERE` clause with `?` placeholders, empty when the filter selects everything.
    pub(crate) fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = self.conditions.iter().map(Condition::to_sql).collect();
        format!(" WHERE {}", parts.join(" AND "))
    }
}

/// A record stored in a [`Table`].
pub trait Entity: Clone + Debug + Send + Sync + Unpin + 'static {
    const TABLE: &'static str;
    /// Data columns, in binding order, excluding [`META_COLUMNS`].
    const COLUMNS: &'static [&'static str];

    fn meta(&self) -> &EntityMeta;
    fn meta_mut(&mut self) -> &mut EntityMeta;

    /// Value of one of [`Entity::COLUMNS`]; unknown names yield [`Value::Null`].
    fn column(&self, name: &str) -> Value;

    fn value_of(&self, name: &str) -> Value {
        let meta = self.meta();
        match name {
            "partition_key" => meta.partition_key.as_str().into(),
            "row_key" => meta.row_key.as_str().into(),
            "timestamp" => meta.timestamp.into(),
            "etag" => meta.etag.as_str().into(),
            other => self.column(other),
        }
    }
}

/// Remote table of entities.
///
/// Writes return the stored copy with refreshed [`EntityMeta`]. `update` is
/// optimistic: it fails with [`AppError::Conflict`] when the stored etag no longer
/// matches the one carried by the entity.
#[async_trait]
pub trait Table<T: Entity>: Send + Sync + Debug {
    async fn query(&self, filter: &Filter) -> Result<Vec<T>, AppError>;

    async fn insert(&self, entity: T) -> Result<T, AppError>;

    async fn update(&self, entity: T) -> Result<T, AppError>;

    async fn delete(&self, entity: &T) -> Result<(), AppError>;

    /// Remove every record. Returns whether the table is now empty.
    async fn clear_all(&self) -> Result<bool, AppError>;
}

/// Sort newest write first.
pub fn newest_first<T: Entity>(records: &mut [T]) {
    records.sort_by(|a, b| b.meta().timestamp.cmp(&a.meta().timestamp));
}
