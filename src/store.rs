//! Record store - read-only access to the downloaded snapshot / 记录存储
//!
//! - One SQLite snapshot file, opened read-only and lazily on first use
//! - User values are always bound parameters, only configured identifiers reach the SQL text
//! - A new snapshot is installed by renaming a temp file over the old one while
//!   holding the write lock, so a search never mixes two snapshots

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::{RwLock, RwLockReadGuard};

use crate::models::{FieldValue, Record};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Snapshot file or master table missing / 快照文件或主表不存在
    #[error("record store unavailable")]
    Unavailable,
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),
    #[error("snapshot install failed: {0}")]
    Install(String),
}

/// Comparison applied by a clause / 匹配方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOp {
    /// Case-insensitive substring / 不区分大小写的子串匹配
    Contains,
    /// Case-insensitive full equality / 不区分大小写的完全匹配
    Equals,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub column: String,
    pub op: MatchOp,
    pub value: String,
}

/// Conjunction of clauses / 过滤条件（AND 组合）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(mut self, column: &str, value: &str) -> Self {
        self.clauses.push(Clause {
            column: column.to_string(),
            op: MatchOp::Contains,
            value: value.to_string(),
        });
        self
    }

    pub fn equals(mut self, column: &str, value: &str) -> Self {
        self.clauses.push(Clause {
            column: column.to_string(),
            op: MatchOp::Equals,
            value: value.to_string(),
        });
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// WHERE clause body with `?` placeholders / 生成 WHERE 子句
    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            return "1 = 1".to_string();
        }
        self.clauses
            .iter()
            .map(|c| match c.op {
                MatchOp::Contains => format!("{} LIKE ? ESCAPE '\\'", quote_ident(&c.column)),
                MatchOp::Equals => format!("{} = ? COLLATE NOCASE", quote_ident(&c.column)),
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// Values to bind, in placeholder order / 按占位符顺序的绑定值
    pub fn bind_values(&self) -> Vec<String> {
        self.clauses
            .iter()
            .map(|c| match c.op {
                MatchOp::Contains => format!("%{}%", escape_like(&c.value)),
                MatchOp::Equals => c.value.clone(),
            })
            .collect()
    }
}

/// Quote an identifier for SQLite / 转义标识符
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Escape LIKE wildcards so user text matches literally / 转义 LIKE 通配符
fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Snapshot-backed record store / 基于快照文件的记录存储
pub struct RecordStore {
    path: PathBuf,
    table: String,
    pool: RwLock<Option<SqlitePool>>,
    loaded_at: parking_lot::RwLock<Option<DateTime<Utc>>>,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>, table: &str) -> Self {
        Self {
            path: path.into(),
            table: table.to_string(),
            pool: RwLock::new(None),
            loaded_at: parking_lot::RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Whether a snapshot file is present on disk / 快照文件是否存在
    pub fn snapshot_exists(&self) -> bool {
        self.path.exists()
    }

    /// Time the current snapshot was opened / 当前快照加载时间
    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        *self.loaded_at.read()
    }

    /// Pin the current snapshot for a count + fetch sequence / 锁定当前快照
    pub async fn snapshot(&self) -> Result<Snapshot<'_>, StoreError> {
        if let Some(snapshot) = self.try_snapshot().await {
            return Ok(snapshot);
        }

        {
            let mut guard = self.pool.write().await;
            if guard.is_none() {
                let pool = self.connect().await?;
                *guard = Some(pool);
                *self.loaded_at.write() = Some(Utc::now());
            }
        }

        self.try_snapshot().await.ok_or(StoreError::Unavailable)
    }

    async fn try_snapshot(&self) -> Option<Snapshot<'_>> {
        let guard = self.pool.read().await;
        RwLockReadGuard::try_map(guard, |p| p.as_ref())
            .ok()
            .map(|pool| Snapshot { pool, table: &self.table })
    }

    pub async fn count(&self, filter: &Filter) -> Result<u64, StoreError> {
        self.snapshot().await?.count(filter).await
    }

    pub async fn fetch(
        &self,
        filter: &Filter,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<Record>, Vec<String>), StoreError> {
        self.snapshot().await?.fetch(filter, limit, offset).await
    }

    /// Open the snapshot read-only and verify the master table / 只读打开快照并校验主表
    async fn connect(&self) -> Result<SqlitePool, StoreError> {
        if !self.path.exists() {
            return Err(StoreError::Unavailable);
        }

        let options = SqliteConnectOptions::new()
            .filename(&self.path)
            .read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let exists: Option<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?"
        )
        .bind(&self.table)
        .fetch_optional(&pool)
        .await?;

        if exists.is_none() {
            tracing::warn!("Snapshot {:?} has no table '{}'", self.path, self.table);
            pool.close().await;
            return Err(StoreError::Unavailable);
        }

        tracing::info!("Snapshot opened: {:?} (table {})", self.path, self.table);
        Ok(pool)
    }

    /// Replace the snapshot file and reopen / 原子替换快照文件并重新打开
    ///
    /// The temp file must live on the same filesystem as the snapshot path.
    pub async fn install_snapshot(&self, file: NamedTempFile) -> Result<(), StoreError> {
        let mut guard = self.pool.write().await;

        if let Some(old) = guard.take() {
            old.close().await;
        }
        *self.loaded_at.write() = None;

        file.persist(&self.path)
            .map_err(|e| StoreError::Install(e.error.to_string()))?;
        tracing::info!("Snapshot installed at {:?}", self.path);

        match self.connect().await {
            Ok(pool) => {
                *guard = Some(pool);
                *self.loaded_at.write() = Some(Utc::now());
            }
            // Searches keep reporting "unavailable" until a usable snapshot arrives
            Err(e) => tracing::warn!("Installed snapshot could not be opened: {}", e),
        }
        Ok(())
    }
}

/// Read guard over one snapshot / 单个快照的读视图
pub struct Snapshot<'a> {
    pool: RwLockReadGuard<'a, SqlitePool>,
    table: &'a str,
}

impl Snapshot<'_> {
    pub async fn count(&self, filter: &Filter) -> Result<u64, StoreError> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {}",
            quote_ident(self.table),
            filter.where_sql()
        );
        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for value in filter.bind_values() {
            query = query.bind(value);
        }
        let total = query.fetch_one(&*self.pool).await.map_err(classify)?;
        Ok(total.max(0) as u64)
    }

    /// Rows in the store's natural order / 按存储自然顺序取行
    pub async fn fetch(
        &self,
        filter: &Filter,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<Record>, Vec<String>), StoreError> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} LIMIT ? OFFSET ?",
            quote_ident(self.table),
            filter.where_sql()
        );
        let mut query = sqlx::query(&sql);
        for value in filter.bind_values() {
            query = query.bind(value);
        }
        let rows = query
            .bind(i64::from(limit))
            .bind(i64::try_from(offset).unwrap_or(i64::MAX))
            .fetch_all(&*self.pool)
            .await
            .map_err(classify)?;

        let columns = match rows.first() {
            Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
            None => self.column_names().await?,
        };

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(decode_row(row, &columns)?);
        }
        Ok((records, columns))
    }

    /// Schema columns of the master table / 主表的列名
    pub async fn column_names(&self) -> Result<Vec<String>, StoreError> {
        let names: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM pragma_table_info(?) ORDER BY cid")
                .bind(self.table)
                .fetch_all(&*self.pool)
                .await
                .map_err(classify)?;
        Ok(names.into_iter().map(|(n,)| n).collect())
    }
}

/// A swapped-in file without the table reads as "unavailable" / 主表缺失视为不可用
fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db) = err {
        if db.message().contains("no such table") {
            return StoreError::Unavailable;
        }
    }
    StoreError::Query(err)
}

fn decode_row(row: &SqliteRow, columns: &[String]) -> Result<Record, StoreError> {
    let mut fields = Vec::with_capacity(columns.len());
    for (idx, name) in columns.iter().enumerate() {
        fields.push((name.clone(), decode_value(row, idx)?));
    }
    Ok(Record::new(fields))
}

fn decode_value(row: &SqliteRow, idx: usize) -> Result<FieldValue, StoreError> {
    let type_name = {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(FieldValue::Null);
        }
        raw.type_info().name().to_string()
    };

    let value = match type_name.as_str() {
        "INTEGER" => FieldValue::Integer(row.try_get(idx)?),
        "REAL" => FieldValue::Real(row.try_get(idx)?),
        "BLOB" => FieldValue::Blob(row.try_get(idx)?),
        _ => FieldValue::Text(row.try_get(idx)?),
    };
    Ok(value)
}
