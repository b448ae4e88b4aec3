//! One call interface over the embedded (sqlite) and client-server (postgres)
//! backends.
//!
//! Statements are written once with `?` placeholders and translated to `$n`
//! for postgres. Rows come back as [`Record`]s keyed by lowercased column
//! name, since postgres folds unquoted identifiers to lowercase.

use crate::db::tables;
use crate::error::AppError;
use serde::Serialize;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Postgres, Row, Sqlite, ValueRef};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Connection handle for one of the two supported engines.
#[derive(Clone, Debug)]
pub enum Backend {
    Embedded(SqlitePool),
    ClientServer(PgPool),
}

/// How a statement's result is collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Run,
    GetOne,
    GetAll,
}

impl FromStr for QueryMode {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "run" => Ok(Self::Run),
            "getOne" | "get_one" | "get" => Ok(Self::GetOne),
            "getAll" | "get_all" | "all" => Ok(Self::GetAll),
            other => Err(AppError::Validation(format!(
                "unknown query mode '{}'",
                other
            ))),
        }
    }
}

/// A bound parameter or decoded column value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for SqlValue {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

/// One decoded row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Record(BTreeMap<String, SqlValue>);

impl Record {
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.0.get(&column.to_ascii_lowercase())
    }

    /// Text column; missing, null and non-text values read as empty.
    pub fn text(&self, column: &str) -> String {
        match self.get(column) {
            Some(SqlValue::Text(value)) => value.clone(),
            Some(SqlValue::Integer(value)) => value.to_string(),
            Some(SqlValue::Float(value)) => value.to_string(),
            _ => String::new(),
        }
    }

    pub fn float(&self, column: &str) -> f64 {
        match self.get(column) {
            Some(SqlValue::Float(value)) => *value,
            Some(SqlValue::Integer(value)) => *value as f64,
            Some(SqlValue::Text(value)) => value.parse().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    pub fn integer(&self, column: &str) -> i64 {
        match self.get(column) {
            Some(SqlValue::Integer(value)) => *value,
            Some(SqlValue::Float(value)) => *value as i64,
            Some(SqlValue::Text(value)) => value.parse().unwrap_or(0),
            _ => 0,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn insert(&mut self, column: &str, value: SqlValue) {
        self.0.insert(column.to_ascii_lowercase(), value);
    }
}

/// Result of [`PersistenceAdapter::execute`], shaped by [`QueryMode`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutput {
    Run { rows_affected: u64 },
    One(Option<Record>),
    All(Vec<Record>),
}

impl QueryOutput {
    pub fn rows_affected(&self) -> u64 {
        match self {
            Self::Run { rows_affected } => *rows_affected,
            Self::One(row) => u64::from(row.is_some()),
            Self::All(rows) => rows.len() as u64,
        }
    }

    pub fn into_one(self) -> Option<Record> {
        match self {
            Self::One(row) => row,
            Self::All(rows) => rows.into_iter().next(),
            Self::Run { .. } => None,
        }
    }

    pub fn into_all(self) -> Vec<Record> {
        match self {
            Self::All(rows) => rows,
            Self::One(row) => row.into_iter().collect(),
            Self::Run { .. } => Vec::new(),
        }
    }
}

/// Rewrite `?` placeholders as `$1..$n`, leaving quoted literals untouched.
pub fn number_placeholders(statement: &str) -> String {
    let mut out = String::with_capacity(statement.len() + 8);
    let mut index = 0;
    let mut in_literal = false;
    for ch in statement.chars() {
        match ch {
            '\'' => {
                in_literal = !in_literal;
                out.push(ch);
            }
            '?' if !in_literal => {
                index += 1;
                out.push('$');
                out.push_str(&index.to_string());
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Escape `%`, `_` and `\` for use inside a `LIKE ... ESCAPE '\'` pattern.
pub fn like_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>;
type PgQuery<'q> = sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>;

fn bind_sqlite<'q>(mut query: SqliteQuery<'q>, params: &[SqlValue]) -> SqliteQuery<'q> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Integer(value) => query.bind(*value),
            SqlValue::Float(value) => query.bind(*value),
            SqlValue::Text(value) => query.bind(value.clone()),
        };
    }
    query
}

fn bind_postgres<'q>(mut query: PgQuery<'q>, params: &[SqlValue]) -> PgQuery<'q> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Integer(value) => query.bind(*value),
            SqlValue::Float(value) => query.bind(*value),
            SqlValue::Text(value) => query.bind(value.clone()),
        };
    }
    query
}

fn decode_sqlite_row(row: &SqliteRow) -> Record {
    let mut record = Record::default();
    for (idx, column) in row.columns().iter().enumerate() {
        let is_null = row
            .try_get_raw(idx)
            .map(|raw| raw.is_null())
            .unwrap_or(true);
        let value = if is_null {
            SqlValue::Null
        } else if let Ok(text) = row.try_get::<String, _>(idx) {
            SqlValue::Text(text)
        } else if let Ok(int) = row.try_get::<i64, _>(idx) {
            SqlValue::Integer(int)
        } else if let Ok(float) = row.try_get::<f64, _>(idx) {
            SqlValue::Float(float)
        } else {
            SqlValue::Null
        };
        record.insert(column.name(), value);
    }
    record
}

fn decode_pg_row(row: &PgRow) -> Record {
    let mut record = Record::default();
    for (idx, column) in row.columns().iter().enumerate() {
        let is_null = row
            .try_get_raw(idx)
            .map(|raw| raw.is_null())
            .unwrap_or(true);
        let value = if is_null {
            SqlValue::Null
        } else if let Ok(text) = row.try_get::<String, _>(idx) {
            SqlValue::Text(text)
        } else if let Ok(float) = row.try_get::<f64, _>(idx) {
            SqlValue::Float(float)
        } else if let Ok(int) = row.try_get::<i64, _>(idx) {
            SqlValue::Integer(int)
        } else if let Ok(int) = row.try_get::<i32, _>(idx) {
            SqlValue::Integer(i64::from(int))
        } else if let Ok(flag) = row.try_get::<bool, _>(idx) {
            SqlValue::Integer(i64::from(flag))
        } else {
            SqlValue::Null
        };
        record.insert(column.name(), value);
    }
    record
}

/// Shared statement executor.
pub struct PersistenceAdapter {
    backend: Backend,
}

impl PersistenceAdapter {
    /// Wrap an already-open backend.
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Connect to `url`, picking the backend from its scheme.
    ///
    /// `sqlite:` URLs create the database file (and its directory) on demand.
    ///
    /// # Errors
    /// Returns an error when the URL is unsupported or the driver cannot connect.
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
            tracing::info!("Connected to client-server database");
            return Ok(Self::new(Backend::ClientServer(pool)));
        }
        if url.starts_with("sqlite:") {
            let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
            if let Some(parent) = options.get_filename().parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let pool = SqlitePoolOptions::new()
                .max_connections(4)
                .connect_with(options)
                .await?;
            tracing::info!("Opened embedded database at {}", url);
            return Ok(Self::new(Backend::Embedded(pool)));
        }
        Err(AppError::StorageMessage(format!(
            "Unsupported database URL '{}': expected sqlite: or postgres://",
            url
        )))
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Create the pastes, encryption and logs tables when missing.
    ///
    /// # Errors
    /// Propagates driver errors.
    pub async fn migrate(&self) -> Result<(), AppError> {
        let statements = match self.backend {
            Backend::Embedded(_) => tables::SQLITE_SCHEMA,
            Backend::ClientServer(_) => tables::POSTGRES_SCHEMA,
        };
        for statement in statements {
            self.execute(statement, &[], QueryMode::Run).await?;
        }
        Ok(())
    }

    /// Execute one statement and collect its result according to `mode`.
    ///
    /// # Errors
    /// Propagates driver errors; nothing is retried.
    pub async fn execute(
        &self,
        statement: &str,
        params: &[SqlValue],
        mode: QueryMode,
    ) -> Result<QueryOutput, AppError> {
        match &self.backend {
            Backend::Embedded(pool) => {
                let query = bind_sqlite(sqlx::query(statement), params);
                Ok(match mode {
                    QueryMode::Run => QueryOutput::Run {
                        rows_affected: query.execute(pool).await?.rows_affected(),
                    },
                    QueryMode::GetOne => QueryOutput::One(
                        query
                            .fetch_optional(pool)
                            .await?
                            .map(|row| decode_sqlite_row(&row)),
                    ),
                    QueryMode::GetAll => QueryOutput::All(
                        query
                            .fetch_all(pool)
                            .await?
                            .iter()
                            .map(decode_sqlite_row)
                            .collect(),
                    ),
                })
            }
            Backend::ClientServer(pool) => {
                let numbered = number_placeholders(statement);
                let query = bind_postgres(sqlx::query(&numbered), params);
                Ok(match mode {
                    QueryMode::Run => QueryOutput::Run {
                        rows_affected: query.execute(pool).await?.rows_affected(),
                    },
                    QueryMode::GetOne => QueryOutput::One(
                        query
                            .fetch_optional(pool)
                            .await?
                            .map(|row| decode_pg_row(&row)),
                    ),
                    QueryMode::GetAll => QueryOutput::All(
                        query
                            .fetch_all(pool)
                            .await?
                            .iter()
                            .map(decode_pg_row)
                            .collect(),
                    ),
                })
            }
        }
    }

    /// Execute one statement inside its own transaction.
    ///
    /// This is the "transaction" of the adapter contract: a single statement
    /// committed atomically, not a multi-statement unit of work.
    ///
    /// # Errors
    /// Propagates driver errors; the transaction rolls back on drop.
    pub async fn execute_atomic(
        &self,
        statement: &str,
        params: &[SqlValue],
    ) -> Result<u64, AppError> {
        match &self.backend {
            Backend::Embedded(pool) => {
                let mut txn = pool.begin().await?;
                let affected = bind_sqlite(sqlx::query(statement), params)
                    .execute(&mut *txn)
                    .await?
                    .rows_affected();
                txn.commit().await?;
                Ok(affected)
            }
            Backend::ClientServer(pool) => {
                let numbered = number_placeholders(statement);
                let mut txn = pool.begin().await?;
                let affected = bind_postgres(sqlx::query(&numbered), params)
                    .execute(&mut *txn)
                    .await?
                    .rows_affected();
                txn.commit().await?;
                Ok(affected)
            }
        }
    }

    /// [`QueryMode::Run`] shorthand returning the affected row count.
    pub async fn run(&self, statement: &str, params: &[SqlValue]) -> Result<u64, AppError> {
        Ok(self
            .execute(statement, params, QueryMode::Run)
            .await?
            .rows_affected())
    }

    /// [`QueryMode::GetOne`] shorthand.
    pub async fn get_one(
        &self,
        statement: &str,
        params: &[SqlValue],
    ) -> Result<Option<Record>, AppError> {
        Ok(self
            .execute(statement, params, QueryMode::GetOne)
            .await?
            .into_one())
    }

    /// [`QueryMode::GetAll`] shorthand.
    pub async fn get_all(
        &self,
        statement: &str,
        params: &[SqlValue],
    ) -> Result<Vec<Record>, AppError> {
        Ok(self
            .execute(statement, params, QueryMode::GetAll)
            .await?
            .into_all())
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        match &self.backend {
            Backend::Embedded(pool) => pool.close().await,
            Backend::ClientServer(pool) => pool.close().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn temp_adapter() -> (PersistenceAdapter, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir");
        let url = format!(
            "sqlite://{}",
            temp_dir.path().join("nested").join("adapter.db").display()
        );
        let adapter = PersistenceAdapter::connect(&url).await.expect("connect");
        adapter.migrate().await.expect("migrate");
        (adapter, temp_dir)
    }

    #[test]
    fn number_placeholders_skips_literals() {
        assert_eq!(
            number_placeholders("SELECT * FROM t WHERE a = ? AND b = '?' AND c = ?"),
            "SELECT * FROM t WHERE a = $1 AND b = '?' AND c = $2"
        );
        assert_eq!(number_placeholders("SELECT 1"), "SELECT 1");
    }

    #[test]
    fn like_escape_neutralizes_wildcards() {
        assert_eq!(like_escape("a_b%c\\d"), "a\\_b\\%c\\\\d");
        assert_eq!(like_escape("plain"), "plain");
    }

    #[test]
    fn query_mode_parses_contract_names() {
        assert_eq!("run".parse::<QueryMode>().ok(), Some(QueryMode::Run));
        assert_eq!("getOne".parse::<QueryMode>().ok(), Some(QueryMode::GetOne));
        assert_eq!("getAll".parse::<QueryMode>().ok(), Some(QueryMode::GetAll));
        assert!("drop".parse::<QueryMode>().is_err());
    }

    #[tokio::test]
    async fn execute_modes_on_embedded_backend() {
        let (adapter, _temp) = temp_adapter().await;
        assert!(matches!(adapter.backend(), Backend::Embedded(_)));

        let inserted = adapter
            .execute(
                "INSERT INTO logs (Content, Timestamp, Type, ID) VALUES (?, ?, ?, ?)",
                &["hello".into(), 12.5.into(), "generic".into(), "id-1".into()],
                QueryMode::Run,
            )
            .await
            .expect("insert");
        assert_eq!(inserted.rows_affected(), 1);

        let one = adapter
            .get_one("SELECT * FROM logs WHERE ID = ?", &["id-1".into()])
            .await
            .expect("get one")
            .expect("row");
        assert_eq!(one.text("Content"), "hello");
        assert_eq!(one.text("content"), "hello");
        assert_eq!(one.float("Timestamp"), 12.5);
        assert_eq!(one.text("Type"), "generic");

        let missing = adapter
            .get_one("SELECT * FROM logs WHERE ID = ?", &["nope".into()])
            .await
            .expect("get one");
        assert!(missing.is_none());

        let count = adapter
            .get_one("SELECT COUNT(*) AS total FROM logs", &[])
            .await
            .expect("count")
            .expect("row");
        assert_eq!(count.integer("total"), 1);

        let all = adapter
            .get_all("SELECT ID FROM logs ORDER BY ID", &[])
            .await
            .expect("get all");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].len(), 1);
    }

    #[tokio::test]
    async fn execute_atomic_commits_single_statement() {
        let (adapter, _temp) = temp_adapter().await;
        let affected = adapter
            .execute_atomic(
                "INSERT INTO logs (Content, Timestamp, Type, ID) VALUES (?, ?, ?, ?)",
                &["x".into(), 1.0.into(), "generic".into(), "id-x".into()],
            )
            .await
            .expect("atomic insert");
        assert_eq!(affected, 1);
        let err = adapter
            .execute_atomic(
                "INSERT INTO logs (Content, Timestamp, Type, ID) VALUES (?, ?, ?, ?)",
                &["y".into(), 1.0.into(), "generic".into(), "id-x".into()],
            )
            .await
            .expect_err("primary key violation propagates");
        assert!(err.is_fault());
        assert_eq!(
            adapter
                .get_all("SELECT * FROM logs", &[])
                .await
                .expect("rows")
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn connect_rejects_unknown_schemes() {
        let err = PersistenceAdapter::connect("mysql://localhost/db")
            .await
            .err()
            .expect("unsupported scheme");
        assert!(matches!(err, AppError::StorageMessage(ref msg) if msg.contains("Unsupported")));
    }
}
