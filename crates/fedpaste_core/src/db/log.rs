//! Deduplicating event log store.

use crate::constants::{BOT_SESSION_MARKER, LOG_CACHE_CAPACITY, SESSION_MAX_AGE_DAYS};
use crate::db::adapter::{like_escape, PersistenceAdapter, Record, SqlValue};
use crate::db::tables::LOG_COLUMNS;
use crate::db::time_util::{now_millis, to_millis};
use crate::error::AppError;
use crate::models::log::{Log, LogType, NewLog};
use crate::models::paste::ImportReport;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Prefix of session log content.
const SESSION_PREFIX: &str = "session:";

fn row_to_log(record: &Record) -> Log {
    Log {
        content: record.text("Content"),
        timestamp: record.float("Timestamp"),
        log_type: LogType::parse(&record.text("Type")),
        id: record.text("ID"),
    }
}

/// Bounded read cache for [`LogStore::get`]; the oldest entry goes first.
#[derive(Debug, Default)]
struct LogCache {
    entries: HashMap<String, Log>,
    order: VecDeque<String>,
}

impl LogCache {
    fn put(&mut self, log: &Log) {
        if self.entries.insert(log.id.clone(), log.clone()).is_none() {
            self.order.push_back(log.id.clone());
        }
        while self.entries.len() > LOG_CACHE_CAPACITY {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    fn remove(&mut self, id: &str) {
        if self.entries.remove(id).is_some() {
            self.order.retain(|cached| cached != id);
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

/// Accessor for the `logs` table.
pub struct LogStore {
    adapter: Arc<PersistenceAdapter>,
    cache: Mutex<LogCache>,
}

impl LogStore {
    pub fn new(adapter: Arc<PersistenceAdapter>) -> Self {
        Self {
            adapter,
            cache: Mutex::new(LogCache::default()),
        }
    }

    fn cache_put(&self, log: &Log) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(log);
        }
    }

    fn cache_get(&self, id: &str) -> Option<Log> {
        self.cache
            .lock()
            .ok()
            .and_then(|cache| cache.entries.get(id).cloned())
    }

    fn cache_evict(&self, id: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.remove(id);
        }
    }

    fn cache_clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    #[cfg(test)]
    pub(crate) fn cached_entries(&self) -> usize {
        self.cache.lock().map(|cache| cache.entries.len()).unwrap_or(0)
    }

    async fn find_identical(&self, log: &Log) -> Result<Option<Log>, AppError> {
        let statement = format!(
            "SELECT {} FROM logs WHERE Content = ? AND Timestamp = ? AND Type = ?",
            LOG_COLUMNS
        );
        let params = [
            SqlValue::from(&log.content),
            SqlValue::from(log.timestamp),
            SqlValue::from(log.log_type.as_str()),
        ];
        Ok(self
            .adapter
            .get_one(&statement, &params)
            .await?
            .map(|record| row_to_log(&record)))
    }

    /// Append a log row, filling in the type, ID and timestamp when absent.
    ///
    /// A row with the same content, timestamp and type is never stored twice:
    /// the existing row is returned instead. The unique constraint catches
    /// inserts racing past the pre-check.
    ///
    /// # Errors
    /// Propagates storage errors.
    pub async fn create(&self, draft: NewLog) -> Result<Log, AppError> {
        let log = Log {
            content: draft.content,
            timestamp: draft.timestamp.unwrap_or_else(now_millis),
            log_type: draft.log_type.unwrap_or_default(),
            id: draft
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
        };

        if let Some(existing) = self.find_identical(&log).await? {
            tracing::debug!("Log {} already recorded as {}", log.log_type, existing.id);
            return Ok(existing);
        }

        let inserted = self
            .adapter
            .run(
                "INSERT INTO logs (Content, Timestamp, Type, ID) VALUES (?, ?, ?, ?) \
                 ON CONFLICT DO NOTHING",
                &[
                    SqlValue::from(&log.content),
                    SqlValue::from(log.timestamp),
                    SqlValue::from(log.log_type.as_str()),
                    SqlValue::from(&log.id),
                ],
            )
            .await?;

        if inserted == 0 {
            return match self.find_identical(&log).await? {
                Some(existing) => Ok(existing),
                None => Err(AppError::Conflict(format!(
                    "log id '{}' already exists",
                    log.id
                ))),
            };
        }

        Ok(log)
    }

    /// Fetch a log by ID.
    ///
    /// A cached copy is served while its content still matches the stored
    /// row; otherwise the row is reloaded.
    ///
    /// # Errors
    /// Propagates storage errors.
    pub async fn get(&self, id: &str) -> Result<Option<Log>, AppError> {
        let current = self
            .adapter
            .get_one("SELECT Content FROM logs WHERE ID = ?", &[id.into()])
            .await?;
        let Some(current) = current else {
            self.cache_evict(id);
            return Ok(None);
        };

        if let Some(cached) = self.cache_get(id) {
            if cached.content == current.text("Content") {
                return Ok(Some(cached));
            }
        }

        let statement = format!("SELECT {} FROM logs WHERE ID = ?", LOG_COLUMNS);
        let fresh = self
            .adapter
            .get_one(&statement, &[id.into()])
            .await?
            .map(|record| row_to_log(&record));
        match &fresh {
            Some(log) => self.cache_put(log),
            None => self.cache_evict(id),
        }
        Ok(fresh)
    }

    /// Delete a log by ID; returns whether a row was removed.
    pub async fn delete(&self, id: &str) -> Result<bool, AppError> {
        self.cache_evict(id);
        let removed = self
            .adapter
            .run("DELETE FROM logs WHERE ID = ?", &[id.into()])
            .await?;
        Ok(removed > 0)
    }

    /// Replace a log's content; returns whether a row was updated.
    pub async fn update(&self, id: &str, content: &str) -> Result<bool, AppError> {
        self.cache_evict(id);
        let updated = self
            .adapter
            .execute_atomic(
                "UPDATE logs SET Content = ? WHERE ID = ?",
                &[content.into(), id.into()],
            )
            .await?;
        Ok(updated > 0)
    }

    /// Run `SELECT {select} FROM logs WHERE {predicate}`.
    ///
    /// `predicate` and `select` are trusted SQL fragments; values go through
    /// `params`.
    pub async fn query(
        &self,
        predicate: &str,
        select: &str,
        params: &[SqlValue],
    ) -> Result<Vec<Record>, AppError> {
        let statement = format!("SELECT {} FROM logs WHERE {}", select, predicate);
        self.adapter.get_all(&statement, params).await
    }

    /// [`LogStore::query`] decoded into full log rows, oldest first.
    pub async fn query_logs(
        &self,
        predicate: &str,
        params: &[SqlValue],
    ) -> Result<Vec<Log>, AppError> {
        let predicate = format!("{} ORDER BY Timestamp ASC", predicate);
        Ok(self
            .query(&predicate, LOG_COLUMNS, params)
            .await?
            .iter()
            .map(row_to_log)
            .collect())
    }

    /// Number of rows matching `predicate`.
    pub async fn count(&self, predicate: &str, params: &[SqlValue]) -> Result<u64, AppError> {
        let rows = self.query(predicate, "COUNT(*) AS total", params).await?;
        Ok(rows
            .first()
            .map(|row| row.integer("total").max(0) as u64)
            .unwrap_or(0))
    }

    /// Delete every row matching `predicate`.
    pub(crate) async fn delete_where(
        &self,
        predicate: &str,
        params: &[SqlValue],
    ) -> Result<u64, AppError> {
        let statement = format!("DELETE FROM logs WHERE {}", predicate);
        let removed = self.adapter.run(&statement, params).await?;
        if removed > 0 {
            self.cache_clear();
        }
        Ok(removed)
    }

    /// Re-insert exported logs, keeping their IDs and timestamps.
    ///
    /// # Errors
    /// Storage faults abort the import; per-row rejections are reported.
    pub async fn import_all(&self, logs: Vec<Log>) -> Result<ImportReport, AppError> {
        let mut report = ImportReport::default();
        for log in logs {
            let id = log.id.clone();
            match self.create(NewLog::from(log)).await {
                Ok(stored) => report.imported.push(stored.id),
                Err(err) if err.is_fault() => return Err(err),
                Err(err) => report.failed.push((id, err.message())),
            }
        }
        Ok(report)
    }

    /// Record a login session; bot sessions carry a marker so they can be
    /// purged separately.
    pub async fn create_session(&self, token: &str, is_bot: bool) -> Result<Log, AppError> {
        let mut content = format!("{}{}", SESSION_PREFIX, token);
        if is_bot {
            content.push_str(BOT_SESSION_MARKER);
        }
        self.create(NewLog::new(LogType::Session, content)).await
    }

    /// Delete every bot-flagged session.
    pub async fn purge_bot_sessions(&self) -> Result<u64, AppError> {
        let pattern = format!("%{}", like_escape(BOT_SESSION_MARKER));
        let removed = self
            .delete_where(
                "Type = ? AND Content LIKE ? ESCAPE '\\'",
                &[LogType::Session.as_str().into(), pattern.into()],
            )
            .await?;
        tracing::info!("Purged {} bot session(s)", removed);
        Ok(removed)
    }

    /// Delete sessions older than the retention window relative to `now`.
    pub async fn prune_sessions(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let cutoff = to_millis(now - Duration::days(SESSION_MAX_AGE_DAYS));
        let removed = self
            .delete_where(
                "Type = ? AND Timestamp < ?",
                &[LogType::Session.as_str().into(), cutoff.into()],
            )
            .await?;
        if removed > 0 {
            tracing::info!("Pruned {} expired session(s)", removed);
        }
        Ok(removed)
    }

    /// Startup pass: optionally purge bot sessions, then prune old sessions.
    pub async fn startup_maintenance(&self, purge_bots: bool) -> Result<(), AppError> {
        if purge_bots {
            self.purge_bot_sessions().await?;
        }
        self.prune_sessions(Utc::now()).await?;
        Ok(())
    }
}
