//! Flat-file index of pending paste expiries.
//!
//! The file is a sequence of `url|rfc3339&` records with no header. Every
//! lookup and sweep is a linear scan of the whole file.

use crate::constants::{EXPIRY_FIELD_DELIMITER, EXPIRY_RECORD_DELIMITER};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use fs2::FileExt;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// One pending expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryEntry {
    pub custom_url: String,
    pub expire_on: DateTime<Utc>,
}

/// Storage for pending expiries.
#[async_trait]
pub trait ExpiryIndex: Send + Sync {
    /// Register `url` to expire at `expire_on`.
    async fn put(&self, url: &str, expire_on: DateTime<Utc>) -> Result<(), AppError>;
    /// Pending expiry for `url`, if any.
    async fn get(&self, url: &str) -> Result<Option<DateTime<Utc>>, AppError>;
    /// Every entry due at or before `now`.
    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<ExpiryEntry>, AppError>;
    /// Drop all records for `urls`; returns how many records were removed.
    async fn remove(&self, urls: &[String]) -> Result<usize, AppError>;
}

/// [`ExpiryIndex`] backed by one append-only text file.
pub struct FlatFileExpiry {
    path: PathBuf,
}

fn format_record(url: &str, expire_on: DateTime<Utc>) -> String {
    format!(
        "{}{}{}{}",
        url,
        EXPIRY_FIELD_DELIMITER,
        expire_on.to_rfc3339_opts(SecondsFormat::Millis, true),
        EXPIRY_RECORD_DELIMITER
    )
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

fn parse_records(contents: &str) -> Vec<(String, Option<DateTime<Utc>>)> {
    contents
        .split(EXPIRY_RECORD_DELIMITER)
        .filter(|record| !record.trim().is_empty())
        .filter_map(|record| {
            let (url, timestamp) = record.split_once(EXPIRY_FIELD_DELIMITER)?;
            Some((url.to_string(), parse_timestamp(timestamp)))
        })
        .collect()
}

/// Substring lookup of `&url|` so `demo` never matches `xdemo` or `demo2`.
fn find_expiry(contents: &str, url: &str) -> Option<DateTime<Utc>> {
    let haystack = format!("{}{}", EXPIRY_RECORD_DELIMITER, contents);
    let needle = format!("{}{}{}", EXPIRY_RECORD_DELIMITER, url, EXPIRY_FIELD_DELIMITER);
    let start = haystack.rfind(&needle)? + needle.len();
    let rest = &haystack[start..];
    let end = rest.find(EXPIRY_RECORD_DELIMITER).unwrap_or(rest.len());
    parse_timestamp(&rest[..end])
}

fn open_locked(path: &Path) -> Result<File, AppError> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    file.lock_exclusive()?;
    Ok(file)
}

async fn blocking<T, F>(task: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| AppError::StorageMessage(format!("expiry task failed: {}", err)))?
}

impl FlatFileExpiry {
    /// Open the index at `path`, creating the file and its directory if needed.
    ///
    /// # Errors
    /// Returns an I/O error when the file cannot be created.
    pub fn initialize(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<String, AppError> {
        let path = self.path.clone();
        blocking(move || {
            let mut file = open_locked(&path)?;
            let mut contents = String::new();
            let read = file.read_to_string(&mut contents);
            file.unlock()?;
            read?;
            Ok(contents)
        })
        .await
    }
}

#[async_trait]
impl ExpiryIndex for FlatFileExpiry {
    async fn put(&self, url: &str, expire_on: DateTime<Utc>) -> Result<(), AppError> {
        let path = self.path.clone();
        let record = format_record(url, expire_on);
        blocking(move || {
            let mut file = open_locked(&path)?;
            let written = file
                .seek(SeekFrom::End(0))
                .and_then(|_| file.write_all(record.as_bytes()))
                .and_then(|_| file.flush());
            file.unlock()?;
            written?;
            Ok(())
        })
        .await
    }

    async fn get(&self, url: &str) -> Result<Option<DateTime<Utc>>, AppError> {
        let contents = self.read_all().await?;
        Ok(find_expiry(&contents, url))
    }

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<ExpiryEntry>, AppError> {
        let contents = self.read_all().await?;
        let mut entries = Vec::new();
        for (custom_url, expire_on) in parse_records(&contents) {
            match expire_on {
                Some(expire_on) if expire_on <= now => entries.push(ExpiryEntry {
                    custom_url,
                    expire_on,
                }),
                Some(_) => {}
                None => tracing::warn!("Skipping malformed expiry record for '{}'", custom_url),
            }
        }
        Ok(entries)
    }

    async fn remove(&self, urls: &[String]) -> Result<usize, AppError> {
        if urls.is_empty() {
            return Ok(0);
        }
        let path = self.path.clone();
        let targets: HashSet<String> = urls.iter().cloned().collect();
        blocking(move || {
            let mut file = open_locked(&path)?;
            let result = (|| -> Result<usize, AppError> {
                let mut contents = String::new();
                file.read_to_string(&mut contents)?;

                let mut kept = String::with_capacity(contents.len());
                let mut removed = 0;
                for record in contents
                    .split(EXPIRY_RECORD_DELIMITER)
                    .filter(|record| !record.trim().is_empty())
                {
                    let url = record
                        .split_once(EXPIRY_FIELD_DELIMITER)
                        .map(|(url, _)| url)
                        .unwrap_or(record);
                    if targets.contains(url) {
                        removed += 1;
                        continue;
                    }
                    kept.push_str(record);
                    kept.push(EXPIRY_RECORD_DELIMITER);
                }

                if removed > 0 {
                    file.set_len(0)?;
                    file.seek(SeekFrom::Start(0))?;
                    file.write_all(kept.as_bytes())?;
                    file.flush()?;
                }
                Ok(removed)
            })();
            file.unlock()?;
            result
        })
        .await
    }
}
