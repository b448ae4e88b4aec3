//! Database layer: the persistence adapter and the stores built on it.

/// Backend-neutral statement executor.
pub mod adapter;
/// Flat-file expiry index.
pub mod expiry;
/// Event log storage.
pub mod log;
/// Paste storage.
pub mod paste;
/// Table definitions.
pub mod tables;
pub(crate) mod time_util;

#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::error::AppError;
use crate::federation::FederationClient;
use std::sync::Arc;

use self::adapter::PersistenceAdapter;
use self::expiry::{ExpiryIndex, FlatFileExpiry};
use self::log::LogStore;
use self::paste::PasteStore;

/// Handle to every store, built once at startup and shared by reference.
pub struct Database {
    pub adapter: Arc<PersistenceAdapter>,
    pub pastes: Arc<PasteStore>,
    pub logs: Arc<LogStore>,
    pub expiry: Arc<dyn ExpiryIndex>,
}

impl Database {
    /// Connect to the configured database, create missing tables and open
    /// the expiry index.
    ///
    /// # Errors
    /// Returns an error when the database or expiry file cannot be opened.
    pub async fn open(config: &Config) -> Result<Self, AppError> {
        let adapter = PersistenceAdapter::connect(&config.database_url).await?;
        adapter.migrate().await?;
        let expiry = FlatFileExpiry::initialize(&config.expiry_path)?;
        Self::from_parts(adapter, Arc::new(expiry), config.clone())
    }

    /// Assemble the stores over an open adapter and expiry index.
    ///
    /// # Errors
    /// Returns an error when the federation client cannot be built.
    pub fn from_parts(
        adapter: PersistenceAdapter,
        expiry: Arc<dyn ExpiryIndex>,
        config: Config,
    ) -> Result<Self, AppError> {
        let adapter = Arc::new(adapter);
        let config = Arc::new(config);
        let federation = FederationClient::new(&config.federation_scheme)?;
        let logs = Arc::new(LogStore::new(adapter.clone()));
        let pastes = Arc::new(PasteStore::new(
            adapter.clone(),
            logs.clone(),
            expiry.clone(),
            federation,
            config,
        ));
        Ok(Self {
            adapter,
            pastes,
            logs,
            expiry,
        })
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        self.adapter.close().await;
    }
}
