//! Shared test-only helpers for fedpaste_core.

use crate::config::Config;
use crate::Database;
use std::collections::HashMap;
use tempfile::TempDir;

/// Admin secret configured by [`test_config`].
pub(crate) const TEST_ADMIN_PASSWORD: &str = "admin-secret";

/// Configuration rooted in `dir`, with `overrides` applied on top.
pub(crate) fn test_config(dir: &TempDir, overrides: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert(
        "DATA_DIR".to_string(),
        dir.path().to_string_lossy().to_string(),
    );
    vars.insert(
        "ADMIN_PASSWORD".to_string(),
        TEST_ADMIN_PASSWORD.to_string(),
    );
    vars.insert("FEDERATION_SCHEME".to_string(), "http".to_string());
    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }
    Config::from_lookup(move |key| vars.get(key).cloned())
}

/// Creates an isolated sqlite database and expiry file.
///
/// Keep the [`TempDir`] alive for the full test to preserve the backing files.
///
/// # Panics
/// Panics if temp-dir creation or database initialization fails.
pub(crate) async fn setup_temp_db() -> (Database, TempDir) {
    setup_temp_db_with(&[]).await
}

/// [`setup_temp_db`] with configuration overrides.
pub(crate) async fn setup_temp_db_with(overrides: &[(&str, &str)]) -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("temp dir");
    let config = test_config(&temp_dir, overrides);
    let db = Database::open(&config).await.expect("db");
    (db, temp_dir)
}
