//! Database integration tests.

use super::*;
use crate::credentials;
use crate::error::{AppError, Outcome};
use crate::models::log::{LogType, NewLog};
use crate::models::paste::*;
use crate::test_support::{setup_temp_db, setup_temp_db_with, TEST_ADMIN_PASSWORD};
use chrono::{Duration, Utc};

fn edit_of(url: &str, password: &str, content: &str) -> PasteEdit {
    PasteEdit {
        old_url: url.to_string(),
        old_edit_password: password.to_string(),
        new_url: url.to_string(),
        new_content: content.to_string(),
        ..PasteEdit::default()
    }
}

async fn table_count(db: &Database, table: &str) -> i64 {
    db.adapter
        .get_one(&format!("SELECT COUNT(*) AS total FROM {}", table), &[])
        .await
        .expect("count")
        .map(|row| row.integer("total"))
        .unwrap_or(0)
}

mod expiry_sweep;
