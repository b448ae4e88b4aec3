//! Table definitions for both backends.
//!
//! Identifiers are left unquoted so the same statements address either
//! engine (postgres folds them to lowercase).

/// Schema for the embedded backend.
pub const SQLITE_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS pastes (
        Content TEXT NOT NULL,
        EditPassword TEXT NOT NULL DEFAULT '',
        CustomURL TEXT NOT NULL PRIMARY KEY,
        ViewPassword TEXT NOT NULL DEFAULT '',
        PubDate REAL NOT NULL,
        EditDate REAL NOT NULL,
        GroupName TEXT NOT NULL DEFAULT '',
        GroupSubmitPassword TEXT NOT NULL DEFAULT ''
    )",
    "CREATE INDEX IF NOT EXISTS pastes_group ON pastes (GroupName)",
    "CREATE TABLE IF NOT EXISTS encryption (
        ViewPassword TEXT NOT NULL,
        CustomURL TEXT NOT NULL,
        ENC_IV TEXT NOT NULL,
        ENC_KEY TEXT NOT NULL,
        ENC_CODE TEXT NOT NULL,
        PRIMARY KEY (ViewPassword, CustomURL)
    )",
    "CREATE TABLE IF NOT EXISTS logs (
        Content TEXT NOT NULL,
        Timestamp REAL NOT NULL,
        Type TEXT NOT NULL,
        ID TEXT NOT NULL PRIMARY KEY,
        UNIQUE (Content, Timestamp, Type)
    )",
    "CREATE INDEX IF NOT EXISTS logs_type ON logs (Type)",
];

/// Schema for the client-server backend.
pub const POSTGRES_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS pastes (
        Content TEXT NOT NULL,
        EditPassword VARCHAR(256) NOT NULL DEFAULT '',
        CustomURL VARCHAR(500) NOT NULL PRIMARY KEY,
        ViewPassword VARCHAR(256) NOT NULL DEFAULT '',
        PubDate DOUBLE PRECISION NOT NULL,
        EditDate DOUBLE PRECISION NOT NULL,
        GroupName VARCHAR(500) NOT NULL DEFAULT '',
        GroupSubmitPassword VARCHAR(256) NOT NULL DEFAULT ''
    )",
    "CREATE INDEX IF NOT EXISTS pastes_group ON pastes (GroupName)",
    "CREATE TABLE IF NOT EXISTS encryption (
        ViewPassword VARCHAR(256) NOT NULL,
        CustomURL VARCHAR(500) NOT NULL,
        ENC_IV TEXT NOT NULL,
        ENC_KEY TEXT NOT NULL,
        ENC_CODE TEXT NOT NULL,
        PRIMARY KEY (ViewPassword, CustomURL)
    )",
    "CREATE TABLE IF NOT EXISTS logs (
        Content TEXT NOT NULL,
        Timestamp DOUBLE PRECISION NOT NULL,
        Type VARCHAR(64) NOT NULL,
        ID VARCHAR(64) NOT NULL PRIMARY KEY
    )",
    // md5 keeps the dedup index under the btree entry size limit.
    "CREATE UNIQUE INDEX IF NOT EXISTS logs_dedup ON logs (md5(Content), Timestamp, Type)",
    "CREATE INDEX IF NOT EXISTS logs_type ON logs (Type)",
];

/// Columns selected for paste rows.
pub const PASTE_COLUMNS: &str =
    "Content, EditPassword, CustomURL, ViewPassword, PubDate, EditDate, GroupName, GroupSubmitPassword";

/// Columns selected for log rows.
pub const LOG_COLUMNS: &str = "Content, Timestamp, Type, ID";
