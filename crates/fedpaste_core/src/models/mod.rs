//! Data models for persistence and the federation wire.

/// Event log rows.
pub mod log;
/// Paste rows, metadata and edit/import payloads.
pub mod paste;

#[cfg(test)]
mod tests;
