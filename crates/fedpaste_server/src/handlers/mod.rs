//! HTTP request handlers.

/// Group listing endpoint.
pub mod group;
/// Raw fetch, edit and delete endpoints.
pub mod paste;

pub use group::list_group;
pub use paste::{delete_paste, edit_paste, raw_paste};
