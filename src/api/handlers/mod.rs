//! API request handlers.

pub mod status;
pub mod summary;
