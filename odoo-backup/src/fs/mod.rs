//! Filesystem helpers: staging layout and tree summaries.

pub mod staging;
pub mod walker;
