//! Data types for the scraping library.

pub mod config;
pub mod endpoint;
pub mod record;
