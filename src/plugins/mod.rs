//! Bundled plugins.

mod large_first;

pub use large_first::LargeFirst;
