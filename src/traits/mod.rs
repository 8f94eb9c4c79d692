//! Trait abstractions at the library's seams.
//!
//! These define the interfaces the engine consumes: the injected
//! browser automation engine, the swappable payload validator, and
//! the plugin hook surface.

pub mod browser;
pub mod plugin;
pub mod validator;
