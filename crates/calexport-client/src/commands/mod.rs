//! Command implementations.

pub mod config;
pub mod plugin;
pub mod prefs;
pub mod serve;
