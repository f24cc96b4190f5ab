//! Command implementations for streamcache-cmd

pub mod config;
pub mod spool;
