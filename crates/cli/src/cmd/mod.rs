//! Command implementations

pub mod apply;
pub mod config;
pub mod diff;
pub mod watch;
