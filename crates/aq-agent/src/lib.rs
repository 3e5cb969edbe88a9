//! Library half of the `aq-agent` binary: configuration, argument parsing,
//! and the wiring that builds a parser/recorder stack from config.

pub mod cli;
pub mod config;
pub mod runtime;
