//! Parley Core: configuration and observability shared by the engine and the CLI.

pub mod config;
pub mod observability;
