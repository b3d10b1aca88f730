//! Keel CLI - Command-line interface for Keel migrations.
//!
//! This crate provides the `keel` binary: creating migration files, applying
//! them to PostgreSQL, reporting status, and resetting a target schema.

pub mod cli;
pub mod commands;
pub mod config;
pub mod env;
pub mod error;
pub mod logging;
pub mod output;
