//! Command implementations for the CLI
//!
//! This module contains the implementation of all CLI commands:
//! - start: Build the logging pipeline and run the demo server
//! - test: Build the logging pipeline and print its destinations
//! - config: Configuration display and validation

pub mod config;
pub mod start;
