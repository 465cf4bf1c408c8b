//! Diskforged - floppy disk imaging front end
//!
//! This library crate exposes configuration and the imaging orchestrator for
//! the CLI and for integration testing.

pub mod config;
pub mod imaging;
