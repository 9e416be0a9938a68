//! # Menagerie Library
//!
//! This library exposes the Menagerie modules for testing and integration.
//!
//! The main binary uses these modules through the `main.rs` entry point.

pub mod api;
pub mod cli;
pub mod error;

// Re-export menagerie_core for convenience
pub use menagerie_core;
