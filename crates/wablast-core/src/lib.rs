//! # wablast-core
//!
//! Core types, traits, configuration, and error handling for wablast.

pub mod config;
pub mod error;
pub mod handle;
pub mod message;
pub mod traits;

pub use config::shellexpand;
