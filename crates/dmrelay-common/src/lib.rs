//! dmrelay Common - Shared types and utilities
//!
//! This crate provides the run request model and its validation, the
//! outcome status taxonomy, configuration, and the error type shared by
//! all dmrelay components.

pub mod config;
pub mod error;
pub mod request;
pub mod types;

pub use self::config::Config;
pub use error::{Error, Result};
pub use request::{RawRunRequest, RunRequest};
