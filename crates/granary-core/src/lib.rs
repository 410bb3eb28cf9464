//! Core types and trait definitions for the Granary warehouse load engine.
//!
//! This crate is deliberately free of database and I/O dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod calendar;
pub mod detect;
pub mod dimension;
pub mod error;
pub mod fact;
pub mod feed;
pub mod store;

pub use error::{Error, Result};
