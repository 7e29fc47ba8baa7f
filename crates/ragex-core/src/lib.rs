//! Core types and trait definitions for the RAG experiment store.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod dataset;
pub mod error;
pub mod ground_truth;
pub mod knowledge_base;
pub mod metrics;
pub mod reconcile;
pub mod signature;
pub mod store;

pub use error::{Error, Result};
