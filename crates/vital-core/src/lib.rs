//! vital-core - Core library for Vital
//!
//! This crate contains the outbox store, cursor-driven extraction, and the
//! batched upload pipeline used by all Vital interfaces.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod models;
pub mod services;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{DataLogRecord, RecordId, SourceKind};
