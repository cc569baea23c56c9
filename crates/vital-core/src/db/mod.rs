//! Database layer for Vital

mod connection;
mod cursor_repository;
mod migrations;
mod outbox_repository;

pub use connection::Database;
pub use cursor_repository::{CursorStore, SqliteCursorStore};
pub use outbox_repository::{OutboxStore, SqliteOutboxStore};
