//! High-level services composing the storage, extraction, and upload layers

mod store;
mod sync;

pub use store::DataStoreService;
pub use sync::{JobOutcome, SyncService};
