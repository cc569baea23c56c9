//! Outbox upload machinery

mod batch;
mod guard;
mod overlap;
mod pipeline;
mod transport;

pub use batch::{calculate_limit, fallback_limit, CHUNK_BYTE_LIMIT};
pub use guard::{SingleFlightGuard, SingleFlightPermit};
pub use overlap::resolve_overlaps;
pub use pipeline::{PostOutcome, UploadPipeline};
pub use transport::{ChunkResponse, HttpLogTransport, LogTransport, ResponseClass};
