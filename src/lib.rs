// RepairLog - Job records for a repair shop, stored as one quota-resilient blob

pub mod backend;
pub mod book;
pub mod config;
pub mod dates;
pub mod file;
pub mod message;
pub mod record;
pub mod search;
pub mod store;
pub mod validate;

// Re-export main types for convenience
pub use backend::{BackendError, MemoryBackend, StorageBackend};
pub use book::{BookError, DisplayRow, RecordBook, SubmitOutcome};
pub use config::Config;
pub use dates::{to_canonical, to_display};
pub use file::FileBackend;
pub use message::compose_message;
pub use record::{Record, RecordForm, now_ms};
pub use search::{MatchKind, rank, rank_scored};
pub use store::{LoadError, SaveError, SaveOutcome, Store};
pub use validate::{ValidationError, validate_mobile};
