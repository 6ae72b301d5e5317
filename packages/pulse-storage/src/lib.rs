pub mod models;
pub mod qdrant;

mod error;

pub use error::Error;
pub use models::{FeedbackFilter, FeedbackRecord, RecordId, SearchHit};

pub type Result<T, E = Error> = std::result::Result<T, E>;
