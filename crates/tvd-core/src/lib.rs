pub mod config;
pub mod logging;

pub mod assemble;
pub mod coordinator;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod progress;
pub mod prune;
pub mod retry;
pub mod sanitize;
pub mod segment;
pub mod source;
pub mod timespec;

pub use error::{SegmentError, TvdError};
pub use segment::Segment;
