pub mod backoff;
pub mod deadline;

pub use backoff::Backoff;
pub use deadline::{deadline_after, remaining};
