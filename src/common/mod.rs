pub mod backoff;
pub mod error;
