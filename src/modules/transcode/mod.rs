pub mod codec;
pub mod command;
pub mod executor;
pub mod job;
pub mod plan;
pub mod publisher;
