//! Background build execution: a bounded-concurrency dispatcher that
//! claims queued conversion jobs and runs them through the pipeline, plus
//! startup recovery for jobs orphaned by a crash.

pub mod config;
pub mod dispatcher;
pub mod recovery;
pub mod telemetry;

pub use config::DispatcherConfig;
pub use dispatcher::{BuildDispatcher, DispatchHandle};
