//! The asynchronous build-job pipeline.
//!
//! A conversion job flows through four components, each usable on its own:
//!
//! 1. [`resolver`]: turns an archive or URL into a local web-content directory.
//! 2. [`materializer`]: scaffolds or refreshes the native wrapper project
//!    (web assets, icons, manifest).
//! 3. [`builder`]: runs the release build and locates the binary.
//! 4. [`orchestrator`]: sequences the above for one job, persisting
//!    progress after every stage and publishing the artifact.
//!
//! The external toolchain sits behind the [`toolchain::Toolchain`] trait.

pub mod builder;
pub mod config;
pub mod error;
pub mod icons;
pub mod manifest;
pub mod materializer;
pub mod orchestrator;
pub mod resolver;
pub mod subprocess;
pub mod toolchain;
pub mod workspace;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineErrorKind, Stage};
pub use orchestrator::{JobOutcome, Orchestrator};
