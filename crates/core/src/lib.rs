//! Domain types and pure logic shared by every WebAPK crate.
//!
//! Nothing in here performs I/O. The database, pipeline, worker and API
//! crates build on these types.

pub mod conversion;
pub mod error;
pub mod icons;
pub mod naming;
pub mod progress;
pub mod types;
