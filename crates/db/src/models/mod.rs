//! Row types and DTOs for the `apks`, `conversion_jobs` and `analytics` tables.

pub mod analytics;
pub mod apk;
pub mod conversion_job;
pub mod status;
