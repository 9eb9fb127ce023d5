pub mod apks;
pub mod conversion_jobs;
