//! Zero-sized repository structs with async SQL methods taking `&PgPool`.

pub mod analytics_repo;
pub mod apk_repo;
pub mod conversion_job_repo;

pub use analytics_repo::AnalyticsRepo;
pub use apk_repo::ApkRepo;
pub use conversion_job_repo::ConversionJobRepo;
