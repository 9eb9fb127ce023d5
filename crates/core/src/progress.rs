//! Build progress checkpoints.
//!
//! The values are a design choice; what matters is that they increase
//! strictly through the pipeline and that completion is always 100.

/// Job picked up and marked processing.
pub const PICKED_UP: i16 = 10;
/// Per-job workspace allocated.
pub const WORKSPACE_READY: i16 = 20;
/// Web content unpacked or URL wrapper written.
pub const SOURCE_RESOLVED: i16 = 40;
/// Native project scaffolded, assets/icons/manifest refreshed.
pub const PROJECT_MATERIALIZED: i16 = 60;
/// Toolchain release build finished and artifact located.
pub const BUILD_FINISHED: i16 = 80;
/// Artifact relocated and published.
pub const COMPLETE: i16 = 100;

/// All checkpoints in pipeline order.
pub const CHECKPOINTS: [i16; 6] = [
    PICKED_UP,
    WORKSPACE_READY,
    SOURCE_RESOLVED,
    PROJECT_MATERIALIZED,
    BUILD_FINISHED,
    COMPLETE,
];

/// Clamp an arbitrary value into the valid `0..=100` progress range.
pub fn clamp_progress(value: i16) -> i16 {
    value.clamp(0, COMPLETE)
}
