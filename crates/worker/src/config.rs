use std::time::Duration;

/// Dispatcher configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Builds allowed to run at the same time (default: `2`).
    pub max_concurrent_builds: usize,
    /// How often to look for queued jobs without a nudge (default: `1000` ms).
    pub poll_interval: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent_builds: 2,
            poll_interval: Duration::from_millis(1000),
        }
    }
}

impl DispatcherConfig {
    /// | Env Var                 | Default |
    /// |-------------------------|---------|
    /// | `MAX_CONCURRENT_BUILDS` | `2`     |
    /// | `DISPATCH_POLL_MS`      | `1000`  |
    pub fn from_env() -> Self {
        let max_concurrent_builds: usize = std::env::var("MAX_CONCURRENT_BUILDS")
            .unwrap_or_else(|_| "2".into())
            .parse()
            .expect("MAX_CONCURRENT_BUILDS must be a valid usize");
        assert!(max_concurrent_builds > 0, "MAX_CONCURRENT_BUILDS must be at least 1");

        let poll_ms: u64 = std::env::var("DISPATCH_POLL_MS")
            .unwrap_or_else(|_| "1000".into())
            .parse()
            .expect("DISPATCH_POLL_MS must be a valid u64");

        Self {
            max_concurrent_builds,
            poll_interval: Duration::from_millis(poll_ms),
        }
    }
}
