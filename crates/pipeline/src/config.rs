use std::path::PathBuf;
use std::time::Duration;

/// Pipeline configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Parent directory for per-job scratch workspaces.
    pub work_root: PathBuf,
    /// Where published artifacts live, one subdirectory per artifact id.
    pub downloads_dir: PathBuf,
    /// Toolchain executable (Cordova-compatible CLI).
    pub toolchain_bin: String,
    /// Upper bound for any single toolchain invocation.
    pub build_timeout: Duration,
    /// Probe remote URLs before wrapping them.
    pub verify_url_reachable: bool,
    pub url_probe_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_root: PathBuf::from("./temp_projects"),
            downloads_dir: PathBuf::from("./downloads"),
            toolchain_bin: "cordova".into(),
            build_timeout: Duration::from_secs(1800),
            verify_url_reachable: false,
            url_probe_timeout: Duration::from_secs(10),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default            |
    /// |--------------------------|--------------------|
    /// | `WORK_ROOT`              | `./temp_projects`  |
    /// | `DOWNLOADS_DIR`          | `./downloads`      |
    /// | `TOOLCHAIN_BIN`          | `cordova`          |
    /// | `BUILD_TIMEOUT_SECS`     | `1800`             |
    /// | `VERIFY_URL_REACHABLE`   | `false`            |
    /// | `URL_PROBE_TIMEOUT_SECS` | `10`               |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let work_root = std::env::var("WORK_ROOT")
            .map(PathBuf::from)
            .unwrap_or(defaults.work_root);

        let downloads_dir = std::env::var("DOWNLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.downloads_dir);

        let toolchain_bin = std::env::var("TOOLCHAIN_BIN").unwrap_or(defaults.toolchain_bin);

        let build_timeout_secs: u64 = std::env::var("BUILD_TIMEOUT_SECS")
            .unwrap_or_else(|_| "1800".into())
            .parse()
            .expect("BUILD_TIMEOUT_SECS must be a valid u64");

        let verify_url_reachable: bool = std::env::var("VERIFY_URL_REACHABLE")
            .unwrap_or_else(|_| "false".into())
            .parse()
            .expect("VERIFY_URL_REACHABLE must be 'true' or 'false'");

        let url_probe_timeout_secs: u64 = std::env::var("URL_PROBE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".into())
            .parse()
            .expect("URL_PROBE_TIMEOUT_SECS must be a valid u64");

        Self {
            work_root,
            downloads_dir,
            toolchain_bin,
            build_timeout: Duration::from_secs(build_timeout_secs),
            verify_url_reachable,
            url_probe_timeout: Duration::from_secs(url_probe_timeout_secs),
        }
    }
}
