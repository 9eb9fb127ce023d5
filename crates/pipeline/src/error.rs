//! Pipeline error taxonomy.
//!
//! Every failure carries the [`Stage`] it happened in and a
//! [`PipelineErrorKind`]. The kind's [`PipelineError::kind_code`] is
//! persisted in `conversion_jobs.error_kind`.

use std::fmt;
use std::path::PathBuf;

use webapk_db::store::StoreError;

/// Longest toolchain output kept in an error message, in characters.
pub const MAX_ERROR_OUTPUT_CHARS: usize = 2000;

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Submit,
    Resolve,
    Materialize,
    Build,
    Relocate,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Submit => "submit",
            Stage::Resolve => "resolve",
            Stage::Materialize => "materialize",
            Stage::Build => "build",
            Stage::Relocate => "relocate",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineErrorKind {
    /// No `index.html` at the archive root or in a single subdirectory.
    #[error("invalid project structure: {0}")]
    InvalidProjectStructure(String),

    /// Corrupt or unsafe archive, or an unreachable URL.
    #[error("{message}")]
    SourceResolution { message: String, network: bool },

    #[error("`{command}` failed with exit code {}: {output}", fmt_exit_code(*exit_code))]
    Toolchain {
        command: String,
        exit_code: Option<i32>,
        output: String,
    },

    #[error("build succeeded but no artifact was produced at {}", expected.display())]
    ArtifactNotProduced { expected: PathBuf },

    #[error("`{command}` timed out after {secs}s")]
    Timeout { command: String, secs: u64 },

    #[error("storage error: {0}")]
    Storage(String),

    /// Icon decoding or manifest rewriting failed.
    #[error("{0}")]
    Materialize(String),
}

fn fmt_exit_code(code: Option<i32>) -> String {
    code.map_or_else(|| "none (terminated by signal)".to_string(), |c| c.to_string())
}

#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed: {kind}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub kind: PipelineErrorKind,
}

impl PipelineError {
    pub fn new(stage: Stage, kind: PipelineErrorKind) -> Self {
        Self { stage, kind }
    }

    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::new(
            Stage::Submit,
            PipelineErrorKind::InvalidProjectStructure(message.into()),
        )
    }

    pub fn resolution(message: impl Into<String>) -> Self {
        Self::new(
            Stage::Resolve,
            PipelineErrorKind::SourceResolution {
                message: message.into(),
                network: false,
            },
        )
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::new(
            Stage::Resolve,
            PipelineErrorKind::SourceResolution {
                message: message.into(),
                network: true,
            },
        )
    }

    pub fn storage(stage: Stage, message: impl fmt::Display) -> Self {
        Self::new(stage, PipelineErrorKind::Storage(message.to_string()))
    }

    pub fn materialize(message: impl fmt::Display) -> Self {
        Self::new(
            Stage::Materialize,
            PipelineErrorKind::Materialize(message.to_string()),
        )
    }

    /// Stable tag stored alongside the failure message.
    pub fn kind_code(&self) -> &'static str {
        match self.kind {
            PipelineErrorKind::InvalidProjectStructure(_) => "invalid_project_structure",
            PipelineErrorKind::SourceResolution { .. } => "source_resolution",
            PipelineErrorKind::Toolchain { .. } => "toolchain",
            PipelineErrorKind::ArtifactNotProduced { .. } => "artifact_not_produced",
            PipelineErrorKind::Timeout { .. } => "timeout",
            PipelineErrorKind::Storage(_) => "storage",
            PipelineErrorKind::Materialize(_) => "materialize",
        }
    }

    /// Whether running the same job again could plausibly succeed.
    ///
    /// Nothing retries automatically; this only classifies the failure.
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            PipelineErrorKind::Toolchain { .. }
            | PipelineErrorKind::Timeout { .. }
            | PipelineErrorKind::Storage(_) => true,
            PipelineErrorKind::SourceResolution { network, .. } => *network,
            PipelineErrorKind::InvalidProjectStructure(_)
            | PipelineErrorKind::ArtifactNotProduced { .. }
            | PipelineErrorKind::Materialize(_) => false,
        }
    }
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        PipelineError::storage(Stage::Relocate, err)
    }
}

/// Keep the tail of long tool output, where build errors are reported.
pub fn truncate_output(output: &str) -> String {
    let trimmed = output.trim();
    let count = trimmed.chars().count();
    if count <= MAX_ERROR_OUTPUT_CHARS {
        return trimmed.to_string();
    }
    let tail: String = trimmed.chars().skip(count - MAX_ERROR_OUTPUT_CHARS).collect();
    format!("...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toolchain_message_includes_command_and_output() {
        let err = PipelineError::new(
            Stage::Build,
            PipelineErrorKind::Toolchain {
                command: "cordova build android --release".into(),
                exit_code: Some(1),
                output: "SDK not found".into(),
            },
        );
        let message = err.to_string();
        assert!(message.starts_with("build stage failed"));
        assert!(message.contains("exit code 1"));
        assert!(message.contains("SDK not found"));
        assert_eq!(err.kind_code(), "toolchain");
        assert!(err.is_retryable());
    }

    #[test]
    fn structural_errors_are_not_retryable() {
        let err = PipelineError::invalid_structure("missing index.html");
        assert_eq!(err.kind_code(), "invalid_project_structure");
        assert!(!err.is_retryable());
    }

    #[test]
    fn only_network_resolution_failures_are_retryable() {
        assert!(PipelineError::unreachable("timeout").is_retryable());
        assert!(!PipelineError::resolution("corrupt archive").is_retryable());
    }

    #[test]
    fn long_output_keeps_the_tail() {
        let output = format!("{}END", "x".repeat(5000));
        let truncated = truncate_output(&output);
        assert!(truncated.starts_with("..."));
        assert!(truncated.ends_with("END"));
        assert_eq!(truncated.chars().count(), MAX_ERROR_OUTPUT_CHARS + 3);
    }
}
