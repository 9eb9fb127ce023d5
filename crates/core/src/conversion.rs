//! Conversion requests: what a user submits to have a web project packaged.
//!
//! A request carries a display name, a build mode, exactly one content
//! source (an uploaded archive or a remote URL) and an optional icon.
//! [`ConversionForm`] is the raw, validated-on-demand input coming from the
//! API; [`ConversionRequest`] is the checked value the pipeline consumes.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidateUrl};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum accepted size of an uploaded project archive (50 MiB).
pub const MAX_ARCHIVE_BYTES: usize = 50 * 1024 * 1024;

/// Maximum accepted size of an uploaded icon (5 MiB).
pub const MAX_ICON_BYTES: usize = 5 * 1024 * 1024;

/// Maximum total uncompressed size of an archive's files (500 MiB).
pub const MAX_EXTRACTED_BYTES: u64 = 500 * 1024 * 1024;

/// Maximum number of entries, files and directories, in an archive.
pub const MAX_ARCHIVE_ENTRIES: usize = 10_000;

/// Maximum length of an app display name.
pub const MAX_APP_NAME_LEN: usize = 100;

/// Only `.zip` archives are accepted as project uploads.
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Icon MIME types the image pipeline can decode.
pub const ACCEPTED_ICON_TYPES: &[&str] = &["image/png", "image/jpeg", "image/webp"];

// ---------------------------------------------------------------------------
// AppMode
// ---------------------------------------------------------------------------

/// How the packaged app obtains its content.
///
/// `Online` apps wrap a live URL in an inline frame; `Offline` apps ship the
/// uploaded web assets inside the package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppMode {
    Online,
    Offline,
}

impl AppMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AppMode::Online => "online",
            AppMode::Offline => "offline",
        }
    }
}

impl fmt::Display for AppMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of the known [`AppMode`] values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid mode '{0}', expected 'online' or 'offline'")]
pub struct ParseModeError(pub String);

impl FromStr for AppMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(AppMode::Online),
            "offline" => Ok(AppMode::Offline),
            other => Err(ParseModeError(other.to_string())),
        }
    }
}

impl TryFrom<String> for AppMode {
    type Error = ParseModeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// ContentSource / ConversionRequest
// ---------------------------------------------------------------------------

/// Where the web content for a build comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    /// Path to an already-persisted uploaded `.zip` archive.
    Archive(PathBuf),
    /// Remote page that the app will load at runtime.
    Url(String),
}

impl ContentSource {
    pub fn archive_path(&self) -> Option<&PathBuf> {
        match self {
            ContentSource::Archive(path) => Some(path),
            ContentSource::Url(_) => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            ContentSource::Archive(_) => None,
            ContentSource::Url(url) => Some(url),
        }
    }
}

/// A checked conversion request. Construct via [`ConversionRequest::new`]
/// or [`ConversionForm::into_request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub name: String,
    pub mode: AppMode,
    pub source: ContentSource,
    pub icon: Option<PathBuf>,
}

impl ConversionRequest {
    /// Build a request, enforcing that exactly one content source is given.
    pub fn new(
        name: &str,
        mode: AppMode,
        archive: Option<PathBuf>,
        url: Option<String>,
        icon: Option<PathBuf>,
    ) -> Result<Self, CoreError> {
        let name = validate_app_name(name)?;

        let source = match (archive, url) {
            (Some(path), None) => ContentSource::Archive(path),
            (None, Some(url)) => {
                validate_source_url(&url)?;
                ContentSource::Url(url.trim().to_string())
            }
            (Some(_), Some(_)) => {
                return Err(CoreError::Validation(
                    "Provide either an archive or a URL, not both".into(),
                ))
            }
            (None, None) => {
                return Err(CoreError::Validation(
                    "A project archive or a URL is required".into(),
                ))
            }
        };

        Ok(Self {
            name,
            mode,
            source,
            icon,
        })
    }
}

/// Raw submission fields as they arrive from a client form.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ConversionForm {
    #[validate(length(min = 1, max = 100, message = "App name must be 1-100 characters"))]
    pub name: String,
    pub mode: AppMode,
    #[validate(url(message = "URL is not valid"))]
    pub url: Option<String>,
}

impl ConversionForm {
    /// Validate the form and combine it with stored upload paths.
    pub fn into_request(
        mut self,
        archive: Option<PathBuf>,
        icon: Option<PathBuf>,
    ) -> Result<ConversionRequest, CoreError> {
        // Browsers send empty text inputs as "", which means "no URL".
        self.url = self.url.take().filter(|u| !u.trim().is_empty());
        self.validate()
            .map_err(|e| CoreError::Validation(e.to_string()))?;
        ConversionRequest::new(&self.name, self.mode, archive, self.url, icon)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Trim and validate an app display name.
pub fn validate_app_name(name: &str) -> Result<String, CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("App name is required".into()));
    }
    if trimmed.chars().count() > MAX_APP_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "App name must not exceed {MAX_APP_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// A source URL must be well formed and use `http` or `https`.
pub fn validate_source_url(url: &str) -> Result<(), CoreError> {
    let url = url.trim();
    let has_web_scheme = url.starts_with("http://") || url.starts_with("https://");
    if !has_web_scheme || !url.validate_url() {
        return Err(CoreError::Validation(format!(
            "'{url}' is not a valid http(s) URL"
        )));
    }
    Ok(())
}

/// Whether a file name looks like an accepted project archive.
pub fn is_archive_file_name(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn mode_round_trips_through_strings() {
        assert_eq!("online".parse::<AppMode>().unwrap(), AppMode::Online);
        assert_eq!(AppMode::Offline.to_string(), "offline");
        assert!("hybrid".parse::<AppMode>().is_err());
    }

    #[test]
    fn request_with_url_only_is_accepted() {
        let req = ConversionRequest::new(
            " Demo ",
            AppMode::Online,
            None,
            Some("https://example.com".into()),
            None,
        )
        .unwrap();
        assert_eq!(req.name, "Demo");
        assert_eq!(req.source.url(), Some("https://example.com"));
    }

    #[test]
    fn request_with_both_sources_is_rejected() {
        let result = ConversionRequest::new(
            "Demo",
            AppMode::Offline,
            Some(PathBuf::from("/tmp/site.zip")),
            Some("https://example.com".into()),
            None,
        );
        assert_matches!(result, Err(CoreError::Validation(_)));
    }

    #[test]
    fn request_without_source_is_rejected() {
        let result = ConversionRequest::new("Demo", AppMode::Offline, None, None, None);
        assert_matches!(result, Err(CoreError::Validation(_)));
    }

    #[test]
    fn blank_name_is_rejected() {
        assert!(validate_app_name("   ").is_err());
        assert!(validate_app_name(&"x".repeat(MAX_APP_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn non_web_urls_are_rejected() {
        assert!(validate_source_url("ftp://example.com").is_err());
        assert!(validate_source_url("javascript:alert(1)").is_err());
        assert!(validate_source_url("https://example.com/app").is_ok());
    }

    #[test]
    fn form_treats_blank_url_as_absent() {
        let form = ConversionForm {
            name: "Site".into(),
            mode: AppMode::Offline,
            url: Some("  ".into()),
        };
        let req = form
            .into_request(Some(PathBuf::from("/uploads/a.zip")), None)
            .unwrap();
        assert_eq!(req.source, ContentSource::Archive(PathBuf::from("/uploads/a.zip")));
    }

    #[test]
    fn archive_extension_check_is_case_insensitive() {
        assert!(is_archive_file_name("site.ZIP"));
        assert!(!is_archive_file_name("site.tar.gz"));
        assert!(!is_archive_file_name("zip"));
    }
}
