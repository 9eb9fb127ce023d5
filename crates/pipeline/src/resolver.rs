//! Artifact Source Resolver: turns a content source into a local web root.
//!
//! Archives are checked for a usable `index.html` and bounded in entry
//! count and expanded size, then unpacked off the async runtime. URLs become a single wrapper page embedding the remote
//! site in a full-viewport iframe.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use webapk_core::conversion::{ContentSource, MAX_ARCHIVE_ENTRIES, MAX_EXTRACTED_BYTES};
use zip::ZipArchive;

use crate::error::PipelineError;

/// The entry page every web project must provide. Matched case-sensitively.
pub const INDEX_FILE: &str = "index.html";

/// Where the entry page was found inside an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebRootLocation {
    /// `index.html` at the archive root.
    Root,
    /// `index.html` directly inside this single top-level directory.
    Subdirectory(String),
}

/// Bounds on what an archive may expand to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveLimits {
    pub max_entries: usize,
    pub max_extracted_bytes: u64,
}

impl Default for ArchiveLimits {
    fn default() -> Self {
        Self {
            max_entries: MAX_ARCHIVE_ENTRIES,
            max_extracted_bytes: MAX_EXTRACTED_BYTES,
        }
    }
}

fn too_large(limits: &ArchiveLimits) -> PipelineError {
    PipelineError::resolution(format!(
        "archive expands to more than {} bytes",
        limits.max_extracted_bytes
    ))
}

/// Resolved content ready for the materializer.
#[derive(Debug, Clone)]
pub struct ResolvedContent {
    /// Directory whose contents become the app's web assets.
    pub web_root: PathBuf,
}

/// Decide where the web root of a project is, from its relative file paths.
///
/// Accepted iff `index.html` sits at the root, or directly inside exactly
/// one top-level directory. Several candidate directories are ambiguous
/// and rejected.
pub fn locate_web_root<'a, I>(files: I) -> Option<WebRootLocation>
where
    I: IntoIterator<Item = &'a Path>,
{
    let mut candidates = BTreeSet::new();
    for path in files {
        let parts: Vec<_> = path
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        match parts.as_slice() {
            [file] if file == INDEX_FILE => return Some(WebRootLocation::Root),
            [dir, file] if file == INDEX_FILE => {
                candidates.insert(dir.clone());
            }
            _ => {}
        }
    }

    if candidates.len() == 1 {
        candidates.pop_first().map(WebRootLocation::Subdirectory)
    } else {
        None
    }
}

fn open_archive(path: &Path) -> Result<ZipArchive<File>, PipelineError> {
    let file = File::open(path)
        .map_err(|e| PipelineError::resolution(format!("cannot open archive: {e}")))?;
    ZipArchive::new(file).map_err(|e| PipelineError::resolution(format!("corrupt archive: {e}")))
}

fn structure_error() -> PipelineError {
    PipelineError::invalid_structure(format!(
        "archive must contain {INDEX_FILE} at its root or inside a single top-level folder"
    ))
}

/// Safe relative path of every file entry; rejects entries escaping the
/// root and archives whose declared sizes exceed `limits`.
fn file_entries(
    archive: &mut ZipArchive<File>,
    limits: &ArchiveLimits,
) -> Result<Vec<PathBuf>, PipelineError> {
    if archive.len() > limits.max_entries {
        return Err(PipelineError::resolution(format!(
            "archive has {} entries, more than the limit of {}",
            archive.len(),
            limits.max_entries
        )));
    }

    let mut files = Vec::with_capacity(archive.len());
    let mut declared: u64 = 0;
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .map_err(|e| PipelineError::resolution(format!("corrupt archive entry: {e}")))?;
        let Some(path) = entry.enclosed_name() else {
            return Err(PipelineError::resolution(format!(
                "unsafe archive entry '{}'",
                entry.name()
            )));
        };
        if entry.is_file() {
            declared = declared.saturating_add(entry.size());
            if declared > limits.max_extracted_bytes {
                return Err(too_large(limits));
            }
            files.push(path);
        }
    }
    Ok(files)
}

/// Check an archive's structure and declared sizes from its central
/// directory, without extracting anything. Blocking.
pub fn inspect_archive(path: &Path) -> Result<WebRootLocation, PipelineError> {
    inspect_archive_with_limits(path, &ArchiveLimits::default())
}

pub fn inspect_archive_with_limits(
    path: &Path,
    limits: &ArchiveLimits,
) -> Result<WebRootLocation, PipelineError> {
    let mut archive = open_archive(path)?;
    let files = file_entries(&mut archive, limits)?;
    locate_web_root(files.iter().map(PathBuf::as_path)).ok_or_else(structure_error)
}

/// Unpack `archive_path` into `target` and return the web root. Blocking.
///
/// Bytes actually written are counted against `limits` as well, so an
/// archive lying about its sizes stops at the cap.
pub fn extract_archive(
    archive_path: &Path,
    target: &Path,
    limits: &ArchiveLimits,
) -> Result<PathBuf, PipelineError> {
    let mut archive = open_archive(archive_path)?;
    let files = file_entries(&mut archive, limits)?;
    let location =
        locate_web_root(files.iter().map(PathBuf::as_path)).ok_or_else(structure_error)?;

    let io_error = |e: std::io::Error| PipelineError::resolution(format!("extraction failed: {e}"));
    std::fs::create_dir_all(target).map_err(io_error)?;

    let mut written: u64 = 0;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| PipelineError::resolution(format!("corrupt archive entry: {e}")))?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(PipelineError::resolution(format!(
                "unsafe archive entry '{}'",
                entry.name()
            )));
        };
        let out_path = target.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(io_error)?;
        } else if entry.is_file() {
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent).map_err(io_error)?;
            }
            let remaining = limits.max_extracted_bytes - written;
            let mut out = File::create(&out_path).map_err(io_error)?;
            let mut limited = (&mut entry).take(remaining.saturating_add(1));
            let copied = std::io::copy(&mut limited, &mut out).map_err(io_error)?;
            written += copied;
            if written > limits.max_extracted_bytes {
                return Err(too_large(limits));
            }
        }
    }

    Ok(match location {
        WebRootLocation::Root => target.to_path_buf(),
        WebRootLocation::Subdirectory(dir) => target.join(dir),
    })
}

/// Escape a value for use inside a double-quoted HTML attribute.
fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Wrapper page that displays `url` in a full-viewport iframe.
pub fn iframe_document(url: &str) -> String {
    let src = escape_attribute(url);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Web App</title>
    <style>
        html, body {{ margin: 0; padding: 0; height: 100%; overflow: hidden; }}
        iframe {{ width: 100%; height: 100vh; border: none; }}
    </style>
</head>
<body>
    <iframe src="{src}" frameborder="0"></iframe>
</body>
</html>
"#
    )
}

/// Optional reachability check for remote URLs.
#[derive(Debug, Clone)]
pub struct UrlProbe {
    client: reqwest::Client,
}

impl UrlProbe {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// `HEAD` the URL, falling back to `GET` when the server rejects `HEAD`.
    pub async fn check(&self, url: &str) -> Result<(), PipelineError> {
        let head = self.client.head(url).send().await;
        let status = match head {
            Ok(resp) if resp.status().is_success() || resp.status().is_redirection() => {
                return Ok(());
            }
            _ => self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| PipelineError::unreachable(format!("URL unreachable: {e}")))?
                .status(),
        };

        if status.is_success() || status.is_redirection() {
            Ok(())
        } else {
            Err(PipelineError::unreachable(format!(
                "URL unreachable: server answered {status}"
            )))
        }
    }
}

/// Resolves content sources into a directory inside a job workspace.
#[derive(Debug, Clone, Default)]
pub struct SourceResolver {
    probe: Option<UrlProbe>,
    limits: ArchiveLimits,
}

impl SourceResolver {
    pub fn new(probe: Option<UrlProbe>) -> Self {
        Self {
            probe,
            limits: ArchiveLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: ArchiveLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Produce the web root for `source` under `content_dir`.
    ///
    /// `content_dir` must not be shared with other jobs; cleaning it up is
    /// the caller's responsibility.
    pub async fn resolve(
        &self,
        source: &ContentSource,
        content_dir: &Path,
    ) -> Result<ResolvedContent, PipelineError> {
        match source {
            ContentSource::Archive(archive) => {
                let archive = archive.clone();
                let target = content_dir.to_path_buf();
                let limits = self.limits;
                let web_root =
                    tokio::task::spawn_blocking(move || extract_archive(&archive, &target, &limits))
                        .await
                        .map_err(|e| {
                            PipelineError::resolution(format!("extraction task failed: {e}"))
                        })??;
                Ok(ResolvedContent { web_root })
            }
            ContentSource::Url(url) => {
                if let Some(probe) = &self.probe {
                    probe.check(url).await?;
                }
                tokio::fs::create_dir_all(content_dir).await.map_err(|e| {
                    PipelineError::resolution(format!("cannot create content directory: {e}"))
                })?;
                tokio::fs::write(content_dir.join(INDEX_FILE), iframe_document(url))
                    .await
                    .map_err(|e| {
                        PipelineError::resolution(format!("cannot write wrapper page: {e}"))
                    })?;
                Ok(ResolvedContent {
                    web_root: content_dir.to_path_buf(),
                })
            }
        }
    }
}
