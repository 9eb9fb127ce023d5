//! Naming helpers: package identifiers, artifact file names, size labels.

use crate::types::DbId;

/// Reverse-domain prefix for every generated application id.
pub const PACKAGE_PREFIX: &str = "com.webapk";

/// Fallback used when a name has no usable characters.
const FALLBACK_NAME: &str = "app";

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Derive an Android application id from a display name.
///
/// Keeps ASCII alphanumerics only, lowercased. A segment may not start
/// with a digit, so such names are prefixed with `app`.
///
/// `"My Cool App!"` becomes `com.webapk.mycoolapp`.
pub fn package_id(app_name: &str) -> String {
    let slug: String = app_name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();

    let segment = match slug.chars().next() {
        None => FALLBACK_NAME.to_string(),
        Some(c) if c.is_ascii_digit() => format!("{FALLBACK_NAME}{slug}"),
        Some(_) => slug,
    };

    format!("{PACKAGE_PREFIX}.{segment}")
}

/// Filesystem-safe stem for an app name: non-alphanumerics become `_`.
pub fn safe_file_stem(app_name: &str) -> String {
    let stem: String = app_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    if stem.chars().all(|c| c == '_') {
        FALLBACK_NAME.to_string()
    } else {
        stem
    }
}

/// File name of the published artifact, keyed by artifact id so two apps
/// with the same display name never collide.
pub fn artifact_file_name(app_name: &str, apk_id: DbId) -> String {
    format!("{}_{apk_id}.apk", safe_file_stem(app_name))
}

/// Human-readable size in megabytes with two decimals, e.g. `"3.25 MB"`.
pub fn format_size_mb(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / BYTES_PER_MB)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_id_strips_punctuation_and_spaces() {
        assert_eq!(package_id("My Cool App!"), "com.webapk.mycoolapp");
    }

    #[test]
    fn package_id_never_starts_segment_with_digit() {
        assert_eq!(package_id("2048"), "com.webapk.app2048");
    }

    #[test]
    fn package_id_falls_back_for_symbol_only_names() {
        assert_eq!(package_id("日本"), "com.webapk.app");
    }

    #[test]
    fn artifact_file_name_is_safe_and_keyed() {
        assert_eq!(artifact_file_name("Demo App", 7), "demo_app_7.apk");
        assert_eq!(artifact_file_name("???", 3), "app_3.apk");
    }

    #[test]
    fn size_is_formatted_with_two_decimals() {
        assert_eq!(format_size_mb(0), "0.00 MB");
        assert_eq!(format_size_mb(1024 * 1024), "1.00 MB");
        assert_eq!(format_size_mb(3 * 1024 * 1024 + 512 * 1024), "3.50 MB");
    }
}
