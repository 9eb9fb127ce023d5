//! Launcher icon rendering.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use webapk_core::icons::DENSITY_BUCKETS;

#[derive(Debug, thiserror::Error)]
pub enum IconError {
    #[error("cannot decode icon {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("cannot write icon {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("cannot create icon directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Resize to an exact `size`x`size` square with Lanczos3 filtering.
pub fn resize_square(image: &DynamicImage, size: u32) -> DynamicImage {
    image.resize_exact(size, size, FilterType::Lanczos3)
}

/// Decode an image, picking the format from its leading bytes. The file
/// extension is only a fallback.
fn decode(icon: &Path) -> image::ImageResult<DynamicImage> {
    ImageReader::open(icon)?.with_guessed_format()?.decode()
}

/// Write one PNG per density bucket into `out_dir` and return their paths.
/// Blocking.
pub fn render_icon_set(icon: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, IconError> {
    let source = decode(icon).map_err(|source| IconError::Decode {
        path: icon.to_path_buf(),
        source,
    })?;
    std::fs::create_dir_all(out_dir)?;

    DENSITY_BUCKETS
        .iter()
        .map(|bucket| {
            let path = out_dir.join(bucket.file_name());
            resize_square(&source, bucket.size)
                .save_with_format(&path, ImageFormat::Png)
                .map_err(|source| IconError::Write {
                    path: path.clone(),
                    source,
                })?;
            Ok(path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, RgbaImage};

    #[test]
    fn resize_produces_exact_square() {
        let wide = DynamicImage::ImageRgba8(RgbaImage::new(300, 120));
        let out = resize_square(&wide, 48);
        assert_eq!(out.dimensions(), (48, 48));
    }

    #[test]
    fn jpeg_saved_with_png_extension_still_renders() {
        let dir = tempfile::tempdir().unwrap();
        let icon = dir.path().join("icon.png");
        let photo = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            64,
            64,
            image::Rgb([10, 120, 200]),
        ));
        photo.save_with_format(&icon, ImageFormat::Jpeg).unwrap();

        let out = dir.path().join("out");
        let written = render_icon_set(&icon, &out).unwrap();
        assert_eq!(written.len(), DENSITY_BUCKETS.len());
        let largest = image::open(written.last().unwrap()).unwrap();
        let expected = DENSITY_BUCKETS.last().unwrap().size;
        assert_eq!(largest.dimensions(), (expected, expected));
    }

    #[test]
    fn undecodable_icon_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("icon.png");
        std::fs::write(&bogus, b"not an image").unwrap();
        let err = render_icon_set(&bogus, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, IconError::Decode { .. }));
    }
}
