//! Android launcher icon density buckets.

/// One density bucket: the resource qualifier and the square edge in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DensityBucket {
    pub density: &'static str,
    pub size: u32,
}

/// The six standard launcher icon densities, smallest first.
pub const DENSITY_BUCKETS: [DensityBucket; 6] = [
    DensityBucket { density: "ldpi", size: 36 },
    DensityBucket { density: "mdpi", size: 48 },
    DensityBucket { density: "hdpi", size: 72 },
    DensityBucket { density: "xhdpi", size: 96 },
    DensityBucket { density: "xxhdpi", size: 144 },
    DensityBucket { density: "xxxhdpi", size: 192 },
];

impl DensityBucket {
    /// File name written into the project's icon resource directory.
    pub fn file_name(&self) -> String {
        format!("{}.png", self.density)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_are_strictly_increasing() {
        assert!(DENSITY_BUCKETS.windows(2).all(|w| w[0].size < w[1].size));
    }

    #[test]
    fn file_names_use_density_qualifier() {
        let names: Vec<String> = DENSITY_BUCKETS.iter().map(|b| b.file_name()).collect();
        assert_eq!(names[0], "ldpi.png");
        assert_eq!(names[5], "xxxhdpi.png");
    }
}
