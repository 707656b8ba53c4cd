//! Rotation/scale-invariant keypoint detection and binary descriptors.
//!
//! The extractor runs FAST-9 corner detection on every pyramid level, assigns
//! each corner an orientation from its intensity centroid, and computes a
//! steered 256-bit BRIEF descriptor on a box-blurred copy of the level. The
//! output is deterministic for identical pixels and configuration: keypoints
//! are ordered by descending corner score with (y, x, level) tie-breaks.

use crate::image::pyramid::{ImagePyramid, OwnedImage};
use crate::trace::{trace_event, trace_span};

mod brief;
mod fast;

pub use brief::BriefPattern;

/// Detection margin in pixels at every pyramid level, covering the FAST
/// circle radius. The orientation patch and BRIEF samples reach further out
/// and clamp at the image border, so corners near the edge stay detectable.
pub(crate) const BORDER: usize = 3;

/// Radius of the separable box blur applied before descriptor sampling.
const BLUR_RADIUS: usize = 2;

/// A detected corner in base-image coordinates.
#[derive(Debug, Clone, Copy)]
pub struct Keypoint {
    /// X coordinate in base-image pixels.
    pub x: f32,
    /// Y coordinate in base-image pixels.
    pub y: f32,
    /// Orientation in radians from the intensity centroid.
    pub angle: f32,
    /// FAST corner response used for ranking.
    pub score: f32,
    /// Pyramid level the corner was detected on (0 = base).
    pub level: usize,
}

/// 256-bit binary descriptor (32 bytes).
pub type Descriptor = [u8; 32];

/// Keypoints with their descriptors, index-aligned.
#[derive(Debug, Default, Clone)]
pub struct FeatureSet {
    /// Detected keypoints, strongest first.
    pub keypoints: Vec<Keypoint>,
    /// Descriptor for each keypoint at the same index.
    pub descriptors: Vec<Descriptor>,
}

impl FeatureSet {
    /// Returns the number of detected keypoints.
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    /// Returns true if no keypoints were detected.
    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// Feature extraction configuration.
#[derive(Debug, Clone, Copy)]
pub struct ExtractorConfig {
    /// Maximum keypoints retained across all levels.
    pub max_features: usize,
    /// FAST segment-test brightness threshold.
    pub fast_threshold: u8,
    /// Number of pyramid levels to search (scale invariance coverage).
    pub num_levels: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_features: 1000,
            fast_threshold: 20,
            num_levels: 4,
        }
    }
}

/// Keypoint detector and descriptor extractor.
pub struct Extractor {
    config: ExtractorConfig,
    pattern: BriefPattern,
}

impl Extractor {
    /// Creates an extractor with the given configuration and the fixed
    /// default sampling pattern.
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config,
            pattern: BriefPattern::default(),
        }
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Detects keypoints and computes descriptors for a grayscale image.
    ///
    /// Blank or degenerate images produce an empty `FeatureSet`; this is a
    /// valid outcome, not an error.
    pub fn detect_and_compute(&self, image: &OwnedImage) -> FeatureSet {
        let _span = trace_span!(
            "detect_features",
            width = image.width(),
            height = image.height()
        )
        .entered();

        let pyramid = ImagePyramid::build(image.view(), self.config.num_levels)
            .expect("owned image view is always valid");

        let mut detected: Vec<(Keypoint, Descriptor)> = Vec::new();
        for (level, level_img) in pyramid.levels().iter().enumerate() {
            if level_img.width() < 2 * BORDER + 1 || level_img.height() < 2 * BORDER + 1 {
                break;
            }
            let scale = pyramid.scale(level);
            let corners = fast::detect(level_img.view(), self.config.fast_threshold, BORDER);
            if corners.is_empty() {
                continue;
            }
            let blurred = level_img.box_blur(BLUR_RADIUS);
            for corner in corners {
                let angle = brief::orientation(level_img.view(), corner.x, corner.y);
                let descriptor =
                    self.pattern
                        .describe(blurred.view(), corner.x as f32, corner.y as f32, angle);
                detected.push((
                    Keypoint {
                        x: corner.x as f32 * scale,
                        y: corner.y as f32 * scale,
                        angle,
                        score: corner.score as f32,
                        level,
                    },
                    descriptor,
                ));
            }
        }

        detected.sort_by(|a, b| {
            b.0.score
                .total_cmp(&a.0.score)
                .then_with(|| a.0.y.total_cmp(&b.0.y))
                .then_with(|| a.0.x.total_cmp(&b.0.x))
                .then_with(|| a.0.level.cmp(&b.0.level))
        });
        detected.truncate(self.config.max_features);

        trace_event!("keypoints", count = detected.len());

        let mut set = FeatureSet {
            keypoints: Vec::with_capacity(detected.len()),
            descriptors: Vec::with_capacity(detected.len()),
        };
        for (keypoint, descriptor) in detected {
            set.keypoints.push(keypoint);
            set.descriptors.push(descriptor);
        }
        set
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(ExtractorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::{Extractor, ExtractorConfig};
    use crate::image::pyramid::OwnedImage;

    fn textured_image(width: usize, height: usize) -> OwnedImage {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                // Blocky pattern with asymmetric junctions: a symmetric
                // checkerboard cross has no contiguous FAST arc at all.
                let (bx, by) = (x / 8, y / 8);
                let value = (bx * 41 + by * 89 + bx * bx * 7 + by * by * 23) % 256;
                data.push(value as u8);
            }
        }
        OwnedImage::new(data, width, height).unwrap()
    }

    #[test]
    fn blank_image_yields_no_keypoints() {
        let img = OwnedImage::new(vec![128u8; 128 * 128], 128, 128).unwrap();
        let set = Extractor::default().detect_and_compute(&img);
        assert!(set.is_empty());
    }

    #[test]
    fn textured_image_yields_keypoints_with_descriptors() {
        let img = textured_image(128, 128);
        let set = Extractor::default().detect_and_compute(&img);
        assert!(!set.is_empty());
        assert_eq!(set.keypoints.len(), set.descriptors.len());
        // Strongest-first ordering.
        for pair in set.keypoints.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn detection_is_deterministic() {
        let img = textured_image(96, 96);
        let extractor = Extractor::default();
        let a = extractor.detect_and_compute(&img);
        let b = extractor.detect_and_compute(&img);
        assert_eq!(a.len(), b.len());
        for (ka, kb) in a.keypoints.iter().zip(&b.keypoints) {
            assert_eq!(ka.x, kb.x);
            assert_eq!(ka.y, kb.y);
        }
        assert_eq!(a.descriptors, b.descriptors);
    }

    #[test]
    fn max_features_caps_output() {
        let img = textured_image(160, 160);
        let capped = Extractor::new(ExtractorConfig {
            max_features: 10,
            ..ExtractorConfig::default()
        })
        .detect_and_compute(&img);
        assert!(capped.len() <= 10);
    }

    #[test]
    fn image_smaller_than_border_yields_empty_set() {
        let img = OwnedImage::new(vec![0u8; 6 * 6], 6, 6).unwrap();
        let set = Extractor::default().detect_and_compute(&img);
        assert!(set.is_empty());
    }

    #[test]
    fn corners_near_the_border_are_detected() {
        // The first block junction sits 8px from the edge; losing it would
        // starve small logos of most of their keypoints.
        let img = textured_image(128, 128);
        let set = Extractor::default().detect_and_compute(&img);
        assert!(set.keypoints.iter().any(|k| k.x <= 12.0));
        assert!(set.keypoints.iter().any(|k| k.y <= 12.0));
    }
}
