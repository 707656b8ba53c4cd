//! Per-image logo compliance checks and the campaign-level runner.
//!
//! A check runs the full pipeline (feature extraction, ratio-test matching,
//! geometric verification) and reduces it to a [`ComplianceResult`]. Every
//! per-image failure is converted to data on the result: this function never
//! panics and never returns an error, so a single bad image can not abort a
//! campaign run.

use crate::features::{Extractor, ExtractorConfig};
use crate::geometry::{estimate_homography, projected_bounds, BoundingBox, RansacParams};
use crate::image::io::load_gray_image;
use crate::image::pyramid::OwnedImage;
use crate::matching::match_descriptors;
use crate::trace::{trace_event, trace_span};
use serde::Serialize;
use std::path::Path;

pub mod campaign;

/// Minimum correspondences required before a geometric fit is attempted.
const MIN_GEOMETRY_MATCHES: usize = 4;

/// Configuration for a single logo compliance check.
#[derive(Debug, Clone, Copy)]
pub struct CheckConfig {
    /// Absolute floor of accepted matches for a found verdict. Protects
    /// against high-ratio-but-low-count false positives on sparse logos.
    pub min_match_count: usize,
    /// Lowe ratio-test threshold in (0, 1).
    pub good_match_threshold: f32,
    /// Feature extraction settings shared by logo and candidate.
    pub extractor: ExtractorConfig,
    /// Geometric verification settings.
    pub ransac: RansacParams,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            min_match_count: 10,
            good_match_threshold: 0.75,
            extractor: ExtractorConfig::default(),
            ransac: RansacParams::default(),
        }
    }
}

/// Outcome of checking one candidate image for one logo.
#[derive(Debug, Clone, Serialize)]
pub struct ComplianceResult {
    /// Whether the logo was detected.
    pub found: bool,
    /// Number of ratio-test-accepted feature matches.
    pub match_count: usize,
    /// Fraction of the logo's keypoints relocated, clamped to [0, 1] and
    /// rounded to 3 decimals.
    pub confidence: f32,
    /// Bounding box of the detected logo, when geometry could be fitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<BoundingBox>,
    /// Failure description when the check could not run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComplianceResult {
    /// A result for a check that could not run. Forces the not-found state:
    /// `error` present implies `found == false`, zero matches, zero
    /// confidence, no location.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            found: false,
            match_count: 0,
            confidence: 0.0,
            location: None,
            error: Some(message.into()),
        }
    }
}

/// Checks whether the logo appears in the candidate image, both already
/// decoded to grayscale.
pub fn check_logo(logo: &OwnedImage, candidate: &OwnedImage, config: &CheckConfig) -> ComplianceResult {
    let _span = trace_span!(
        "check_logo",
        logo_w = logo.width(),
        logo_h = logo.height(),
        candidate_w = candidate.width(),
        candidate_h = candidate.height()
    )
    .entered();

    let extractor = Extractor::new(config.extractor);
    let logo_features = extractor.detect_and_compute(logo);
    let candidate_features = extractor.detect_and_compute(candidate);

    if logo_features.is_empty() || candidate_features.is_empty() {
        return ComplianceResult::failure("Not enough features detected in images");
    }

    let matches = match_descriptors(
        &logo_features.descriptors,
        &candidate_features.descriptors,
        config.good_match_threshold,
    );
    let match_count = matches.len();
    let found = match_count >= config.min_match_count;

    // Confidence reflects how much of the logo's own distinguishing
    // structure was relocated, independent of how feature-rich the
    // background scene is.
    let confidence = (match_count as f32 / logo_features.len().max(1) as f32).min(1.0);
    let confidence = (confidence * 1000.0).round() / 1000.0;

    let mut location = None;
    if found && match_count >= MIN_GEOMETRY_MATCHES {
        let src: Vec<(f32, f32)> = matches
            .iter()
            .map(|m| {
                let kp = &logo_features.keypoints[m.query_idx];
                (kp.x, kp.y)
            })
            .collect();
        let dst: Vec<(f32, f32)> = matches
            .iter()
            .map(|m| {
                let kp = &candidate_features.keypoints[m.train_idx];
                (kp.x, kp.y)
            })
            .collect();
        // A failed fit only loses the bounding box; the verdict stands on
        // the match count alone.
        if let Ok(model) = estimate_homography(&src, &dst, &config.ransac) {
            location = projected_bounds(&model, logo.width(), logo.height());
        }
    }

    trace_event!(
        "check_logo_done",
        matches = match_count,
        found = found,
        located = location.is_some()
    );

    ComplianceResult {
        found,
        match_count,
        confidence,
        location,
        error: None,
    }
}

/// Checks whether the logo appears in the candidate image, loading both from
/// disk. Missing or undecodable files become error results, never panics or
/// propagated errors.
pub fn check_logo_in_image(
    candidate_path: impl AsRef<Path>,
    logo_path: impl AsRef<Path>,
    config: &CheckConfig,
) -> ComplianceResult {
    let candidate_path = candidate_path.as_ref();
    let logo_path = logo_path.as_ref();

    if !candidate_path.exists() {
        return ComplianceResult::failure(format!(
            "Campaign image not found: {}",
            candidate_path.display()
        ));
    }
    if !logo_path.exists() {
        return ComplianceResult::failure(format!("Logo image not found: {}", logo_path.display()));
    }

    let candidate = match load_gray_image(candidate_path) {
        Ok(img) => img,
        Err(_) => {
            return ComplianceResult::failure(format!(
                "Could not read campaign image: {}",
                candidate_path.display()
            ))
        }
    };
    let logo = match load_gray_image(logo_path) {
        Ok(img) => img,
        Err(_) => {
            return ComplianceResult::failure(format!(
                "Could not read logo image: {}",
                logo_path.display()
            ))
        }
    };

    check_logo(&logo, &candidate, config)
}

#[cfg(test)]
mod tests {
    use super::{check_logo, check_logo_in_image, CheckConfig, ComplianceResult};
    use crate::image::pyramid::OwnedImage;

    fn assert_error_invariants(result: &ComplianceResult) {
        assert!(result.error.is_some());
        assert!(!result.found);
        assert_eq!(result.match_count, 0);
        assert_eq!(result.confidence, 0.0);
        assert!(result.location.is_none());
    }

    #[test]
    fn missing_candidate_file_is_an_error_result() {
        let result =
            check_logo_in_image("/nonexistent/image.png", "/nonexistent/logo.png", &CheckConfig::default());
        assert_error_invariants(&result);
        assert!(result.error.as_deref().unwrap().starts_with("Campaign image not found"));
    }

    #[test]
    fn blank_images_report_not_enough_features() {
        let blank = OwnedImage::new(vec![128u8; 128 * 128], 128, 128).unwrap();
        let result = check_logo(&blank, &blank, &CheckConfig::default());
        assert_error_invariants(&result);
        assert_eq!(result.error.as_deref(), Some("Not enough features detected in images"));
    }

    #[test]
    fn confidence_stays_within_bounds() {
        // Asymmetric block values; checkerboard X-junctions would give FAST
        // no contiguous arc to detect.
        let mut data = Vec::with_capacity(160 * 160);
        for y in 0..160 {
            for x in 0..160 {
                let (bx, by) = (x / 10, y / 10);
                data.push(((bx * 41 + by * 89 + bx * bx * 7 + by * by * 23) % 256) as u8);
            }
        }
        let img = OwnedImage::new(data, 160, 160).unwrap();
        let result = check_logo(&img, &img, &CheckConfig::default());
        assert!(result.error.is_none());
        assert!((0.0..=1.0).contains(&result.confidence));
    }
}
