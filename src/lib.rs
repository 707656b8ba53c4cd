//! LogoMatch verifies that a known brand logo is visibly present in generated
//! marketing creatives, tolerating rotation, scale, and position changes.
//!
//! The pipeline detects FAST corners with binary descriptors on both the logo
//! and the candidate image, matches descriptors by Hamming distance with a
//! ratio test, and confirms geometry with a RANSAC homography fit. The
//! `compliance` module wraps the pipeline into per-image verdicts and a
//! campaign-level runner; optional parallelism is available via the `rayon`
//! feature.

pub mod compliance;
pub mod features;
pub mod geometry;
pub mod image;
pub mod matching;
mod trace;
pub mod util;

pub use compliance::campaign::{
    check_campaign_compliance, check_tasks, CampaignDoc, CheckTask, ComplianceOptions,
    ComplianceSummary, TaskResult,
};
pub use compliance::{check_logo, check_logo_in_image, CheckConfig, ComplianceResult};
pub use features::{Descriptor, Extractor, ExtractorConfig, FeatureSet, Keypoint};
pub use geometry::{estimate_homography, BoundingBox, FitError, Homography, RansacParams};
pub use image::pyramid::{ImagePyramid, OwnedImage};
pub use image::ImageView;
pub use matching::{match_descriptors, MatchPair};
pub use util::{LogoMatchError, LogoMatchResult};
