//! Homography fitting and bounding-region derivation.
//!
//! Matched keypoints are geometrically verified by fitting a projective
//! transform from logo coordinates to candidate-image coordinates with a
//! RANSAC loop around a normalized DLT solve. Fitting failure is reported as
//! an explicit [`FitError`] value, never as a panic: callers treat it as
//! reduced information (no bounding box), not as a failed verdict.

use crate::trace::{trace_event, trace_span};
use crate::util::math::solve_linear;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const PIVOT_EPS: f64 = 1e-10;

/// Axis-aligned bounding box in candidate-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Box width.
    pub width: i32,
    /// Box height.
    pub height: i32,
}

/// 3x3 projective transform, row-major, mapping logo points to candidate
/// points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    h: [f64; 9],
}

impl Homography {
    /// Creates a homography from a row-major 3x3 matrix.
    pub fn new(h: [f64; 9]) -> Self {
        Self { h }
    }

    /// Returns the row-major matrix entries.
    pub fn matrix(&self) -> &[f64; 9] {
        &self.h
    }

    /// Projects a point, or returns `None` if it maps to infinity.
    pub fn project(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let h = &self.h;
        let w = h[6] * x + h[7] * y + h[8];
        if w.abs() < PIVOT_EPS {
            return None;
        }
        let u = (h[0] * x + h[1] * y + h[2]) / w;
        let v = (h[3] * x + h[4] * y + h[5]) / w;
        Some((u, v))
    }

    /// Squared reprojection error for one correspondence, or `None` if the
    /// source point maps to infinity.
    fn reprojection_error_sq(&self, src: (f32, f32), dst: (f32, f32)) -> Option<f64> {
        let (u, v) = self.project(f64::from(src.0), f64::from(src.1))?;
        let du = u - f64::from(dst.0);
        let dv = v - f64::from(dst.1);
        Some(du * du + dv * dv)
    }
}

/// Why a homography could not be fitted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FitError {
    /// Fewer than the 4 correspondences a projective fit requires.
    #[error("too few correspondences: got {got}, need at least 4")]
    TooFewPoints {
        /// Number of correspondences supplied.
        got: usize,
    },
    /// The point configuration is degenerate (collinear or coincident).
    #[error("degenerate point configuration")]
    Degenerate,
    /// No model reached the minimum consensus of 4 inliers.
    #[error("no consensus reached")]
    NoConsensus,
}

/// RANSAC configuration for the homography fit.
#[derive(Debug, Clone, Copy)]
pub struct RansacParams {
    /// Maximum sampling iterations.
    pub max_iterations: usize,
    /// Reprojection tolerance in pixels for counting inliers.
    pub inlier_threshold: f64,
    /// Seed for the deterministic sampler.
    pub seed: u64,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            inlier_threshold: 5.0,
            seed: 0xC0FF_EE11,
        }
    }
}

/// Fits a homography mapping `src` points onto `dst` points with RANSAC,
/// then refits on the consensus set by least squares.
///
/// Deterministic for identical inputs and parameters.
pub fn estimate_homography(
    src: &[(f32, f32)],
    dst: &[(f32, f32)],
    params: &RansacParams,
) -> Result<Homography, FitError> {
    let n = src.len().min(dst.len());
    if n < 4 {
        return Err(FitError::TooFewPoints { got: n });
    }
    let src = &src[..n];
    let dst = &dst[..n];

    let _span = trace_span!("estimate_homography", points = n).entered();

    if n == 4 {
        return dlt(src, dst).ok_or(FitError::Degenerate);
    }

    let threshold_sq = params.inlier_threshold * params.inlier_threshold;
    let mut rng = Xorshift64::new(params.seed);
    let mut best_model: Option<Homography> = None;
    let mut best_inliers = 0usize;

    for _ in 0..params.max_iterations {
        let sample = sample_four(&mut rng, n);
        let sample_src = [src[sample[0]], src[sample[1]], src[sample[2]], src[sample[3]]];
        let sample_dst = [dst[sample[0]], dst[sample[1]], dst[sample[2]], dst[sample[3]]];
        let Some(model) = dlt(&sample_src, &sample_dst) else {
            continue;
        };

        let inliers = count_inliers(&model, src, dst, threshold_sq);
        if inliers > best_inliers {
            best_inliers = inliers;
            best_model = Some(model);
            if inliers == n {
                break;
            }
        }
    }

    let Some(model) = best_model else {
        return Err(FitError::NoConsensus);
    };
    if best_inliers < 4 {
        return Err(FitError::NoConsensus);
    }
    trace_event!("ransac_consensus", inliers = best_inliers, total = n);

    // Least-squares refit over the consensus set; keep the minimal model if
    // the refit turns out degenerate.
    let mut inlier_src = Vec::with_capacity(best_inliers);
    let mut inlier_dst = Vec::with_capacity(best_inliers);
    for i in 0..n {
        if let Some(err) = model.reprojection_error_sq(src[i], dst[i]) {
            if err <= threshold_sq {
                inlier_src.push(src[i]);
                inlier_dst.push(dst[i]);
            }
        }
    }
    Ok(dlt(&inlier_src, &inlier_dst).unwrap_or(model))
}

/// Projects the logo's four corners through the homography and returns the
/// axis-aligned bounds, or `None` if any corner maps to infinity.
pub fn projected_bounds(model: &Homography, logo_width: usize, logo_height: usize) -> Option<BoundingBox> {
    let w = (logo_width.max(1) - 1) as f64;
    let h = (logo_height.max(1) - 1) as f64;
    let corners = [(0.0, 0.0), (0.0, h), (w, h), (w, 0.0)];

    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for (cx, cy) in corners {
        let (u, v) = model.project(cx, cy)?;
        min_x = min_x.min(u);
        min_y = min_y.min(v);
        max_x = max_x.max(u);
        max_y = max_y.max(v);
    }

    let x = min_x.floor() as i32;
    let y = min_y.floor() as i32;
    Some(BoundingBox {
        x,
        y,
        width: (max_x - f64::from(x)) as i32,
        height: (max_y - f64::from(y)) as i32,
    })
}

fn count_inliers(
    model: &Homography,
    src: &[(f32, f32)],
    dst: &[(f32, f32)],
    threshold_sq: f64,
) -> usize {
    src.iter()
        .zip(dst)
        .filter(|(&s, &d)| {
            model
                .reprojection_error_sq(s, d)
                .is_some_and(|err| err <= threshold_sq)
        })
        .count()
}

/// Direct linear transform with Hartley normalization. Solves the normal
/// equations of the 2n x 8 system with `h33 = 1`.
fn dlt(src: &[(f32, f32)], dst: &[(f32, f32)]) -> Option<Homography> {
    let n = src.len();
    if n < 4 {
        return None;
    }
    let (t_src, norm_src) = normalize(src)?;
    let (t_dst, norm_dst) = normalize(dst)?;

    // Accumulate A^T A and A^T b directly; A has two rows per point.
    let mut ata = [0.0f64; 64];
    let mut atb = [0.0f64; 8];
    for i in 0..n {
        let (x, y) = norm_src[i];
        let (u, v) = norm_dst[i];
        let rows = [
            ([x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y], u),
            ([0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y], v),
        ];
        for (row, rhs) in rows {
            for r in 0..8 {
                for c in 0..8 {
                    ata[r * 8 + c] += row[r] * row[c];
                }
                atb[r] += row[r] * rhs;
            }
        }
    }

    let solution = solve_linear(&mut ata, &mut atb, 8, PIVOT_EPS)?;
    let h_norm = [
        solution[0],
        solution[1],
        solution[2],
        solution[3],
        solution[4],
        solution[5],
        solution[6],
        solution[7],
        1.0,
    ];

    // Denormalize: H = T_dst^-1 * H_norm * T_src.
    let t_dst_inv = invert_similarity(t_dst);
    let h = mat3_mul(&mat3_mul(&t_dst_inv, &h_norm), &t_src);
    if h[8].abs() < PIVOT_EPS {
        return None;
    }
    let mut scaled = [0.0f64; 9];
    for (out, value) in scaled.iter_mut().zip(h) {
        *out = value / h[8];
    }
    Some(Homography::new(scaled))
}

/// Similarity transform moving the centroid to the origin with mean distance
/// sqrt(2), plus the transformed points. `None` for coincident points.
fn normalize(points: &[(f32, f32)]) -> Option<([f64; 9], Vec<(f64, f64)>)> {
    let n = points.len() as f64;
    let (mut cx, mut cy) = (0.0f64, 0.0f64);
    for &(x, y) in points {
        cx += f64::from(x);
        cy += f64::from(y);
    }
    cx /= n;
    cy /= n;

    let mut mean_dist = 0.0f64;
    for &(x, y) in points {
        let dx = f64::from(x) - cx;
        let dy = f64::from(y) - cy;
        mean_dist += (dx * dx + dy * dy).sqrt();
    }
    mean_dist /= n;
    if mean_dist < PIVOT_EPS {
        return None;
    }
    let scale = std::f64::consts::SQRT_2 / mean_dist;

    let transform = [scale, 0.0, -scale * cx, 0.0, scale, -scale * cy, 0.0, 0.0, 1.0];
    let transformed = points
        .iter()
        .map(|&(x, y)| {
            (
                scale * (f64::from(x) - cx),
                scale * (f64::from(y) - cy),
            )
        })
        .collect();
    Some((transform, transformed))
}

/// Inverse of a `[s, 0, tx; 0, s, ty; 0, 0, 1]` similarity transform.
fn invert_similarity(t: [f64; 9]) -> [f64; 9] {
    let s = t[0];
    [
        1.0 / s,
        0.0,
        -t[2] / s,
        0.0,
        1.0 / s,
        -t[5] / s,
        0.0,
        0.0,
        1.0,
    ]
}

fn mat3_mul(a: &[f64; 9], b: &[f64; 9]) -> [f64; 9] {
    let mut out = [0.0f64; 9];
    for r in 0..3 {
        for c in 0..3 {
            let mut acc = 0.0;
            for k in 0..3 {
                acc += a[r * 3 + k] * b[k * 3 + c];
            }
            out[r * 3 + c] = acc;
        }
    }
    out
}

/// Small deterministic generator for RANSAC sampling (xorshift64).
struct Xorshift64 {
    state: u64,
}

impl Xorshift64 {
    fn new(seed: u64) -> Self {
        Self {
            state: seed.max(1),
        }
    }

    fn next_below(&mut self, bound: usize) -> usize {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        (self.state % bound as u64) as usize
    }
}

fn sample_four(rng: &mut Xorshift64, n: usize) -> [usize; 4] {
    let mut sample = [0usize; 4];
    let mut filled = 0usize;
    while filled < 4 {
        let idx = rng.next_below(n);
        if !sample[..filled].contains(&idx) {
            sample[filled] = idx;
            filled += 1;
        }
    }
    sample
}

#[cfg(test)]
mod tests {
    use super::{
        estimate_homography, projected_bounds, FitError, Homography, RansacParams,
    };

    fn apply(h: &Homography, p: (f32, f32)) -> (f32, f32) {
        let (u, v) = h.project(f64::from(p.0), f64::from(p.1)).unwrap();
        (u as f32, v as f32)
    }

    fn grid_points() -> Vec<(f32, f32)> {
        let mut points = Vec::new();
        for y in 0..5 {
            for x in 0..5 {
                points.push((x as f32 * 20.0 + 3.0, y as f32 * 15.0 + 7.0));
            }
        }
        points
    }

    #[test]
    fn recovers_pure_translation() {
        let src = grid_points();
        let dst: Vec<_> = src.iter().map(|&(x, y)| (x + 40.0, y - 12.5)).collect();
        let h = estimate_homography(&src, &dst, &RansacParams::default()).unwrap();
        for (&s, &d) in src.iter().zip(&dst) {
            let (u, v) = apply(&h, s);
            assert!((u - d.0).abs() < 0.5 && (v - d.1).abs() < 0.5);
        }
    }

    #[test]
    fn recovers_rotation_with_outliers() {
        let src = grid_points();
        let angle = 0.35f32;
        let (sin, cos) = angle.sin_cos();
        let mut dst: Vec<_> = src
            .iter()
            .map(|&(x, y)| (cos * x - sin * y + 50.0, sin * x + cos * y + 20.0))
            .collect();
        // Plant gross outliers on a quarter of the correspondences.
        for i in (0..dst.len()).step_by(4) {
            dst[i].0 += 300.0;
            dst[i].1 -= 250.0;
        }
        let h = estimate_homography(&src, &dst, &RansacParams::default()).unwrap();
        let mut inliers = 0;
        for (i, (&s, _)) in src.iter().zip(&dst).enumerate() {
            if i % 4 == 0 {
                continue;
            }
            let expected = (cos * s.0 - sin * s.1 + 50.0, sin * s.0 + cos * s.1 + 20.0);
            let (u, v) = apply(&h, s);
            if (u - expected.0).abs() < 1.0 && (v - expected.1).abs() < 1.0 {
                inliers += 1;
            }
        }
        assert!(inliers >= 17, "only {inliers} inliers recovered");
    }

    #[test]
    fn too_few_points_is_an_error() {
        let pts = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)];
        assert_eq!(
            estimate_homography(&pts, &pts, &RansacParams::default()),
            Err(FitError::TooFewPoints { got: 3 })
        );
    }

    #[test]
    fn collinear_points_are_degenerate() {
        let src = [(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 3.0)];
        let dst = [(0.0, 0.0), (2.0, 2.0), (4.0, 4.0), (6.0, 6.0)];
        assert_eq!(
            estimate_homography(&src, &dst, &RansacParams::default()),
            Err(FitError::Degenerate)
        );
    }

    #[test]
    fn identity_bounds_cover_the_logo() {
        let identity = Homography::new([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        let bbox = projected_bounds(&identity, 100, 60).unwrap();
        assert_eq!(bbox.x, 0);
        assert_eq!(bbox.y, 0);
        assert_eq!(bbox.width, 99);
        assert_eq!(bbox.height, 59);
    }

    #[test]
    fn translated_bounds_shift_accordingly() {
        let shift = Homography::new([1.0, 0.0, 25.0, 0.0, 1.0, -10.0, 0.0, 0.0, 1.0]);
        let bbox = projected_bounds(&shift, 50, 50).unwrap();
        assert_eq!(bbox.x, 25);
        assert_eq!(bbox.y, -10);
        assert_eq!(bbox.width, 49);
        assert_eq!(bbox.height, 49);
    }

    #[test]
    fn estimation_is_deterministic() {
        let src = grid_points();
        let dst: Vec<_> = src.iter().map(|&(x, y)| (x * 1.3 + 5.0, y * 1.3 - 2.0)).collect();
        let params = RansacParams::default();
        let a = estimate_homography(&src, &dst, &params).unwrap();
        let b = estimate_homography(&src, &dst, &params).unwrap();
        assert_eq!(a.matrix(), b.matrix());
    }
}
