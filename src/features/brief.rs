//! Orientation assignment and steered BRIEF-256 descriptors.

use crate::image::ImageView;

/// Radius of the circular patch used for the intensity centroid.
const CENTROID_RADIUS: i32 = 15;

/// Half-width of the box the sampling pattern is drawn from. Rotated pattern
/// points stay within `PATTERN_HALF * sqrt(2)` of the keypoint; samples past
/// the image edge clamp to the border.
const PATTERN_HALF: i32 = 13;

/// Number of point pairs, one per descriptor bit.
const PATTERN_PAIRS: usize = 256;

/// Seed for the pattern generator. Fixed so every extractor instance uses
/// the same pattern and descriptors stay comparable across runs.
const PATTERN_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

/// Computes the keypoint orientation from the intensity centroid of a
/// circular patch, in radians. Patch pixels past the image edge clamp to the
/// border. A perfectly symmetric patch yields 0.
pub(crate) fn orientation(image: ImageView<'_>, x: usize, y: usize) -> f32 {
    let max_x = (image.width() - 1) as i32;
    let max_y = (image.height() - 1) as i32;
    let mut m10 = 0i64;
    let mut m01 = 0i64;
    for dv in -CENTROID_RADIUS..=CENTROID_RADIUS {
        for du in -CENTROID_RADIUS..=CENTROID_RADIUS {
            if du * du + dv * dv > CENTROID_RADIUS * CENTROID_RADIUS {
                continue;
            }
            let px = (x as i32 + du).clamp(0, max_x) as usize;
            let py = (y as i32 + dv).clamp(0, max_y) as usize;
            let value = i64::from(image.at(px, py));
            m10 += i64::from(du) * value;
            m01 += i64::from(dv) * value;
        }
    }
    if m10 == 0 && m01 == 0 {
        return 0.0;
    }
    (m01 as f32).atan2(m10 as f32)
}

/// Fixed pseudo-random BRIEF sampling pattern: 256 point pairs inside a
/// `[-13, 13]` box around the keypoint.
pub struct BriefPattern {
    pairs: Vec<(f32, f32, f32, f32)>,
}

impl BriefPattern {
    /// Generates the pattern from a seed using an xorshift generator.
    pub fn seeded(seed: u64) -> Self {
        let mut state = seed.max(1);
        let mut next_coord = || {
            // xorshift64*
            state ^= state >> 12;
            state ^= state << 25;
            state ^= state >> 27;
            let value = state.wrapping_mul(0x2545_F491_4F6C_DD1D);
            let span = (2 * PATTERN_HALF + 1) as u64;
            (value >> 33) as i64 % span as i64 - i64::from(PATTERN_HALF)
        };
        let mut pairs = Vec::with_capacity(PATTERN_PAIRS);
        while pairs.len() < PATTERN_PAIRS {
            let x1 = next_coord() as f32;
            let y1 = next_coord() as f32;
            let x2 = next_coord() as f32;
            let y2 = next_coord() as f32;
            if x1 == x2 && y1 == y2 {
                continue;
            }
            pairs.push((x1, y1, x2, y2));
        }
        Self { pairs }
    }

    /// Computes the steered descriptor for a keypoint at `(x, y)` with the
    /// given orientation. Pattern points are rotated by the orientation and
    /// sampled with bilinear interpolation.
    pub fn describe(&self, image: ImageView<'_>, x: f32, y: f32, angle: f32) -> super::Descriptor {
        let (sin, cos) = angle.sin_cos();
        let mut descriptor = [0u8; 32];
        for (bit, (x1, y1, x2, y2)) in self.pairs.iter().enumerate() {
            let a = sample_bilinear(image, x + x1 * cos - y1 * sin, y + x1 * sin + y1 * cos);
            let b = sample_bilinear(image, x + x2 * cos - y2 * sin, y + x2 * sin + y2 * cos);
            if a < b {
                descriptor[bit / 8] |= 1 << (bit % 8);
            }
        }
        descriptor
    }
}

impl Default for BriefPattern {
    fn default() -> Self {
        Self::seeded(PATTERN_SEED)
    }
}

/// Bilinear intensity sample with border clamping.
fn sample_bilinear(image: ImageView<'_>, x: f32, y: f32) -> f32 {
    let max_x = (image.width() - 1) as f32;
    let max_y = (image.height() - 1) as f32;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(image.width() - 1);
    let y1 = (y0 + 1).min(image.height() - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let v00 = f32::from(image.at(x0, y0));
    let v10 = f32::from(image.at(x1, y0));
    let v01 = f32::from(image.at(x0, y1));
    let v11 = f32::from(image.at(x1, y1));
    let top = v00 + (v10 - v00) * fx;
    let bottom = v01 + (v11 - v01) * fx;
    top + (bottom - top) * fy
}

#[cfg(test)]
mod tests {
    use super::{orientation, sample_bilinear, BriefPattern, PATTERN_HALF, PATTERN_PAIRS};
    use crate::image::ImageView;

    #[test]
    fn pattern_is_reproducible_and_in_bounds() {
        let a = BriefPattern::default();
        let b = BriefPattern::default();
        assert_eq!(a.pairs.len(), PATTERN_PAIRS);
        for (pa, pb) in a.pairs.iter().zip(&b.pairs) {
            assert_eq!(pa, pb);
        }
        let half = PATTERN_HALF as f32;
        for (x1, y1, x2, y2) in &a.pairs {
            for v in [x1, y1, x2, y2] {
                assert!(v.abs() <= half);
            }
        }
    }

    #[test]
    fn orientation_points_toward_bright_side() {
        // Bright half-plane to the right of the center: centroid pulls the
        // orientation toward angle 0.
        let size = 64;
        let mut data = vec![0u8; size * size];
        for y in 0..size {
            for x in 32..size {
                data[y * size + x] = 200;
            }
        }
        let view = ImageView::from_slice(&data, size, size).unwrap();
        let angle = orientation(view, 32, 32);
        assert!(angle.abs() < 0.2, "angle {angle}");
    }

    #[test]
    fn orientation_rotates_with_the_patch() {
        let size = 64;
        let mut right = vec![0u8; size * size];
        let mut down = vec![0u8; size * size];
        for y in 0..size {
            for x in 0..size {
                if x >= 32 {
                    right[y * size + x] = 200;
                }
                if y >= 32 {
                    down[y * size + x] = 200;
                }
            }
        }
        let right_view = ImageView::from_slice(&right, size, size).unwrap();
        let down_view = ImageView::from_slice(&down, size, size).unwrap();
        let delta = orientation(down_view, 32, 32) - orientation(right_view, 32, 32);
        assert!((delta - std::f32::consts::FRAC_PI_2).abs() < 0.2, "delta {delta}");
    }

    #[test]
    fn bilinear_interpolates_between_pixels() {
        let data = vec![0u8, 100, 0, 100];
        let view = ImageView::from_slice(&data, 2, 2).unwrap();
        let mid = sample_bilinear(view, 0.5, 0.5);
        assert!((mid - 50.0).abs() < 1e-3);
        // Clamping keeps out-of-range samples at the border value.
        assert!((sample_bilinear(view, -5.0, 0.0) - 0.0).abs() < 1e-3);
        assert!((sample_bilinear(view, 5.0, 0.0) - 100.0).abs() < 1e-3);
    }

    #[test]
    fn descriptor_is_stable_for_same_input() {
        let size = 64;
        let mut data = vec![0u8; size * size];
        for y in 0..size {
            for x in 0..size {
                data[y * size + x] = ((x * 7) ^ (y * 13)) as u8;
            }
        }
        let view = ImageView::from_slice(&data, size, size).unwrap();
        let pattern = BriefPattern::default();
        let a = pattern.describe(view, 32.0, 32.0, 0.4);
        let b = pattern.describe(view, 32.0, 32.0, 0.4);
        assert_eq!(a, b);
    }
}
