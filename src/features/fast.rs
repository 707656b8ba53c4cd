//! FAST-9 segment-test corner detection with non-maximum suppression.

use crate::image::ImageView;

/// Bresenham circle of radius 3 around the candidate pixel, clockwise from
/// twelve o'clock. FAST-9 requires 9 contiguous circle pixels all brighter or
/// all darker than the center by the threshold.
const CIRCLE: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

const ARC_LENGTH: usize = 9;

/// A raw corner in level coordinates with its response score.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Corner {
    pub(crate) x: usize,
    pub(crate) y: usize,
    pub(crate) score: u32,
}

/// Detects FAST-9 corners inside the margin and suppresses non-maxima in a
/// 3x3 neighborhood. Ties go to the smaller (y, x) so scan order never
/// changes the surviving set.
pub(crate) fn detect(image: ImageView<'_>, threshold: u8, margin: usize) -> Vec<Corner> {
    let width = image.width();
    let height = image.height();
    if width < 2 * margin + 1 || height < 2 * margin + 1 {
        return Vec::new();
    }

    let mut scores = vec![0u32; width * height];
    let mut candidates = Vec::new();
    for y in margin..height - margin {
        for x in margin..width - margin {
            if let Some(score) = corner_score(image, x, y, threshold) {
                scores[y * width + x] = score;
                candidates.push((x, y, score));
            }
        }
    }

    let mut corners = Vec::with_capacity(candidates.len() / 4 + 1);
    'candidates: for (x, y, score) in candidates {
        for dy in -1i32..=1 {
            for dx in -1i32..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = (x as i32 + dx) as usize;
                let ny = (y as i32 + dy) as usize;
                let neighbor = scores[ny * width + nx];
                if neighbor > score || (neighbor == score && (ny, nx) < (y, x)) {
                    continue 'candidates;
                }
            }
        }
        corners.push(Corner { x, y, score });
    }
    corners
}

/// Runs the segment test at `(x, y)` and returns the corner response, or
/// `None` if the pixel is not a corner.
///
/// The response is the sum of absolute circle-pixel margins beyond the
/// threshold, so stronger and larger arcs rank higher.
fn corner_score(image: ImageView<'_>, x: usize, y: usize, threshold: u8) -> Option<u32> {
    let center = i32::from(image.at(x, y));
    let t = i32::from(threshold);

    let mut values = [0i32; 16];
    for (idx, (dx, dy)) in CIRCLE.iter().enumerate() {
        let px = (x as i32 + dx) as usize;
        let py = (y as i32 + dy) as usize;
        values[idx] = i32::from(image.at(px, py));
    }

    // Quick reject: a 9-arc must include at least two of the four compass
    // points being consistently bright or dark.
    let bright_compass = [0, 4, 8, 12]
        .iter()
        .filter(|&&i| values[i] >= center + t)
        .count();
    let dark_compass = [0, 4, 8, 12]
        .iter()
        .filter(|&&i| values[i] <= center - t)
        .count();
    if bright_compass < 2 && dark_compass < 2 {
        return None;
    }

    let is_arc = |predicate: &dyn Fn(i32) -> bool| -> bool {
        let mut run = 0usize;
        // Walk the circle twice so wraparound arcs are counted.
        for idx in 0..CIRCLE.len() * 2 {
            if predicate(values[idx % CIRCLE.len()]) {
                run += 1;
                if run >= ARC_LENGTH {
                    return true;
                }
            } else {
                run = 0;
            }
        }
        false
    };

    let bright = is_arc(&|v| v >= center + t);
    let dark = is_arc(&|v| v <= center - t);
    if !bright && !dark {
        return None;
    }

    let mut score = 0u32;
    for v in values {
        let diff = (v - center).abs() - t;
        if diff > 0 {
            score += diff as u32;
        }
    }
    Some(score)
}
