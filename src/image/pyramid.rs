//! Owned grayscale buffers and pyramid construction.
//!
//! Downsampling uses a 2x2 box filter with integer rounding:
//! `dst = ((a + b + c + d) + 2) / 4`. Each pyramid level halves both
//! dimensions, giving the feature extractor its scale coverage.

use crate::image::ImageView;
use crate::util::{LogoMatchError, LogoMatchResult};

/// Owned contiguous grayscale image buffer.
#[derive(Clone)]
pub struct OwnedImage {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl OwnedImage {
    /// Creates an owned image from a contiguous row-major buffer.
    pub fn new(data: Vec<u8>, width: usize, height: usize) -> LogoMatchResult<Self> {
        if width == 0 || height == 0 {
            return Err(LogoMatchError::InvalidDimensions { width, height });
        }
        let needed = width
            .checked_mul(height)
            .ok_or(LogoMatchError::InvalidDimensions { width, height })?;
        if data.len() != needed {
            return Err(LogoMatchError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the raw row-major pixel buffer.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns a borrowed view of the image.
    pub fn view(&self) -> ImageView<'_> {
        ImageView::from_slice(&self.data, self.width, self.height)
            .expect("owned buffer is always consistent")
    }

    /// Returns a copy smoothed with a separable box filter of the given
    /// radius. Border pixels average the in-bounds part of the window.
    pub(crate) fn box_blur(&self, radius: usize) -> OwnedImage {
        if radius == 0 {
            return self.clone();
        }
        let w = self.width;
        let h = self.height;
        let mut horiz = vec![0u8; w * h];
        for y in 0..h {
            let row = &self.data[y * w..(y + 1) * w];
            for x in 0..w {
                let x0 = x.saturating_sub(radius);
                let x1 = (x + radius).min(w - 1);
                let sum: u32 = row[x0..=x1].iter().map(|&v| u32::from(v)).sum();
                horiz[y * w + x] = (sum / (x1 - x0 + 1) as u32) as u8;
            }
        }
        let mut out = vec![0u8; w * h];
        for x in 0..w {
            for y in 0..h {
                let y0 = y.saturating_sub(radius);
                let y1 = (y + radius).min(h - 1);
                let mut sum = 0u32;
                for yy in y0..=y1 {
                    sum += u32::from(horiz[yy * w + x]);
                }
                out[y * w + x] = (sum / (y1 - y0 + 1) as u32) as u8;
            }
        }
        OwnedImage {
            data: out,
            width: w,
            height: h,
        }
    }
}

/// Owned image pyramid built from a base level by repeated halving.
pub struct ImagePyramid {
    levels: Vec<OwnedImage>,
}

impl ImagePyramid {
    /// Builds a pyramid from a base grayscale view.
    ///
    /// `max_levels` is clamped to at least 1 so the base level is always
    /// present; construction stops early once a level would drop below 2
    /// pixels on either side.
    pub fn build(base: ImageView<'_>, max_levels: usize) -> LogoMatchResult<Self> {
        let max_levels = max_levels.max(1);
        let mut base_data = Vec::with_capacity(base.width() * base.height());
        for y in 0..base.height() {
            let row = base.row(y).ok_or(LogoMatchError::BufferTooSmall {
                needed: (y + 1) * base.stride(),
                got: base.as_slice().len(),
            })?;
            base_data.extend_from_slice(row);
        }
        let mut levels = vec![OwnedImage::new(base_data, base.width(), base.height())?];

        while levels.len() < max_levels {
            let prev = levels.last().expect("levels is not empty");
            if prev.width() < 2 || prev.height() < 2 {
                break;
            }
            let dst_width = prev.width() / 2;
            let dst_height = prev.height() / 2;
            let src = prev.view();
            let mut dst = vec![0u8; dst_width * dst_height];
            for y in 0..dst_height {
                let row0 = src.row(y * 2).expect("row within source bounds");
                let row1 = src.row(y * 2 + 1).expect("row within source bounds");
                for x in 0..dst_width {
                    let sum = u16::from(row0[2 * x])
                        + u16::from(row0[2 * x + 1])
                        + u16::from(row1[2 * x])
                        + u16::from(row1[2 * x + 1]);
                    dst[y * dst_width + x] = ((sum + 2) / 4) as u8;
                }
            }
            levels.push(OwnedImage::new(dst, dst_width, dst_height)?);
        }

        Ok(Self { levels })
    }

    /// Returns all pyramid levels (level 0 is the base resolution).
    pub fn levels(&self) -> &[OwnedImage] {
        &self.levels
    }

    /// Returns the scale factor from level coordinates to base coordinates.
    pub fn scale(&self, level: usize) -> f32 {
        (1usize << level) as f32
    }
}
