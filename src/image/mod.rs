//! Grayscale image views, owned buffers, pyramid, and file loading.
//!
//! `ImageView` is a borrowed 2D view into a 1D `u8` buffer with an explicit
//! stride. The stride counts elements between the starts of consecutive rows,
//! so a stride larger than the width represents padded rows.

use crate::util::{LogoMatchError, LogoMatchResult};

pub mod io;
pub mod pyramid;

/// Borrowed 2D grayscale view with an explicit stride.
#[derive(Copy, Clone)]
pub struct ImageView<'a> {
    data: &'a [u8],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a> ImageView<'a> {
    /// Creates a contiguous view with `stride == width`.
    pub fn from_slice(data: &'a [u8], width: usize, height: usize) -> LogoMatchResult<Self> {
        Self::new(data, width, height, width)
    }

    /// Creates a view with an explicit stride.
    pub fn new(
        data: &'a [u8],
        width: usize,
        height: usize,
        stride: usize,
    ) -> LogoMatchResult<Self> {
        let needed = required_len(width, height, stride)?;
        if data.len() < needed {
            return Err(LogoMatchError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
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

    /// Returns the stride in elements between row starts.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns the backing slice including any row padding.
    pub fn as_slice(&self) -> &'a [u8] {
        self.data
    }

    /// Returns the pixel at `(x, y)` if it is within bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y * self.stride + x).copied()
    }

    /// Returns the pixel at `(x, y)` without bounds checking the borders.
    ///
    /// Callers must keep `x < width` and `y < height`; detection loops use
    /// this on coordinates already clamped by their margins.
    #[inline]
    pub(crate) fn at(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.stride + x]
    }

    /// Returns a contiguous slice for row `y` with length `width`.
    pub fn row(&self, y: usize) -> Option<&'a [u8]> {
        if y >= self.height {
            return None;
        }
        let start = y * self.stride;
        self.data.get(start..start + self.width)
    }
}

fn required_len(width: usize, height: usize, stride: usize) -> LogoMatchResult<usize> {
    if width == 0 || height == 0 {
        return Err(LogoMatchError::InvalidDimensions { width, height });
    }
    if stride < width {
        return Err(LogoMatchError::InvalidStride { width, stride });
    }
    (height - 1)
        .checked_mul(stride)
        .and_then(|v| v.checked_add(width))
        .ok_or(LogoMatchError::InvalidDimensions { width, height })
}

#[cfg(test)]
mod tests {
    use super::ImageView;

    #[test]
    fn view_accessors_respect_stride() {
        let data = vec![1u8, 2, 3, 0, 4, 5, 6, 0];
        let view = ImageView::new(&data, 3, 2, 4).unwrap();
        assert_eq!(view.get(0, 0), Some(1));
        assert_eq!(view.get(2, 1), Some(6));
        assert_eq!(view.get(3, 0), None);
        assert_eq!(view.row(1).unwrap(), &[4, 5, 6]);
    }

    #[test]
    fn rejects_undersized_buffer() {
        let data = vec![0u8; 5];
        assert!(ImageView::from_slice(&data, 3, 2).is_err());
    }

    #[test]
    fn rejects_zero_dimensions() {
        let data = vec![0u8; 4];
        assert!(ImageView::from_slice(&data, 0, 2).is_err());
        assert!(ImageView::from_slice(&data, 2, 0).is_err());
    }
}
