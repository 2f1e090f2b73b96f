//! Conversion between row-major pixel arrays and `image` buffers.

use image::GrayImage;

/// Errors when building an image from row-major pixel data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RasterError {
    /// No rows, or a first row without pixels.
    Empty,
    /// A row whose length differs from the first row.
    Ragged {
        /// Index of the offending row.
        row: usize,
        /// Length of the first row.
        expected: usize,
        /// Length of the offending row.
        got: usize,
    },
    /// Dimensions that do not fit the image buffer index type.
    TooLarge {
        /// Number of columns.
        width: usize,
        /// Number of rows.
        height: usize,
    },
}

impl std::fmt::Display for RasterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "image has no pixels"),
            Self::Ragged { row, expected, got } => {
                write!(f, "row {} has {} pixels, expected {}", row, got, expected)
            }
            Self::TooLarge { width, height } => {
                write!(f, "image {}x{} is too large", width, height)
            }
        }
    }
}

impl std::error::Error for RasterError {}

/// Build a grayscale image from rows of pixel values (top row first).
pub fn gray_from_rows(rows: &[Vec<u8>]) -> Result<GrayImage, RasterError> {
    let height = rows.len();
    let width = rows.first().map_or(0, Vec::len);
    if height == 0 || width == 0 {
        return Err(RasterError::Empty);
    }
    if let Some((row, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
        return Err(RasterError::Ragged {
            row,
            expected: width,
            got: r.len(),
        });
    }
    let (w, h) = match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) => (w, h),
        _ => return Err(RasterError::TooLarge { width, height }),
    };

    let raw: Vec<u8> = rows.iter().flatten().copied().collect();
    GrayImage::from_raw(w, h, raw).ok_or(RasterError::TooLarge { width, height })
}

/// Split an image into row-major pixel rows.
pub fn rows_from_gray(img: &GrayImage) -> Vec<Vec<u8>> {
    let w = img.width() as usize;
    if w == 0 {
        return vec![Vec::new(); img.height() as usize];
    }
    img.as_raw().chunks(w).map(<[u8]>::to_vec).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_roundtrip_preserves_layout() {
        let rows = vec![vec![1, 2, 3], vec![4, 5, 6]];
        let img = gray_from_rows(&rows).unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(2, 0)[0], 3);
        assert_eq!(img.get_pixel(0, 1)[0], 4);
        assert_eq!(rows_from_gray(&img), rows);
    }

    #[test]
    fn empty_and_ragged_rows_are_rejected() {
        assert_eq!(gray_from_rows(&[]), Err(RasterError::Empty));
        assert_eq!(gray_from_rows(&[vec![]]), Err(RasterError::Empty));
        assert_eq!(
            gray_from_rows(&[vec![1, 2], vec![3]]),
            Err(RasterError::Ragged {
                row: 1,
                expected: 2,
                got: 1
            })
        );
    }
}
