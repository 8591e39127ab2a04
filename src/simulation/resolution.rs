//! Surface size and field resolution
//!
//! The drawable surface is passed in explicitly as a [`SurfaceSize`] (logical
//! client size plus pixel ratio) rather than read from the window, so every
//! resolution computation is a pure function of its inputs.

/// Logical size of the drawable surface and its device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSize {
    pub client_width: f32,
    pub client_height: f32,
    pub pixel_ratio: f32,
}

impl SurfaceSize {
    pub fn new(client_width: f32, client_height: f32, pixel_ratio: f32) -> Self {
        Self {
            client_width,
            client_height,
            pixel_ratio,
        }
    }

    /// A surface already measured in physical pixels.
    pub fn from_physical(width: u32, height: u32) -> Self {
        Self::new(width as f32, height as f32, 1.0)
    }

    /// Size in physical pixels, at least 1x1.
    pub fn physical(&self) -> (u32, u32) {
        (
            scale_by_pixel_ratio(self.client_width, self.pixel_ratio).max(1),
            scale_by_pixel_ratio(self.client_height, self.pixel_ratio).max(1),
        )
    }

    /// Physical width over physical height.
    pub fn aspect_ratio(&self) -> f32 {
        let (width, height) = self.physical();
        width as f32 / height as f32
    }
}

/// Convert a logical length to whole physical pixels.
pub fn scale_by_pixel_ratio(length: f32, pixel_ratio: f32) -> u32 {
    let ratio = if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
        pixel_ratio
    } else {
        1.0
    };
    let scaled = (length * ratio).floor();
    if scaled.is_finite() && scaled > 0.0 {
        scaled as u32
    } else {
        0
    }
}

/// Grid size of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Grid for a field whose short side is `resolution` texels, matching the
/// orientation of a `width`x`height` surface.
pub fn field_resolution(resolution: u32, width: u32, height: u32) -> Resolution {
    let (width, height) = (width.max(1), height.max(1));
    let mut aspect_ratio = width as f32 / height as f32;
    if aspect_ratio < 1.0 {
        aspect_ratio = 1.0 / aspect_ratio;
    }

    let min = resolution.max(1);
    let max = ((resolution as f32 * aspect_ratio).round() as u32).max(1);

    if width > height {
        Resolution {
            width: max,
            height: min,
        }
    } else {
        Resolution {
            width: min,
            height: max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_landscape_and_portrait() {
        assert_eq!(field_resolution(128, 1920, 1080), Resolution { width: 228, height: 128 });
        assert_eq!(field_resolution(128, 1080, 1920), Resolution { width: 128, height: 228 });
        assert_eq!(field_resolution(128, 500, 500), Resolution { width: 128, height: 128 });
    }

    #[test]
    fn test_degenerate_surface_clamps() {
        assert_eq!(field_resolution(0, 0, 0), Resolution { width: 1, height: 1 });
        assert_eq!(SurfaceSize::new(0.0, 0.4, 1.0).physical(), (1, 1));
        assert_eq!(SurfaceSize::new(100.0, 50.0, f32::NAN).physical(), (100, 50));
    }

    #[test]
    fn test_pixel_ratio_floors() {
        let surface = SurfaceSize::new(333.0, 200.0, 1.5);
        assert_eq!(surface.physical(), (499, 300));
        assert_eq!(scale_by_pixel_ratio(10.0, 2.0), 20);
    }

    proptest! {
        #[test]
        fn prop_short_side_is_resolution(resolution in 1u32..2048, width in 1u32..4096, height in 1u32..4096) {
            let grid = field_resolution(resolution, width, height);
            prop_assert_eq!(grid.width.min(grid.height), resolution);
            prop_assert!(grid.width >= 1 && grid.height >= 1);
            if width > height {
                prop_assert!(grid.width >= grid.height);
            } else {
                prop_assert!(grid.height >= grid.width);
            }
        }
    }
}
