//! Pointer colors

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Brightness of a continuous-splat color.
pub const CONTINUOUS_INTENSITY: f32 = 0.15;

/// Extra gain of burst-splat colors over continuous ones.
pub const BURST_GAIN: f32 = 10.0;

/// Linear RGB color
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorRgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl ColorRgb {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn scaled(self, factor: f32) -> Self {
        Self::new(self.r * factor, self.g * factor, self.b * factor)
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

/// HSV to RGB, all components in `[0, 1]`.
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> ColorRgb {
    let i = (h * 6.0).floor();
    let f = h * 6.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);

    match (i as i64).rem_euclid(6) {
        0 => ColorRgb::new(v, t, p),
        1 => ColorRgb::new(q, v, p),
        2 => ColorRgb::new(p, v, t),
        3 => ColorRgb::new(p, q, v),
        4 => ColorRgb::new(t, p, v),
        _ => ColorRgb::new(v, p, q),
    }
}

/// Fully saturated color of random hue, dimmed for continuous splats.
pub fn generate_color<R: Rng + ?Sized>(rng: &mut R) -> ColorRgb {
    hsv_to_rgb(rng.gen::<f32>(), 1.0, 1.0).scaled(CONTINUOUS_INTENSITY)
}

/// Wrap `value` into `[min, max)`. A zero-width range yields `min`.
pub fn wrap(value: f32, min: f32, max: f32) -> f32 {
    let range = max - min;
    if range == 0.0 {
        return min;
    }
    (value - min) % range + min
}
