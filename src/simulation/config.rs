use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::input::color::ColorRgb;
use crate::rendering::capabilities::DeviceCapabilities;

/// Dye resolution used when the device cannot filter float textures.
pub const DEGRADED_DYE_RESOLUTION: u32 = 256;

/// Tunable constants of one simulation session
///
/// Missing fields in a RON file take their defaults, so a config file only
/// needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Short side of the velocity/pressure grid in texels
    pub sim_resolution: u32,

    /// Short side of the dye grid in texels
    pub dye_resolution: u32,

    /// Short side of a still capture. Kept for config compatibility.
    pub capture_resolution: u32,

    /// Dye decay rate per second
    pub density_dissipation: f32,

    /// Velocity decay rate per second
    pub velocity_dissipation: f32,

    /// Fraction of last frame's pressure kept as the solver's starting guess
    pub pressure: f32,

    /// Jacobi iterations per frame
    pub pressure_iterations: u32,

    /// Vorticity confinement strength
    pub curl: f32,

    /// Splat radius in percent of the surface height
    pub splat_radius: f32,

    /// Velocity impulse per unit of pointer movement
    pub splat_force: f32,

    pub shading: bool,

    /// Pointer color rotations per second
    pub color_update_speed: f32,

    pub back_color: ColorRgb,

    pub transparent: bool,

    /// Start in the stopped state
    pub paused: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            sim_resolution: 128,
            dye_resolution: 1440,
            capture_resolution: 512,
            density_dissipation: 3.5,
            velocity_dissipation: 2.0,
            pressure: 0.1,
            pressure_iterations: 20,
            curl: 3.0,
            splat_radius: 0.2,
            splat_force: 6000.0,
            shading: true,
            color_update_speed: 10.0,
            back_color: ColorRgb::new(0.5, 0.0, 0.0),
            transparent: true,
            paused: false,
        }
    }
}

impl SimulationConfig {
    /// Clamp every value into its usable range.
    ///
    /// Resolutions are at least 1; rates that are negative or not finite
    /// fall back to their defaults.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();

        self.sim_resolution = self.sim_resolution.max(1);
        self.dye_resolution = self.dye_resolution.max(1);
        self.capture_resolution = self.capture_resolution.max(1);

        let non_negative = |value: f32, default: f32| {
            if value.is_finite() && value >= 0.0 {
                value
            } else {
                default
            }
        };
        self.density_dissipation = non_negative(self.density_dissipation, defaults.density_dissipation);
        self.velocity_dissipation = non_negative(self.velocity_dissipation, defaults.velocity_dissipation);
        self.pressure = non_negative(self.pressure, defaults.pressure);
        self.curl = non_negative(self.curl, defaults.curl);
        self.splat_force = non_negative(self.splat_force, defaults.splat_force);
        self.color_update_speed = non_negative(self.color_update_speed, defaults.color_update_speed);

        // Radius divides the splat exponent
        if !(self.splat_radius.is_finite() && self.splat_radius > 0.0) {
            self.splat_radius = defaults.splat_radius;
        }

        self
    }

    /// Lower quality on devices that cannot filter float textures.
    ///
    /// Returns `true` when anything changed.
    pub fn apply_capabilities(&mut self, capabilities: &DeviceCapabilities) -> bool {
        if !capabilities.is_degraded() {
            return false;
        }

        let changed = self.dye_resolution != DEGRADED_DYE_RESOLUTION || self.shading;
        self.dye_resolution = DEGRADED_DYE_RESOLUTION;
        self.shading = false;

        if changed {
            log::warn!(
                "Reduced dye resolution to {} and disabled shading for this device",
                DEGRADED_DYE_RESOLUTION
            );
        }
        changed
    }

    /// Load a config from a RON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = ron::from_str(&contents)?;
        Ok(config.validated())
    }

    /// Save the config as pretty RON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let contents = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Load `path` if given, otherwise defaults. Load failures are logged
    /// and fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match Self::load(path) {
            Ok(config) => {
                log::info!("Loaded simulation config from {:?}", path);
                config
            }
            Err(e) => {
                log::warn!("Failed to load simulation config {:?}: {}. Using defaults.", path, e);
                Self::default()
            }
        }
    }
}

/// Error type for config loading and saving.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("RON serialize error: {0}")]
    Serialize(#[from] ron::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::device::TexelType;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("rainbow_fluid_{}_{}.ron", name, std::process::id()))
    }

    #[test]
    fn test_partial_ron_takes_defaults() {
        let config: SimulationConfig = ron::from_str("(sim_resolution: 32, shading: false)").unwrap();
        assert_eq!(config.sim_resolution, 32);
        assert!(!config.shading);
        assert_eq!(config.dye_resolution, 1440);
        assert_eq!(config.pressure_iterations, 20);
        assert_eq!(config.back_color, ColorRgb::new(0.5, 0.0, 0.0));
    }

    #[test]
    fn test_validated_clamps() {
        let config = SimulationConfig {
            sim_resolution: 0,
            dye_resolution: 0,
            pressure: -1.0,
            curl: f32::NAN,
            splat_radius: 0.0,
            ..Default::default()
        }
        .validated();
        assert_eq!(config.sim_resolution, 1);
        assert_eq!(config.dye_resolution, 1);
        assert_eq!(config.pressure, 0.1);
        assert_eq!(config.curl, 3.0);
        assert_eq!(config.splat_radius, 0.2);
    }

    #[test]
    fn test_capability_downgrade() {
        let mut config = SimulationConfig::default();
        assert!(!config.apply_capabilities(&DeviceCapabilities::software()));
        assert_eq!(config.dye_resolution, 1440);

        let mut degraded = DeviceCapabilities::software();
        degraded.texel = TexelType::Unorm8;
        assert!(config.apply_capabilities(&degraded));
        assert_eq!(config.dye_resolution, DEGRADED_DYE_RESOLUTION);
        assert!(!config.shading);

        // Already downgraded
        assert!(!config.apply_capabilities(&degraded));
    }

    #[test]
    fn test_save_then_load() {
        let path = temp_path("save_load");
        let config = SimulationConfig {
            curl: 12.5,
            transparent: false,
            ..Default::default()
        };
        config.save(&path).unwrap();
        let loaded = SimulationConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let path = temp_path("missing");
        assert!(matches!(SimulationConfig::load(&path), Err(ConfigError::Io(_))));
        assert_eq!(SimulationConfig::load_or_default(Some(&path)), SimulationConfig::default());
    }
}
