//! Program and material cache
//!
//! Every pass of the solver runs one [`ProgramKind`]. A [`Material`] is the
//! family of compiled variants of one kind, keyed by the [`FeatureSet`] of
//! active feature flags. Each unique flag set is compiled at most once per
//! session; a failed compile is remembered as an empty slot and never
//! retried.
//!
//! Optional uniforms are resolved once per variant into a [`UniformSet`].
//! [`UniformBlock`] setters silently skip uniforms the variant does not have,
//! so passes stay correct when a feature is compiled out.

use std::collections::{BTreeSet, HashMap};

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use super::capabilities::DeviceCapabilities;
use super::device::{ProgramHandle, RenderDevice};

/// Fragment programs used by the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    Copy,
    Clear,
    Splat,
    Advection,
    Divergence,
    Curl,
    Vorticity,
    Pressure,
    GradientSubtract,
    Display,
}

impl ProgramKind {
    pub const ALL: [ProgramKind; 10] = [
        ProgramKind::Copy,
        ProgramKind::Clear,
        ProgramKind::Splat,
        ProgramKind::Advection,
        ProgramKind::Divergence,
        ProgramKind::Curl,
        ProgramKind::Vorticity,
        ProgramKind::Pressure,
        ProgramKind::GradientSubtract,
        ProgramKind::Display,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ProgramKind::Copy => "Copy",
            ProgramKind::Clear => "Clear",
            ProgramKind::Splat => "Splat",
            ProgramKind::Advection => "Advection",
            ProgramKind::Divergence => "Divergence",
            ProgramKind::Curl => "Curl",
            ProgramKind::Vorticity => "Vorticity",
            ProgramKind::Pressure => "Pressure",
            ProgramKind::GradientSubtract => "Gradient Subtract",
            ProgramKind::Display => "Display",
        }
    }

    /// Feature flags this program's source understands.
    pub fn supported_features(self) -> &'static [Feature] {
        match self {
            ProgramKind::Advection => &[Feature::ManualFiltering],
            ProgramKind::Display => &[Feature::Shading],
            _ => &[],
        }
    }

    /// Uniforms present in the variant compiled with `features`.
    pub fn uniforms(self, features: &FeatureSet) -> UniformSet {
        use Uniform::*;
        let mut set = match self {
            ProgramKind::Copy => UniformSet::EMPTY,
            ProgramKind::Clear => UniformSet::of(&[Value]),
            ProgramKind::Splat => UniformSet::of(&[AspectRatio, Point, Color, Radius]),
            ProgramKind::Advection => UniformSet::of(&[TexelSize, Dt, Dissipation]),
            ProgramKind::Divergence
            | ProgramKind::Curl
            | ProgramKind::Pressure
            | ProgramKind::GradientSubtract => UniformSet::of(&[TexelSize]),
            ProgramKind::Vorticity => UniformSet::of(&[TexelSize, Curl, Dt]),
            ProgramKind::Display => UniformSet::EMPTY,
        };
        if self == ProgramKind::Advection && features.contains(Feature::ManualFiltering) {
            set.insert(DyeTexelSize);
        }
        if self == ProgramKind::Display && features.contains(Feature::Shading) {
            set.insert(TexelSize);
        }
        set
    }
}

/// Compile-time feature flag of a program variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feature {
    /// Bilinear filtering done in the shader, for devices without linear
    /// filtering of float textures
    ManualFiltering,
    /// Directional shading from the dye gradient in the display pass
    Shading,
}

impl Feature {
    /// Name of the pipeline-overridable constant in WGSL.
    pub fn name(self) -> &'static str {
        match self {
            Feature::ManualFiltering => "MANUAL_FILTERING",
            Feature::Shading => "SHADING",
        }
    }

    pub fn from_name(name: &str) -> Option<Feature> {
        match name {
            "MANUAL_FILTERING" => Some(Feature::ManualFiltering),
            "SHADING" => Some(Feature::Shading),
            _ => None,
        }
    }
}

/// Order-independent set of active feature flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FeatureSet(BTreeSet<Feature>);

impl FeatureSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, feature: Feature) -> bool {
        self.0.contains(&feature)
    }

    pub fn insert(&mut self, feature: Feature) {
        self.0.insert(feature);
    }

    pub fn iter(&self) -> impl Iterator<Item = Feature> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Feature> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Named uniform of the shared uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Uniform {
    TexelSize = 1 << 0,
    DyeTexelSize = 1 << 1,
    Point = 1 << 2,
    AspectRatio = 1 << 3,
    Radius = 1 << 4,
    Color = 1 << 5,
    Dt = 1 << 6,
    Dissipation = 1 << 7,
    Curl = 1 << 8,
    Value = 1 << 9,
}

/// Set of uniforms present in one program variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UniformSet(u16);

impl UniformSet {
    pub const EMPTY: UniformSet = UniformSet(0);

    pub fn of(uniforms: &[Uniform]) -> Self {
        let mut set = Self::EMPTY;
        for &uniform in uniforms {
            set.insert(uniform);
        }
        set
    }

    pub fn insert(&mut self, uniform: Uniform) {
        self.0 |= uniform as u16;
    }

    pub fn contains(self, uniform: Uniform) -> bool {
        self.0 & uniform as u16 != 0
    }
}

/// Uniform values shared by every fluid shader (must match `Uniforms` in WGSL)
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct UniformValues {
    pub texel_size: [f32; 2],
    pub dye_texel_size: [f32; 2],
    pub point: [f32; 2],
    pub aspect_ratio: f32,
    pub radius: f32,
    pub color: [f32; 4],
    pub dt: f32,
    pub dissipation: f32,
    pub curl: f32,
    pub value: f32,
}

/// Uniform values for one draw, filtered by the program's [`UniformSet`].
#[derive(Debug, Clone, Copy)]
pub struct UniformBlock {
    present: UniformSet,
    values: UniformValues,
}

impl UniformBlock {
    pub fn new(program: &Program) -> Self {
        Self {
            present: program.uniforms(),
            values: UniformValues::default(),
        }
    }

    pub fn values(&self) -> &UniformValues {
        &self.values
    }

    fn has(&self, uniform: Uniform) -> bool {
        self.present.contains(uniform)
    }

    pub fn set_texel_size(&mut self, texel_size: Vec2) -> &mut Self {
        if self.has(Uniform::TexelSize) {
            self.values.texel_size = texel_size.to_array();
        }
        self
    }

    pub fn set_dye_texel_size(&mut self, texel_size: Vec2) -> &mut Self {
        if self.has(Uniform::DyeTexelSize) {
            self.values.dye_texel_size = texel_size.to_array();
        }
        self
    }

    pub fn set_point(&mut self, point: Vec2) -> &mut Self {
        if self.has(Uniform::Point) {
            self.values.point = point.to_array();
        }
        self
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) -> &mut Self {
        if self.has(Uniform::AspectRatio) {
            self.values.aspect_ratio = aspect_ratio;
        }
        self
    }

    pub fn set_radius(&mut self, radius: f32) -> &mut Self {
        if self.has(Uniform::Radius) {
            self.values.radius = radius;
        }
        self
    }

    pub fn set_color(&mut self, color: [f32; 3]) -> &mut Self {
        if self.has(Uniform::Color) {
            self.values.color = [color[0], color[1], color[2], 1.0];
        }
        self
    }

    pub fn set_dt(&mut self, dt: f32) -> &mut Self {
        if self.has(Uniform::Dt) {
            self.values.dt = dt;
        }
        self
    }

    pub fn set_dissipation(&mut self, dissipation: f32) -> &mut Self {
        if self.has(Uniform::Dissipation) {
            self.values.dissipation = dissipation;
        }
        self
    }

    pub fn set_curl(&mut self, curl: f32) -> &mut Self {
        if self.has(Uniform::Curl) {
            self.values.curl = curl;
        }
        self
    }

    pub fn set_value(&mut self, value: f32) -> &mut Self {
        if self.has(Uniform::Value) {
            self.values.value = value;
        }
        self
    }
}

/// Errors from compiling a program variant.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ShaderError {
    #[error("{kind:?} program failed to compile: {message}")]
    Compile { kind: ProgramKind, message: String },
}

/// A compiled program variant.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    handle: ProgramHandle,
    kind: ProgramKind,
    features: FeatureSet,
    uniforms: UniformSet,
}

impl Program {
    pub fn new(handle: ProgramHandle, kind: ProgramKind, features: FeatureSet) -> Self {
        let uniforms = kind.uniforms(&features);
        Self {
            handle,
            kind,
            features,
            uniforms,
        }
    }

    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    pub fn kind(&self) -> ProgramKind {
        self.kind
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    pub fn uniforms(&self) -> UniformSet {
        self.uniforms
    }
}

/// All compiled variants of one program kind.
pub struct Material {
    kind: ProgramKind,
    variants: HashMap<FeatureSet, Option<Program>>,
    active: FeatureSet,
}

impl Material {
    pub fn new(kind: ProgramKind) -> Self {
        Self {
            kind,
            variants: HashMap::new(),
            active: FeatureSet::empty(),
        }
    }

    /// Select the variant for `features`, compiling it on first use.
    ///
    /// Flags the program does not understand are dropped from the key, so
    /// they never cause a redundant compile.
    pub fn set_features<D: RenderDevice + ?Sized>(&mut self, device: &mut D, features: &FeatureSet) {
        let key: FeatureSet = features
            .iter()
            .filter(|feature| self.kind.supported_features().contains(feature))
            .collect();

        if !self.variants.contains_key(&key) {
            let program = match device.compile(self.kind, &key) {
                Ok(handle) => {
                    log::debug!("Compiled {} program with {:?}", self.kind.label(), key);
                    Some(Program::new(handle, self.kind, key.clone()))
                }
                Err(e) => {
                    log::warn!("{}", e);
                    None
                }
            };
            self.variants.insert(key.clone(), program);
        }
        self.active = key;
    }

    /// Active variant, or `None` when its compile failed.
    pub fn program(&self) -> Option<&Program> {
        self.variants.get(&self.active).and_then(Option::as_ref)
    }

    pub fn active_features(&self) -> &FeatureSet {
        &self.active
    }

    /// Number of flag sets compiled so far, failures included.
    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }
}

/// The full set of programs the simulation needs.
pub struct ProgramLibrary {
    pub copy: Material,
    pub clear: Material,
    pub splat: Material,
    pub advection: Material,
    pub divergence: Material,
    pub curl: Material,
    pub vorticity: Material,
    pub pressure: Material,
    pub gradient_subtract: Material,
    pub display: Material,
}

impl ProgramLibrary {
    /// Compile every program for the negotiated capabilities.
    pub fn new<D: RenderDevice + ?Sized>(device: &mut D, shading: bool) -> Self {
        let capabilities = device.capabilities().clone();
        let mut library = Self {
            copy: Material::new(ProgramKind::Copy),
            clear: Material::new(ProgramKind::Clear),
            splat: Material::new(ProgramKind::Splat),
            advection: Material::new(ProgramKind::Advection),
            divergence: Material::new(ProgramKind::Divergence),
            curl: Material::new(ProgramKind::Curl),
            vorticity: Material::new(ProgramKind::Vorticity),
            pressure: Material::new(ProgramKind::Pressure),
            gradient_subtract: Material::new(ProgramKind::GradientSubtract),
            display: Material::new(ProgramKind::Display),
        };

        let none = FeatureSet::empty();
        library.copy.set_features(device, &none);
        library.clear.set_features(device, &none);
        library.splat.set_features(device, &none);
        library
            .advection
            .set_features(device, &Self::advection_features(&capabilities));
        library.divergence.set_features(device, &none);
        library.curl.set_features(device, &none);
        library.vorticity.set_features(device, &none);
        library.pressure.set_features(device, &none);
        library.gradient_subtract.set_features(device, &none);
        library.set_shading(device, shading);
        library
    }

    fn advection_features(capabilities: &DeviceCapabilities) -> FeatureSet {
        let mut features = FeatureSet::empty();
        if !capabilities.linear_filtering {
            features.insert(Feature::ManualFiltering);
        }
        features
    }

    /// Re-key the display material.
    pub fn set_shading<D: RenderDevice + ?Sized>(&mut self, device: &mut D, shading: bool) {
        let mut features = FeatureSet::empty();
        if shading {
            features.insert(Feature::Shading);
        }
        self.display.set_features(device, &features);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::cpu_device::CpuDevice;

    #[test]
    fn test_uniform_values_size() {
        // Must match the WGSL `Uniforms` struct
        assert_eq!(std::mem::size_of::<UniformValues>(), 64);
    }

    #[test]
    fn test_feature_set_order_independent() {
        let a: FeatureSet = [Feature::Shading, Feature::ManualFiltering].into_iter().collect();
        let b: FeatureSet = [Feature::ManualFiltering, Feature::Shading, Feature::Shading]
            .into_iter()
            .collect();
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);

        let mut map = HashMap::new();
        map.insert(a, 1);
        assert_eq!(map.get(&b), Some(&1));
    }

    #[test]
    fn test_feature_names_round_trip() {
        for feature in [Feature::ManualFiltering, Feature::Shading] {
            assert_eq!(Feature::from_name(feature.name()), Some(feature));
        }
        assert_eq!(Feature::from_name("BLOOM"), None);
    }

    #[test]
    fn test_optional_uniform_skipped_when_compiled_out() {
        let linear = Program::new(ProgramHandle(0), ProgramKind::Advection, FeatureSet::empty());
        let mut block = UniformBlock::new(&linear);
        block
            .set_dye_texel_size(Vec2::new(0.5, 0.25))
            .set_dt(0.016)
            .set_point(Vec2::ONE);
        assert_eq!(block.values().dye_texel_size, [0.0, 0.0]);
        assert_eq!(block.values().point, [0.0, 0.0]);
        assert_eq!(block.values().dt, 0.016);

        let manual: FeatureSet = [Feature::ManualFiltering].into_iter().collect();
        let manual = Program::new(ProgramHandle(1), ProgramKind::Advection, manual);
        let mut block = UniformBlock::new(&manual);
        block.set_dye_texel_size(Vec2::new(0.5, 0.25));
        assert_eq!(block.values().dye_texel_size, [0.5, 0.25]);
    }

    #[test]
    fn test_display_texel_size_only_with_shading() {
        let plain = ProgramKind::Display.uniforms(&FeatureSet::empty());
        assert!(!plain.contains(Uniform::TexelSize));

        let shaded: FeatureSet = [Feature::Shading].into_iter().collect();
        assert!(ProgramKind::Display.uniforms(&shaded).contains(Uniform::TexelSize));
    }

    #[test]
    fn test_material_compiles_each_flag_set_once() {
        let mut device = CpuDevice::new(64, 64);
        let mut material = Material::new(ProgramKind::Display);
        let shading: FeatureSet = [Feature::Shading].into_iter().collect();

        material.set_features(&mut device, &shading);
        material.set_features(&mut device, &FeatureSet::empty());
        material.set_features(&mut device, &shading);
        material.set_features(&mut device, &FeatureSet::empty());

        assert_eq!(material.variant_count(), 2);
        assert_eq!(device.compile_count(), 2);
        assert!(material.program().is_some());
        assert!(material.active_features().is_empty());
    }

    #[test]
    fn test_material_ignores_unsupported_flags() {
        let mut device = CpuDevice::new(64, 64);
        let mut material = Material::new(ProgramKind::Curl);
        let shading: FeatureSet = [Feature::Shading].into_iter().collect();

        material.set_features(&mut device, &FeatureSet::empty());
        material.set_features(&mut device, &shading);

        assert_eq!(material.variant_count(), 1);
        assert_eq!(device.compile_count(), 1);
    }

    #[test]
    fn test_failed_compile_leaves_empty_slot() {
        let mut device = CpuDevice::new(64, 64);
        device.fail_compiles_for(ProgramKind::Vorticity);
        let mut material = Material::new(ProgramKind::Vorticity);

        material.set_features(&mut device, &FeatureSet::empty());
        material.set_features(&mut device, &FeatureSet::empty());

        assert!(material.program().is_none());
        // Failures are cached, not retried
        assert_eq!(device.compile_count(), 1);
    }

    #[test]
    fn test_library_uses_manual_filtering_without_linear_support() {
        let mut capabilities = DeviceCapabilities::software();
        capabilities.linear_filtering = false;
        let mut device = CpuDevice::with_capabilities(32, 32, capabilities);
        let library = ProgramLibrary::new(&mut device, false);

        let advection = library.advection.program().expect("advection compiled");
        assert!(advection.features().contains(Feature::ManualFiltering));
        assert!(advection.uniforms().contains(Uniform::DyeTexelSize));
    }
}
