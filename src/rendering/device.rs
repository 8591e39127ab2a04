//! Graphics device abstraction
//!
//! The fluid solver never talks to wgpu directly. Every pass is expressed as a
//! [`DrawCall`]: one compiled program, up to two sampled textures, a uniform
//! block and an output (an off-screen target or the visible surface). Two
//! backends implement [`RenderDevice`]:
//! - [`super::wgpu_device::WgpuDevice`] - real GPU rendering through wgpu
//! - [`super::cpu_device::CpuDevice`] - software mirror of every shader, used
//!   for tests and headless runs

use super::capabilities::DeviceCapabilities;
use super::programs::{FeatureSet, Program, ProgramKind, ShaderError, UniformBlock};

/// Handle to a render target owned by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub(crate) u32);

/// Handle to a compiled program owned by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub(crate) u32);

/// Number of channels stored per texel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channels {
    R,
    Rg,
    Rgba,
}

impl Channels {
    pub fn count(self) -> usize {
        match self {
            Channels::R => 1,
            Channels::Rg => 2,
            Channels::Rgba => 4,
        }
    }

    /// Next wider channel layout, used when a narrow format is not renderable.
    pub fn wider(self) -> Option<Channels> {
        match self {
            Channels::R => Some(Channels::Rg),
            Channels::Rg => Some(Channels::Rgba),
            Channels::Rgba => None,
        }
    }
}

/// Numeric storage type of a texel channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TexelType {
    /// 16-bit float
    Half,
    /// 32-bit float
    Full,
    /// 8-bit normalized, last resort when no float format renders
    Unorm8,
}

impl TexelType {
    pub fn is_float(self) -> bool {
        matches!(self, TexelType::Half | TexelType::Full)
    }
}

/// Concrete texture format of a simulation field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldFormat {
    pub channels: Channels,
    pub texel: TexelType,
}

impl FieldFormat {
    pub const fn new(channels: Channels, texel: TexelType) -> Self {
        Self { channels, texel }
    }
}

/// Sampling filter of a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

/// Allocation request for a render target.
#[derive(Debug, Clone, Copy)]
pub struct TargetDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: FieldFormat,
    pub filter: Filter,
}

/// A render target bound to a sampling unit for one draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureBinding {
    pub unit: u32,
    pub target: TargetId,
}

/// Number of sampling units every program layout exposes.
pub const SAMPLING_UNITS: u32 = 2;

/// Where a draw writes its fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawTarget {
    Target(TargetId),
    Surface,
}

/// Output blending for a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Fragment replaces the destination
    Replace,
    /// `dst = src + dst * (1 - src.a)`
    PremultipliedOver,
}

/// One fullscreen pass.
#[derive(Debug, Clone, Copy)]
pub struct DrawCall<'a> {
    pub program: &'a Program,
    pub uniforms: &'a UniformBlock,
    pub textures: &'a [TextureBinding],
    pub output: DrawTarget,
    pub blend: BlendMode,
}

impl DrawCall<'_> {
    /// Reject draws that sample the target they write, or use a unit the
    /// program layout does not have.
    pub fn validate(&self) -> Result<(), DeviceError> {
        for binding in self.textures {
            if binding.unit >= SAMPLING_UNITS {
                return Err(DeviceError::InvalidUnit(binding.unit));
            }
            if self.output == DrawTarget::Target(binding.target) {
                return Err(DeviceError::Aliased(binding.target));
            }
        }
        Ok(())
    }

    /// Target bound to `unit`, if any.
    pub fn texture(&self, unit: u32) -> Option<TargetId> {
        self.textures
            .iter()
            .find(|binding| binding.unit == unit)
            .map(|binding| binding.target)
    }
}

/// Errors raised by a graphics device.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("no usable graphics context")]
    NoGraphicsContext,
    #[error("failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("failed to request device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("surface texture unavailable: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("no renderable field texture format")]
    NoRenderableFormat,
    #[error("surface drawn outside of a frame")]
    NoSurfaceFrame,
    #[error("unknown render target {0:?}")]
    UnknownTarget(TargetId),
    #[error("unknown program {0:?}")]
    UnknownProgram(ProgramHandle),
    #[error("render target {0:?} bound as both input and output")]
    Aliased(TargetId),
    #[error("sampling unit {0} out of range")]
    InvalidUnit(u32),
    #[error("invalid target size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
}

/// A graphics device able to run fullscreen fragment passes.
pub trait RenderDevice {
    /// Capability record negotiated when the device was created.
    fn capabilities(&self) -> &DeviceCapabilities;

    /// Allocate a renderable 2D target. Contents are undefined until cleared.
    fn create_target(&mut self, desc: &TargetDesc) -> Result<TargetId, DeviceError>;

    /// Free a target. Unknown ids are ignored.
    fn release_target(&mut self, id: TargetId);

    /// Compile the program `kind` with the given feature flags.
    fn compile(&mut self, kind: ProgramKind, features: &FeatureSet)
        -> Result<ProgramHandle, ShaderError>;

    /// Run one fullscreen pass.
    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), DeviceError>;

    /// Fill a target or the surface with a constant color.
    fn clear(&mut self, output: DrawTarget, color: [f32; 4]) -> Result<(), DeviceError>;

    /// Size of the visible surface in physical pixels.
    fn surface_size(&self) -> (u32, u32);

    /// Reconfigure the visible surface.
    fn resize_surface(&mut self, width: u32, height: u32);

    /// Acquire the surface for this frame's display pass.
    fn begin_frame(&mut self) -> Result<(), DeviceError>;

    /// Submit recorded work and present the surface.
    fn end_frame(&mut self) -> Result<(), DeviceError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::programs::{FeatureSet, Program, ProgramKind, UniformBlock};

    #[test]
    fn test_channel_cascade_order() {
        assert_eq!(Channels::R.wider(), Some(Channels::Rg));
        assert_eq!(Channels::Rg.wider(), Some(Channels::Rgba));
        assert_eq!(Channels::Rgba.wider(), None);
    }

    #[test]
    fn test_texel_type_float() {
        assert!(TexelType::Half.is_float());
        assert!(TexelType::Full.is_float());
        assert!(!TexelType::Unorm8.is_float());
    }

    #[test]
    fn test_draw_call_rejects_aliasing() {
        let program = Program::new(ProgramHandle(0), ProgramKind::Copy, FeatureSet::empty());
        let uniforms = UniformBlock::new(&program);
        let textures = [TextureBinding { unit: 0, target: TargetId(3) }];
        let call = DrawCall {
            program: &program,
            uniforms: &uniforms,
            textures: &textures,
            output: DrawTarget::Target(TargetId(3)),
            blend: BlendMode::Replace,
        };
        assert!(matches!(call.validate(), Err(DeviceError::Aliased(TargetId(3)))));

        let call = DrawCall {
            output: DrawTarget::Target(TargetId(4)),
            ..call
        };
        assert!(call.validate().is_ok());
        assert_eq!(call.texture(0), Some(TargetId(3)));
        assert_eq!(call.texture(1), None);
    }

    #[test]
    fn test_draw_call_rejects_unknown_unit() {
        let program = Program::new(ProgramHandle(0), ProgramKind::Copy, FeatureSet::empty());
        let uniforms = UniformBlock::new(&program);
        let textures = [TextureBinding { unit: 2, target: TargetId(1) }];
        let call = DrawCall {
            program: &program,
            uniforms: &uniforms,
            textures: &textures,
            output: DrawTarget::Surface,
            blend: BlendMode::Replace,
        };
        assert!(matches!(call.validate(), Err(DeviceError::InvalidUnit(2))));
    }
}
