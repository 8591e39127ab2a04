//! Software render device
//!
//! Mirrors every fluid shader on the CPU so the solver can run headless and
//! be inspected pixel by pixel. Sampling follows GPU rules: clamp-to-edge
//! addressing, texel centers at `(i + 0.5) / size`, nearest or bilinear
//! filtering per target, and missing channels reading back as `(0, 0, 1)`.
//! Rows are shaded in parallel with rayon.

use std::collections::{HashMap, HashSet};

use glam::{Vec2, Vec3, Vec4, Vec4Swizzles};
use rayon::prelude::*;

use super::capabilities::DeviceCapabilities;
use super::device::{
    BlendMode, Channels, DeviceError, DrawCall, DrawTarget, FieldFormat, Filter, ProgramHandle,
    RenderDevice, TargetDesc, TargetId, TexelType,
};
use super::programs::{Feature, FeatureSet, ProgramKind, ShaderError, UniformValues};

struct CpuTarget {
    width: u32,
    height: u32,
    format: FieldFormat,
    filter: Filter,
    data: Vec<Vec4>,
}

impl CpuTarget {
    fn new(width: u32, height: u32, format: FieldFormat, filter: Filter) -> Self {
        Self {
            width,
            height,
            format,
            filter,
            data: vec![Vec4::ZERO; (width * height) as usize],
        }
    }

    fn texel(&self, x: i64, y: i64) -> Vec4 {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        self.data[y * self.width as usize + x]
    }

    fn sample(&self, uv: Vec2) -> Vec4 {
        let size = Vec2::new(self.width as f32, self.height as f32);
        match self.filter {
            Filter::Nearest => {
                let st = (uv * size).floor();
                self.texel(st.x as i64, st.y as i64)
            }
            Filter::Linear => {
                let st = uv * size - 0.5;
                let base = st.floor();
                let f = st - base;
                let (x, y) = (base.x as i64, base.y as i64);
                let a = self.texel(x, y);
                let b = self.texel(x + 1, y);
                let c = self.texel(x, y + 1);
                let d = self.texel(x + 1, y + 1);
                a.lerp(b, f.x).lerp(c.lerp(d, f.x), f.y)
            }
        }
    }
}

/// Drop channels `format` does not store.
fn encode(format: FieldFormat, value: Vec4) -> Vec4 {
    let value = match format.channels {
        Channels::R => Vec4::new(value.x, 0.0, 0.0, 1.0),
        Channels::Rg => Vec4::new(value.x, value.y, 0.0, 1.0),
        Channels::Rgba => value,
    };
    match format.texel {
        TexelType::Unorm8 => (value.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round() / 255.0,
        TexelType::Half | TexelType::Full => value,
    }
}

/// Sampling units of one draw.
struct Inputs<'a> {
    units: [Option<&'a CpuTarget>; 2],
}

impl Inputs<'_> {
    fn sample(&self, unit: usize, uv: Vec2) -> Vec4 {
        self.units[unit].map_or(Vec4::ZERO, |target| target.sample(uv))
    }

    /// Bilinear filtering built from four nearest samples.
    fn bilerp(&self, unit: usize, uv: Vec2, texel_size: Vec2) -> Vec4 {
        let st = uv / texel_size - 0.5;
        let iuv = st.floor();
        let fuv = st - iuv;
        let a = self.sample(unit, (iuv + Vec2::new(0.5, 0.5)) * texel_size);
        let b = self.sample(unit, (iuv + Vec2::new(1.5, 0.5)) * texel_size);
        let c = self.sample(unit, (iuv + Vec2::new(0.5, 1.5)) * texel_size);
        let d = self.sample(unit, (iuv + Vec2::new(1.5, 1.5)) * texel_size);
        a.lerp(b, fuv.x).lerp(c.lerp(d, fuv.x), fuv.y)
    }
}

/// Neighbor coordinates produced by the shared vertex stage.
struct Stencil {
    uv: Vec2,
    l: Vec2,
    r: Vec2,
    t: Vec2,
    b: Vec2,
}

impl Stencil {
    fn new(uv: Vec2, texel_size: Vec2) -> Self {
        Self {
            uv,
            l: uv - Vec2::new(texel_size.x, 0.0),
            r: uv + Vec2::new(texel_size.x, 0.0),
            t: uv + Vec2::new(0.0, texel_size.y),
            b: uv - Vec2::new(0.0, texel_size.y),
        }
    }
}

/// Fragment stage of every program, matching `shaders/fluid/*.wgsl`.
fn shade(kind: ProgramKind, features: &FeatureSet, u: &UniformValues, inputs: &Inputs, uv: Vec2) -> Vec4 {
    let texel_size = Vec2::from(u.texel_size);
    let s = Stencil::new(uv, texel_size);

    match kind {
        ProgramKind::Copy => inputs.sample(0, uv),
        ProgramKind::Clear => inputs.sample(0, uv) * u.value,
        ProgramKind::Splat => {
            let mut p = uv - Vec2::from(u.point);
            p.x *= u.aspect_ratio;
            let splat = (-p.dot(p) / u.radius).exp() * Vec4::from(u.color).xyz();
            let base = inputs.sample(0, uv).xyz();
            (base + splat).extend(1.0)
        }
        ProgramKind::Advection => {
            let result = if features.contains(Feature::ManualFiltering) {
                let velocity = inputs.bilerp(0, uv, texel_size).xy();
                let coord = uv - u.dt * velocity * texel_size;
                inputs.bilerp(1, coord, Vec2::from(u.dye_texel_size))
            } else {
                let coord = uv - u.dt * inputs.sample(0, uv).xy() * texel_size;
                inputs.sample(1, coord)
            };
            let decay = 1.0 + u.dissipation * u.dt;
            result / decay
        }
        ProgramKind::Divergence => {
            let mut l = inputs.sample(0, s.l).x;
            let mut r = inputs.sample(0, s.r).x;
            let mut t = inputs.sample(0, s.t).y;
            let mut b = inputs.sample(0, s.b).y;
            let c = inputs.sample(0, s.uv).xy();
            if s.l.x < 0.0 {
                l = -c.x;
            }
            if s.r.x > 1.0 {
                r = -c.x;
            }
            if s.t.y > 1.0 {
                t = -c.y;
            }
            if s.b.y < 0.0 {
                b = -c.y;
            }
            let divergence = 0.5 * (r - l + t - b);
            Vec4::new(divergence, 0.0, 0.0, 1.0)
        }
        ProgramKind::Curl => {
            let l = inputs.sample(0, s.l).y;
            let r = inputs.sample(0, s.r).y;
            let t = inputs.sample(0, s.t).x;
            let b = inputs.sample(0, s.b).x;
            let vorticity = r - l - t + b;
            Vec4::new(0.5 * vorticity, 0.0, 0.0, 1.0)
        }
        ProgramKind::Vorticity => {
            let l = inputs.sample(1, s.l).x;
            let r = inputs.sample(1, s.r).x;
            let t = inputs.sample(1, s.t).x;
            let b = inputs.sample(1, s.b).x;
            let c = inputs.sample(1, s.uv).x;

            let mut force = 0.5 * Vec2::new(t.abs() - b.abs(), r.abs() - l.abs());
            force /= force.length() + 0.0001;
            force *= u.curl * c;
            force.y *= -1.0;

            let velocity = inputs.sample(0, s.uv).xy() + force * u.dt;
            let velocity = velocity.clamp(Vec2::splat(-1000.0), Vec2::splat(1000.0));
            Vec4::new(velocity.x, velocity.y, 0.0, 1.0)
        }
        ProgramKind::Pressure => {
            let l = inputs.sample(1, s.l).x;
            let r = inputs.sample(1, s.r).x;
            let t = inputs.sample(1, s.t).x;
            let b = inputs.sample(1, s.b).x;
            let divergence = inputs.sample(0, s.uv).x;
            let pressure = (l + r + b + t - divergence) * 0.25;
            Vec4::new(pressure, 0.0, 0.0, 1.0)
        }
        ProgramKind::GradientSubtract => {
            let l = inputs.sample(0, s.l).x;
            let r = inputs.sample(0, s.r).x;
            let t = inputs.sample(0, s.t).x;
            let b = inputs.sample(0, s.b).x;
            let velocity = inputs.sample(1, s.uv).xy() - Vec2::new(r - l, t - b);
            Vec4::new(velocity.x, velocity.y, 0.0, 1.0)
        }
        ProgramKind::Display => {
            // Fields are stored y-up, the surface y-down
            let field = Stencil::new(Vec2::new(uv.x, 1.0 - uv.y), texel_size);
            let mut c = inputs.sample(0, field.uv).xyz();
            if features.contains(Feature::Shading) {
                let lc = inputs.sample(0, field.l).xyz();
                let rc = inputs.sample(0, field.r).xyz();
                let tc = inputs.sample(0, field.t).xyz();
                let bc = inputs.sample(0, field.b).xyz();
                let dx = rc.length() - lc.length();
                let dy = tc.length() - bc.length();
                let n = Vec3::new(dx, dy, texel_size.length()).normalize_or_zero();
                let diffuse = (n.dot(Vec3::Z) + 0.7).clamp(0.7, 1.0);
                c *= diffuse;
            }
            let a = c.x.max(c.y.max(c.z));
            c.extend(a)
        }
    }
}

/// CPU implementation of [`RenderDevice`].
pub struct CpuDevice {
    capabilities: DeviceCapabilities,
    targets: HashMap<TargetId, CpuTarget>,
    next_target: u32,
    programs: Vec<(ProgramKind, FeatureSet)>,
    failing: HashSet<ProgramKind>,
    compile_count: usize,
    draw_count: usize,
    surface: CpuTarget,
    in_frame: bool,
    frames_presented: u64,
}

impl CpuDevice {
    /// Device with full float and linear filtering support.
    pub fn new(surface_width: u32, surface_height: u32) -> Self {
        Self::with_capabilities(surface_width, surface_height, DeviceCapabilities::software())
    }

    pub fn with_capabilities(surface_width: u32, surface_height: u32, capabilities: DeviceCapabilities) -> Self {
        Self {
            capabilities,
            targets: HashMap::new(),
            next_target: 0,
            programs: Vec::new(),
            failing: HashSet::new(),
            compile_count: 0,
            draw_count: 0,
            surface: Self::surface_target(surface_width, surface_height),
            in_frame: false,
            frames_presented: 0,
        }
    }

    fn surface_target(width: u32, height: u32) -> CpuTarget {
        CpuTarget::new(
            width.max(1),
            height.max(1),
            FieldFormat::new(Channels::Rgba, TexelType::Full),
            Filter::Nearest,
        )
    }

    /// Make every later compile of `kind` fail.
    pub fn fail_compiles_for(&mut self, kind: ProgramKind) {
        self.failing.insert(kind);
    }

    /// Compile attempts so far, failures included.
    pub fn compile_count(&self) -> usize {
        self.compile_count
    }

    pub fn draw_count(&self) -> usize {
        self.draw_count
    }

    pub fn live_targets(&self) -> usize {
        self.targets.len()
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Size of a target, if it exists.
    pub fn target_size(&self, id: TargetId) -> Option<(u32, u32)> {
        self.targets.get(&id).map(|target| (target.width, target.height))
    }

    /// Read back a target, rows bottom to top in field space.
    pub fn pixels(&self, id: TargetId) -> Option<Vec<[f32; 4]>> {
        self.targets
            .get(&id)
            .map(|target| target.data.iter().map(|texel| texel.to_array()).collect())
    }

    /// Read back the visible surface, rows top to bottom.
    pub fn surface_pixels(&self) -> Vec<[f32; 4]> {
        self.surface.data.iter().map(|texel| texel.to_array()).collect()
    }

    /// Overwrite every texel of a target.
    pub fn fill(&mut self, id: TargetId, color: [f32; 4]) -> Result<(), DeviceError> {
        let target = self.targets.get_mut(&id).ok_or(DeviceError::UnknownTarget(id))?;
        let value = encode(target.format, Vec4::from(color));
        target.data.fill(value);
        Ok(())
    }

    fn render(
        output: &mut CpuTarget,
        kind: ProgramKind,
        features: &FeatureSet,
        uniforms: &UniformValues,
        inputs: &Inputs,
        blend: BlendMode,
    ) {
        let width = output.width as usize;
        let size = Vec2::new(output.width as f32, output.height as f32);
        let shaded: Vec<Vec4> = (0..output.data.len())
            .into_par_iter()
            .map(|index| {
                let x = (index % width) as f32;
                let y = (index / width) as f32;
                let uv = (Vec2::new(x, y) + 0.5) / size;
                shade(kind, features, uniforms, inputs, uv)
            })
            .collect();

        let format = output.format;
        for (texel, src) in output.data.iter_mut().zip(shaded) {
            let value = match blend {
                BlendMode::Replace => src,
                BlendMode::PremultipliedOver => src + *texel * (1.0 - src.w),
            };
            *texel = encode(format, value);
        }
    }
}

impl RenderDevice for CpuDevice {
    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn create_target(&mut self, desc: &TargetDesc) -> Result<TargetId, DeviceError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(DeviceError::InvalidSize {
                width: desc.width,
                height: desc.height,
            });
        }
        let id = TargetId(self.next_target);
        self.next_target += 1;
        self.targets
            .insert(id, CpuTarget::new(desc.width, desc.height, desc.format, desc.filter));
        Ok(id)
    }

    fn release_target(&mut self, id: TargetId) {
        self.targets.remove(&id);
    }

    fn compile(&mut self, kind: ProgramKind, features: &FeatureSet) -> Result<ProgramHandle, ShaderError> {
        self.compile_count += 1;
        if self.failing.contains(&kind) {
            return Err(ShaderError::Compile {
                kind,
                message: "compilation disabled for this device".to_string(),
            });
        }
        let handle = ProgramHandle(self.programs.len() as u32);
        self.programs.push((kind, features.clone()));
        Ok(handle)
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), DeviceError> {
        call.validate()?;
        let handle = call.program.handle();
        let (kind, features) = self
            .programs
            .get(handle.0 as usize)
            .cloned()
            .ok_or(DeviceError::UnknownProgram(handle))?;

        let mut units = [None, None];
        for binding in call.textures {
            let target = self
                .targets
                .get(&binding.target)
                .ok_or(DeviceError::UnknownTarget(binding.target))?;
            units[binding.unit as usize] = Some(target);
        }
        let inputs = Inputs { units };
        let uniforms = call.uniforms.values();

        match call.output {
            DrawTarget::Surface => {
                if !self.in_frame {
                    return Err(DeviceError::NoSurfaceFrame);
                }
                Self::render(&mut self.surface, kind, &features, uniforms, &inputs, call.blend);
            }
            DrawTarget::Target(id) => {
                // Inputs never alias the output (validated above), so the
                // output can be shaded from a scratch copy.
                let output = self.targets.get(&id).ok_or(DeviceError::UnknownTarget(id))?;
                let mut scratch = CpuTarget {
                    width: output.width,
                    height: output.height,
                    format: output.format,
                    filter: output.filter,
                    data: output.data.clone(),
                };
                Self::render(&mut scratch, kind, &features, uniforms, &inputs, call.blend);
                if let Some(output) = self.targets.get_mut(&id) {
                    output.data = scratch.data;
                }
            }
        }
        self.draw_count += 1;
        Ok(())
    }

    fn clear(&mut self, output: DrawTarget, color: [f32; 4]) -> Result<(), DeviceError> {
        match output {
            DrawTarget::Surface => {
                let value = Vec4::from(color);
                self.surface.data.fill(value);
                Ok(())
            }
            DrawTarget::Target(id) => self.fill(id, color),
        }
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.surface.width, self.surface.height)
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        self.surface = Self::surface_target(width, height);
    }

    fn begin_frame(&mut self) -> Result<(), DeviceError> {
        self.in_frame = true;
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), DeviceError> {
        if self.in_frame {
            self.in_frame = false;
            self.frames_presented += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::programs::{Program, UniformBlock};

    const RGBA: FieldFormat = FieldFormat::new(Channels::Rgba, TexelType::Full);
    const R: FieldFormat = FieldFormat::new(Channels::R, TexelType::Full);

    fn target(device: &mut CpuDevice, width: u32, height: u32, format: FieldFormat, filter: Filter) -> TargetId {
        device
            .create_target(&TargetDesc {
                label: "Test",
                width,
                height,
                format,
                filter,
            })
            .unwrap()
    }

    #[test]
    fn test_single_channel_masks_on_write() {
        let mut device = CpuDevice::new(8, 8);
        let id = target(&mut device, 2, 2, R, Filter::Nearest);
        device.fill(id, [0.5, 0.7, 0.9, 0.2]).unwrap();
        assert_eq!(device.pixels(id).unwrap()[0], [0.5, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_linear_sampling_interpolates_between_texel_centers() {
        let mut device = CpuDevice::new(8, 8);
        let id = target(&mut device, 2, 1, RGBA, Filter::Linear);
        device.targets.get_mut(&id).unwrap().data = vec![Vec4::ZERO, Vec4::ONE];

        let target = &device.targets[&id];
        assert_eq!(target.sample(Vec2::new(0.25, 0.5)), Vec4::ZERO);
        assert_eq!(target.sample(Vec2::new(0.75, 0.5)), Vec4::ONE);
        assert!((target.sample(Vec2::new(0.5, 0.5)).x - 0.5).abs() < 1e-6);
        // Clamp to edge
        assert_eq!(target.sample(Vec2::new(-1.0, 0.5)), Vec4::ZERO);
        assert_eq!(target.sample(Vec2::new(2.0, 0.5)), Vec4::ONE);
    }

    #[test]
    fn test_manual_bilerp_matches_hardware_filtering() {
        let mut device = CpuDevice::new(8, 8);
        let nearest = target(&mut device, 4, 4, RGBA, Filter::Nearest);
        let linear = target(&mut device, 4, 4, RGBA, Filter::Linear);
        let data: Vec<Vec4> = (0..16).map(|i| Vec4::splat(i as f32)).collect();
        device.targets.get_mut(&nearest).unwrap().data = data.clone();
        device.targets.get_mut(&linear).unwrap().data = data;

        let manual = Inputs {
            units: [device.targets.get(&nearest), None],
        };
        let hardware = &device.targets[&linear];
        let texel = Vec2::splat(0.25);
        for uv in [Vec2::new(0.3, 0.4), Vec2::new(0.51, 0.77), Vec2::new(0.2, 0.6)] {
            let a = manual.bilerp(0, uv, texel);
            let b = hardware.sample(uv);
            assert!((a - b).abs().max_element() < 1e-4, "{uv}: {a} vs {b}");
        }
    }

    #[test]
    fn test_clear_program_scales_by_value() {
        let mut device = CpuDevice::new(8, 8);
        let source = target(&mut device, 4, 4, R, Filter::Nearest);
        let output = target(&mut device, 4, 4, R, Filter::Nearest);
        device.fill(source, [2.0, 0.0, 0.0, 1.0]).unwrap();

        let handle = device.compile(ProgramKind::Clear, &FeatureSet::empty()).unwrap();
        let program = Program::new(handle, ProgramKind::Clear, FeatureSet::empty());
        let mut uniforms = UniformBlock::new(&program);
        uniforms.set_value(0.1);
        device
            .draw(&DrawCall {
                program: &program,
                uniforms: &uniforms,
                textures: &[crate::rendering::device::TextureBinding { unit: 0, target: source }],
                output: DrawTarget::Target(output),
                blend: BlendMode::Replace,
            })
            .unwrap();

        let pixels = device.pixels(output).unwrap();
        assert!(pixels.iter().all(|p| (p[0] - 0.2).abs() < 1e-6));
    }

    #[test]
    fn test_surface_draw_requires_frame() {
        let mut device = CpuDevice::new(4, 4);
        let handle = device.compile(ProgramKind::Display, &FeatureSet::empty()).unwrap();
        let program = Program::new(handle, ProgramKind::Display, FeatureSet::empty());
        let uniforms = UniformBlock::new(&program);
        let call = DrawCall {
            program: &program,
            uniforms: &uniforms,
            textures: &[],
            output: DrawTarget::Surface,
            blend: BlendMode::PremultipliedOver,
        };
        assert!(matches!(device.draw(&call), Err(DeviceError::NoSurfaceFrame)));

        device.begin_frame().unwrap();
        assert!(device.draw(&call).is_ok());
        device.end_frame().unwrap();
        assert_eq!(device.frames_presented(), 1);
    }

    #[test]
    fn test_unorm_targets_clamp() {
        let mut device = CpuDevice::new(4, 4);
        let id = target(
            &mut device,
            1,
            1,
            FieldFormat::new(Channels::Rgba, TexelType::Unorm8),
            Filter::Linear,
        );
        device.fill(id, [-1.0, 2.0, 0.5, 1.0]).unwrap();
        let pixel = device.pixels(id).unwrap()[0];
        assert_eq!(pixel[0], 0.0);
        assert_eq!(pixel[1], 1.0);
        assert!((pixel[2] - 128.0 / 255.0).abs() < 1e-6);
    }
}
