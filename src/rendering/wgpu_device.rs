//! wgpu render device
//!
//! Owns the surface, device and queue, and runs every [`DrawCall`] as a
//! fullscreen-triangle render pass. Context creation walks a fallback
//! ladder (primary backends, then WebGL2-level limits, then a software
//! adapter). Uniform blocks are packed into a ring buffer bound with dynamic
//! offsets and flushed to the queue when the ring fills or the frame ends.

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;

use winit::window::Window;

use super::capabilities::{self, ContextTier, DeviceCapabilities, FormatProbe};
use super::device::{
    BlendMode, Channels, DeviceError, DrawCall, DrawTarget, FieldFormat, Filter, ProgramHandle,
    RenderDevice, TargetDesc, TargetId, TexelType, SAMPLING_UNITS,
};
use super::programs::{FeatureSet, ProgramKind, ShaderError, UniformValues};

/// Uniform blocks recorded before the ring is flushed.
const UNIFORM_RING_SLOTS: u64 = 128;

const UNIFORM_SIZE: u64 = std::mem::size_of::<UniformValues>() as u64;

const FALLBACK_LADDER: [ContextTier; 3] = [ContextTier::Primary, ContextTier::Downlevel, ContextTier::Fallback];

/// WGSL source of a program: shared vertex stage plus its fragment stage.
fn shader_source(kind: ProgramKind) -> &'static str {
    macro_rules! fluid_shader {
        ($file:literal) => {
            concat!(
                include_str!("../../shaders/fluid/common.wgsl"),
                include_str!(concat!("../../shaders/fluid/", $file))
            )
        };
    }
    match kind {
        ProgramKind::Copy => fluid_shader!("copy.wgsl"),
        ProgramKind::Clear => fluid_shader!("clear.wgsl"),
        ProgramKind::Splat => fluid_shader!("splat.wgsl"),
        ProgramKind::Advection => fluid_shader!("advection.wgsl"),
        ProgramKind::Divergence => fluid_shader!("divergence.wgsl"),
        ProgramKind::Curl => fluid_shader!("curl.wgsl"),
        ProgramKind::Vorticity => fluid_shader!("vorticity.wgsl"),
        ProgramKind::Pressure => fluid_shader!("pressure.wgsl"),
        ProgramKind::GradientSubtract => fluid_shader!("gradient_subtract.wgsl"),
        ProgramKind::Display => fluid_shader!("display.wgsl"),
    }
}

pub fn texture_format(format: FieldFormat) -> wgpu::TextureFormat {
    use wgpu::TextureFormat as F;
    match (format.channels, format.texel) {
        (Channels::R, TexelType::Half) => F::R16Float,
        (Channels::Rg, TexelType::Half) => F::Rg16Float,
        (Channels::Rgba, TexelType::Half) => F::Rgba16Float,
        (Channels::R, TexelType::Full) => F::R32Float,
        (Channels::Rg, TexelType::Full) => F::Rg32Float,
        (Channels::Rgba, TexelType::Full) => F::Rgba32Float,
        (Channels::R, TexelType::Unorm8) => F::R8Unorm,
        (Channels::Rg, TexelType::Unorm8) => F::Rg8Unorm,
        (Channels::Rgba, TexelType::Unorm8) => F::Rgba8Unorm,
    }
}

/// Answers format queries from the adapter, restricted to what the device
/// was created with.
struct AdapterProbe<'a> {
    adapter: &'a wgpu::Adapter,
    features: wgpu::Features,
}

impl AdapterProbe<'_> {
    fn format_features(&self, format: FieldFormat) -> (wgpu::TextureFormatFeatures, wgpu::TextureFormatFeatures) {
        let format = texture_format(format);
        (
            format.guaranteed_format_features(self.features),
            self.adapter.get_texture_format_features(format),
        )
    }
}

impl FormatProbe for AdapterProbe<'_> {
    fn is_renderable(&self, format: FieldFormat) -> bool {
        let usages = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        let (guaranteed, adapter) = self.format_features(format);
        guaranteed.allowed_usages.contains(usages) && adapter.allowed_usages.contains(usages)
    }

    fn is_filterable(&self, format: FieldFormat) -> bool {
        let filterable = wgpu::TextureFormatFeatureFlags::FILTERABLE;
        let (guaranteed, adapter) = self.format_features(format);
        guaranteed.flags.contains(filterable) && adapter.flags.contains(filterable)
    }
}

struct GpuContext {
    surface: wgpu::Surface<'static>,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
}

fn request_context(tier: ContextTier, window: Arc<Window>) -> Result<GpuContext, DeviceError> {
    let backends = match tier {
        ContextTier::Primary => wgpu::Backends::PRIMARY,
        ContextTier::Downlevel | ContextTier::Fallback => wgpu::Backends::all(),
    };
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends,
        ..Default::default()
    });
    let surface = instance.create_surface(window)?;

    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: Some(&surface),
        force_fallback_adapter: tier == ContextTier::Fallback,
    }))
    .map_err(|e| {
        log::debug!("No {:?} adapter: {}", tier, e);
        DeviceError::NoGraphicsContext
    })?;

    log::info!("Using GPU: {:?} ({:?})", adapter.get_info().name, tier);

    let base_limits = match tier {
        ContextTier::Primary => wgpu::Limits::default(),
        ContextTier::Downlevel | ContextTier::Fallback => wgpu::Limits::downlevel_webgl2_defaults(),
    };
    let required_features = adapter.features() & wgpu::Features::FLOAT32_FILTERABLE;

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("Fluid Device"),
        required_features,
        required_limits: base_limits.using_resolution(adapter.limits()),
        memory_hints: wgpu::MemoryHints::Performance,
        trace: wgpu::Trace::Off,
    }))?;

    device.on_uncaptured_error(Box::new(|error| {
        log::error!("GPU uncaptured error: {}", error);
    }));

    Ok(GpuContext {
        surface,
        adapter,
        device,
        queue,
    })
}

struct GpuTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    format: wgpu::TextureFormat,
    filter: Filter,
}

struct CompiledProgram {
    kind: ProgramKind,
    module: wgpu::ShaderModule,
    constants: Vec<(&'static str, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramHandle,
    format: wgpu::TextureFormat,
    blend: BlendMode,
}

/// CPU staging of uniform blocks, uploaded in one write per flush.
struct UniformRing {
    buffer: wgpu::Buffer,
    stride: u64,
    staging: Vec<u8>,
    len: u64,
}

impl UniformRing {
    fn new(device: &wgpu::Device) -> Self {
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let stride = UNIFORM_SIZE.div_ceil(alignment) * alignment;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Fluid Uniform Ring"),
            size: stride * UNIFORM_RING_SLOTS,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            buffer,
            stride,
            staging: vec![0; (stride * UNIFORM_RING_SLOTS) as usize],
            len: 0,
        }
    }

    fn is_full(&self) -> bool {
        self.len == UNIFORM_RING_SLOTS
    }

    /// Stage `values`, returning the dynamic offset of its slot.
    fn push(&mut self, values: &UniformValues) -> u32 {
        let offset = self.len * self.stride;
        let start = offset as usize;
        self.staging[start..start + UNIFORM_SIZE as usize].copy_from_slice(bytemuck::bytes_of(values));
        self.len += 1;
        offset as u32
    }

    fn upload(&mut self, queue: &wgpu::Queue) {
        if self.len > 0 {
            let used = (self.len * self.stride) as usize;
            queue.write_buffer(&self.buffer, 0, &self.staging[..used]);
        }
        self.len = 0;
    }
}

/// GPU implementation of [`RenderDevice`].
pub struct WgpuDevice {
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    device: wgpu::Device,
    queue: wgpu::Queue,
    capabilities: DeviceCapabilities,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    linear_sampler: wgpu::Sampler,
    nearest_sampler: wgpu::Sampler,
    dummy_view: wgpu::TextureView,
    programs: Vec<CompiledProgram>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    targets: HashMap<TargetId, GpuTarget>,
    next_target: u32,
    uniforms: UniformRing,
    encoder: Option<wgpu::CommandEncoder>,
    frame: Option<(wgpu::SurfaceTexture, wgpu::TextureView)>,
}

impl WgpuDevice {
    /// Create a device rendering into `window`.
    ///
    /// `transparent` selects a premultiplied-alpha surface when the platform
    /// offers one.
    pub fn new(window: Arc<Window>, transparent: bool) -> Result<Self, DeviceError> {
        let size = window.inner_size();

        let mut context = None;
        for tier in FALLBACK_LADDER {
            match request_context(tier, window.clone()) {
                Ok(found) => {
                    context = Some((tier, found));
                    break;
                }
                Err(e) => log::warn!("{:?} graphics context unavailable: {}", tier, e),
            }
        }
        let (tier, GpuContext {
            surface,
            adapter,
            device,
            queue,
        }) = context.ok_or(DeviceError::NoGraphicsContext)?;

        let probe = AdapterProbe {
            adapter: &adapter,
            features: device.features(),
        };
        let capabilities = capabilities::negotiate(tier, &probe)?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(DeviceError::NoGraphicsContext)?;
        let alpha_mode = if transparent
            && surface_caps
                .alpha_modes
                .contains(&wgpu::CompositeAlphaMode::PreMultiplied)
        {
            wgpu::CompositeAlphaMode::PreMultiplied
        } else {
            surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto)
        };

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let filterable = capabilities.linear_filtering;
        let sampler_binding = if filterable {
            wgpu::SamplerBindingType::Filtering
        } else {
            wgpu::SamplerBindingType::NonFiltering
        };
        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let sampler_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(sampler_binding),
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Fluid Bind Group Layout"),
            entries: &[
                // Uniform block, one ring slot per draw
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: NonZeroU64::new(UNIFORM_SIZE),
                    },
                    count: None,
                },
                texture_entry(1),
                texture_entry(2),
                sampler_entry(3),
                sampler_entry(4),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Fluid Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let nearest_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Fluid Nearest Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let linear_sampler = if filterable {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("Fluid Linear Sampler"),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                ..Default::default()
            })
        } else {
            nearest_sampler.clone()
        };

        // Bound to sampling units a pass leaves empty
        let dummy = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Fluid Empty Texture"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format(capabilities.format_rgba),
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let dummy_view = dummy.create_view(&wgpu::TextureViewDescriptor::default());

        let uniforms = UniformRing::new(&device);

        Ok(Self {
            surface,
            surface_config,
            device,
            queue,
            capabilities,
            bind_group_layout,
            pipeline_layout,
            linear_sampler,
            nearest_sampler,
            dummy_view,
            programs: Vec::new(),
            pipelines: HashMap::new(),
            targets: HashMap::new(),
            next_target: 0,
            uniforms,
            encoder: None,
            frame: None,
        })
    }

    fn sampler(&self, filter: Filter) -> &wgpu::Sampler {
        match filter {
            Filter::Linear => &self.linear_sampler,
            Filter::Nearest => &self.nearest_sampler,
        }
    }

    /// Upload staged uniforms and submit recorded passes.
    fn flush(&mut self) {
        self.uniforms.upload(&self.queue);
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
    }

    /// Encoder collecting passes until the next flush.
    fn take_encoder(&mut self) -> wgpu::CommandEncoder {
        self.encoder.take().unwrap_or_else(|| {
            self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Fluid Encoder"),
            })
        })
    }

    fn output_view(&self, output: DrawTarget) -> Result<(&wgpu::TextureView, wgpu::TextureFormat), DeviceError> {
        match output {
            DrawTarget::Surface => self
                .frame
                .as_ref()
                .map(|(_, view)| (view, self.surface_config.format))
                .ok_or(DeviceError::NoSurfaceFrame),
            DrawTarget::Target(id) => self
                .targets
                .get(&id)
                .map(|target| (&target.view, target.format))
                .ok_or(DeviceError::UnknownTarget(id)),
        }
    }

    fn create_pipeline(&self, key: PipelineKey) -> Result<wgpu::RenderPipeline, DeviceError> {
        let program = self
            .programs
            .get(key.program.0 as usize)
            .ok_or(DeviceError::UnknownProgram(key.program))?;

        let blend = match key.blend {
            BlendMode::Replace => None,
            BlendMode::PremultipliedOver => Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
        };
        let compilation_options = wgpu::PipelineCompilationOptions {
            constants: &program.constants,
            zero_initialize_workgroup_memory: false,
        };

        log::debug!("Creating {} pipeline for {:?}", program.kind.label(), key.format);

        Ok(self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(program.kind.label()),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &program.module,
                entry_point: Some("vs_main"),
                buffers: &[], // Fullscreen triangle, no vertex buffer
                compilation_options: compilation_options.clone(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &program.module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: key.format,
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options,
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        }))
    }

    fn acquire_frame(&mut self) -> Result<wgpu::SurfaceTexture, DeviceError> {
        match self.surface.get_current_texture() {
            Ok(frame) => Ok(frame),
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                log::debug!("Surface outdated, reconfiguring");
                self.surface.configure(&self.device, &self.surface_config);
                Ok(self.surface.get_current_texture()?)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl RenderDevice for WgpuDevice {
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
        let format = texture_format(desc.format);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let id = TargetId(self.next_target);
        self.next_target += 1;
        self.targets.insert(
            id,
            GpuTarget {
                _texture: texture,
                view,
                format,
                filter: desc.filter,
            },
        );
        Ok(id)
    }

    fn release_target(&mut self, id: TargetId) {
        // Recorded passes may still reference the texture
        self.flush();
        self.targets.remove(&id);
    }

    fn compile(&mut self, kind: ProgramKind, features: &FeatureSet) -> Result<ProgramHandle, ShaderError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(kind.label()),
            source: wgpu::ShaderSource::Wgsl(shader_source(kind).into()),
        });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(ShaderError::Compile {
                kind,
                message: error.to_string(),
            });
        }

        // Only overrides the module declares may be passed
        let constants = kind
            .supported_features()
            .iter()
            .map(|&feature| (feature.name(), if features.contains(feature) { 1.0 } else { 0.0 }))
            .collect();

        let handle = ProgramHandle(self.programs.len() as u32);
        self.programs.push(CompiledProgram {
            kind,
            module,
            constants,
        });
        Ok(handle)
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), DeviceError> {
        call.validate()?;

        let (_, format) = self.output_view(call.output)?;
        let key = PipelineKey {
            program: call.program.handle(),
            format,
            blend: call.blend,
        };
        if !self.pipelines.contains_key(&key) {
            let pipeline = self.create_pipeline(key)?;
            self.pipelines.insert(key, pipeline);
        }

        if self.uniforms.is_full() {
            self.flush();
        }
        let offset = self.uniforms.push(call.uniforms.values());

        let mut views = [&self.dummy_view; SAMPLING_UNITS as usize];
        let mut samplers = [&self.nearest_sampler; SAMPLING_UNITS as usize];
        for binding in call.textures {
            let target = self
                .targets
                .get(&binding.target)
                .ok_or(DeviceError::UnknownTarget(binding.target))?;
            views[binding.unit as usize] = &target.view;
            samplers[binding.unit as usize] = self.sampler(target.filter);
        }

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Fluid Pass Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &self.uniforms.buffer,
                        offset: 0,
                        size: NonZeroU64::new(UNIFORM_SIZE),
                    }),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(views[0]),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(views[1]),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(samplers[0]),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(samplers[1]),
                },
            ],
        });

        let mut encoder = self.take_encoder();
        let (view, _) = self.output_view(call.output)?;
        let pipeline = self
            .pipelines
            .get(&key)
            .ok_or(DeviceError::UnknownProgram(key.program))?;

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(call.program.kind().label()),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, &bind_group, &[offset]);
        render_pass.draw(0..3, 0..1);
        drop(render_pass);

        self.encoder = Some(encoder);
        Ok(())
    }

    fn clear(&mut self, output: DrawTarget, color: [f32; 4]) -> Result<(), DeviceError> {
        // Fail before taking the encoder so recorded passes survive
        self.output_view(output)?;
        let mut encoder = self.take_encoder();
        let (view, _) = self.output_view(output)?;

        let [r, g, b, a] = color.map(f64::from);
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Fluid Clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        self.encoder = Some(encoder);
        Ok(())
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        self.surface_config.width = width.max(1);
        self.surface_config.height = height.max(1);
        self.surface.configure(&self.device, &self.surface_config);
    }

    fn begin_frame(&mut self) -> Result<(), DeviceError> {
        if self.frame.is_none() {
            let frame = self.acquire_frame()?;
            let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
            self.frame = Some((frame, view));
        }
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), DeviceError> {
        self.flush();
        if let Some((frame, _)) = self.frame.take() {
            frame.present();
        }
        Ok(())
    }
}
