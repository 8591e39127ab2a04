//! Render-target pool
//!
//! Allocates single and double-buffered off-screen targets, clears them on
//! creation, and resizes double buffers while preserving the `read` slot.

use glam::Vec2;

use super::device::{
    BlendMode, DeviceError, DrawCall, DrawTarget, FieldFormat, Filter, RenderDevice, TargetDesc,
    TargetId, TextureBinding,
};
use super::programs::{Program, UniformBlock};
use crate::simulation::double_buffer::DoubleBuffer;

/// An off-screen 2D field buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTarget {
    id: TargetId,
    width: u32,
    height: u32,
    format: FieldFormat,
    filter: Filter,
}

impl RenderTarget {
    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> FieldFormat {
        self.format
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    /// `(1 / width, 1 / height)`, the neighbor offset used by stencils.
    pub fn texel_size(&self) -> Vec2 {
        Vec2::new(1.0 / self.width as f32, 1.0 / self.height as f32)
    }

    /// Bind this target to sampling unit `unit`.
    pub fn attach(&self, unit: u32) -> TextureBinding {
        TextureBinding {
            unit,
            target: self.id,
        }
    }

    /// Draw output writing into this target.
    pub fn output(&self) -> DrawTarget {
        DrawTarget::Target(self.id)
    }
}

/// Owns every render target of a simulation.
pub struct RenderTargetPool {
    clear_color: [f32; 4],
    live: Vec<TargetId>,
}

impl RenderTargetPool {
    /// `transparent` selects the clear color of fresh targets.
    pub fn new(transparent: bool) -> Self {
        let clear_color = if transparent {
            [0.0, 0.0, 0.0, 0.0]
        } else {
            [0.0, 0.0, 0.0, 1.0]
        };
        Self {
            clear_color,
            live: Vec::new(),
        }
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn create_target<D: RenderDevice + ?Sized>(
        &mut self,
        device: &mut D,
        label: &'static str,
        width: u32,
        height: u32,
        format: FieldFormat,
        filter: Filter,
    ) -> Result<RenderTarget, DeviceError> {
        if width == 0 || height == 0 {
            return Err(DeviceError::InvalidSize { width, height });
        }

        let id = device.create_target(&TargetDesc {
            label,
            width,
            height,
            format,
            filter,
        })?;
        device.clear(DrawTarget::Target(id), self.clear_color)?;
        self.live.push(id);

        log::debug!("Allocated {} target {}x{} ({:?})", label, width, height, format.channels);

        Ok(RenderTarget {
            id,
            width,
            height,
            format,
            filter,
        })
    }

    pub fn create_double_buffer<D: RenderDevice + ?Sized>(
        &mut self,
        device: &mut D,
        label: &'static str,
        width: u32,
        height: u32,
        format: FieldFormat,
        filter: Filter,
    ) -> Result<DoubleBuffer<RenderTarget>, DeviceError> {
        let read = self.create_target(device, label, width, height, format, filter)?;
        let write = self.create_target(device, label, width, height, format, filter)?;
        Ok(DoubleBuffer::new(read, write))
    }

    /// Resize `buffer` to `width`x`height`.
    ///
    /// No-op when the size is unchanged. Otherwise the old `read` contents are
    /// blitted into the new `read` storage with `copy`; `write` is allocated
    /// fresh. Returns whether storage was reallocated.
    pub fn resize_double_buffer<D: RenderDevice + ?Sized>(
        &mut self,
        device: &mut D,
        buffer: &mut DoubleBuffer<RenderTarget>,
        width: u32,
        height: u32,
        copy: Option<&Program>,
    ) -> Result<bool, DeviceError> {
        let current = *buffer.read();
        if current.width == width && current.height == height {
            return Ok(false);
        }

        let label = "Resized Field";
        let read = self.create_target(device, label, width, height, current.format, current.filter)?;
        if let Some(copy) = copy {
            let uniforms = UniformBlock::new(copy);
            device.draw(&DrawCall {
                program: copy,
                uniforms: &uniforms,
                textures: &[current.attach(0)],
                output: read.output(),
                blend: BlendMode::Replace,
            })?;
        }
        let write = self.create_target(device, label, width, height, current.format, current.filter)?;

        let (old_read, old_write) = buffer.replace(read, write);
        self.release(device, old_read);
        self.release(device, old_write);
        Ok(true)
    }

    pub fn release<D: RenderDevice + ?Sized>(&mut self, device: &mut D, target: RenderTarget) {
        self.live.retain(|&id| id != target.id);
        device.release_target(target.id);
    }

    pub fn release_double_buffer<D: RenderDevice + ?Sized>(
        &mut self,
        device: &mut D,
        buffer: DoubleBuffer<RenderTarget>,
    ) {
        for target in buffer.iter().copied().collect::<Vec<_>>() {
            self.release(device, target);
        }
    }
}
