//! Stable-fluids solver
//!
//! Owns the simulation fields and runs the per-frame pass sequence:
//!
//! 1. curl of velocity
//! 2. vorticity confinement into velocity
//! 3. divergence of velocity
//! 4. pressure warm start (previous pressure scaled by `pressure`)
//! 5. Jacobi pressure iterations
//! 6. pressure gradient subtraction
//! 7. velocity self-advection
//! 8. dye advection
//!
//! Every pass reads a field's `read` slot and writes its `write` slot, then
//! swaps. A pass whose program failed to compile is skipped without a swap,
//! so the field keeps its last valid value.

use glam::Vec2;

use super::config::SimulationConfig;
use super::double_buffer::DoubleBuffer;
use super::resolution::Resolution;
use crate::input::color::ColorRgb;
use crate::rendering::device::{BlendMode, DeviceError, DrawCall, DrawTarget, Filter, RenderDevice, TextureBinding};
use crate::rendering::programs::{Material, Program, ProgramLibrary, UniformBlock};
use crate::rendering::targets::{RenderTarget, RenderTargetPool};

/// Every render target the solver works on.
pub struct FluidFields {
    pub velocity: DoubleBuffer<RenderTarget>,
    pub dye: DoubleBuffer<RenderTarget>,
    pub divergence: RenderTarget,
    pub curl: RenderTarget,
    pub pressure: DoubleBuffer<RenderTarget>,
}

impl FluidFields {
    /// Allocate velocity, pressure and scratch fields at `sim` and dye at
    /// `dye`, in the formats the device negotiated.
    pub fn allocate<D: RenderDevice + ?Sized>(
        device: &mut D,
        pool: &mut RenderTargetPool,
        sim: Resolution,
        dye: Resolution,
    ) -> Result<Self, DeviceError> {
        let capabilities = device.capabilities().clone();
        let filtering = if capabilities.linear_filtering {
            Filter::Linear
        } else {
            Filter::Nearest
        };

        let dye = pool.create_double_buffer(
            device,
            "Dye",
            dye.width,
            dye.height,
            capabilities.format_rgba,
            filtering,
        )?;
        let velocity = pool.create_double_buffer(
            device,
            "Velocity",
            sim.width,
            sim.height,
            capabilities.format_rg,
            filtering,
        )?;
        let (divergence, curl, pressure) = Self::allocate_scratch(device, pool, sim, &capabilities)?;

        Ok(Self {
            velocity,
            dye,
            divergence,
            curl,
            pressure,
        })
    }

    fn allocate_scratch<D: RenderDevice + ?Sized>(
        device: &mut D,
        pool: &mut RenderTargetPool,
        sim: Resolution,
        capabilities: &crate::rendering::capabilities::DeviceCapabilities,
    ) -> Result<(RenderTarget, RenderTarget, DoubleBuffer<RenderTarget>), DeviceError> {
        let format = capabilities.format_r;
        let divergence = pool.create_target(device, "Divergence", sim.width, sim.height, format, Filter::Nearest)?;
        let curl = pool.create_target(device, "Curl", sim.width, sim.height, format, Filter::Nearest)?;
        let pressure =
            pool.create_double_buffer(device, "Pressure", sim.width, sim.height, format, Filter::Nearest)?;
        Ok((divergence, curl, pressure))
    }

    /// Resize to new grids. Velocity and dye keep their contents through
    /// `copy`; scratch fields and pressure start over.
    pub fn reallocate<D: RenderDevice + ?Sized>(
        &mut self,
        device: &mut D,
        pool: &mut RenderTargetPool,
        sim: Resolution,
        dye: Resolution,
        copy: Option<&Program>,
    ) -> Result<(), DeviceError> {
        pool.resize_double_buffer(device, &mut self.dye, dye.width, dye.height, copy)?;
        pool.resize_double_buffer(device, &mut self.velocity, sim.width, sim.height, copy)?;

        let capabilities = device.capabilities().clone();
        let (divergence, curl, pressure) = Self::allocate_scratch(device, pool, sim, &capabilities)?;
        pool.release(device, std::mem::replace(&mut self.divergence, divergence));
        pool.release(device, std::mem::replace(&mut self.curl, curl));
        let old_pressure = std::mem::replace(&mut self.pressure, pressure);
        pool.release_double_buffer(device, old_pressure);
        Ok(())
    }

    pub fn sim_resolution(&self) -> Resolution {
        let velocity = self.velocity.read();
        Resolution {
            width: velocity.width(),
            height: velocity.height(),
        }
    }

    pub fn dye_resolution(&self) -> Resolution {
        let dye = self.dye.read();
        Resolution {
            width: dye.width(),
            height: dye.height(),
        }
    }
}

/// Run `material` as one fullscreen pass. Returns `false` when the program
/// is missing and nothing was drawn.
fn run_pass<D: RenderDevice + ?Sized>(
    device: &mut D,
    material: &Material,
    textures: &[TextureBinding],
    output: DrawTarget,
    set_uniforms: impl FnOnce(&mut UniformBlock),
) -> Result<bool, DeviceError> {
    let Some(program) = material.program() else {
        return Ok(false);
    };

    let mut uniforms = UniformBlock::new(program);
    set_uniforms(&mut uniforms);
    device.draw(&DrawCall {
        program,
        uniforms: &uniforms,
        textures,
        output,
        blend: BlendMode::Replace,
    })?;
    Ok(true)
}

/// One frame's worth of solver work over borrowed state.
pub struct Solver<'a, D: RenderDevice + ?Sized> {
    device: &'a mut D,
    programs: &'a ProgramLibrary,
    fields: &'a mut FluidFields,
}

impl<'a, D: RenderDevice + ?Sized> Solver<'a, D> {
    pub fn new(device: &'a mut D, programs: &'a ProgramLibrary, fields: &'a mut FluidFields) -> Self {
        Self {
            device,
            programs,
            fields,
        }
    }

    /// Add a Gaussian impulse: `force` into velocity, `color` into dye.
    pub fn splat(
        &mut self,
        point: Vec2,
        force: Vec2,
        color: ColorRgb,
        aspect_ratio: f32,
        radius: f32,
    ) -> Result<(), DeviceError> {
        let velocity = *self.fields.velocity.read();
        let drawn = run_pass(
            &mut *self.device,
            &self.programs.splat,
            &[velocity.attach(0)],
            self.fields.velocity.write().output(),
            |u| {
                u.set_aspect_ratio(aspect_ratio)
                    .set_point(point)
                    .set_color([force.x, force.y, 0.0])
                    .set_radius(radius);
            },
        )?;
        if drawn {
            self.fields.velocity.swap();
        }

        let dye = *self.fields.dye.read();
        let drawn = run_pass(
            &mut *self.device,
            &self.programs.splat,
            &[dye.attach(0)],
            self.fields.dye.write().output(),
            |u| {
                u.set_aspect_ratio(aspect_ratio)
                    .set_point(point)
                    .set_color(color.to_array())
                    .set_radius(radius);
            },
        )?;
        if drawn {
            self.fields.dye.swap();
        }
        Ok(())
    }

    /// Advance the fields by `dt` seconds.
    pub fn step(&mut self, config: &SimulationConfig, dt: f32) -> Result<(), DeviceError> {
        self.apply_vorticity(config.curl, dt)?;
        self.project(config)?;
        self.advect(config, dt)
    }

    fn apply_vorticity(&mut self, curl_strength: f32, dt: f32) -> Result<(), DeviceError> {
        let velocity = *self.fields.velocity.read();
        let texel_size = velocity.texel_size();
        let curl = self.fields.curl;

        run_pass(
            &mut *self.device,
            &self.programs.curl,
            &[velocity.attach(0)],
            curl.output(),
            |u| {
                u.set_texel_size(texel_size);
            },
        )?;

        let drawn = run_pass(
            &mut *self.device,
            &self.programs.vorticity,
            &[velocity.attach(0), curl.attach(1)],
            self.fields.velocity.write().output(),
            |u| {
                u.set_texel_size(texel_size).set_curl(curl_strength).set_dt(dt);
            },
        )?;
        if drawn {
            self.fields.velocity.swap();
        }
        Ok(())
    }

    /// Divergence of the current velocity into the divergence field.
    pub fn compute_divergence(&mut self) -> Result<(), DeviceError> {
        let velocity = *self.fields.velocity.read();
        let texel_size = velocity.texel_size();
        run_pass(
            &mut *self.device,
            &self.programs.divergence,
            &[velocity.attach(0)],
            self.fields.divergence.output(),
            |u| {
                u.set_texel_size(texel_size);
            },
        )?;
        Ok(())
    }

    /// Make the velocity field (nearly) divergence free.
    pub fn project(&mut self, config: &SimulationConfig) -> Result<(), DeviceError> {
        self.compute_divergence()?;

        let texel_size = self.fields.velocity.read().texel_size();
        let divergence = self.fields.divergence;

        // Warm start from a fraction of last frame's pressure
        let pressure = *self.fields.pressure.read();
        let drawn = run_pass(
            &mut *self.device,
            &self.programs.clear,
            &[pressure.attach(0)],
            self.fields.pressure.write().output(),
            |u| {
                u.set_value(config.pressure);
            },
        )?;
        if drawn {
            self.fields.pressure.swap();
        }

        for _ in 0..config.pressure_iterations {
            let pressure = *self.fields.pressure.read();
            let drawn = run_pass(
                &mut *self.device,
                &self.programs.pressure,
                &[divergence.attach(0), pressure.attach(1)],
                self.fields.pressure.write().output(),
                |u| {
                    u.set_texel_size(texel_size);
                },
            )?;
            if !drawn {
                break;
            }
            self.fields.pressure.swap();
        }

        let pressure = *self.fields.pressure.read();
        let velocity = *self.fields.velocity.read();
        let drawn = run_pass(
            &mut *self.device,
            &self.programs.gradient_subtract,
            &[pressure.attach(0), velocity.attach(1)],
            self.fields.velocity.write().output(),
            |u| {
                u.set_texel_size(texel_size);
            },
        )?;
        if drawn {
            self.fields.velocity.swap();
        }
        Ok(())
    }

    fn advect(&mut self, config: &SimulationConfig, dt: f32) -> Result<(), DeviceError> {
        let velocity = *self.fields.velocity.read();
        let texel_size = velocity.texel_size();

        let drawn = run_pass(
            &mut *self.device,
            &self.programs.advection,
            &[velocity.attach(0), velocity.attach(1)],
            self.fields.velocity.write().output(),
            |u| {
                u.set_texel_size(texel_size)
                    .set_dye_texel_size(texel_size)
                    .set_dt(dt)
                    .set_dissipation(config.velocity_dissipation);
            },
        )?;
        if drawn {
            self.fields.velocity.swap();
        }

        // Dye moves through the freshly advected velocity at its own grid
        let velocity = *self.fields.velocity.read();
        let dye = *self.fields.dye.read();
        let drawn = run_pass(
            &mut *self.device,
            &self.programs.advection,
            &[velocity.attach(0), dye.attach(1)],
            self.fields.dye.write().output(),
            |u| {
                u.set_texel_size(texel_size)
                    .set_dye_texel_size(dye.texel_size())
                    .set_dt(dt)
                    .set_dissipation(config.density_dissipation);
            },
        )?;
        if drawn {
            self.fields.dye.swap();
        }
        Ok(())
    }
}
