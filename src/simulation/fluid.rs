//! Fluid simulation session
//!
//! [`FluidSimulation`] owns everything one session needs: the device, the
//! compiled programs, the fields, the pointer tracker and the input
//! subscription. Lifecycle is `Running ⇄ Stopped → Destroyed`; a destroyed
//! simulation refuses every further transition.
//!
//! GPU objects are not released one by one on [`FluidSimulation::destroy`].
//! They go away with the device when the simulation is dropped.

use std::time::Instant;

use glam::Vec2;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::clock::{cap_timestep, FrameClock};
use super::config::SimulationConfig;
use super::resolution::{field_resolution, Resolution, SurfaceSize};
use super::solver::{FluidFields, Solver};
use crate::input::color::ColorRgb;
use crate::input::events::{InputSource, InputSubscription};
use crate::input::pointer::{correct_radius, Pointer, PointerTracker, SplatKind};
use crate::rendering::device::{BlendMode, DeviceError, DrawCall, DrawTarget, RenderDevice};
use crate::rendering::programs::{ProgramLibrary, UniformBlock};
use crate::rendering::targets::RenderTargetPool;

/// Errors surfaced by a simulation session.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("no usable graphics context")]
    NoGraphicsContext,
    #[error("device cannot render to any field format")]
    NoRenderableFormat,
    #[error("simulation has been destroyed")]
    Destroyed,
    #[error(transparent)]
    Device(DeviceError),
}

impl From<DeviceError> for SimulationError {
    fn from(error: DeviceError) -> Self {
        match error {
            DeviceError::NoGraphicsContext => SimulationError::NoGraphicsContext,
            DeviceError::NoRenderableFormat => SimulationError::NoRenderableFormat,
            other => SimulationError::Device(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationState {
    Running,
    Stopped,
    Destroyed,
}

/// What one call to [`FluidSimulation::frame`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameReport {
    /// Capped timestep the solver advanced by; 0 when nothing ran
    pub dt: f32,
    pub continuous_splats: usize,
    pub burst_splats: usize,
    /// Fields were reallocated for a new surface size this frame
    pub resized: bool,
}

pub struct FluidSimulation<D: RenderDevice> {
    device: D,
    config: SimulationConfig,
    programs: ProgramLibrary,
    pool: RenderTargetPool,
    fields: FluidFields,
    tracker: PointerTracker,
    clock: FrameClock,
    surface: SurfaceSize,
    pending_resize: Option<SurfaceSize>,
    subscription: Option<InputSubscription>,
    state: SimulationState,
}

impl<D: RenderDevice> FluidSimulation<D> {
    /// Build a simulation on `device` for a surface of `surface` size.
    ///
    /// Pointer colors come from entropy; use [`FluidSimulation::with_seed`]
    /// for reproducible runs.
    pub fn new(device: D, surface: SurfaceSize, config: SimulationConfig) -> Result<Self, SimulationError> {
        Self::with_tracker(device, surface, config, PointerTracker::new(StdRng::from_entropy()))
    }

    pub fn with_seed(
        device: D,
        surface: SurfaceSize,
        config: SimulationConfig,
        seed: u64,
    ) -> Result<Self, SimulationError> {
        Self::with_tracker(device, surface, config, PointerTracker::seeded(seed))
    }

    fn with_tracker(
        mut device: D,
        surface: SurfaceSize,
        config: SimulationConfig,
        tracker: PointerTracker,
    ) -> Result<Self, SimulationError> {
        let mut config = config.validated();
        config.apply_capabilities(device.capabilities());

        let (width, height) = surface.physical();
        device.resize_surface(width, height);

        let programs = ProgramLibrary::new(&mut device, config.shading);
        let mut pool = RenderTargetPool::new(config.transparent);
        let (sim, dye) = Self::resolutions(&config, device.surface_size());
        let fields = FluidFields::allocate(&mut device, &mut pool, sim, dye)?;

        log::info!(
            "Fluid simulation ready: velocity {}x{}, dye {}x{}, {:?} device",
            sim.width,
            sim.height,
            dye.width,
            dye.height,
            device.capabilities().tier
        );

        let state = if config.paused {
            SimulationState::Stopped
        } else {
            SimulationState::Running
        };

        Ok(Self {
            device,
            config,
            programs,
            pool,
            fields,
            tracker,
            clock: FrameClock::new(),
            surface,
            pending_resize: None,
            subscription: None,
            state,
        })
    }

    fn resolutions(config: &SimulationConfig, (width, height): (u32, u32)) -> (Resolution, Resolution) {
        (
            field_resolution(config.sim_resolution, width, height),
            field_resolution(config.dye_resolution, width, height),
        )
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    /// Config in effect, after validation and capability downgrades.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn fields(&self) -> &FluidFields {
        &self.fields
    }

    pub fn pointers(&self) -> &[Pointer] {
        self.tracker.pointers()
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    fn ensure_alive(&self) -> Result<(), SimulationError> {
        if self.state == SimulationState::Destroyed {
            return Err(SimulationError::Destroyed);
        }
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), SimulationError> {
        self.ensure_alive()?;
        if self.state != SimulationState::Running {
            self.discard_input();
            self.clock.reset();
            self.state = SimulationState::Running;
        }
        Ok(())
    }

    /// Halt the frame loop. Fields and programs are kept for a later start.
    pub fn stop(&mut self) -> Result<(), SimulationError> {
        self.ensure_alive()?;
        self.state = SimulationState::Stopped;
        Ok(())
    }

    /// Stop for good and drop the input subscription.
    pub fn destroy(&mut self) -> Result<(), SimulationError> {
        self.ensure_alive()?;
        self.state = SimulationState::Destroyed;
        // Dropping the subscription detaches it from its source
        self.subscription = None;
        log::info!("Fluid simulation destroyed");
        Ok(())
    }

    /// Subscribe to `source`. Mounting again while mounted does nothing.
    pub fn mount_input_events(&mut self, source: &mut dyn InputSource) -> Result<(), SimulationError> {
        self.ensure_alive()?;
        if self.subscription.is_none() {
            self.subscription = Some(source.subscribe());
        }
        Ok(())
    }

    pub fn unmount_input_events(&mut self, source: &mut dyn InputSource) {
        if let Some(subscription) = self.subscription.take() {
            source.unsubscribe(subscription.id());
        }
    }

    pub fn is_input_mounted(&self) -> bool {
        self.subscription.is_some()
    }

    /// Events published to the subscription and not yet drained.
    pub fn pending_input_events(&self) -> usize {
        self.subscription.as_ref().map_or(0, InputSubscription::pending)
    }

    fn drain_input(&mut self) {
        if let Some(subscription) = &self.subscription {
            for event in subscription.drain() {
                self.tracker.handle_event(event, &self.surface);
            }
        }
    }

    /// Fold queued events into pointer state without splatting them.
    fn discard_input(&mut self) {
        self.drain_input();
        let dropped = self.tracker.take_splats(self.config.splat_force).len();
        if dropped > 0 {
            log::debug!("Dropped {} splats queued while stopped", dropped);
        }
    }

    /// Track an externally created pointer.
    pub fn add_pointer(&mut self, pointer: Pointer) {
        self.tracker.add_pointer(pointer);
    }

    /// Splat immediately at `(x, y)` in simulation space. Without `color` a
    /// fresh continuous color is drawn.
    pub fn trigger_splat_at(
        &mut self,
        x: f32,
        y: f32,
        dx: f32,
        dy: f32,
        color: Option<ColorRgb>,
    ) -> Result<(), SimulationError> {
        self.ensure_alive()?;
        let color = color.unwrap_or_else(|| self.tracker.generate_color());
        let (aspect_ratio, radius) = self.splat_shape();

        Solver::new(&mut self.device, &self.programs, &mut self.fields).splat(
            Vec2::new(x, y),
            Vec2::new(dx, dy),
            color,
            aspect_ratio,
            radius,
        )?;
        Ok(())
    }

    fn splat_shape(&self) -> (f32, f32) {
        let (width, height) = self.device.surface_size();
        let aspect_ratio = width.max(1) as f32 / height.max(1) as f32;
        (aspect_ratio, correct_radius(self.config.splat_radius / 100.0, aspect_ratio))
    }

    /// Record a new surface size. Fields follow at the top of the next frame.
    pub fn resize(&mut self, surface: SurfaceSize) {
        self.pending_resize = Some(surface);
    }

    /// Switch display shading. Each variant compiles at most once.
    pub fn set_shading(&mut self, shading: bool) {
        self.config.shading = shading;
        self.programs.set_shading(&mut self.device, shading);
    }

    /// Run one frame timed by the wall clock.
    ///
    /// While stopped nothing is drawn, but input is still drained so the
    /// queue does not back up.
    pub fn frame(&mut self, now: Instant) -> Result<FrameReport, SimulationError> {
        if self.state != SimulationState::Running {
            self.discard_input();
            return Ok(FrameReport::default());
        }
        let dt = self.clock.tick(now);
        self.run_frame(dt)
    }

    /// Run one frame with an explicit timestep (still capped).
    pub fn frame_with_dt(&mut self, dt: f32) -> Result<FrameReport, SimulationError> {
        if self.state != SimulationState::Running {
            self.discard_input();
            return Ok(FrameReport::default());
        }
        self.run_frame(cap_timestep(dt))
    }

    fn run_frame(&mut self, dt: f32) -> Result<FrameReport, SimulationError> {
        let resized = self.apply_pending_resize()?;

        self.tracker.update_colors(dt, self.config.color_update_speed);
        self.drain_input();

        let splats = self.tracker.take_splats(self.config.splat_force);
        let burst_splats = splats.iter().filter(|splat| splat.kind == SplatKind::Burst).count();
        let (aspect_ratio, radius) = self.splat_shape();

        let mut solver = Solver::new(&mut self.device, &self.programs, &mut self.fields);
        for splat in &splats {
            solver.splat(splat.point, splat.force, splat.color, aspect_ratio, radius)?;
        }
        solver.step(&self.config, dt)?;

        self.render()?;

        Ok(FrameReport {
            dt,
            continuous_splats: splats.len() - burst_splats,
            burst_splats,
            resized,
        })
    }

    fn apply_pending_resize(&mut self) -> Result<bool, SimulationError> {
        let Some(surface) = self.pending_resize.take() else {
            return Ok(false);
        };

        self.surface = surface;
        let (width, height) = surface.physical();
        if (width, height) == self.device.surface_size() {
            return Ok(false);
        }

        self.device.resize_surface(width, height);
        let (sim, dye) = Self::resolutions(&self.config, self.device.surface_size());
        self.fields
            .reallocate(&mut self.device, &mut self.pool, sim, dye, self.programs.copy.program())?;

        log::info!(
            "Surface resized to {}x{}: velocity {}x{}, dye {}x{}",
            width,
            height,
            sim.width,
            sim.height,
            dye.width,
            dye.height
        );
        Ok(true)
    }

    /// Composite the dye onto the surface and present.
    fn render(&mut self) -> Result<(), SimulationError> {
        self.device.begin_frame()?;

        let background = if self.config.transparent {
            [0.0, 0.0, 0.0, 0.0]
        } else {
            let back = self.config.back_color;
            [back.r, back.g, back.b, 1.0]
        };
        self.device.clear(DrawTarget::Surface, background)?;

        if let Some(program) = self.programs.display.program() {
            let (width, height) = self.device.surface_size();
            let mut uniforms = UniformBlock::new(program);
            uniforms.set_texel_size(Vec2::new(1.0 / width.max(1) as f32, 1.0 / height.max(1) as f32));

            self.device.draw(&DrawCall {
                program,
                uniforms: &uniforms,
                textures: &[self.fields.dye.read().attach(0)],
                output: DrawTarget::Surface,
                blend: BlendMode::PremultipliedOver,
            })?;
        }

        self.device.end_frame()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::events::{InputEvent, InputHub, MAX_PENDING_EVENTS};
    use crate::input::pointer::MOUSE_POINTER_ID;
    use crate::rendering::capabilities::DeviceCapabilities;
    use crate::rendering::cpu_device::CpuDevice;
    use crate::rendering::device::{Channels, FieldFormat, TexelType};
    use crate::simulation::config::DEGRADED_DYE_RESOLUTION;
    use proptest::prelude::*;

    fn small_config() -> SimulationConfig {
        SimulationConfig {
            sim_resolution: 32,
            dye_resolution: 64,
            ..SimulationConfig::default()
        }
    }

    fn simulation(config: SimulationConfig) -> FluidSimulation<CpuDevice> {
        FluidSimulation::with_seed(
            CpuDevice::new(64, 64),
            SurfaceSize::from_physical(64, 64),
            config,
            42,
        )
        .unwrap()
    }

    #[test]
    fn test_splat_stays_local_after_ten_frames() {
        let mut sim = simulation(small_config());
        sim.trigger_splat_at(0.5, 0.5, 10.0, 0.0, Some(ColorRgb::new(1.0, 0.0, 0.0)))
            .unwrap();
        for _ in 0..10 {
            sim.frame_with_dt(1.0 / 60.0).unwrap();
        }

        let dye = sim.fields().dye.read();
        assert_eq!((dye.width(), dye.height()), (64, 64));
        let pixels = sim.device().pixels(dye.id()).unwrap();
        let texel = |x: usize, y: usize| pixels[y * 64 + x];

        // Gaussian falloff is exp(-d^2 / radius), so sqrt(radius) is its width
        let reach = 3.0 * sim.splat_shape().1.sqrt();
        let mut near_center = 0.0f32;
        let mut far_away = 0.0f32;
        for y in 0..64 {
            for x in 0..64 {
                let uv = Vec2::new((x as f32 + 0.5) / 64.0, (y as f32 + 0.5) / 64.0);
                if uv.distance(Vec2::splat(0.5)) < reach {
                    near_center = near_center.max(texel(x, y)[0]);
                } else if uv.distance(Vec2::splat(0.5)) > 2.0 * reach {
                    far_away = far_away.max(texel(x, y)[0]);
                }
            }
        }
        assert!(near_center > 1e-3, "no dye near the center: {}", near_center);
        assert!(far_away < 1e-3, "dye spread too far: {}", far_away);

        for (cx, cy) in [(0, 0), (62, 0), (0, 62), (62, 62)] {
            for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                let [r, g, b, _] = texel(cx + dx, cy + dy);
                assert!(r.abs() < 1e-6 && g.abs() < 1e-6 && b.abs() < 1e-6);
            }
        }

        assert_eq!(sim.device().frames_presented(), 10);
        assert!(sim.device().surface_pixels().iter().any(|p| p[0] > 0.0));
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut sim = simulation(small_config());
        assert_eq!(sim.state(), SimulationState::Running);

        sim.stop().unwrap();
        let draws = sim.device().draw_count();
        assert_eq!(sim.frame_with_dt(0.01).unwrap(), FrameReport::default());
        assert_eq!(sim.device().draw_count(), draws);

        sim.start().unwrap();
        let report = sim.frame_with_dt(0.01).unwrap();
        assert_eq!(report.dt, 0.01);
        assert!(sim.device().draw_count() > draws);

        sim.destroy().unwrap();
        assert_eq!(sim.state(), SimulationState::Destroyed);
        assert!(matches!(sim.start(), Err(SimulationError::Destroyed)));
        assert!(matches!(sim.stop(), Err(SimulationError::Destroyed)));
        assert!(matches!(sim.destroy(), Err(SimulationError::Destroyed)));
        assert!(matches!(
            sim.trigger_splat_at(0.5, 0.5, 0.0, 0.0, None),
            Err(SimulationError::Destroyed)
        ));
        assert_eq!(sim.frame_with_dt(0.01).unwrap(), FrameReport::default());
    }

    #[test]
    fn test_paused_config_starts_stopped() {
        let mut sim = simulation(SimulationConfig {
            paused: true,
            ..small_config()
        });
        assert_eq!(sim.state(), SimulationState::Stopped);
        assert_eq!(sim.frame(Instant::now()).unwrap(), FrameReport::default());
        assert_eq!(sim.device().frames_presented(), 0);
    }

    #[test]
    fn test_dt_is_capped() {
        let mut sim = simulation(small_config());
        assert!(sim.frame_with_dt(2.0).unwrap().dt <= crate::simulation::clock::MAX_TIMESTEP);
    }

    #[test]
    fn test_mount_is_idempotent_and_destroy_unsubscribes() {
        let mut hub = InputHub::new();
        let mut sim = simulation(small_config());

        sim.mount_input_events(&mut hub).unwrap();
        sim.mount_input_events(&mut hub).unwrap();
        assert_eq!(hub.subscriber_count(), 1);

        sim.unmount_input_events(&mut hub);
        assert_eq!(hub.subscriber_count(), 0);
        assert!(!sim.is_input_mounted());

        sim.mount_input_events(&mut hub).unwrap();
        assert_eq!(hub.subscriber_count(), 1);
        sim.destroy().unwrap();
        assert_eq!(hub.subscriber_count(), 0);
        assert!(!sim.is_input_mounted());
        assert!(matches!(sim.mount_input_events(&mut hub), Err(SimulationError::Destroyed)));
    }

    #[test]
    fn test_dropping_simulation_unsubscribes() {
        let mut hub = InputHub::new();
        let mut sim = simulation(small_config());
        sim.mount_input_events(&mut hub).unwrap();

        drop(sim);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn test_input_while_stopped_is_bounded_and_not_replayed() {
        let mut hub = InputHub::new();
        let mut sim = simulation(small_config());
        sim.mount_input_events(&mut hub).unwrap();
        sim.stop().unwrap();

        for i in 0..3 * MAX_PENDING_EVENTS {
            let x = (i % 64) as f32;
            hub.publish(InputEvent::PointerDown { id: MOUSE_POINTER_ID, x, y: 32.0 });
        }
        assert!(sim.pending_input_events() <= MAX_PENDING_EVENTS);

        assert_eq!(sim.frame_with_dt(0.01).unwrap(), FrameReport::default());
        assert_eq!(sim.pending_input_events(), 0);

        hub.publish(InputEvent::PointerDown { id: MOUSE_POINTER_ID, x: 1.0, y: 1.0 });
        sim.start().unwrap();
        let report = sim.frame_with_dt(0.01).unwrap();
        assert_eq!(report.burst_splats, 0);
        assert_eq!(report.continuous_splats, 0);
        // Pointer state still follows what happened while stopped
        assert!(sim.pointers().iter().any(|pointer| pointer.id == MOUSE_POINTER_ID && pointer.down));
    }

    #[test]
    fn test_click_produces_one_burst() {
        let mut hub = InputHub::new();
        let mut sim = simulation(small_config());
        sim.mount_input_events(&mut hub).unwrap();

        hub.publish(InputEvent::PointerDown { id: MOUSE_POINTER_ID, x: 32.0, y: 32.0 });
        hub.publish(InputEvent::PointerUp { id: MOUSE_POINTER_ID });
        let report = sim.frame_with_dt(0.01).unwrap();
        assert_eq!(report.burst_splats, 1);
        assert_eq!(report.continuous_splats, 0);

        let report = sim.frame_with_dt(0.01).unwrap();
        assert_eq!(report.burst_splats, 0);
    }

    #[test]
    fn test_touch_drag_produces_continuous_splats() {
        let mut hub = InputHub::new();
        let mut sim = simulation(small_config());
        sim.mount_input_events(&mut hub).unwrap();

        hub.publish(InputEvent::PointerDown { id: 7, x: 10.0, y: 10.0 });
        hub.publish(InputEvent::PointerMove { id: 7, x: 20.0, y: 10.0 });
        let report = sim.frame_with_dt(0.01).unwrap();
        assert_eq!(report.burst_splats, 1);
        assert_eq!(report.continuous_splats, 1);
        assert!(sim.pointers().iter().any(|pointer| pointer.id == 7 && pointer.down));
    }

    #[test]
    fn test_resize_applies_at_next_frame() {
        let mut sim = simulation(small_config());
        sim.resize(SurfaceSize::new(64.0, 32.0, 2.0));
        assert_eq!(sim.device().surface_size(), (64, 64));

        let report = sim.frame_with_dt(0.01).unwrap();
        assert!(report.resized);
        assert_eq!(sim.device().surface_size(), (128, 64));
        assert_eq!(sim.fields().sim_resolution(), field_resolution(32, 128, 64));
        assert_eq!(sim.fields().dye_resolution(), Resolution { width: 128, height: 64 });

        // Same size again is not a resize
        sim.resize(SurfaceSize::new(64.0, 32.0, 2.0));
        assert!(!sim.frame_with_dt(0.01).unwrap().resized);
    }

    #[test]
    fn test_same_size_resize_keeps_dye() {
        let mut sim = simulation(small_config());
        let dye = sim.fields().dye.read().id();
        sim.device_mut().fill(dye, [0.25, 0.5, 0.75, 1.0]).unwrap();

        sim.resize(SurfaceSize::from_physical(64, 64));
        let report = sim.frame_with_dt(0.0).unwrap();
        assert!(!report.resized);

        let dye = sim.fields().dye.read();
        let pixels = sim.device().pixels(dye.id()).unwrap();
        assert_eq!(pixels.len(), 64 * 64);
        for [r, g, b, _] in pixels {
            assert!((r - 0.25).abs() < 1e-6 && (g - 0.5).abs() < 1e-6 && (b - 0.75).abs() < 1e-6);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_resize_sequence_matches_final_size(
            sizes in proptest::collection::vec((1u32..48, 1u32..48), 1..5),
        ) {
            let config = SimulationConfig {
                sim_resolution: 8,
                dye_resolution: 16,
                ..SimulationConfig::default()
            };
            let mut sim = simulation(config);

            for &(width, height) in &sizes {
                sim.resize(SurfaceSize::from_physical(width, height));
                sim.frame_with_dt(0.01).unwrap();

                prop_assert_eq!(sim.device().surface_size(), (width, height));
                prop_assert_eq!(sim.fields().sim_resolution(), field_resolution(8, width, height));
                prop_assert_eq!(sim.fields().dye_resolution(), field_resolution(16, width, height));
            }
        }
    }

    #[test]
    fn test_shading_toggle_compiles_once_per_variant() {
        let mut sim = simulation(small_config());
        let compiled = sim.device().compile_count();

        sim.set_shading(false);
        sim.set_shading(true);
        sim.set_shading(false);
        assert_eq!(sim.device().compile_count(), compiled + 1);
        assert!(!sim.config().shading);
    }

    #[test]
    fn test_degraded_device_lowers_quality() {
        let capabilities = DeviceCapabilities {
            texel: TexelType::Unorm8,
            linear_filtering: false,
            format_r: FieldFormat::new(Channels::Rgba, TexelType::Unorm8),
            format_rg: FieldFormat::new(Channels::Rgba, TexelType::Unorm8),
            format_rgba: FieldFormat::new(Channels::Rgba, TexelType::Unorm8),
            ..DeviceCapabilities::software()
        };
        let sim = FluidSimulation::with_seed(
            CpuDevice::with_capabilities(64, 64, capabilities),
            SurfaceSize::from_physical(64, 64),
            small_config(),
            1,
        )
        .unwrap();

        assert_eq!(sim.config().dye_resolution, DEGRADED_DYE_RESOLUTION);
        assert!(!sim.config().shading);
        assert_eq!(sim.fields().dye_resolution().height, DEGRADED_DYE_RESOLUTION);
    }

    #[test]
    fn test_opaque_background_fills_surface() {
        let mut sim = simulation(SimulationConfig {
            transparent: false,
            back_color: ColorRgb::new(0.0, 0.0, 1.0),
            ..small_config()
        });
        sim.frame_with_dt(0.01).unwrap();

        let pixel = sim.device().surface_pixels()[0];
        assert_eq!(pixel[2], 1.0);
        assert_eq!(pixel[3], 1.0);
    }

    #[test]
    fn test_missing_display_program_still_presents() {
        let mut device = CpuDevice::new(64, 64);
        device.fail_compiles_for(crate::rendering::programs::ProgramKind::Display);
        let mut sim =
            FluidSimulation::with_seed(device, SurfaceSize::from_physical(64, 64), small_config(), 3).unwrap();

        sim.frame_with_dt(0.01).unwrap();
        assert_eq!(sim.device().frames_presented(), 1);
    }
}
