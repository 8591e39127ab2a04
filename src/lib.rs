//! # Rainbow Fluid: GPU Stable-Fluids Dye Simulation
//!
//! A real-time 2D fluid simulation that stirs colored dye with pointer input.
//! Velocity is solved on a coarse grid with the stable-fluids method; dye is
//! carried through it at display resolution and composited onto a surface.
//!
//! ## Architecture Overview
//!
//! The codebase is organized into three subsystems:
//!
//! ### 1. Simulation ([`simulation`])
//!
//! - [`simulation::FluidSimulation`] - Session lifecycle, frame loop, splats, display pass
//! - [`simulation::solver`] - The per-frame pass sequence over the fields
//! - [`simulation::SimulationConfig`] - Tunable constants, loadable from RON
//! - [`simulation::DoubleBuffer`] - Ping-pong slots for fields read and written by one pass
//!
//! **Key Design**: Surface size is passed in explicitly, so resolution
//! computation is a pure function and resizes only happen between frames.
//!
//! ### 2. Rendering ([`rendering`])
//!
//! - [`rendering::RenderDevice`] - Fullscreen-pass device abstraction
//! - [`rendering::WgpuDevice`] - wgpu backend with a context fallback ladder
//! - [`rendering::CpuDevice`] - Software backend mirroring every shader, used by tests
//! - [`rendering::capabilities`] - Format and filtering negotiation
//! - [`rendering::programs`] - Program/material cache keyed by feature flags
//!
//! **Key Design**: Optional shader uniforms are a typed set resolved once per
//! compiled variant; a program that fails to compile is skipped, not fatal.
//!
//! ### 3. Input ([`input`])
//!
//! - [`input::InputHub`] - Injected event source the simulation subscribes to
//! - [`input::PointerTracker`] - Per-pointer state machine and splat requests
//! - [`input::color`] - HSV pointer colors
//!
//! ## Frame Data Flow
//!
//! ```text
//! Resize → Color Rotation → Input Drain → Splats → Solver Step → Display → Present
//! ```
//!
//! ## Dependencies
//!
//! - **Graphics**: `wgpu` (GPU abstraction), `winit` (windowing), `pollster` (blocking on adapter requests)
//! - **Math**: `glam` (vector types), `bytemuck` (uniform uploads)
//! - **Concurrency**: `rayon` (software rasterizer), `crossbeam` (input channels)
//! - **Serialization**: `serde` + `ron` (config files)
//! - **Errors and logging**: `thiserror`, `log` + `env_logger`

pub mod app;
pub mod input;
pub mod rendering;
pub mod simulation;
