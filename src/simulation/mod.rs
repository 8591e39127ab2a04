pub mod clock;
pub mod config;
pub mod double_buffer;
pub mod fluid;
pub mod resolution;
pub mod solver;

pub use config::SimulationConfig;
pub use double_buffer::DoubleBuffer;
pub use fluid::{FluidSimulation, FrameReport, SimulationError, SimulationState};
pub use resolution::{Resolution, SurfaceSize};
