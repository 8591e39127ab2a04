pub mod capabilities;
pub mod cpu_device;
pub mod device;
pub mod programs;
pub mod targets;
pub mod wgpu_device;

pub use capabilities::DeviceCapabilities;
pub use cpu_device::CpuDevice;
pub use device::{DeviceError, RenderDevice};
pub use programs::{Feature, FeatureSet, ProgramKind, ProgramLibrary};
pub use targets::{RenderTarget, RenderTargetPool};
pub use wgpu_device::WgpuDevice;
