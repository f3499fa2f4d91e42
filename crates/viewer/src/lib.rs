//! wgpu backend and interactive viewer for the fluid surface renderer.

pub mod allocator;
pub mod app;
pub mod context;
pub mod demo;
pub mod executor;
pub mod programs;
pub mod uniforms;

pub use allocator::{GpuAllocator, GpuArgsBuffer, GpuSurface};
pub use app::{run, ViewerOptions};
pub use context::GpuContext;
pub use executor::{EncodeError, FrameTargets, GpuExecutor};
pub use programs::GpuPrograms;
