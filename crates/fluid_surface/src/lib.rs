//! Screen-space fluid surface rendering.
//!
//! Particles are splatted into a depth surface, packed with a thickness
//! estimate into a four-channel composite surface, smoothed with an
//! edge-aware filter and shaded over a tiled floor. This crate holds the
//! backend-independent pipeline: surface management, the smoothing
//! strategies, parameter binding, the per-frame pass list and a CPU executor
//! that runs it.

pub mod binder;
pub mod camera;
pub mod commands;
pub mod config;
pub mod display;
pub mod host;
pub mod params;
pub mod pipeline;
pub mod resources;
pub mod smoothing;
pub mod surface;

pub use binder::{bind, DisplayState, FrameBindings, SimulationState, ViewState};
pub use camera::{frame_bounds_ortho, OrthoCamera};
pub use commands::{build, FramePlan, OrderViolation, Pass};
pub use config::{ConfigError, DebugSettings, EnvironmentSettings, FluidMaterial, RenderConfig};
pub use display::{DisplayMode, DisplayModeController};
pub use host::{ExecuteError, HostExecutor};
pub use params::{ParamValue, ParameterSet, PassPrograms, ProgramHandle, ProgramRole};
pub use pipeline::{FluidPipeline, FrameError};
pub use resources::{
    AllocError, DrawArgs, HostAllocator, Reallocation, ResourceError, SurfaceAllocator, SurfaceManager,
};
pub use smoothing::{
    smooth, ChannelMask, FilterAxis, KernelParams, SmoothStep, SmoothingKind, SmoothingSettings,
    SmoothingStrategy,
};
pub use surface::{
    is_background, BufferSlot, DepthAttachment, Surface, SurfaceDesc, SurfaceFormat, SurfaceSlot, Viewport, FAR_DEPTH,
};
