#![forbid(unsafe_code)]

//! Backend-agnostic post-processing runtime.
//!
//! `postfx-plan` decides *what* runs each frame; this crate turns a plan into calls on a
//! [`RenderDevice`]. Backends (`postfx-runtime-glow`, `postfx-runtime-cpu`) implement the device
//! contract; nothing here touches a graphics API.
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

pub mod device;
pub mod diagnostics;
pub mod kernel;
pub mod orchestrator;
pub mod params;
pub mod pool;

pub use device::{
    ProgramHandle, RenderDevice, RenderTarget, SampleFilter, SurfaceHandle, TextureDesc,
    TextureHandle, WrapMode,
};
pub use diagnostics::{DiagnosticsSink, NoopDiagnostics, TimingLog};
pub use kernel::{NoiseTile, SampleKernel, SamplingSet, NOISE_TILE_SIZE};
pub use orchestrator::{FrameCtx, GeometryOutput, PostProcessor, SceneImage};
pub use params::{CameraMatrices, EffectParams, Uniform};
pub use pool::ResourcePool;

pub use postfx_core::EngineError;
