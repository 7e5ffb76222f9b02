#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

//! Shared vocabulary for the postfx crates: the error taxonomy and the pipeline configuration.

pub mod config;
pub mod error;

pub use config::{
    load_config_from, BloomSettings, DiagnosticsSettings, Extent, FilterSettings, FxaaSettings,
    KernelProfile, PostFxConfig, ResolutionSettings, SsaoSettings, ToneMapSettings,
    VignetteSettings, MAX_AO_BLUR_RADIUS, MAX_KERNEL_SIZE,
};
pub use error::{EngineError, ErrorKind};
