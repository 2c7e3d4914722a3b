//! Core rendering machinery for a Vulkan physically-based-rendering demo.
//!
//! Two halves:
//!
//! - a reusable graphics [`pipeline`] configuration builder with
//!   engine-standard defaults, plus the steady-state [`scene`] pipelines
//!   built with it;
//! - the [`ibl`] precomputation engine, which bakes the BRDF integration
//!   LUT, the diffuse irradiance cube map and the specular prefiltered
//!   environment cube map at startup.
//!
//! Everything runs against an explicit [`context::RenderContext`]; the
//! crate owns no window, swapchain or frame loop.

pub mod barrier;
pub mod command;
pub mod context;
pub mod error;
pub mod ibl;
pub mod mesh;
pub mod pipeline;
pub mod scene;
pub mod shader;
pub mod texture;

pub use context::RenderContext;
pub use error::RenderError;
pub use ibl::{IblMaps, IblShaders};
pub use mesh::{CubeMesh, Vertex};
pub use pipeline::PipelineBuilder;
pub use scene::{ScenePipelines, SceneShaders};
pub use shader::{load_shader, ShaderStage};
pub use texture::Texture;
