//! # render_core
//!
//! A minimal real-time rendering runtime built on Vulkan.
//!
//! The crate opens a window, brings up a Vulkan context (instance, device,
//! surface, swapchain, pipelines), and drives a fence/semaphore-synchronized
//! frame loop until the window is closed. Applications plug into the loop
//! through the [`Application`] trait.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use render_core::prelude::*;
//!
//! struct Demo;
//!
//! impl Application for Demo {
//!     fn initialize(&mut self, _engine: &mut Engine) -> Result<(), AppError> {
//!         Ok(())
//!     }
//!
//!     fn update(&mut self, _engine: &mut Engine, _delta_time: f32) -> Result<(), AppError> {
//!         Ok(())
//!     }
//!
//!     fn cleanup(&mut self, _engine: &mut Engine) {}
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::default();
//!     let mut app = Demo;
//!     Engine::run(config, &mut app)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions, clippy::similar_names)]

pub mod config;
pub mod foundation;
pub mod render;

mod application;
mod engine;

pub use application::{AppError, AppEvent, Application};
pub use engine::{Engine, EngineError};

/// Common imports for crate users
pub mod prelude {
    pub use crate::{
        application::AppEvent,
        config::{EngineConfig, RendererConfig, ShaderConfig, WindowConfig},
        AppError, Application, Engine, EngineError,
    };
}
