//! Application trait and lifecycle management

use crate::engine::{Engine, EngineError};
use thiserror::Error;

/// Application lifecycle trait
///
/// Implement this trait to create a demo or tool on top of the engine.
/// The engine calls back into the application once per frame.
pub trait Application {
    /// Initialize the application
    ///
    /// Called once after the engine is initialized, before the first frame.
    fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError>;

    /// Update the application
    ///
    /// Called every frame before the frame is rendered.
    ///
    /// # Arguments
    /// * `engine` - Mutable reference to the engine
    /// * `delta_time` - Time since last frame in seconds
    fn update(&mut self, engine: &mut Engine, delta_time: f32) -> Result<(), AppError>;

    /// Handle a window event
    ///
    /// Called once per pending event at the top of each frame. The default
    /// implementation ignores everything; close requests and resizes are
    /// already observed by the engine itself.
    fn handle_event(&mut self, engine: &mut Engine, event: AppEvent) -> Result<(), AppError> {
        let _ = (engine, event);
        Ok(())
    }

    /// Cleanup the application
    ///
    /// Called once when the run loop has exited and the device is idle.
    fn cleanup(&mut self, engine: &mut Engine);
}

/// Application-level errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Engine error propagated to application level
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Custom application error
    #[error("Application error: {0}")]
    Custom(String),
}

/// Window events surfaced to the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    /// Window close requested
    WindowCloseRequested,

    /// The drawable area changed size
    FramebufferResized {
        /// New width in pixels
        width: u32,
        /// New height in pixels
        height: u32,
    },

    /// Key input event
    KeyInput {
        /// The key that was pressed/released
        key: glfw::Key,
        /// Whether the key was pressed (true) or released (false)
        pressed: bool,
    },
}
