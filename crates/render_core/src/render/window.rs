//! Window management using GLFW
//!
//! Provides cross-platform window creation and event handling for Vulkan

use crate::config::WindowConfig;
use thiserror::Error;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW could not be initialized
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// The native window could not be created
    #[error("Window creation failed")]
    CreationFailed,

    /// The presentation surface could not be created
    #[error("Surface creation failed: {0:?}")]
    SurfaceCreationFailed(ash::vk::Result),

    /// Any other GLFW error
    #[error("GLFW error: {0}")]
    Glfw(String),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// GLFW window wrapper with proper resource management
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
}

impl Window {
    /// Create a new window according to the configuration
    ///
    /// The window is created without a client API context; rendering goes
    /// through the Vulkan surface created with [`Window::create_surface`].
    pub fn new(config: &WindowConfig) -> WindowResult<Self> {
        let mut glfw = glfw::init(glfw::fail_on_errors)
            .map_err(|_| WindowError::InitializationFailed)?;

        // Configure for Vulkan (no OpenGL context)
        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(config.resizable));

        let (mut window, events) = if config.fullscreen {
            glfw.with_primary_monitor(|glfw, monitor| {
                let mode = monitor
                    .map(|m| glfw::WindowMode::FullScreen(&*m))
                    .unwrap_or(glfw::WindowMode::Windowed);
                glfw.create_window(config.width, config.height, &config.title, mode)
            })
        } else {
            glfw.create_window(
                config.width,
                config.height,
                &config.title,
                glfw::WindowMode::Windowed,
            )
        }
        .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);

        Ok(Self {
            glfw,
            window,
            events,
        })
    }

    /// Whether a close has been requested for the window
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Request the window to close at the next loop iteration
    pub fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }

    /// Pump the platform event queue
    pub fn poll_events(&mut self) {
        self.glfw.poll_events();
    }

    /// Drain all pending window events collected since the last poll
    pub fn drain_events(&mut self) -> Vec<glfw::WindowEvent> {
        glfw::flush_messages(&self.events)
            .map(|(_, event)| event)
            .collect()
    }

    /// Get the drawable area in pixels
    ///
    /// May differ from the window size on high-DPI displays, and is (0, 0)
    /// while the window is minimized.
    pub fn framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (width.max(0) as u32, height.max(0) as u32)
    }

    /// Get required Vulkan instance extensions for presenting to this window
    pub fn required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| WindowError::Glfw("no Vulkan instance extensions reported".to_string()))
    }

    /// Create a Vulkan surface bound to this window
    pub fn create_surface(&mut self, instance: ash::vk::Instance) -> WindowResult<ash::vk::SurfaceKHR> {
        let mut surface = ash::vk::SurfaceKHR::null();
        let result = self
            .window
            .create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == ash::vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::SurfaceCreationFailed(result))
        }
    }
}
