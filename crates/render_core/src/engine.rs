//! Core engine implementation
//!
//! Owns the window, renderer and frame timing, and drives the main loop:
//! poll events, guard against a zero-sized drawable, recreate the swapchain
//! when it goes stale, update the application, draw, pace.

use std::time::{Duration, Instant};

use thiserror::Error;

use crate::application::{AppEvent, Application};
use crate::config::{ConfigError, EngineConfig};
use crate::foundation::time::Timer;
use crate::render::vulkan::{FrameOutcome, VulkanError, VulkanRenderer};
use crate::render::window::{Window, WindowError};

/// Main engine struct
///
/// The engine coordinates the window and renderer and manages the main loop.
pub struct Engine {
    window: Window,
    renderer: VulkanRenderer,
    timer: Timer,
    running: bool,
    swapchain_stale: bool,
    frame_budget: Option<Duration>,
}

impl Engine {
    /// Create a new engine instance
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        log::info!("Initializing engine...");

        let mut window = Window::new(&config.window)?;
        let renderer = VulkanRenderer::new(
            &mut window,
            &config.renderer,
            &config.shaders,
            &config.window.title,
        )?;

        Ok(Self {
            window,
            renderer,
            timer: Timer::new(),
            running: true,
            swapchain_stale: false,
            frame_budget: frame_budget(config.window.lock_fps),
        })
    }

    /// Run the engine main loop with the given application
    pub fn run<T: Application>(config: EngineConfig, app: &mut T) -> Result<(), EngineError> {
        let mut engine = Self::new(config)?;

        app.initialize(&mut engine)
            .map_err(|e| EngineError::Application(format!("App initialization: {e}")))?;

        log::info!("Starting main loop...");

        while engine.running {
            let frame_start = Instant::now();
            engine.timer.update();

            engine.window.poll_events();
            for window_event in engine.window.drain_events() {
                let Some(event) = translate_event(window_event) else {
                    continue;
                };
                match event {
                    AppEvent::WindowCloseRequested => engine.running = false,
                    AppEvent::FramebufferResized { .. } => engine.swapchain_stale = true,
                    AppEvent::KeyInput { .. } => {}
                }
                app.handle_event(&mut engine, event)
                    .map_err(|e| EngineError::Application(format!("App event: {e}")))?;
            }
            // Exit requests are observed here, before any frame work
            if !engine.running || engine.window.should_close() {
                break;
            }

            // A zero-sized drawable (minimized window) cannot back a
            // swapchain; skip all frame work until it grows back.
            let (width, height) = engine.window.framebuffer_size();
            if drawable_is_zero(width, height) {
                engine.pace(frame_start);
                continue;
            }

            if engine.swapchain_stale {
                engine.renderer.recreate_swapchain(&engine.window)?;
                engine.swapchain_stale = false;
            }

            let delta_time = engine.timer.delta_time();
            app.update(&mut engine, delta_time)
                .map_err(|e| EngineError::Application(format!("App update: {e}")))?;

            match engine.renderer.draw_frame()? {
                FrameOutcome::Presented => {}
                FrameOutcome::SwapchainStale => engine.swapchain_stale = true,
            }

            engine.pace(frame_start);
        }

        // Let in-flight work drain before anything is torn down
        engine.renderer.wait_idle()?;
        app.cleanup(&mut engine);

        log::info!("Engine shutdown complete");
        Ok(())
    }

    /// Sleep out the remainder of the frame budget, if any
    fn pace(&self, frame_start: Instant) {
        if let Some(budget) = self.frame_budget {
            if let Some(remaining) = remaining_budget(budget, frame_start.elapsed()) {
                std::thread::sleep(remaining);
            }
        }
    }

    /// Request engine shutdown; observed at the top of the next iteration
    pub fn quit(&mut self) {
        log::info!("Engine shutdown requested");
        self.running = false;
    }

    /// Get the time since the last frame in seconds
    pub fn delta_time(&self) -> f32 {
        self.timer.delta_time()
    }

    /// Get the frame timer
    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    /// Get the window
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Get mutable access to the window
    pub fn window_mut(&mut self) -> &mut Window {
        &mut self.window
    }
}

/// Map a GLFW event to the subset the application sees
fn translate_event(event: glfw::WindowEvent) -> Option<AppEvent> {
    match event {
        glfw::WindowEvent::Close => Some(AppEvent::WindowCloseRequested),
        glfw::WindowEvent::FramebufferSize(width, height) => Some(AppEvent::FramebufferResized {
            width: width.max(0) as u32,
            height: height.max(0) as u32,
        }),
        glfw::WindowEvent::Key(key, _, action, _) => match action {
            glfw::Action::Press => Some(AppEvent::KeyInput { key, pressed: true }),
            glfw::Action::Release => Some(AppEvent::KeyInput {
                key,
                pressed: false,
            }),
            glfw::Action::Repeat => None,
        },
        _ => None,
    }
}

/// The time one frame may take under the configured cap; `None` uncapped
fn frame_budget(lock_fps: u32) -> Option<Duration> {
    (lock_fps > 0).then(|| Duration::from_secs_f64(1.0 / f64::from(lock_fps)))
}

/// How much of the budget is left to sleep; `None` when already over
fn remaining_budget(budget: Duration, elapsed: Duration) -> Option<Duration> {
    (elapsed < budget).then(|| budget - elapsed)
}

/// Whether the drawable area cannot back a swapchain
fn drawable_is_zero(width: u32, height: u32) -> bool {
    width == 0 || height == 0
}

/// Engine-level errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Window system error
    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    /// Rendering backend error
    #[error("Render error: {0}")]
    Render(#[from] VulkanError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Application error
    #[error("Application error: {0}")]
    Application(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_budget_matches_target_rate() {
        let budget = frame_budget(60).unwrap();
        assert!((budget.as_secs_f64() - 1.0 / 60.0).abs() < 1e-9);
        assert_eq!(frame_budget(0), None);
    }

    #[test]
    fn fast_frames_leave_sleep_time() {
        let budget = Duration::from_millis(16);
        let remaining = remaining_budget(budget, Duration::from_millis(4)).unwrap();
        assert_eq!(remaining, Duration::from_millis(12));
    }

    #[test]
    fn slow_frames_do_not_sleep() {
        let budget = Duration::from_millis(16);
        assert_eq!(remaining_budget(budget, Duration::from_millis(16)), None);
        assert_eq!(remaining_budget(budget, Duration::from_millis(40)), None);
    }

    #[test]
    fn zero_drawable_skips_frame_work() {
        assert!(drawable_is_zero(0, 0));
        assert!(drawable_is_zero(0, 720));
        assert!(drawable_is_zero(1280, 0));
        assert!(!drawable_is_zero(1, 1));
    }

    #[test]
    fn repeat_keys_are_not_surfaced() {
        let event = glfw::WindowEvent::Key(
            glfw::Key::Escape,
            0,
            glfw::Action::Repeat,
            glfw::Modifiers::empty(),
        );
        assert_eq!(translate_event(event), None);
    }

    #[test]
    fn close_translates_to_close_request() {
        assert_eq!(
            translate_event(glfw::WindowEvent::Close),
            Some(AppEvent::WindowCloseRequested)
        );
    }
}
