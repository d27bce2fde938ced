//! Windowed Vulkan triangle demo
//!
//! Opens a window, clears it black and draws two triangles: one with
//! coordinates embedded in the vertex shader, one fed from a vertex
//! buffer. Escape or closing the window exits.

use render_core::prelude::*;

struct TriangleDemo;

impl Application for TriangleDemo {
    fn initialize(&mut self, _engine: &mut Engine) -> Result<(), AppError> {
        log::info!("Triangle demo initialized");
        Ok(())
    }

    fn update(&mut self, _engine: &mut Engine, _delta_time: f32) -> Result<(), AppError> {
        Ok(())
    }

    fn handle_event(&mut self, engine: &mut Engine, event: AppEvent) -> Result<(), AppError> {
        if let AppEvent::KeyInput {
            key: glfw::Key::Escape,
            pressed: true,
        } = event
        {
            engine.quit();
        }
        Ok(())
    }

    fn cleanup(&mut self, engine: &mut Engine) {
        log::info!(
            "Exiting after {} frames ({:.1} fps average)",
            engine.timer().frame_count(),
            engine.timer().average_fps()
        );
    }
}

fn main() {
    render_core::foundation::logging::init();

    let config = EngineConfig::default();
    let mut app = TriangleDemo;

    if let Err(e) = Engine::run(config, &mut app) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
