mod canvas;
mod hud;
mod renderer;
mod sprites;

pub use renderer::Renderer;
