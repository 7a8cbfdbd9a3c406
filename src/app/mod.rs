pub mod app;
pub mod clipboard;
pub mod command;
pub mod controller;
pub mod generation;
pub mod renderer;

pub use app::App;
pub use command::{CommandError, UserCommand};
pub use controller::{Controller, ControllerError};
pub use generation::{GenerationError, GenerationState, Ticket};
pub use renderer::Renderer;
