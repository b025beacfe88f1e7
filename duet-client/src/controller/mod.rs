mod client_event;
mod controller_command;
mod media_layout;
mod session_controller;

pub use client_event::*;
pub use controller_command::*;
pub use media_layout::*;
pub use session_controller::*;
