mod connection_registry;
mod coordinator;
mod room_command;
mod room_directory;

pub use connection_registry::*;
pub use coordinator::*;
pub use room_command::*;
pub use room_directory::*;
