mod peer_connection;
mod peer_session;

pub use peer_connection::*;
pub use peer_session::*;
