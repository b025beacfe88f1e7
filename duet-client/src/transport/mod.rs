mod connection_wrapper;
mod transport_config;

pub use connection_wrapper::*;
pub use transport_config::*;
