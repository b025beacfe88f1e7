//! Signaling server for two-party video calls: room lifecycle, offer/answer/ICE
//! relay, chat fan-out and persistence, media upload.

pub mod app;
pub mod config;
pub mod room;
pub mod signaling;
pub mod storage;
pub mod upload;

pub use app::*;
pub use config::DuetConfig;
pub use room::*;
pub use signaling::*;
pub use storage::*;
