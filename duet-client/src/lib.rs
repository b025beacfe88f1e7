//! Client side of a duet call: the peer session protocol, the controller that
//! drives it from signaling traffic, and a native WebRTC backend.

pub mod controller;
pub mod error;
pub mod peer;
pub mod transport;

pub use controller::{ClientEvent, ClientSessionController, ControllerCommand, MediaLayout, Slot};
pub use error::ClientError;
pub use peer::{
    ConnectionState, PeerConnection, PeerConnectionFactory, PeerEvent, PeerEventKind, PeerSession,
    Role,
};
pub use transport::{TransportConfig, WebRtcConnection, WebRtcFactory};
