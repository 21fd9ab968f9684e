//! Fleet loop: which registered channels are live right now.
//!
//! [`FleetController`] polls the user directory and the streaming platform,
//! then pushes the desired channel set over the local [`transport`] to the
//! process holding the chat connection.

pub mod controller;
pub mod transport;

pub use controller::{FleetConfig, FleetController, FleetError};
pub use transport::{PushClient, TransportError, serve};
