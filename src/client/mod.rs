//! Control-channel session layer
//!
//! Owns the connection to one server: value types, the forward-only
//! session state machine, the plain/TLS transport, and the command/reply
//! channel itself.

pub mod channel;
pub mod state;
pub mod tls;
pub mod transport;
pub mod types;

pub use channel::{ChannelOptions, ControlChannel};
pub use state::SessionState;
pub use types::{Credentials, EncryptionMode, SiteAddress};
