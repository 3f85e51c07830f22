//! Error handling
//!
//! Error taxonomy shared by every module of the FXP client.

pub mod types;

pub use types::{ClientError, ClientResult};
