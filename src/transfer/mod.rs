//! Transfer operations
//!
//! Passive-mode negotiation and the FXP server-to-server orchestration.

pub mod fxp;
pub mod passive;

pub use fxp::{TransferOutcome, TransferStep, transfer};
pub use passive::enter_passive;
