//! RAX FXP Client
//!
//! An FTP control-protocol client with FXP support: two independent
//! server sessions exchange a file directly with each other while this
//! process brokers the control commands. Implements the reply framing
//! rule, the explicit AUTH TLS upgrade, passive-mode negotiation,
//! `stat -l` directory listing, and the fixed server-to-server transfer
//! sequence.

pub mod client;
pub mod config;
pub mod error;
pub mod listing;
pub mod protocol;
pub mod transfer;

pub use client::{ChannelOptions, ControlChannel, Credentials, EncryptionMode, SiteAddress};
pub use error::{ClientError, ClientResult};
pub use listing::DirectoryEntry;
pub use transfer::{TransferOutcome, TransferStep};
