//! Control-protocol primitives
//!
//! Reply framing and the logical [`Response`] type shared by every
//! higher-level operation.

pub mod response;

pub use response::{Response, ResponseAssembler};
