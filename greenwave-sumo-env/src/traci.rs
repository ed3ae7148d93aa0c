//! Client side of TraCI, the remote-control protocol of SUMO.
//!
//! Only the commands the environment needs are implemented. The connection is
//! synchronous: every call writes one message and reads its response.
mod client;
pub mod constants;
mod storage;
pub use client::TraciClient;
pub use storage::{encode_message, Command, Storage, TraciValue};
