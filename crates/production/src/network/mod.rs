//! Peer networking over TCP between line neighbors.

mod adapter;
pub mod codec;
mod config;

pub use adapter::{LineAdapter, NetworkError};
pub use codec::{decode_message, encode_message, CodecError, DEFAULT_MAX_FRAME_SIZE};
pub use config::NetworkConfig;
