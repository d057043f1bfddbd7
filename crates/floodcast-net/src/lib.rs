//! Floodcast Net Library
//!
//! Bindings to the messaging substrate the broadcast protocol runs over:
//! newline-delimited JSON envelopes on a byte stream (stdin/stdout in
//! production, in-memory pipes in tests), with an `init` handshake,
//! request/response correlation, and awaited RPC.
//!
//! # Modules
//!
//! - [`codec`]: Line framing for the wire
//! - [`node`]: The substrate runtime and the [`node::Node`] handle

pub mod codec;
pub mod node;

pub use codec::{CodecError, LineCodec};
pub use node::{NetError, Node};
