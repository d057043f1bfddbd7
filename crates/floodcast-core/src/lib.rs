//! Floodcast Core Library
//!
//! This crate provides the wire-contract types for the floodcast broadcast
//! protocol: node identifiers, the message envelope, and the typed payload
//! for every message the protocol exchanges.
//!
//! # Modules
//!
//! - [`types`]: Identifier types (NodeId, MsgId)
//! - [`message`]: Envelope, body, payload, and standard error codes

pub mod message;
pub mod types;

pub use message::{Body, Envelope, Payload};
pub use types::{MsgId, NodeId};
