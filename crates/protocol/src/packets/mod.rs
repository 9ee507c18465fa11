//! Message definitions for the snake protocol.
//!
//! Every frame is a JSON object whose `type` field selects the variant.
//! This module contains both client->server and server->client messages.

mod client;
mod server;

pub use client::*;
pub use server::*;
