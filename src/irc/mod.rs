//! IRC protocol layer: transport, framing, event parsing, and outbound lines.

pub mod commands;
pub mod connection;
pub mod ctcp;
pub mod event;
pub mod framing;
pub mod outbound;
pub mod token;
