//! Core application logic: session state, protocol responders, and the event loop.

pub mod dispatch;
pub mod handler;
pub mod session;
pub mod state;
