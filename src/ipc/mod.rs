//! IPC listener that accepts commands over a Unix socket.
//!
//! Scripts and launch agents can connect to the daemon's socket and send
//! newline-delimited commands.

pub mod listener;
