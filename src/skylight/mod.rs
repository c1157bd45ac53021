//! macOS window-server backend.
//!
//! Provides a concrete [`WindowServer`](crate::traits::WindowServer) powered
//! by the private SkyLight (CGS) API, plus the accessibility trust check.
//!
//! Nothing outside this module should call the window server directly.

mod ffi;
pub mod server;

pub use server::{SkyLightError, SkyLightServer};
