//! **spacewrangler**: macOS space bookkeeping and stray-window relocation.
//!
//! The crate keeps a snapshot of every Mission Control space across all
//! screens (the [`directory::SpaceDirectory`]) and uses it to gather
//! windows that only live on inactive spaces onto the active one
//! ([`relocator::WindowRelocator`]).
//!
//! # Architecture
//!
//! The crate is organised around two core traits:
//!
//! * [`traits::WindowServer`]: abstracts space queries and window
//!   membership commands so the directory and relocation logic is not
//!   coupled to the private SkyLight API.
//! * [`traits::CommandSource`]: abstracts the transport that delivers
//!   commands to the daemon (a Unix socket today).
//!
//! Concrete implementations live in `skylight` (macOS only), [`sim`] (an
//! in-memory window server for dry runs and tests) and [`ipc`] (Unix-socket
//! command listener).  [`session::Session`] ties a window server to a
//! directory and dispatches [`command::Command`]s.

pub mod command;
pub mod config;
pub mod directory;
pub mod ipc;
pub mod relocator;
pub mod session;
pub mod sim;
#[cfg(target_os = "macos")]
pub mod skylight;
pub mod traits;
