//! Command dispatch.
//!
//! A [`Session`] owns the [`SpaceDirectory`] and the [`WindowRelocator`] for
//! one process and turns each incoming [`Command`] into calls on them.  Both
//! the one-shot CLI and the daemon loop go through [`Session::handle`], so a
//! command behaves the same whichever way it arrives.

use crate::command::{Command, MoveWindowsTarget, SpaceId, SpaceIndex};
use crate::config::Config;
use crate::directory::SpaceDirectory;
use crate::relocator::{MoveReport, RelocateError, RelocationOutcome, WindowRelocator};
use crate::traits::WindowServer;
use log::info;
use serde::Serialize;

/// What a handled command produced.
#[derive(Debug, Clone, Serialize)]
pub enum Response {
    Refreshed {
        active_space: Option<SpaceId>,
        active_index: SpaceIndex,
        space_count: usize,
    },
    Spaces(SpaceDirectory),
    Relocation(RelocationOutcome),
    Moved(MoveReport),
}

/// Directory plus relocator for a single window server.
pub struct Session<W: WindowServer> {
    directory: SpaceDirectory,
    relocator: WindowRelocator<W>,
}

impl<W: WindowServer> Session<W> {
    /// Create a session with an empty directory and the given settings.
    pub fn new(server: W, config: &Config) -> Self {
        let mut relocator = WindowRelocator::new(server);
        relocator.set_relocation_config(config.relocation.clone());
        relocator.set_verify_config(config.verify.clone());
        Self {
            directory: SpaceDirectory::new(),
            relocator,
        }
    }

    pub fn directory(&self) -> &SpaceDirectory {
        &self.directory
    }

    pub fn relocator(&self) -> &WindowRelocator<W> {
        &self.relocator
    }

    /// Process a single [`Command`].
    ///
    /// Only a missing accessibility permission is an error; empty candidate
    /// sets and windows that did not move are part of the [`Response`].
    pub fn handle(&mut self, cmd: Command) -> Result<Response, RelocateError> {
        match cmd {
            Command::Refresh => {
                self.refresh();
                info!(
                    "{} space(s), active {:?} at index {}",
                    self.directory.len(),
                    self.directory.active_space_id(),
                    self.directory.active_space_index()
                );
                Ok(Response::Refreshed {
                    active_space: self.directory.active_space_id(),
                    active_index: self.directory.active_space_index(),
                    space_count: self.directory.len(),
                })
            }

            Command::Spaces => {
                self.refresh();
                Ok(Response::Spaces(self.directory.clone()))
            }

            Command::Relocate => {
                let outcome = self.relocator.refresh_and_relocate(&mut self.directory)?;
                Ok(Response::Relocation(outcome))
            }

            Command::MoveWindows(MoveWindowsTarget { space, windows }) => {
                info!("move {:?} to space {}", windows, space);
                let report = self.relocator.move_windows_to_space(&windows, space)?;
                self.refresh();
                Ok(Response::Moved(report))
            }
        }
    }

    fn refresh(&mut self) {
        self.directory.refresh(self.relocator.server());
    }
}

//  Tests
