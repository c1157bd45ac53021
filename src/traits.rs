//! Core traits that decouple spacewrangler from the operating system's
//! window server and from any specific command transport.
//!
//! Every concrete backend (SkyLight, the in-memory simulator, a test
//! harness, a Unix-socket listener, …) implements one of these traits.  The
//! [`SpaceDirectory`](crate::directory::SpaceDirectory) and the
//! [`WindowRelocator`](crate::relocator::WindowRelocator) only depend on
//! these abstractions.

use crate::command::{
    Command, CopyWindowsOptions, DisplaySpaces, ScreenUuid, SpaceId, SpaceMask, SpaceType,
    WindowId,
};
use std::sync::mpsc;

/// Abstraction over the window server that owns spaces and windows.
///
/// Every method is one synchronous round-trip.  Queries return whatever the
/// server reports at that instant; commands are fire-and-forget on the
/// server side, so an `Ok(())` only means the request was accepted, not
/// that the change has been applied yet.
pub trait WindowServer {
    /// The error type produced by this window server.
    type Error: std::error::Error + Send + 'static;

    /// Identity of the primary screen, or `None` if there is no primary
    /// screen or its identity cannot be resolved.
    fn main_screen_uuid(&self) -> Result<Option<ScreenUuid>, Self::Error>;

    /// The space currently shown on `screen`.
    fn current_space(&self, screen: &ScreenUuid) -> Result<SpaceId, Self::Error>;

    /// The full screen → space topology, screens in enumeration order.
    fn managed_display_spaces(&self) -> Result<Vec<DisplaySpaces>, Self::Error>;

    /// Ids of windows on any of `spaces`.
    ///
    /// Order is unspecified and a window present on several of the spaces
    /// may be reported more than once.
    fn windows_in_spaces(
        &self,
        spaces: &[SpaceId],
        options: CopyWindowsOptions,
    ) -> Result<Vec<WindowId>, Self::Error>;

    /// Stacking level of `window`.  `0` is an ordinary window.
    fn window_level(&self, window: WindowId) -> Result<i32, Self::Error>;

    /// Spaces containing any of `windows`, filtered by `mask`.
    fn spaces_for_windows(
        &self,
        windows: &[WindowId],
        mask: SpaceMask,
    ) -> Result<Vec<SpaceId>, Self::Error>;

    /// Kind of `space`.
    fn space_type(&self, space: SpaceId) -> Result<SpaceType, Self::Error>;

    /// Add `windows` to every space in `spaces`, keeping existing
    /// memberships.
    fn add_windows_to_spaces(
        &self,
        windows: &[WindowId],
        spaces: &[SpaceId],
    ) -> Result<(), Self::Error>;

    /// Remove `windows` from every space in `spaces`.
    fn remove_windows_from_spaces(
        &self,
        windows: &[WindowId],
        spaces: &[SpaceId],
    ) -> Result<(), Self::Error>;

    /// Move `windows` so that `space` becomes their only managed space.
    fn move_windows_to_managed_space(
        &self,
        windows: &[WindowId],
        space: SpaceId,
    ) -> Result<(), Self::Error>;

    /// Whether this process holds the accessibility permission.  When it
    /// does not, no mutating operation may be attempted.
    fn is_accessibility_trusted(&self) -> bool;
}

impl<T: WindowServer + ?Sized> WindowServer for &T {
    type Error = T::Error;

    fn main_screen_uuid(&self) -> Result<Option<ScreenUuid>, Self::Error> {
        (**self).main_screen_uuid()
    }

    fn current_space(&self, screen: &ScreenUuid) -> Result<SpaceId, Self::Error> {
        (**self).current_space(screen)
    }

    fn managed_display_spaces(&self) -> Result<Vec<DisplaySpaces>, Self::Error> {
        (**self).managed_display_spaces()
    }

    fn windows_in_spaces(
        &self,
        spaces: &[SpaceId],
        options: CopyWindowsOptions,
    ) -> Result<Vec<WindowId>, Self::Error> {
        (**self).windows_in_spaces(spaces, options)
    }

    fn window_level(&self, window: WindowId) -> Result<i32, Self::Error> {
        (**self).window_level(window)
    }

    fn spaces_for_windows(
        &self,
        windows: &[WindowId],
        mask: SpaceMask,
    ) -> Result<Vec<SpaceId>, Self::Error> {
        (**self).spaces_for_windows(windows, mask)
    }

    fn space_type(&self, space: SpaceId) -> Result<SpaceType, Self::Error> {
        (**self).space_type(space)
    }

    fn add_windows_to_spaces(
        &self,
        windows: &[WindowId],
        spaces: &[SpaceId],
    ) -> Result<(), Self::Error> {
        (**self).add_windows_to_spaces(windows, spaces)
    }

    fn remove_windows_from_spaces(
        &self,
        windows: &[WindowId],
        spaces: &[SpaceId],
    ) -> Result<(), Self::Error> {
        (**self).remove_windows_from_spaces(windows, spaces)
    }

    fn move_windows_to_managed_space(
        &self,
        windows: &[WindowId],
        space: SpaceId,
    ) -> Result<(), Self::Error> {
        (**self).move_windows_to_managed_space(windows, space)
    }

    fn is_accessibility_trusted(&self) -> bool {
        (**self).is_accessibility_trusted()
    }
}

//  Command Source

/// A source of [`Command`]s.
///
/// Implementations listen on some transport (a Unix socket, an in-memory
/// channel) and forward parsed commands into the provided
/// [`mpsc::Sender`].
///
/// # Contract
///
/// * [`run`](CommandSource::run) **blocks** until the source is exhausted or
///   an unrecoverable error occurs.
/// * Each received command must be sent through `sink` exactly once.
/// * Implementations must be [`Send`] so they can run on a dedicated thread.
pub trait CommandSource: Send {
    /// The error type produced by this source.
    type Error: std::error::Error + Send + 'static;

    /// Start listening and forward every incoming [`Command`] into `sink`.
    ///
    /// This method blocks the calling thread.
    fn run(&mut self, sink: mpsc::Sender<Command>) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, MoveWindowsTarget};
    use std::cell::RefCell;
    use std::sync::mpsc;

    //  Mock WindowServer

    /// A test double that records every mutating call made to it.
    #[derive(Debug, Default)]
    struct MockServer {
        add_log: RefCell<Vec<(Vec<WindowId>, Vec<SpaceId>)>>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("mock error")]
    struct MockError;

    impl WindowServer for MockServer {
        type Error = MockError;

        fn main_screen_uuid(&self) -> Result<Option<ScreenUuid>, MockError> {
            Ok(Some("MOCK-UUID".into()))
        }

        fn current_space(&self, _: &ScreenUuid) -> Result<SpaceId, MockError> {
            Ok(SpaceId(1))
        }

        fn managed_display_spaces(&self) -> Result<Vec<DisplaySpaces>, MockError> {
            Ok(vec![DisplaySpaces {
                display_identifier: "MOCK-UUID".into(),
                spaces: vec![SpaceId(1)],
                current_space: SpaceId(1),
            }])
        }

        fn windows_in_spaces(
            &self,
            _: &[SpaceId],
            _: CopyWindowsOptions,
        ) -> Result<Vec<WindowId>, MockError> {
            Ok(Vec::new())
        }

        fn window_level(&self, _: WindowId) -> Result<i32, MockError> {
            Err(MockError)
        }

        fn spaces_for_windows(&self, _: &[WindowId], _: SpaceMask) -> Result<Vec<SpaceId>, MockError> {
            Ok(Vec::new())
        }

        fn space_type(&self, _: SpaceId) -> Result<SpaceType, MockError> {
            Ok(SpaceType::User)
        }

        fn add_windows_to_spaces(
            &self,
            windows: &[WindowId],
            spaces: &[SpaceId],
        ) -> Result<(), MockError> {
            self.add_log
                .borrow_mut()
                .push((windows.to_vec(), spaces.to_vec()));
            Ok(())
        }

        fn remove_windows_from_spaces(&self, _: &[WindowId], _: &[SpaceId]) -> Result<(), MockError> {
            Ok(())
        }

        fn move_windows_to_managed_space(&self, _: &[WindowId], _: SpaceId) -> Result<(), MockError> {
            Ok(())
        }

        fn is_accessibility_trusted(&self) -> bool {
            true
        }
    }

    #[test]
    fn mock_server_records_adds_through_reference() {
        let server = MockServer::default();
        let by_ref = &server;
        by_ref
            .add_windows_to_spaces(&[WindowId(9)], &[SpaceId(42)])
            .unwrap();
        assert_eq!(server.add_log.borrow().len(), 1);
        assert_eq!(
            server.add_log.borrow()[0],
            (vec![WindowId(9)], vec![SpaceId(42)])
        );
        assert!(by_ref.window_level(WindowId(9)).is_err());
    }

    //  Mock CommandSource

    /// A test double that emits a fixed sequence of commands.
    struct MockSource {
        commands: Vec<Command>,
    }

    impl CommandSource for MockSource {
        type Error = MockError;

        fn run(&mut self, sink: mpsc::Sender<Command>) -> Result<(), MockError> {
            for cmd in self.commands.drain(..) {
                let _ = sink.send(cmd);
            }
            Ok(())
        }
    }

    #[test]
    fn mock_source_emits_commands() {
        let mut src = MockSource {
            commands: vec![
                Command::Refresh,
                Command::MoveWindows(MoveWindowsTarget {
                    space: SpaceId(3),
                    windows: vec![WindowId(1)],
                }),
            ],
        };
        let (tx, rx) = mpsc::channel();
        src.run(tx).unwrap();
        let cmds: Vec<Command> = rx.try_iter().collect();
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0], Command::Refresh);
        assert!(matches!(cmds[1], Command::MoveWindows(_)));
    }
}
