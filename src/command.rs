//! Commands and types used throughout spacewrangler.
//!
//! This module defines the vocabulary that all components share:
//! [`Command`] describes every action the daemon and CLI can perform, the id
//! newtypes ([`SpaceId`], [`WindowId`], [`SpaceIndex`], [`ScreenUuid`]) name
//! window-server entities, and [`DisplaySpaces`] / [`CopyWindowsOptions`] /
//! [`SpaceMask`] / [`SpaceType`] describe what the window server reports and
//! accepts.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier the window server reports for the primary screen on OS
/// versions that do not expose a stable UUID for it.
pub const MAIN_DISPLAY_IDENTIFIER: &str = "Main";

/// Opaque window-server identifier of a space (virtual desktop).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpaceId(pub u64);

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque window-server identifier of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u32);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 1-based position of a space in the global ordering of one directory
/// snapshot.
///
/// Indices run across all screens in enumeration order; they are *not*
/// restarted per screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpaceIndex(pub usize);

impl SpaceIndex {
    /// Index of the first space, also the fallback for an unresolved active
    /// space.
    pub const FIRST: SpaceIndex = SpaceIndex(1);

    /// The index following this one.
    pub fn next(self) -> SpaceIndex {
        SpaceIndex(self.0 + 1)
    }
}

impl Default for SpaceIndex {
    fn default() -> Self {
        Self::FIRST
    }
}

impl fmt::Display for SpaceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// UUID-like string identifying a physical screen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScreenUuid(String);

impl ScreenUuid {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self(uuid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the `"Main"` sentinel rather than a real UUID.
    pub fn is_main_sentinel(&self) -> bool {
        self.0 == MAIN_DISPLAY_IDENTIFIER
    }
}

impl From<&str> for ScreenUuid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ScreenUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One screen's entry in the window server's managed-display topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySpaces {
    /// Screen identity as reported; may be [`MAIN_DISPLAY_IDENTIFIER`].
    pub display_identifier: ScreenUuid,
    /// Spaces owned by the screen, in window-server order.
    pub spaces: Vec<SpaceId>,
    /// The space currently shown on the screen.
    pub current_space: SpaceId,
}

bitflags! {
    /// Options for the window-server "copy windows in spaces" query.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CopyWindowsOptions: u32 {
        const INVISIBLE_1 = 1 << 0;
        /// Screen-saver level windows and above.
        const SCREEN_SAVER_LEVEL_1000 = 1 << 1;
        const INVISIBLE_2 = 1 << 2;
    }
}

impl CopyWindowsOptions {
    /// The option set used for every space listing: the screen-saver tier,
    /// plus both invisibility flags when `include_invisible` is set.
    pub fn for_listing(include_invisible: bool) -> Self {
        let mut options = Self::SCREEN_SAVER_LEVEL_1000;
        if include_invisible {
            options |= Self::INVISIBLE_1 | Self::INVISIBLE_2;
        }
        options
    }

    /// Whether windows marked invisible should be reported.
    pub fn includes_invisible(self) -> bool {
        self.intersects(Self::INVISIBLE_1 | Self::INVISIBLE_2)
    }
}

/// Which of a window's spaces a "spaces for windows" query reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpaceMask {
    /// Only the spaces currently shown on some screen.
    Current,
    /// Only spaces not currently shown.
    Other,
    /// Every space.
    All,
}

impl SpaceMask {
    /// Raw mask value understood by the window server.
    pub fn raw(self) -> u32 {
        match self {
            SpaceMask::Current => 5,
            SpaceMask::Other => 6,
            SpaceMask::All => 7,
        }
    }
}

/// Kind of a space as reported by the window server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpaceType {
    User,
    System,
    Fullscreen,
    Unknown,
}

impl SpaceType {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => SpaceType::User,
            2 => SpaceType::System,
            4 => SpaceType::Fullscreen,
            _ => SpaceType::Unknown,
        }
    }
}

/// Payload of [`Command::MoveWindows`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveWindowsTarget {
    /// Destination space.
    pub space: SpaceId,
    /// Windows to move.  Not deduplicated or filtered.
    pub windows: Vec<WindowId>,
}

/// Every action spacewrangler can perform.
///
/// Commands come from the command line or, in daemon mode, from a
/// [`CommandSource`](crate::traits::CommandSource).
///
/// # Wire format
///
/// ```json
/// "Refresh"
/// "Spaces"
/// "Relocate"
/// {"MoveWindows":{"space":3,"windows":[120,121]}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Rebuild the space directory from the window server.
    Refresh,

    /// Rebuild the directory and report it.
    Spaces,

    /// Rebuild the directory, then move every stray window onto the active
    /// space.
    Relocate,

    /// Move an explicit set of windows to a space and verify.
    MoveWindows(MoveWindowsTarget),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Refresh => write!(f, "refresh"),
            Command::Spaces => write!(f, "spaces"),
            Command::Relocate => write!(f, "relocate"),
            Command::MoveWindows(target) => {
                write!(f, "move {} window(s) to space {}", target.windows.len(), target.space)
            }
        }
    }
}

/// Error from turning command-line words into a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandParseError {
    #[error("missing command")]
    Missing,
    #[error("unknown command: {0:?}")]
    Unknown(String),
    #[error("move: expected a space id followed by at least one window id")]
    MoveArity,
    #[error("invalid {what}: {value:?}")]
    InvalidId { what: &'static str, value: String },
}

fn parse_id<T: std::str::FromStr>(what: &'static str, value: &str) -> Result<T, CommandParseError> {
    value.trim().parse().map_err(|_| CommandParseError::InvalidId {
        what,
        value: value.to_string(),
    })
}

/// Parse the positional words of a one-shot invocation
/// (`relocate`, `move 3 120 121`, …).  Names are case-insensitive.
pub fn parse_command<S: AsRef<str>>(words: &[S]) -> Result<Command, CommandParseError> {
    let (head, rest) = words.split_first().ok_or(CommandParseError::Missing)?;
    match head.as_ref().to_lowercase().as_str() {
        "refresh" => Ok(Command::Refresh),
        "spaces" | "list" => Ok(Command::Spaces),
        "relocate" | "gather" => Ok(Command::Relocate),
        "move" => {
            let (space, windows) = rest.split_first().ok_or(CommandParseError::MoveArity)?;
            if windows.is_empty() {
                return Err(CommandParseError::MoveArity);
            }
            let space = SpaceId(parse_id("space id", space.as_ref())?);
            let windows = windows
                .iter()
                .map(|w| parse_id("window id", w.as_ref()).map(WindowId))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Command::MoveWindows(MoveWindowsTarget { space, windows }))
        }
        other => Err(CommandParseError::Unknown(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_commands() {
        assert_eq!(parse_command(&["refresh"]), Ok(Command::Refresh));
        assert_eq!(parse_command(&["Spaces"]), Ok(Command::Spaces));
        assert_eq!(parse_command(&["RELOCATE"]), Ok(Command::Relocate));
        assert_eq!(parse_command(&["gather"]), Ok(Command::Relocate));
    }

    #[test]
    fn parse_move_command() {
        let cmd = parse_command(&["move", "3", "120", "121"]).unwrap();
        assert_eq!(
            cmd,
            Command::MoveWindows(MoveWindowsTarget {
                space: SpaceId(3),
                windows: vec![WindowId(120), WindowId(121)],
            })
        );
    }

    #[test]
    fn parse_move_requires_windows() {
        assert_eq!(parse_command(&["move", "3"]), Err(CommandParseError::MoveArity));
        assert_eq!(parse_command(&["move"]), Err(CommandParseError::MoveArity));
    }

    #[test]
    fn parse_rejects_bad_ids_and_unknown_words() {
        assert!(matches!(
            parse_command(&["move", "three", "1"]),
            Err(CommandParseError::InvalidId { what: "space id", .. })
        ));
        assert!(matches!(
            parse_command(&["move", "3", "-1"]),
            Err(CommandParseError::InvalidId { what: "window id", .. })
        ));
        assert_eq!(
            parse_command(&["tile"]),
            Err(CommandParseError::Unknown("tile".into()))
        );
        assert_eq!(parse_command::<&str>(&[]), Err(CommandParseError::Missing));
    }

    #[test]
    fn wire_format() {
        let cmd: Command = serde_json::from_str(r#""Relocate""#).unwrap();
        assert_eq!(cmd, Command::Relocate);

        let cmd: Command =
            serde_json::from_str(r#"{"MoveWindows":{"space":7,"windows":[1,2]}}"#).unwrap();
        assert_eq!(
            cmd,
            Command::MoveWindows(MoveWindowsTarget {
                space: SpaceId(7),
                windows: vec![WindowId(1), WindowId(2)],
            })
        );
    }

    #[test]
    fn listing_options() {
        let visible_only = CopyWindowsOptions::for_listing(false);
        assert_eq!(visible_only, CopyWindowsOptions::SCREEN_SAVER_LEVEL_1000);
        assert!(!visible_only.includes_invisible());

        let all = CopyWindowsOptions::for_listing(true);
        assert_eq!(all.bits(), 0b111);
        assert!(all.includes_invisible());
    }

    #[test]
    fn main_sentinel() {
        assert!(ScreenUuid::from("Main").is_main_sentinel());
        assert!(!ScreenUuid::from("37D8832A-2D66-02CA-B9F7-8F30A301B230").is_main_sentinel());
    }

    #[test]
    fn space_type_from_raw() {
        assert_eq!(SpaceType::from_raw(0), SpaceType::User);
        assert_eq!(SpaceType::from_raw(4), SpaceType::Fullscreen);
        assert_eq!(SpaceType::from_raw(99), SpaceType::Unknown);
    }
}
