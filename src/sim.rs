//! In-memory [`WindowServer`] driven by a JSON fixture.
//!
//! Used for `--fixture` dry runs (the only backend available off macOS) and
//! as the deterministic test double for the directory and relocator.  Every
//! call is recorded so callers can assert on exactly what was asked of the
//! server.
//!
//! # Fixture format
//!
//! ```json
//! {
//!   "main_screen": "A",
//!   "screens": [
//!     { "uuid": "A", "spaces": [100, 200], "current": 100 },
//!     { "uuid": "B", "spaces": [300], "current": 300 }
//!   ],
//!   "windows": [
//!     { "id": 5, "spaces": [200] },
//!     { "id": 6, "spaces": [100, 200] },
//!     { "id": 9, "spaces": [300], "level": 25 }
//!   ],
//!   "fullscreen_spaces": [],
//!   "trusted": true
//! }
//! ```

use crate::command::{
    CopyWindowsOptions, DisplaySpaces, ScreenUuid, SpaceId, SpaceMask, SpaceType, WindowId,
};
use crate::traits::WindowServer;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

fn default_true() -> bool {
    true
}

/// A screen in a [`Fixture`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureScreen {
    pub uuid: ScreenUuid,
    pub spaces: Vec<SpaceId>,
    pub current: SpaceId,
}

/// A window in a [`Fixture`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureWindow {
    pub id: WindowId,
    pub spaces: Vec<SpaceId>,
    #[serde(default)]
    pub level: i32,
    /// Only listed when invisible windows are requested.
    #[serde(default)]
    pub invisible: bool,
    /// Ignores every add/remove/move command.
    #[serde(default)]
    pub pinned: bool,
}

/// Description of a simulated window server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    /// Primary screen.  Defaults to the first screen.
    #[serde(default)]
    pub main_screen: Option<ScreenUuid>,
    pub screens: Vec<FixtureScreen>,
    #[serde(default)]
    pub windows: Vec<FixtureWindow>,
    #[serde(default)]
    pub fullscreen_spaces: Vec<SpaceId>,
    /// Report the primary screen as `"Main"` in the topology, like OS
    /// versions without a stable primary UUID.
    #[serde(default)]
    pub report_main_sentinel: bool,
    #[serde(default = "default_true")]
    pub trusted: bool,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            main_screen: None,
            screens: Vec::new(),
            windows: Vec::new(),
            fullscreen_spaces: Vec::new(),
            report_main_sentinel: false,
            trusted: true,
        }
    }
}

impl Fixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a screen owning `spaces` and showing `current`.
    pub fn screen(mut self, uuid: &str, spaces: &[u64], current: u64) -> Self {
        self.screens.push(FixtureScreen {
            uuid: uuid.into(),
            spaces: spaces.iter().copied().map(SpaceId).collect(),
            current: SpaceId(current),
        });
        self
    }

    /// Append an ordinary (level 0) window on `spaces`.
    pub fn window(self, id: u32, spaces: &[u64]) -> Self {
        self.window_at_level(id, spaces, 0)
    }

    /// Append a window with an explicit stacking level.
    pub fn window_at_level(mut self, id: u32, spaces: &[u64], level: i32) -> Self {
        self.windows.push(FixtureWindow {
            id: WindowId(id),
            spaces: spaces.iter().copied().map(SpaceId).collect(),
            level,
            invisible: false,
            pinned: false,
        });
        self
    }
}

/// Errors produced by the simulated server.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("fixture parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown screen: {0}")]
    UnknownScreen(ScreenUuid),
    #[error("unknown window: {0}")]
    UnknownWindow(WindowId),
    #[error("unknown space: {0}")]
    UnknownSpace(SpaceId),
    #[error("injected failure: {0}")]
    Injected(&'static str),
}

/// One recorded call against the simulated server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimCall {
    MainScreenUuid,
    CurrentSpace(ScreenUuid),
    ManagedDisplaySpaces,
    WindowsInSpaces(Vec<SpaceId>),
    WindowLevel(WindowId),
    SpacesForWindows(Vec<WindowId>),
    SpaceType(SpaceId),
    AddWindowsToSpaces(Vec<WindowId>, Vec<SpaceId>),
    RemoveWindowsFromSpaces(Vec<WindowId>, Vec<SpaceId>),
    MoveWindowsToManagedSpace(Vec<WindowId>, SpaceId),
    IsAccessibilityTrusted,
}

impl SimCall {
    /// Whether the call changes window membership.
    pub fn is_command(&self) -> bool {
        matches!(
            self,
            SimCall::AddWindowsToSpaces(..)
                | SimCall::RemoveWindowsFromSpaces(..)
                | SimCall::MoveWindowsToManagedSpace(..)
        )
    }
}

#[derive(Debug, Clone)]
struct SimWindow {
    spaces: BTreeSet<SpaceId>,
    level: i32,
    invisible: bool,
    pinned: bool,
}

/// Membership change that has been accepted but not applied yet.
#[derive(Debug)]
struct Pending {
    window: WindowId,
    spaces: BTreeSet<SpaceId>,
    remaining: u32,
}

#[derive(Debug)]
struct State {
    main_screen: Option<ScreenUuid>,
    screens: Vec<FixtureScreen>,
    windows: BTreeMap<WindowId, SimWindow>,
    fullscreen: BTreeSet<SpaceId>,
    pending: Vec<Pending>,
}

/// In-memory window server.
///
/// Membership commands land after [`latency`](Self::set_latency) window
/// queries, which models the real server applying changes asynchronously.
pub struct SimulatedWindowServer {
    state: RefCell<State>,
    calls: RefCell<Vec<SimCall>>,
    trusted: Cell<bool>,
    /// Screen reported as `"Main"` in the topology.
    sentinel_screen: Option<ScreenUuid>,
    latency: Cell<u32>,
    fail_topology: Cell<bool>,
    fail_main_screen: Cell<bool>,
    fail_levels: RefCell<BTreeSet<WindowId>>,
}

impl SimulatedWindowServer {
    pub fn new(fixture: Fixture) -> Self {
        let main_screen = fixture
            .main_screen
            .or_else(|| fixture.screens.first().map(|s| s.uuid.clone()));
        let sentinel_screen = main_screen
            .clone()
            .filter(|_| fixture.report_main_sentinel);
        let windows = fixture
            .windows
            .into_iter()
            .map(|w| {
                (
                    w.id,
                    SimWindow {
                        spaces: w.spaces.into_iter().collect(),
                        level: w.level,
                        invisible: w.invisible,
                        pinned: w.pinned,
                    },
                )
            })
            .collect();
        Self {
            state: RefCell::new(State {
                main_screen,
                screens: fixture.screens,
                windows,
                fullscreen: fixture.fullscreen_spaces.into_iter().collect(),
                pending: Vec::new(),
            }),
            calls: RefCell::new(Vec::new()),
            trusted: Cell::new(fixture.trusted),
            sentinel_screen,
            latency: Cell::new(0),
            fail_topology: Cell::new(false),
            fail_main_screen: Cell::new(false),
            fail_levels: RefCell::new(BTreeSet::new()),
        }
    }

    /// Load a fixture from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self, SimError> {
        let contents = std::fs::read_to_string(path)?;
        let fixture: Fixture = serde_json::from_str(&contents)?;
        Ok(Self::new(fixture))
    }

    //  Test controls

    pub fn set_trusted(&self, trusted: bool) {
        self.trusted.set(trusted);
    }

    /// Delay membership commands until `queries` window queries have run.
    pub fn set_latency(&self, queries: u32) {
        self.latency.set(queries);
    }

    /// Make the topology query fail until reset.
    pub fn set_fail_topology(&self, fail: bool) {
        self.fail_topology.set(fail);
    }

    /// Make the primary-screen identity query fail until reset.
    pub fn set_fail_main_screen(&self, fail: bool) {
        self.fail_main_screen.set(fail);
    }

    /// Make level queries for `window` fail.
    pub fn fail_level_for(&self, window: WindowId) {
        self.fail_levels.borrow_mut().insert(window);
    }

    /// Forget the primary screen.  The topology keeps reporting a `"Main"`
    /// sentinel if the fixture asked for one.
    pub fn clear_main_screen(&self) {
        self.state.borrow_mut().main_screen = None;
    }

    /// Report `uuid` as the primary screen, whether or not the topology
    /// knows it.
    pub fn set_main_screen(&self, uuid: &str) {
        self.state.borrow_mut().main_screen = Some(ScreenUuid::from(uuid));
    }

    /// Show `space` on `screen`.
    pub fn switch_space(&self, screen: &str, space: u64) {
        let mut state = self.state.borrow_mut();
        if let Some(s) = state.screens.iter_mut().find(|s| s.uuid.as_str() == screen) {
            s.current = SpaceId(space);
        }
    }

    /// Add a window after construction, e.g. to model user activity.
    pub fn open_window(&self, id: u32, spaces: &[u64]) {
        self.state.borrow_mut().windows.insert(
            WindowId(id),
            SimWindow {
                spaces: spaces.iter().copied().map(SpaceId).collect(),
                level: 0,
                invisible: false,
                pinned: false,
            },
        );
    }

    //  Inspection

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<SimCall> {
        self.calls.borrow().clone()
    }

    /// Number of membership commands issued so far.
    pub fn command_count(&self) -> usize {
        self.calls.borrow().iter().filter(|c| c.is_command()).count()
    }

    /// Number of topology queries issued so far.
    pub fn topology_query_count(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| **c == SimCall::ManagedDisplaySpaces)
            .count()
    }

    /// Current (applied) spaces of `window`.
    pub fn window_spaces(&self, window: WindowId) -> Option<BTreeSet<SpaceId>> {
        self.state
            .borrow()
            .windows
            .get(&window)
            .map(|w| w.spaces.clone())
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    //  Internals

    fn record(&self, call: SimCall) {
        self.calls.borrow_mut().push(call);
    }

    fn known_space(state: &State, space: SpaceId) -> bool {
        state.screens.iter().any(|s| s.spaces.contains(&space))
    }

    /// Count down pending changes; apply those that are due.
    fn tick(&self) {
        let mut state = self.state.borrow_mut();
        let mut due = Vec::new();
        state.pending.retain_mut(|p| {
            p.remaining = p.remaining.saturating_sub(1);
            if p.remaining == 0 {
                due.push((p.window, std::mem::take(&mut p.spaces)));
                false
            } else {
                true
            }
        });
        for (window, spaces) in due {
            if let Some(w) = state.windows.get_mut(&window) {
                w.spaces = spaces;
            }
        }
    }

    /// Compute the new membership of each window and schedule it.
    fn schedule<F>(&self, windows: &[WindowId], change: F)
    where
        F: Fn(&BTreeSet<SpaceId>) -> BTreeSet<SpaceId>,
    {
        let latency = self.latency.get();
        let mut state = self.state.borrow_mut();
        for window in windows {
            // Later commands build on earlier, still pending, ones.
            let base = state
                .pending
                .iter()
                .rev()
                .find(|p| p.window == *window)
                .map(|p| p.spaces.clone())
                .or_else(|| {
                    state
                        .windows
                        .get(window)
                        .filter(|w| !w.pinned)
                        .map(|w| w.spaces.clone())
                });
            let Some(base) = base else {
                continue;
            };
            let spaces = change(&base);
            if latency == 0 {
                if let Some(w) = state.windows.get_mut(window) {
                    w.spaces = spaces;
                }
            } else {
                state.pending.push(Pending {
                    window: *window,
                    spaces,
                    remaining: latency,
                });
            }
        }
    }
}

impl WindowServer for SimulatedWindowServer {
    type Error = SimError;

    fn main_screen_uuid(&self) -> Result<Option<ScreenUuid>, SimError> {
        self.record(SimCall::MainScreenUuid);
        if self.fail_main_screen.get() {
            return Err(SimError::Injected("main screen uuid"));
        }
        Ok(self.state.borrow().main_screen.clone())
    }

    fn current_space(&self, screen: &ScreenUuid) -> Result<SpaceId, SimError> {
        self.record(SimCall::CurrentSpace(screen.clone()));
        self.state
            .borrow()
            .screens
            .iter()
            .find(|s| &s.uuid == screen)
            .map(|s| s.current)
            .ok_or_else(|| SimError::UnknownScreen(screen.clone()))
    }

    fn managed_display_spaces(&self) -> Result<Vec<DisplaySpaces>, SimError> {
        self.record(SimCall::ManagedDisplaySpaces);
        if self.fail_topology.get() {
            return Err(SimError::Injected("managed display spaces"));
        }
        let state = self.state.borrow();
        Ok(state
            .screens
            .iter()
            .map(|s| {
                let display_identifier = if self.sentinel_screen.as_ref() == Some(&s.uuid) {
                    ScreenUuid::from(crate::command::MAIN_DISPLAY_IDENTIFIER)
                } else {
                    s.uuid.clone()
                };
                DisplaySpaces {
                    display_identifier,
                    spaces: s.spaces.clone(),
                    current_space: s.current,
                }
            })
            .collect())
    }

    fn windows_in_spaces(
        &self,
        spaces: &[SpaceId],
        options: CopyWindowsOptions,
    ) -> Result<Vec<WindowId>, SimError> {
        self.record(SimCall::WindowsInSpaces(spaces.to_vec()));
        self.tick();
        let state = self.state.borrow();
        let mut out = Vec::new();
        for (id, w) in &state.windows {
            if w.invisible && !options.includes_invisible() {
                continue;
            }
            // One entry per matching space, like the real server.
            for space in spaces {
                if w.spaces.contains(space) {
                    out.push(*id);
                }
            }
        }
        Ok(out)
    }

    fn window_level(&self, window: WindowId) -> Result<i32, SimError> {
        self.record(SimCall::WindowLevel(window));
        if self.fail_levels.borrow().contains(&window) {
            return Err(SimError::Injected("window level"));
        }
        self.state
            .borrow()
            .windows
            .get(&window)
            .map(|w| w.level)
            .ok_or(SimError::UnknownWindow(window))
    }

    fn spaces_for_windows(
        &self,
        windows: &[WindowId],
        mask: SpaceMask,
    ) -> Result<Vec<SpaceId>, SimError> {
        self.record(SimCall::SpacesForWindows(windows.to_vec()));
        self.tick();
        let state = self.state.borrow();
        let visible: BTreeSet<SpaceId> = state.screens.iter().map(|s| s.current).collect();
        let mut out = BTreeSet::new();
        for window in windows {
            let w = state
                .windows
                .get(window)
                .ok_or(SimError::UnknownWindow(*window))?;
            out.extend(w.spaces.iter().copied().filter(|s| match mask {
                SpaceMask::Current => visible.contains(s),
                SpaceMask::Other => !visible.contains(s),
                SpaceMask::All => true,
            }));
        }
        Ok(out.into_iter().collect())
    }

    fn space_type(&self, space: SpaceId) -> Result<SpaceType, SimError> {
        self.record(SimCall::SpaceType(space));
        let state = self.state.borrow();
        if state.fullscreen.contains(&space) {
            Ok(SpaceType::Fullscreen)
        } else if Self::known_space(&state, space) {
            Ok(SpaceType::User)
        } else {
            Err(SimError::UnknownSpace(space))
        }
    }

    fn add_windows_to_spaces(
        &self,
        windows: &[WindowId],
        spaces: &[SpaceId],
    ) -> Result<(), SimError> {
        self.record(SimCall::AddWindowsToSpaces(windows.to_vec(), spaces.to_vec()));
        self.schedule(windows, |current| {
            current.iter().chain(spaces).copied().collect()
        });
        Ok(())
    }

    fn remove_windows_from_spaces(
        &self,
        windows: &[WindowId],
        spaces: &[SpaceId],
    ) -> Result<(), SimError> {
        self.record(SimCall::RemoveWindowsFromSpaces(
            windows.to_vec(),
            spaces.to_vec(),
        ));
        self.schedule(windows, |current| {
            current
                .iter()
                .copied()
                .filter(|s| !spaces.contains(s))
                .collect()
        });
        Ok(())
    }

    fn move_windows_to_managed_space(
        &self,
        windows: &[WindowId],
        space: SpaceId,
    ) -> Result<(), SimError> {
        self.record(SimCall::MoveWindowsToManagedSpace(windows.to_vec(), space));
        self.schedule(windows, |_| BTreeSet::from([space]));
        Ok(())
    }

    fn is_accessibility_trusted(&self) -> bool {
        self.record(SimCall::IsAccessibilityTrusted);
        self.trusted.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_screens() -> SimulatedWindowServer {
        SimulatedWindowServer::new(
            Fixture::new()
                .screen("A", &[100, 200], 100)
                .screen("B", &[300], 300)
                .window(5, &[200])
                .window(6, &[100, 200]),
        )
    }

    #[test]
    fn parse_fixture_json_with_defaults() {
        let json = r#"{
            "screens": [{ "uuid": "A", "spaces": [1, 2], "current": 1 }],
            "windows": [{ "id": 7, "spaces": [2] }]
        }"#;
        let fixture: Fixture = serde_json::from_str(json).unwrap();
        assert!(fixture.trusted);
        assert!(!fixture.report_main_sentinel);
        assert_eq!(fixture.windows[0].level, 0);

        let server = SimulatedWindowServer::new(fixture);
        assert_eq!(server.main_screen_uuid().unwrap(), Some(ScreenUuid::from("A")));
    }

    #[test]
    fn windows_reported_once_per_matching_space() {
        let server = two_screens();
        let mut ids = server
            .windows_in_spaces(&[SpaceId(100), SpaceId(200)], CopyWindowsOptions::for_listing(true))
            .unwrap();
        ids.sort();
        assert_eq!(ids, vec![WindowId(5), WindowId(6), WindowId(6)]);
    }

    #[test]
    fn invisible_windows_need_the_flag() {
        let mut fixture = Fixture::new().screen("A", &[1], 1).window(4, &[1]);
        fixture.windows[0].invisible = true;
        let server = SimulatedWindowServer::new(fixture);
        let visible_only = server
            .windows_in_spaces(&[SpaceId(1)], CopyWindowsOptions::for_listing(false))
            .unwrap();
        assert!(visible_only.is_empty());
        let all = server
            .windows_in_spaces(&[SpaceId(1)], CopyWindowsOptions::for_listing(true))
            .unwrap();
        assert_eq!(all, vec![WindowId(4)]);
    }

    #[test]
    fn move_replaces_membership() {
        let server = two_screens();
        server
            .move_windows_to_managed_space(&[WindowId(6)], SpaceId(300))
            .unwrap();
        assert_eq!(
            server.window_spaces(WindowId(6)),
            Some(BTreeSet::from([SpaceId(300)]))
        );
        assert_eq!(server.command_count(), 1);
    }

    #[test]
    fn latency_delays_commands() {
        let server = two_screens();
        server.set_latency(2);
        server
            .add_windows_to_spaces(&[WindowId(5)], &[SpaceId(100)])
            .unwrap();
        server
            .remove_windows_from_spaces(&[WindowId(5)], &[SpaceId(200)])
            .unwrap();
        let options = CopyWindowsOptions::for_listing(true);

        // First query: still pending.
        let first = server.windows_in_spaces(&[SpaceId(200)], options).unwrap();
        assert!(first.contains(&WindowId(5)));

        // Second query: both changes have landed.
        let second = server.windows_in_spaces(&[SpaceId(200)], options).unwrap();
        assert!(!second.contains(&WindowId(5)));
        assert_eq!(
            server.window_spaces(WindowId(5)),
            Some(BTreeSet::from([SpaceId(100)]))
        );
    }

    #[test]
    fn pinned_windows_ignore_commands() {
        let mut fixture = Fixture::new().screen("A", &[1, 2], 1).window(8, &[2]);
        fixture.windows[0].pinned = true;
        let server = SimulatedWindowServer::new(fixture);
        server
            .move_windows_to_managed_space(&[WindowId(8)], SpaceId(1))
            .unwrap();
        assert_eq!(
            server.window_spaces(WindowId(8)),
            Some(BTreeSet::from([SpaceId(2)]))
        );
    }

    #[test]
    fn main_sentinel_reported_for_primary_screen_only() {
        let mut fixture = Fixture::new().screen("A", &[1], 1).screen("B", &[2], 2);
        fixture.report_main_sentinel = true;
        let server = SimulatedWindowServer::new(fixture);
        let topology = server.managed_display_spaces().unwrap();
        assert!(topology[0].display_identifier.is_main_sentinel());
        assert_eq!(topology[1].display_identifier, ScreenUuid::from("B"));
    }

    #[test]
    fn spaces_for_windows_honours_mask() {
        let server = two_screens();
        let all = server
            .spaces_for_windows(&[WindowId(6)], SpaceMask::All)
            .unwrap();
        assert_eq!(all, vec![SpaceId(100), SpaceId(200)]);
        let current = server
            .spaces_for_windows(&[WindowId(6)], SpaceMask::Current)
            .unwrap();
        assert_eq!(current, vec![SpaceId(100)]);
        let other = server
            .spaces_for_windows(&[WindowId(6)], SpaceMask::Other)
            .unwrap();
        assert_eq!(other, vec![SpaceId(200)]);
    }

    #[test]
    fn load_missing_file_fails() {
        let err = SimulatedWindowServer::load(Path::new("/nonexistent/spacewrangler.json"));
        assert!(matches!(err, Err(SimError::Io(_))));
    }
}
