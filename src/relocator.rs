//! Stray-window relocation.
//!
//! [`WindowRelocator`] finds windows that live only on inactive spaces and
//! moves them onto a target space (normally the active one), then checks
//! that they actually arrived.  It holds no topology of its own; every call
//! reads the [`SpaceDirectory`] it is given and refreshes it afterwards.

use crate::command::{CopyWindowsOptions, SpaceId, SpaceMask, SpaceType, WindowId};
use crate::config::{RelocationConfig, RelocationStrategy, VerifyConfig};
use crate::directory::SpaceDirectory;
use crate::traits::WindowServer;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::BTreeSet;

/// Hard precondition failures.  Everything else is reported through
/// [`RelocationOutcome`] / [`MoveReport`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelocateError {
    /// The process does not hold the accessibility permission.
    #[error("accessibility permission not granted")]
    PermissionDenied,
}

/// Result of a completed relocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelocationReport {
    /// Space the windows were moved to.
    pub target: SpaceId,
    /// Windows the move command was issued for.
    pub stray: Vec<WindowId>,
    /// Stray windows left alone because they are not relocatable.
    pub skipped: Vec<WindowId>,
    /// Stray windows still found on another space after verification.
    pub unmoved: Vec<WindowId>,
}

impl RelocationReport {
    /// Whether every stray window left the other spaces.
    pub fn is_complete(&self) -> bool {
        self.unmoved.is_empty()
    }
}

/// What [`WindowRelocator::relocate_stray_windows`] did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RelocationOutcome {
    /// The directory does not know the active space.
    NoActiveSpace,
    /// The directory lists no space besides the active one.
    NoOtherSpaces,
    /// Every window on the other spaces is also on the active space, or was
    /// skipped.
    NoStrayWindows { skipped: Vec<WindowId> },
    /// A move was issued and verified.
    Relocated(RelocationReport),
}

/// Result of [`WindowRelocator::move_windows_to_space`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveReport {
    pub target: SpaceId,
    /// Windows found on the target after the move.
    pub moved: Vec<WindowId>,
    /// Windows not (yet) found on the target.
    pub unmoved: Vec<WindowId>,
}

/// Moves stray windows between spaces through a [`WindowServer`].
///
/// The relocator is generic over any [`WindowServer`] implementation; the
/// SkyLight backend and the in-memory simulator are interchangeable.
///
/// # Typical usage
///
/// ```ignore
/// let mut directory = SpaceDirectory::new();
/// directory.refresh(&server);
/// let relocator = WindowRelocator::new(server);
/// relocator.relocate_to_active(&mut directory)?;
/// ```
pub struct WindowRelocator<W: WindowServer> {
    server: W,
    relocation: RelocationConfig,
    verify: VerifyConfig,
}

impl<W: WindowServer> WindowRelocator<W> {
    /// Create a relocator with default relocation and verification
    /// settings.
    pub fn new(server: W) -> Self {
        Self {
            server,
            relocation: RelocationConfig::default(),
            verify: VerifyConfig::default(),
        }
    }

    pub fn set_relocation_config(&mut self, config: RelocationConfig) {
        self.relocation = config;
    }

    pub fn set_verify_config(&mut self, config: VerifyConfig) {
        self.verify = config;
    }

    /// The underlying window server.
    pub fn server(&self) -> &W {
        &self.server
    }

    //  Queries

    /// Windows on any of `spaces`, deduplicated.
    ///
    /// A failed query is logged and reported as an empty set.
    pub fn windows_in_spaces(&self, spaces: &[SpaceId], include_invisible: bool) -> BTreeSet<WindowId> {
        self.query_windows(spaces, include_invisible)
            .unwrap_or_else(|e| {
                warn!("failed to list windows in spaces {:?}: {}", spaces, e);
                BTreeSet::new()
            })
    }

    fn query_windows(
        &self,
        spaces: &[SpaceId],
        include_invisible: bool,
    ) -> Result<BTreeSet<WindowId>, W::Error> {
        if spaces.is_empty() {
            return Ok(BTreeSet::new());
        }
        let options = CopyWindowsOptions::for_listing(include_invisible);
        Ok(self
            .server
            .windows_in_spaces(spaces, options)?
            .into_iter()
            .collect())
    }

    /// Whether `window` may be moved between spaces.
    ///
    /// Only ordinary (level 0) windows qualify; any other level is rejected
    /// without further queries.  With
    /// [`exclude_fullscreen`](RelocationConfig::exclude_fullscreen) set, a
    /// level-0 window whose every space is a fullscreen space is rejected
    /// too.  Any failed query rejects the window.
    pub fn is_relocatable(&self, window: WindowId) -> bool {
        let level = match self.server.window_level(window) {
            Ok(level) => level,
            Err(e) => {
                warn!("failed to get window level for window {}: {}", window, e);
                return false;
            }
        };
        if level != 0 {
            debug!("window {} has level {}, not relocatable", window, level);
            return false;
        }
        if !self.relocation.exclude_fullscreen {
            return true;
        }

        let spaces = match self.server.spaces_for_windows(&[window], SpaceMask::All) {
            Ok(spaces) => spaces,
            Err(e) => {
                warn!("failed to get spaces of window {}: {}", window, e);
                return false;
            }
        };
        if spaces.is_empty() {
            return true;
        }
        for space in spaces {
            match self.server.space_type(space) {
                Ok(SpaceType::Fullscreen) => continue,
                Ok(_) => return true,
                Err(e) => {
                    warn!("failed to get type of space {}: {}", space, e);
                    return false;
                }
            }
        }
        debug!("window {} is only on fullscreen spaces", window);
        false
    }

    //  Relocation

    fn ensure_trusted(&self) -> Result<(), RelocateError> {
        if self.server.is_accessibility_trusted() {
            Ok(())
        } else {
            error!(
                "the process is not trusted; grant accessibility permission in System Settings"
            );
            Err(RelocateError::PermissionDenied)
        }
    }

    /// [`relocate_stray_windows`](Self::relocate_stray_windows) with the
    /// directory's active space as the target.
    pub fn relocate_to_active(
        &self,
        directory: &mut SpaceDirectory,
    ) -> Result<RelocationOutcome, RelocateError> {
        self.ensure_trusted()?;
        Ok(self.relocate_to_active_trusted(directory))
    }

    /// Refresh `directory`, then relocate to its active space.  The
    /// permission check comes first, so an untrusted process does not even
    /// query the topology.
    pub fn refresh_and_relocate(
        &self,
        directory: &mut SpaceDirectory,
    ) -> Result<RelocationOutcome, RelocateError> {
        self.ensure_trusted()?;
        directory.refresh(&self.server);
        Ok(self.relocate_to_active_trusted(directory))
    }

    /// Move every window that is on some non-active space but not on the
    /// active space to `target`, verify, then refresh `directory`.
    ///
    /// Returns [`RelocateError::PermissionDenied`] without touching the
    /// window server or the directory when the process is not trusted.
    /// Windows that did not arrive are reported, not retried.
    pub fn relocate_stray_windows(
        &self,
        directory: &mut SpaceDirectory,
        target: SpaceId,
    ) -> Result<RelocationOutcome, RelocateError> {
        self.ensure_trusted()?;
        Ok(self.relocate_trusted(directory, target))
    }

    fn relocate_to_active_trusted(&self, directory: &mut SpaceDirectory) -> RelocationOutcome {
        match directory.active_space_id() {
            Some(active) => self.relocate_trusted(directory, active),
            None => {
                info!("active space unknown, nothing to relocate");
                RelocationOutcome::NoActiveSpace
            }
        }
    }

    fn relocate_trusted(
        &self,
        directory: &mut SpaceDirectory,
        target: SpaceId,
    ) -> RelocationOutcome {
        let other = directory.other_space_ids();
        debug!("other spaces: {:?}", other);
        if other.is_empty() {
            info!("no other spaces found");
            return RelocationOutcome::NoOtherSpaces;
        }
        let Some(active) = directory.active_space_id() else {
            info!("active space unknown, nothing to relocate");
            return RelocationOutcome::NoActiveSpace;
        };

        let include_invisible = self.relocation.include_invisible;
        let on_other = self.windows_in_spaces(&other, include_invisible);
        let on_active = self.windows_in_spaces(&[active], include_invisible);
        debug!("windows on other spaces: {:?}", on_other);
        debug!("windows on active space {}: {:?}", active, on_active);

        let candidates: Vec<WindowId> = on_other.difference(&on_active).copied().collect();
        let (stray, skipped): (Vec<WindowId>, Vec<WindowId>) = if self.relocation.skip_special_windows {
            candidates.into_iter().partition(|w| self.is_relocatable(*w))
        } else {
            (candidates, Vec::new())
        };
        if !skipped.is_empty() {
            info!("leaving {} special window(s) in place: {:?}", skipped.len(), skipped);
        }
        if stray.is_empty() {
            info!("no windows to move");
            return RelocationOutcome::NoStrayWindows { skipped };
        }
        info!("moving {} window(s) to space {}: {:?}", stray.len(), target, stray);

        // Windows sitting on the target count as arrived even if it is not
        // the active space.
        let sources: Vec<SpaceId> = other.iter().copied().filter(|s| *s != target).collect();
        self.issue_relocation(&stray, target, &sources);

        let unmoved = self.verify_left_sources(&stray, &sources);
        if unmoved.is_empty() {
            info!("successfully moved all {} window(s)", stray.len());
        } else {
            warn!(
                "failed to move {} of {} window(s); unmoved window ids: {:?}",
                unmoved.len(),
                stray.len(),
                unmoved
            );
        }

        directory.refresh_all_spaces(&self.server);
        directory.refresh_active_space_id(&self.server);

        RelocationOutcome::Relocated(RelocationReport {
            target,
            stray,
            skipped,
            unmoved,
        })
    }

    /// Send the configured relocation command(s).  Failures are logged;
    /// verification will report the affected windows.
    fn issue_relocation(&self, windows: &[WindowId], target: SpaceId, sources: &[SpaceId]) {
        match self.relocation.strategy {
            RelocationStrategy::Move => {
                if let Err(e) = self.server.move_windows_to_managed_space(windows, target) {
                    error!("move to space {} failed: {}", target, e);
                }
            }
            RelocationStrategy::Add => {
                if let Err(e) = self.server.add_windows_to_spaces(windows, &[target]) {
                    error!("add to space {} failed: {}", target, e);
                }
            }
            RelocationStrategy::AddRemove => {
                if let Err(e) = self.server.add_windows_to_spaces(windows, &[target]) {
                    error!("add to space {} failed: {}", target, e);
                    return;
                }
                if sources.is_empty() {
                    return;
                }
                if let Err(e) = self.server.remove_windows_from_spaces(windows, sources) {
                    error!("remove from spaces {:?} failed: {}", sources, e);
                }
            }
        }
    }

    /// Poll until none of `windows` is listed on `sources`, or the attempts
    /// run out.  Returns the windows still listed.
    fn verify_left_sources(&self, windows: &[WindowId], sources: &[SpaceId]) -> Vec<WindowId> {
        let mut unmoved = windows.to_vec();
        for attempt in 1..=self.verify.effective_attempts() {
            self.wait();
            match self.query_windows(sources, self.relocation.include_invisible) {
                Ok(still_there) => {
                    unmoved = windows
                        .iter()
                        .copied()
                        .filter(|w| still_there.contains(w))
                        .collect();
                }
                Err(e) => warn!("verification query {} failed: {}", attempt, e),
            }
            if unmoved.is_empty() {
                break;
            }
            debug!("attempt {}: {} window(s) not moved yet", attempt, unmoved.len());
        }
        unmoved
    }

    /// Move exactly `windows` to `target` and check that `target` is among
    /// each window's spaces afterwards.
    ///
    /// The command carries `windows` as given, with no deduplication or
    /// relocatability filtering.  Each window appears once in the report.
    pub fn move_windows_to_space(
        &self,
        windows: &[WindowId],
        target: SpaceId,
    ) -> Result<MoveReport, RelocateError> {
        self.ensure_trusted()?;
        if windows.is_empty() {
            return Ok(MoveReport {
                target,
                moved: Vec::new(),
                unmoved: Vec::new(),
            });
        }

        if let Err(e) = self.server.move_windows_to_managed_space(windows, target) {
            error!("move to space {} failed: {}", target, e);
        }

        let mut moved = Vec::new();
        let mut pending: Vec<WindowId> = Vec::new();
        for w in windows {
            if !pending.contains(w) {
                pending.push(*w);
            }
        }
        for attempt in 1..=self.verify.effective_attempts() {
            self.wait();
            pending.retain(|w| match self.server.spaces_for_windows(&[*w], SpaceMask::All) {
                Ok(spaces) if spaces.contains(&target) => {
                    moved.push(*w);
                    false
                }
                Ok(_) => true,
                Err(e) => {
                    warn!("failed to get spaces of window {}: {}", w, e);
                    true
                }
            });
            if pending.is_empty() {
                break;
            }
            debug!("attempt {}: {} window(s) not on space {} yet", attempt, pending.len(), target);
        }

        if pending.is_empty() {
            info!("moved {} window(s) to space {}", moved.len(), target);
        } else {
            warn!("failed to move window(s) {:?} to space {}", pending, target);
        }
        Ok(MoveReport {
            target,
            moved,
            unmoved: pending,
        })
    }

    fn wait(&self) {
        let interval = self.verify.interval();
        if !interval.is_zero() {
            std::thread::sleep(interval);
        }
    }
}
