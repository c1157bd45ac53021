//! Space topology snapshot.
//!
//! The [`SpaceDirectory`] holds the authoritative view of which spaces
//! exist, how they are ordered, which screen owns each of them, which space
//! every screen is showing and which space is active (shown on the primary
//! screen).
//!
//! The snapshot is rebuilt wholesale from the window server on every
//! refresh.  A refresh that cannot complete leaves the previous snapshot in
//! place; no operation here ever fails outright.

use crate::command::{ScreenUuid, SpaceId, SpaceIndex};
use crate::traits::WindowServer;
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashMap;

/// The part of a snapshot rebuilt by
/// [`refresh_all_spaces`](SpaceDirectory::refresh_all_spaces).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
struct Topology {
    /// Every space with its global 1-based index, in enumeration order.
    ordered: Vec<(SpaceId, SpaceIndex)>,
    /// `screen -> spaces owned by that screen`, in enumeration order.
    screen_spaces: HashMap<ScreenUuid, Vec<SpaceId>>,
    /// The space shown on each screen, in screen enumeration order.
    visible: Vec<SpaceId>,
}

/// Queryable snapshot of space topology and the active space.
///
/// Starts empty.  Call [`refresh`](Self::refresh) (or
/// [`refresh_all_spaces`](Self::refresh_all_spaces) followed by
/// [`update_active_space_index`](Self::update_active_space_index)) before
/// relying on any query.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SpaceDirectory {
    active_space: Option<SpaceId>,
    active_index: SpaceIndex,
    #[serde(flatten)]
    topology: Topology,
}

impl SpaceDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    //  Refresh

    /// Rebuild the topology, then resolve the active space and its index.
    pub fn refresh<W: WindowServer>(&mut self, server: &W) {
        self.refresh_all_spaces(server);
        self.update_active_space_index(server);
    }

    /// Store the space shown on the primary screen as the active space.
    ///
    /// If the primary screen, its identity, or its current space cannot be
    /// resolved, the previous active space is kept.
    pub fn refresh_active_space_id<W: WindowServer>(&mut self, server: &W) {
        let screen = match server.main_screen_uuid() {
            Ok(Some(screen)) => screen,
            Ok(None) => {
                warn!("no primary screen; keeping active space {:?}", self.active_space);
                return;
            }
            Err(e) => {
                warn!("failed to resolve primary screen: {}", e);
                return;
            }
        };
        match server.current_space(&screen) {
            Ok(space) => {
                debug!("active space on {}: {}", screen, space);
                self.active_space = Some(space);
            }
            Err(e) => warn!("failed to query current space of {}: {}", screen, e),
        }
    }

    /// Rebuild the ordered space list, the per-screen lists and the visible
    /// spaces from the window server's topology.
    ///
    /// Indices start at 1 and increase across all screens in enumeration
    /// order.  A screen reported under the `"Main"` sentinel is filed under
    /// the primary screen's real identity when that can be resolved.  If the
    /// topology query fails, the previous snapshot is kept.
    pub fn refresh_all_spaces<W: WindowServer>(&mut self, server: &W) {
        let displays = match server.managed_display_spaces() {
            Ok(displays) => displays,
            Err(e) => {
                warn!("failed to query space topology, keeping previous snapshot: {}", e);
                return;
            }
        };

        // Resolved at most once per refresh.
        let mut main_uuid: Option<Option<ScreenUuid>> = None;

        let mut topology = Topology::default();
        let mut index = SpaceIndex::FIRST;
        for display in displays {
            let screen = if display.display_identifier.is_main_sentinel() {
                let resolved = main_uuid.get_or_insert_with(|| match server.main_screen_uuid() {
                    Ok(uuid) => uuid,
                    Err(e) => {
                        warn!("failed to resolve primary screen for \"Main\" display: {}", e);
                        None
                    }
                });
                resolved
                    .clone()
                    .unwrap_or_else(|| display.display_identifier.clone())
            } else {
                display.display_identifier.clone()
            };

            for space in &display.spaces {
                topology.ordered.push((*space, index));
                topology
                    .screen_spaces
                    .entry(screen.clone())
                    .or_default()
                    .push(*space);
                index = index.next();
            }
            topology.visible.push(display.current_space);
        }

        debug!(
            "refreshed {} space(s) across {} screen(s)",
            topology.ordered.len(),
            topology.visible.len()
        );
        self.topology = topology;
    }

    /// Refresh the active space, then look up its index.
    ///
    /// Falls back to index 1 when the active space is not in the ordered
    /// list.
    pub fn update_active_space_index<W: WindowServer>(&mut self, server: &W) {
        self.refresh_active_space_id(server);
        self.active_index = self
            .active_space
            .and_then(|space| self.index_of(space))
            .unwrap_or_else(|| {
                debug!("active space {:?} not in directory, defaulting index", self.active_space);
                SpaceIndex::FIRST
            });
    }

    //  Queries

    /// Every space except the active one, in list order.
    pub fn other_space_ids(&self) -> Vec<SpaceId> {
        self.topology
            .ordered
            .iter()
            .map(|(space, _)| *space)
            .filter(|space| Some(*space) != self.active_space)
            .collect()
    }

    /// The active space, once it has been resolved.
    pub fn active_space_id(&self) -> Option<SpaceId> {
        self.active_space
    }

    pub fn active_space_index(&self) -> SpaceIndex {
        self.active_index
    }

    /// Every space with its index, in enumeration order.
    pub fn spaces(&self) -> &[(SpaceId, SpaceIndex)] {
        &self.topology.ordered
    }

    /// `screen -> spaces` for every screen in the snapshot.
    pub fn screen_spaces(&self) -> &HashMap<ScreenUuid, Vec<SpaceId>> {
        &self.topology.screen_spaces
    }

    /// The space shown on each screen.
    pub fn visible_spaces(&self) -> &[SpaceId] {
        &self.topology.visible
    }

    pub fn index_of(&self, space: SpaceId) -> Option<SpaceIndex> {
        self.topology
            .ordered
            .iter()
            .find(|(s, _)| *s == space)
            .map(|(_, index)| *index)
    }

    pub fn space_at(&self, index: SpaceIndex) -> Option<SpaceId> {
        self.topology
            .ordered
            .iter()
            .find(|(_, i)| *i == index)
            .map(|(space, _)| *space)
    }

    /// Number of spaces in the snapshot.
    pub fn len(&self) -> usize {
        self.topology.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topology.ordered.is_empty()
    }
}
