use crate::peer::TrackKind;
use duet_core::ConnectionId;
use std::collections::HashSet;

/// Which stream a display slot shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Local,
    Remote(ConnectionId),
}

/// Main/mini display assignment.
///
/// Local is main until a remote stream with at least one track exists; then
/// remote is main and local moves to mini. The assignment is derived from the
/// current facts only, so the order in which tracks and membership events
/// arrive does not matter and repeating a fact changes nothing.
#[derive(Debug, Default)]
pub struct MediaLayout {
    local_attached: bool,
    remote_peer: Option<ConnectionId>,
    remote_tracks: HashSet<TrackKind>,
    primary: Option<Slot>,
    mini: Option<Slot>,
}

impl MediaLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach_local(&mut self) -> bool {
        self.local_attached = true;
        self.reconcile()
    }

    /// A track from `peer` arrived. Tracks from a peer other than the current
    /// remote one replace it.
    pub fn remote_track_added(&mut self, peer: ConnectionId, kind: TrackKind) -> bool {
        if self.remote_peer != Some(peer) {
            self.remote_peer = Some(peer);
            self.remote_tracks.clear();
        }
        self.remote_tracks.insert(kind);
        self.reconcile()
    }

    /// Drops the remote stream if it belongs to `peer`.
    pub fn remote_removed(&mut self, peer: ConnectionId) -> bool {
        if self.remote_peer != Some(peer) {
            return false;
        }
        self.remote_peer = None;
        self.remote_tracks.clear();
        self.reconcile()
    }

    pub fn reset(&mut self) -> bool {
        self.local_attached = false;
        self.remote_peer = None;
        self.remote_tracks.clear();
        self.reconcile()
    }

    /// Recomputes the slots. Returns true only if an assignment changed.
    fn reconcile(&mut self) -> bool {
        let local = self.local_attached.then_some(Slot::Local);
        let (primary, mini) = match self.remote_peer {
            Some(peer) if !self.remote_tracks.is_empty() => (Some(Slot::Remote(peer)), local),
            _ => (local, None),
        };

        let changed = primary != self.primary || mini != self.mini;
        self.primary = primary;
        self.mini = mini;
        changed
    }

    pub fn primary(&self) -> Option<Slot> {
        self.primary
    }

    pub fn mini(&self) -> Option<Slot> {
        self.mini
    }

    pub fn has_remote(&self) -> bool {
        matches!(self.primary, Some(Slot::Remote(_)))
    }
}
