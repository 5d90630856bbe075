//! Live-update gate between the listing loop and the details loop.
//!
//! Restarting the details loop reorders and refills the visible list. With
//! live updates off, membership changes are held here until the user asks
//! for them, while the displayed page stays put.

use crate::event::IdChange;
use joblist_types::JobIdSet;

/// What the coordinator should do with an offered change.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Apply now: swap the active set and restart the details loop.
    Apply(IdChange),
    /// Held as pending; the display is untouched.
    Buffered,
    /// Same membership as what is displayed; nothing to do.
    Unchanged,
}

/// Applies or buffers membership changes according to the live-update flag.
#[derive(Debug, Clone, Default)]
pub struct LiveUpdateGate {
    live: bool,
    pending: Option<IdChange>,
}

impl LiveUpdateGate {
    pub fn new(live_updates_enabled: bool) -> Self {
        Self {
            live: live_updates_enabled,
            pending: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    /// The buffered change, if any.
    pub fn pending(&self) -> Option<&IdChange> {
        self.pending.as_ref()
    }

    pub fn pending_ids(&self) -> Option<&JobIdSet> {
        self.pending.as_ref().map(|p| &p.ids)
    }

    /// Whether a pending change would alter what is displayed.
    pub fn has_pending_diff(&self, active: &JobIdSet) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|p| !p.ids.same_members(active))
    }

    /// Decides what happens to a new membership.
    ///
    /// A change matching the active set also discards any older pending
    /// change, since the server has come back to what is displayed.
    pub fn offer(&mut self, active: &JobIdSet, change: IdChange) -> GateDecision {
        if change.ids.same_members(active) {
            self.pending = None;
            return GateDecision::Unchanged;
        }
        if self.live {
            self.pending = None;
            GateDecision::Apply(change)
        } else {
            self.pending = Some(change);
            GateDecision::Buffered
        }
    }

    /// Takes the pending change for manual application, clearing the slot.
    pub fn apply_pending(&mut self) -> Option<IdChange> {
        self.pending.take()
    }

    /// Flips the live-update flag. Turning it on releases the pending change,
    /// which the listing loop will not report again while it stays current.
    pub fn set_live(&mut self, enabled: bool) -> Option<IdChange> {
        self.live = enabled;
        if enabled { self.pending.take() } else { None }
    }

    /// Drops any pending change, e.g. after navigating to another page.
    pub fn clear(&mut self) {
        self.pending = None;
    }
}
