//! Device → owner mapping and secondary-transport reconciliation.

use std::collections::{BTreeSet, HashMap};

use studio_ipc::{DeviceRef, ParticipantId};
use tracing::debug;

/// Outcome of reconciling secondary devices against a poll.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SecondaryDiff {
    pub added: Vec<ParticipantId>,
    pub removed: Vec<ParticipantId>,
}

impl SecondaryDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Which participant each known device belongs to.
#[derive(Debug, Default)]
pub struct DeviceMap {
    entries: HashMap<DeviceRef, ParticipantId>,
    /// Whether a poll result has landed in the current live period.
    polled: bool,
}

impl DeviceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a device to its owner, replacing any previous owner.
    pub fn upsert(&mut self, device: DeviceRef, owner: ParticipantId) {
        if let Some(previous) = self.entries.insert(device.clone(), owner.clone()) {
            if previous != owner {
                debug!(%device, %previous, %owner, "Device changed owner");
            }
        }
    }

    /// Forget a device. Returns its owner if it was known.
    pub fn retire(&mut self, device: &DeviceRef) -> Option<ParticipantId> {
        self.entries.remove(device)
    }

    pub fn owner_of(&self, device: &DeviceRef) -> Option<&ParticipantId> {
        self.entries.get(device)
    }

    /// Owner of a device as reported by the meters channel.
    ///
    /// Primary devices must have been announced. A secondary device names its
    /// owner, but is only trusted while no poll has contradicted it.
    pub fn resolve(&self, device: &DeviceRef) -> Option<ParticipantId> {
        match device {
            DeviceRef::Primary(_) => self.entries.get(device).cloned(),
            DeviceRef::Secondary(owner) => {
                if !self.polled || self.entries.contains_key(device) {
                    Some(owner.clone())
                } else {
                    None
                }
            }
        }
    }

    /// Replace the set of secondary devices with those of `active` users.
    ///
    /// Entries present on both sides are left untouched.
    pub fn reconcile_secondary(&mut self, active: &BTreeSet<ParticipantId>) -> SecondaryDiff {
        self.polled = true;

        let known: BTreeSet<ParticipantId> = self
            .entries
            .keys()
            .filter_map(|device| device.secondary_owner().cloned())
            .collect();

        let mut diff = SecondaryDiff::default();
        for owner in known.difference(active) {
            self.entries.remove(&DeviceRef::secondary(owner));
            diff.removed.push(owner.clone());
        }
        for owner in active.difference(&known) {
            self.entries
                .insert(DeviceRef::secondary(owner), owner.clone());
            diff.added.push(owner.clone());
        }
        diff
    }

    /// Start a live period: secondary devices are trusted until polled.
    pub fn begin_live(&mut self) {
        self.polled = false;
    }

    /// End a live period, forgetting every secondary device.
    pub fn end_live(&mut self) {
        self.entries.retain(|device, _| device.is_primary());
        self.polled = false;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.polled = false;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
