//! A flat per-key wake schedule.
//!
//! Kept deliberately simple: the reactor only ever has one outstanding
//! wake-up per peer (the periodic tick), so a linear scan over a handful of
//! peers is cheaper and easier to reason about than a heap.
use std::collections::HashMap;

use iop_net::{LocalDuration, LocalTime};
use iop_p2p::PeerId;

/// Tracks one scheduled wake-up time per peer.
#[derive(Debug, Default)]
pub struct TimeoutManager {
    wakes: HashMap<PeerId, LocalTime>,
}

impl TimeoutManager {
    /// An empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the wake-up time for `peer`.
    pub fn register(&mut self, peer: PeerId, at: LocalTime) {
        self.wakes.insert(peer, at);
    }

    /// Cancel `peer`'s scheduled wake-up, if any.
    pub fn unregister(&mut self, peer: PeerId) {
        self.wakes.remove(&peer);
    }

    /// Move every peer whose wake-up time has passed into `fired`, in no
    /// particular order, removing them from the schedule.
    pub fn wake(&mut self, now: LocalTime, fired: &mut Vec<PeerId>) {
        let due: Vec<PeerId> = self
            .wakes
            .iter()
            .filter(|(_, &at)| at <= now)
            .map(|(&peer, _)| peer)
            .collect();
        for peer in due {
            self.wakes.remove(&peer);
            fired.push(peer);
        }
    }

    /// How long until the next scheduled wake-up, or `None` if nothing is scheduled.
    pub fn next_wake(&self, now: LocalTime) -> Option<LocalDuration> {
        self.wakes.values().map(|&at| at.duration_since(now)).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_only_due_peers() {
        let mut timeouts = TimeoutManager::new();
        let t0 = LocalTime::from_secs(100);
        timeouts.register(1, LocalTime::from_secs(105));
        timeouts.register(2, LocalTime::from_secs(95));

        let mut fired = Vec::new();
        timeouts.wake(t0, &mut fired);

        assert_eq!(fired, vec![2]);
        assert_eq!(timeouts.next_wake(t0), Some(LocalDuration::from_secs(5)));
    }

    #[test]
    fn unregister_cancels() {
        let mut timeouts = TimeoutManager::new();
        timeouts.register(1, LocalTime::from_secs(10));
        timeouts.unregister(1);

        let mut fired = Vec::new();
        timeouts.wake(LocalTime::from_secs(100), &mut fired);
        assert!(fired.is_empty());
    }
}
