use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::address::Address;
use crate::channel::ChannelKey;

/// Bookkeeping shared by lookups and discovery responses.
///
/// Both sets live in one struct behind one mutex so that "is this lookup
/// still pending" and "is this address already connected" are decided
/// together.
#[derive(Debug, Default)]
pub(crate) struct BroadcastState {
    pending: HashSet<ChannelKey>,
    connections: HashSet<Address>,
    stopped: bool,
}

/// What to do with an availability announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    /// No lookup for the channel is pending.
    Unsolicited,
    /// The lookup was answered by an address that is already connected;
    /// the caller adds the channel to that connection.
    AlreadyConnected,
    Stopped,
    /// The address was reserved; the caller must connect to it.
    Connect,
}

impl BroadcastState {
    /// Marks `channel` as looked up. Returns `false` when a lookup is
    /// already pending or the broadcaster has stopped.
    pub(crate) fn begin_lookup(&mut self, channel: &ChannelKey) -> bool {
        !self.stopped && self.pending.insert(channel.clone())
    }

    pub(crate) fn admit(&mut self, channel: &ChannelKey, address: &Address) -> Admission {
        if self.stopped {
            return Admission::Stopped;
        }
        if !self.pending.remove(channel) {
            return Admission::Unsolicited;
        }
        if !self.connections.insert(address.clone()) {
            return Admission::AlreadyConnected;
        }
        Admission::Connect
    }

    /// Forgets `address` after a failed connection attempt or once its
    /// connection is lost.
    pub(crate) fn release(&mut self, address: &Address) {
        self.connections.remove(address);
    }

    /// Returns `false` if already stopped.
    pub(crate) fn stop(&mut self) -> bool {
        if self.stopped {
            return false;
        }
        self.stopped = true;
        self.connections.clear();
        true
    }

    pub(crate) fn is_pending(&self, channel: &ChannelKey) -> bool {
        self.pending.contains(channel)
    }

    pub(crate) fn is_connected(&self, address: &Address) -> bool {
        self.connections.contains(address)
    }
}

pub(crate) fn lock(state: &Mutex<BroadcastState>) -> MutexGuard<'_, BroadcastState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
