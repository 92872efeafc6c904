//! Lifecycle signals for community records.
//!
//! Receivers are registered per [`Signal`] under a dispatch uid. Connecting
//! with a uid that is already registered replaces the old receiver, so a
//! module can connect its handlers idempotently. Tests disconnect a uid to
//! exercise the provisioning steps in isolation.

use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::model::Community;
use crate::service::{CommunityError, CommunityService};

/// The lifecycle points receivers can hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Before an existing community is updated. An error aborts the save
    /// with nothing written.
    PreSave,
    /// After a community is inserted or updated.
    PostSave,
    /// After a community is deleted.
    PostDelete,
}

/// What happened, as seen by a receiver.
#[derive(Debug)]
pub enum SignalEvent<'a> {
    PreSave {
        community: &'a Community,
    },
    PostSave {
        community: &'a Community,
        created: bool,
    },
    PostDelete {
        community: &'a Community,
    },
}

impl SignalEvent<'_> {
    pub fn signal(&self) -> Signal {
        match self {
            SignalEvent::PreSave { .. } => Signal::PreSave,
            SignalEvent::PostSave { .. } => Signal::PostSave,
            SignalEvent::PostDelete { .. } => Signal::PostDelete,
        }
    }
}

/// Callback type for signal receivers.
pub type Receiver =
    Arc<dyn Fn(&CommunityService, &SignalEvent<'_>) -> Result<(), CommunityError> + Send + Sync>;

#[derive(Clone)]
struct ReceiverEntry {
    signal: Signal,
    dispatch_uid: String,
    receiver: Receiver,
}

/// Registry of signal receivers.
#[derive(Default)]
pub struct Signals {
    entries: RwLock<Vec<ReceiverEntry>>,
}

impl Signals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `receiver` for `signal` under `dispatch_uid`, replacing any
    /// receiver already registered with the same pair.
    pub fn connect<F>(&self, signal: Signal, dispatch_uid: &str, receiver: F)
    where
        F: Fn(&CommunityService, &SignalEvent<'_>) -> Result<(), CommunityError>
            + Send
            + Sync
            + 'static,
    {
        let entry = ReceiverEntry {
            signal,
            dispatch_uid: dispatch_uid.to_string(),
            receiver: Arc::new(receiver),
        };
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        match entries
            .iter_mut()
            .find(|e| e.signal == signal && e.dispatch_uid == dispatch_uid)
        {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
    }

    /// Remove the receiver for `signal` registered under `dispatch_uid`.
    /// Returns true if one was removed.
    pub fn disconnect(&self, signal: Signal, dispatch_uid: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|e| !(e.signal == signal && e.dispatch_uid == dispatch_uid));
        entries.len() < before
    }

    /// Whether a receiver is registered for `signal` under `dispatch_uid`.
    pub fn is_connected(&self, signal: Signal, dispatch_uid: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .any(|e| e.signal == signal && e.dispatch_uid == dispatch_uid)
    }

    /// Deliver an event to every matching receiver in connection order.
    ///
    /// The registry lock is released before receivers run, so a receiver may
    /// save the community again (re-entering `send`). The first error stops
    /// delivery and is returned.
    pub fn send(&self, svc: &CommunityService, event: &SignalEvent<'_>) -> Result<(), CommunityError> {
        let signal = event.signal();
        let matching: Vec<ReceiverEntry> = {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            entries.iter().filter(|e| e.signal == signal).cloned().collect()
        };
        for entry in matching {
            debug!("dispatching {:?} to {}", signal, entry.dispatch_uid);
            (entry.receiver)(svc, event)?;
        }
        Ok(())
    }
}
