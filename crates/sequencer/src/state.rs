//! Sequencer activity state machine.
//!
//! One lock covers read-and-transition atomically: tearing down an old
//! forwarder must never race the construction of its replacement.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::warn;

use crate::forwarder::TransactionForwarder;

/// Activity mode of this sequencer node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerMode {
    /// Initial state; not sequencing, not forwarding.
    Inactive,
    /// Sequencing locally.
    Active,
    /// Not sequencing; submitted transactions stay queued.
    Paused,
    /// Relaying transactions to a backup sequencer.
    Forwarding,
}

struct StateInner {
    mode: SequencerMode,
    forwarder: Option<Arc<TransactionForwarder>>,
}

/// Mode state plus, while forwarding, the live forwarder instance.
pub struct SequencerState {
    inner: Mutex<StateInner>,
    forward_timeout: Duration,
}

impl SequencerState {
    pub fn new(forward_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(StateInner {
                mode: SequencerMode::Inactive,
                forwarder: None,
            }),
            forward_timeout,
        }
    }

    /// True only in `Active`.
    pub fn is_active(&self) -> bool {
        self.inner.lock().mode == SequencerMode::Active
    }

    pub fn mode(&self) -> SequencerMode {
        self.inner.lock().mode
    }

    /// The live forwarder, while forwarding.
    pub fn forwarder(&self) -> Option<Arc<TransactionForwarder>> {
        self.inner.lock().forwarder.clone()
    }

    /// Switches to local sequencing, tearing down any forwarder first.
    pub fn activate(&self) {
        let mut inner = self.inner.lock();
        if let Some(forwarder) = inner.forwarder.take() {
            forwarder.disable();
        }
        inner.mode = SequencerMode::Active;
    }

    /// Stops sequencing without forwarding, tearing down any forwarder first.
    pub fn pause(&self) {
        let mut inner = self.inner.lock();
        if let Some(forwarder) = inner.forwarder.take() {
            forwarder.disable();
        }
        inner.mode = SequencerMode::Paused;
    }

    /// Starts forwarding to `url`. Re-targeting the current url leaves the
    /// existing forwarder untouched; a different url disables the old
    /// forwarder before the new one is constructed.
    pub fn forward_to(&self, url: &str) -> anyhow::Result<()> {
        let mut inner = self.inner.lock();

        if let Some(forwarder) = &inner.forwarder {
            if forwarder.target() == url {
                warn!("Attempted to update sequencer forward target with existing target: {url}");
                return Ok(());
            }
            forwarder.disable();
        }

        inner.forwarder = Some(Arc::new(TransactionForwarder::new(
            url,
            self.forward_timeout,
        )?));
        inner.mode = SequencerMode::Forwarding;
        Ok(())
    }
}
