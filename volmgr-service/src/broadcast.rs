// SPDX-License-Identifier: GPL-3.0-only

//! Channel-backed broadcaster.
//!
//! The controller emits state-change notifications through the
//! [`Broadcaster`] contract; this implementation fans them out on a tokio
//! broadcast channel. The daemon forwards the channel to a D-Bus signal,
//! keeping the transport outside the state machine.

use tokio::sync::broadcast;
use tracing::debug;

use volmgr_contracts::Broadcaster;
use volmgr_types::BroadcastCode;

/// One emitted notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastEvent {
    pub code: BroadcastCode,
    pub message: String,
    pub sticky: bool,
}

pub struct ChannelBroadcaster {
    sender: broadcast::Sender<BroadcastEvent>,
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.sender.subscribe()
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn broadcast(&self, code: BroadcastCode, message: &str, sticky: bool) {
        debug!(code = code.code(), message, "broadcast");
        // Nobody listening is fine; the channel just drops the event.
        let _ = self.sender.send(BroadcastEvent {
            code,
            message: message.to_string(),
            sticky,
        });
    }
}
