// crates/trustx-ledger/src/outbox.rs
// ============================================================================
// Module: Channel Outbox
// Description: Bounded channel handing ledger writes to the reconciler.
// Purpose: Keep ledger I/O off the request path.
// Dependencies: tokio, trustx-core
// ============================================================================

//! ## Overview
//! [`ChannelOutbox`] enqueues writes with `try_send` on a bounded
//! `tokio::sync::mpsc` channel so a full queue fails the attempt immediately
//! instead of blocking a request.

// ============================================================================
// SECTION: Imports
// ============================================================================

use tokio::sync::mpsc;
use tokio::sync::mpsc::Receiver;
use tokio::sync::mpsc::Sender;
use tokio::sync::mpsc::error::TrySendError;
use trustx_core::LedgerOutbox;
use trustx_core::LedgerWriteRequest;
use trustx_core::OutboxError;

// ============================================================================
// SECTION: Outbox
// ============================================================================

/// Default outbox capacity.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 1024;

/// Channel-backed ledger outbox.
#[derive(Debug, Clone)]
pub struct ChannelOutbox {
    /// Sender half.
    sender: Sender<LedgerWriteRequest>,
}

impl ChannelOutbox {
    /// Creates an outbox and the receiver the reconciler drains.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, Receiver<LedgerWriteRequest>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                sender,
            },
            receiver,
        )
    }
}

impl LedgerOutbox for ChannelOutbox {
    fn enqueue(&self, request: LedgerWriteRequest) -> Result<(), OutboxError> {
        self.sender.try_send(request).map_err(|err| match err {
            TrySendError::Full(_) => OutboxError::Full,
            TrySendError::Closed(_) => OutboxError::Closed,
        })
    }
}
