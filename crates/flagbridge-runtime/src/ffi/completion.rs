//! One-shot completions for non-blocking native calls
//!
//! A pending completion is registered under an id in the same kind of
//! registry the adapters use. The id and [`completion_callback`] are passed
//! to the native call; the engine invokes the callback exactly once, from any
//! thread, when the operation finishes.

use super::marshal::borrow_bytes;
use super::registry::{guard, CallbackRegistry};
use crate::error::{BridgeError, BridgeResult};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tokio::sync::oneshot;

type Payload = Option<Vec<u8>>;
type Slot = Mutex<Option<oneshot::Sender<Payload>>>;

fn pending_completions() -> &'static CallbackRegistry<Slot> {
    static PENDING: OnceLock<CallbackRegistry<Slot>> = OnceLock::new();
    PENDING.get_or_init(|| CallbackRegistry::new("completion"))
}

/// Removes the pending slot if the completion is dropped unsignalled.
#[derive(Debug)]
struct PendingSlot(u64);

impl Drop for PendingSlot {
    fn drop(&mut self) {
        pending_completions().unregister(self.0);
    }
}

/// Result of a non-blocking native operation
///
/// The payload is whatever buffer the engine attached to the callback, or
/// `None` when it attached nothing.
#[derive(Debug)]
pub struct Completion {
    receiver: oneshot::Receiver<Payload>,
    slot: PendingSlot,
}

impl Completion {
    /// Register a new pending completion.
    pub(crate) fn pending() -> Self {
        let (sender, receiver) = oneshot::channel();
        let id = pending_completions().register(Arc::new(Mutex::new(Some(sender))));
        Self {
            receiver,
            slot: PendingSlot(id),
        }
    }

    /// A completion that is already signalled without a payload.
    pub(crate) fn resolved() -> Self {
        let (sender, receiver) = oneshot::channel();
        // The receiver is held right here, so the send cannot fail.
        let _ = sender.send(None);
        Self {
            receiver,
            slot: PendingSlot(0),
        }
    }

    /// Id to hand to the native call alongside [`completion_callback`]
    pub fn id(&self) -> u64 {
        self.slot.0
    }

    /// Block the current thread until the native side signals.
    ///
    /// Must not be called from inside an async runtime; use [`wait`](Self::wait) there.
    pub fn blocking_wait(self) -> BridgeResult<Option<Vec<u8>>> {
        let Completion { receiver, slot } = self;
        let result = receiver
            .blocking_recv()
            .map_err(|_| BridgeError::CompletionDropped);
        drop(slot);
        result
    }

    /// Wait asynchronously for the native side to signal.
    pub async fn wait(self) -> BridgeResult<Option<Vec<u8>>> {
        let Completion { receiver, slot } = self;
        let result = receiver.await.map_err(|_| BridgeError::CompletionDropped);
        drop(slot);
        result
    }
}

/// Native completion entry point
///
/// # Safety
///
/// A non-null `result` must be valid for reads of `result_len` bytes for the
/// duration of the call.
pub unsafe extern "C" fn completion_callback(id: u64, result: *const u8, result_len: u64) {
    guard("completion", (), || {
        let Some(slot) = pending_completions().unregister(id) else {
            tracing::warn!(registry_id = id, "completion for unknown id");
            return;
        };

        let payload = if result.is_null() {
            None
        } else {
            match unsafe { borrow_bytes(result, result_len) } {
                Ok(bytes) => Some(bytes.to_vec()),
                Err(err) => {
                    tracing::warn!(registry_id = id, error = %err, "bad completion payload");
                    None
                }
            }
        };

        let sender = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(sender) = sender {
            // Receiver may already be gone; nothing to do then.
            let _ = sender.send(payload);
        }
        tracing::trace!(registry_id = id, "completion signalled");
    })
}
