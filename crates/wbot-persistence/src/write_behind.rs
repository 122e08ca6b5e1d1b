//! Write-behind buffer between the session owner and the store.
//!
//! Commands stage patches synchronously; a background flusher writes the
//! merged patch after a short debounce so bursts of changes cost one write.

use crate::error::PersistenceResult;
use crate::snapshot::{PersistedSnapshot, SnapshotPatch};
use crate::store::SessionStore;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct WriteBehind {
    store: Arc<dyn SessionStore>,
    pending: Mutex<Option<SnapshotPatch>>,
    /// Serializes store writes against `clear`.
    io: Mutex<()>,
    notify: Notify,
}

impl WriteBehind {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            pending: Mutex::new(None),
            io: Mutex::new(()),
            notify: Notify::new(),
        }
    }

    /// Merge `patch` into the pending buffer and wake the flusher.
    pub fn stage(&self, patch: SnapshotPatch) {
        if patch.is_empty() {
            return;
        }
        {
            let mut pending = self.pending.lock();
            match pending.as_mut() {
                Some(existing) => existing.merge(patch),
                None => *pending = Some(patch),
            }
        }
        self.notify.notify_one();
    }

    /// Write the pending patch. Returns whether anything was written.
    ///
    /// On failure the patch is put back in front of anything staged
    /// meanwhile so the next flush retries it.
    pub fn flush(&self) -> PersistenceResult<bool> {
        let _io = self.io.lock();
        let Some(patch) = self.pending.lock().take() else {
            return Ok(false);
        };
        if let Err(e) = self.store.save(&patch) {
            let mut pending = self.pending.lock();
            let mut restored = patch;
            if let Some(newer) = pending.take() {
                restored.merge(newer);
            }
            *pending = Some(restored);
            return Err(e);
        }
        Ok(true)
    }

    /// Drop anything staged but not yet written.
    pub fn discard(&self) {
        if self.pending.lock().take().is_some() {
            debug!("Discarded staged persistence patch");
        }
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// Read the durable slot.
    #[must_use]
    pub fn load(&self) -> Option<PersistedSnapshot> {
        self.store.load()
    }

    /// Drop staged changes and purge the durable slot.
    pub fn clear(&self) -> PersistenceResult<()> {
        let _io = self.io.lock();
        self.discard();
        self.store.clear()
    }

    /// Flusher loop. Waits for staged changes, debounces, writes.
    /// Performs a final flush when `cancel` fires.
    pub async fn run_flusher(self: Arc<Self>, debounce: Duration, cancel: CancellationToken) {
        info!(debounce_ms = debounce.as_millis() as u64, "Persistence flusher started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.notify.notified() => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(debounce) => {}
            }

            if let Err(e) = self.flush() {
                warn!(error = %e, "Persistence flush failed, will retry on next change");
            }
        }

        match self.flush() {
            Ok(true) => info!("Final persistence flush written"),
            Ok(false) => debug!("Nothing to flush at shutdown"),
            Err(e) => warn!(error = %e, "Final persistence flush failed"),
        }
    }
}
