// Session store
// Single-writer holder of the current session state

use tokio::sync::watch;

use super::types::SessionStatus;

/// Write side of the session store.
///
/// Owned exclusively by the auth manager; everything else reads through
/// [`SessionReader`] handles. Writes replace the whole value, so readers
/// never observe a partially populated session.
pub struct SessionStore {
    tx: watch::Sender<SessionStatus>,
}

impl SessionStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionStatus::Uninitialized);
        Self { tx }
    }

    /// Commit a new status. Readers observe it on their next read.
    pub fn write(&self, status: SessionStatus) {
        tracing::debug!(status = status.label(), "Session store commit");
        self.tx.send_replace(status);
    }

    /// Latest committed status.
    pub fn read(&self) -> SessionStatus {
        self.tx.borrow().clone()
    }

    /// A new reader handle observing this store.
    pub fn reader(&self) -> SessionReader {
        SessionReader {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Read side of the session store. Cheap to clone and share.
#[derive(Clone)]
pub struct SessionReader {
    rx: watch::Receiver<SessionStatus>,
}

impl SessionReader {
    /// Latest committed status.
    pub fn current(&self) -> SessionStatus {
        self.rx.borrow().clone()
    }

    /// Wait for the next commit after this call.
    ///
    /// Returns `None` if the store has been dropped.
    pub async fn changed(&mut self) -> Option<SessionStatus> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until bootstrap has settled the store into `Anonymous` or
    /// `Authenticated`. Protected content must not render before this.
    pub async fn settled(&mut self) -> SessionStatus {
        loop {
            let status = self.rx.borrow_and_update().clone();
            if status.is_settled() {
                return status;
            }
            if self.rx.changed().await.is_err() {
                return status;
            }
        }
    }
}
