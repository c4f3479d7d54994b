// Test doubles for the auth core
// Available in test builds and behind the `test-utils` feature

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Notify, RwLock};
use uuid::Uuid;

use crate::auth::types::{AuthEvent, Identity, Profile, ProfilePatch, Role};
use crate::notify::Notifier;
use crate::profile::{ProfileRepository, RepositoryError};
use crate::provider::{EventHub, EventStream, IdentityProvider, ProviderError};

/// A fresh identity with a random id.
pub fn test_identity(email: &str) -> Identity {
    Identity {
        id: Uuid::new_v4(),
        email: email.to_string(),
    }
}

/// A profile paired with the given identity.
pub fn test_profile(identity: &Identity, name: &str, role: Role) -> Profile {
    Profile {
        id: identity.id,
        name: name.to_string(),
        email: identity.email.clone(),
        role,
        avatar_url: None,
        bio: None,
    }
}

/// Scriptable in-memory identity provider.
///
/// Does not emit events on its own; tests push them through [`emit`]
/// so event timing stays deterministic.
///
/// [`emit`]: MockIdentityProvider::emit
pub struct MockIdentityProvider {
    accounts: DashMap<String, (String, Identity)>,
    session: RwLock<Option<Identity>>,
    events: EventHub,
    verify_gate: Option<Arc<Notify>>,
    session_gate: Option<Arc<Notify>>,
    fail_revoke: AtomicBool,
    pub verify_calls: AtomicUsize,
    pub revoke_calls: AtomicUsize,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            session: RwLock::new(None),
            events: EventHub::new(),
            verify_gate: None,
            session_gate: None,
            fail_revoke: AtomicBool::new(false),
            verify_calls: AtomicUsize::new(0),
            revoke_calls: AtomicUsize::new(0),
        }
    }

    /// Register an account the provider will accept.
    pub fn with_account(self, email: &str, password: &str, identity: Identity) -> Self {
        self.accounts
            .insert(email.to_string(), (password.to_string(), identity));
        self
    }

    /// Pretend a provider session already exists at startup.
    pub fn with_session(mut self, identity: Identity) -> Self {
        self.session = RwLock::new(Some(identity));
        self
    }

    /// Park `verify_credentials` until the returned handle is notified.
    pub fn hold_verify(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.verify_gate = Some(gate.clone());
        (self, gate)
    }

    /// Park `current_session` until the returned handle is notified.
    pub fn hold_current_session(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.session_gate = Some(gate.clone());
        (self, gate)
    }

    pub fn set_fail_revoke(&self, fail: bool) {
        self.fail_revoke.store(fail, Ordering::SeqCst);
    }

    /// Push a provider event to all subscribers.
    pub fn emit(&self, event: AuthEvent) {
        self.events.emit(event);
    }
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, ProviderError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.verify_gate {
            gate.notified().await;
        }

        let identity = self
            .accounts
            .get(email)
            .filter(|entry| entry.value().0 == password)
            .map(|entry| entry.value().1.clone())
            .ok_or(ProviderError::InvalidCredentials)?;

        let mut session = self.session.write().await;
        *session = Some(identity.clone());
        Ok(identity)
    }

    async fn current_session(&self) -> Result<Option<Identity>, ProviderError> {
        if let Some(gate) = &self.session_gate {
            gate.notified().await;
        }
        let session = self.session.read().await;
        Ok(session.clone())
    }

    async fn revoke_session(&self) -> Result<(), ProviderError> {
        self.revoke_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_revoke.load(Ordering::SeqCst) {
            return Err(ProviderError::Unexpected {
                status: 503,
                message: "provider unavailable".to_string(),
            });
        }
        let mut session = self.session.write().await;
        *session = None;
        Ok(())
    }

    fn subscribe(&self) -> EventStream {
        self.events.subscribe()
    }
}

/// In-memory profile store with call accounting.
pub struct MockProfileRepository {
    profiles: DashMap<Uuid, Profile>,
    fail_fetch: AtomicBool,
    fail_update: AtomicBool,
    pub fetch_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
    updates: Mutex<Vec<(Uuid, ProfilePatch)>>,
}

impl MockProfileRepository {
    pub fn new() -> Self {
        Self {
            profiles: DashMap::new(),
            fail_fetch: AtomicBool::new(false),
            fail_update: AtomicBool::new(false),
            fetch_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            updates: Mutex::new(Vec::new()),
        }
    }

    pub fn with_profile(self, profile: Profile) -> Self {
        self.profiles.insert(profile.id, profile);
        self
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_update(&self, fail: bool) {
        self.fail_update.store(fail, Ordering::SeqCst);
    }

    /// Updates received so far, in call order.
    pub fn recorded_updates(&self) -> Vec<(Uuid, ProfilePatch)> {
        self.updates.lock().unwrap().clone()
    }
}

impl Default for MockProfileRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileRepository for MockProfileRepository {
    async fn fetch(&self, id: Uuid) -> Result<Profile, RepositoryError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unexpected {
                status: 500,
                message: "repository unavailable".to_string(),
            });
        }
        self.profiles
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(RepositoryError::NotFound(id))
    }

    async fn update(&self, id: Uuid, patch: &ProfilePatch) -> Result<(), RepositoryError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.updates.lock().unwrap().push((id, patch.clone()));
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unexpected {
                status: 500,
                message: "repository unavailable".to_string(),
            });
        }
        match self.profiles.get_mut(&id) {
            Some(mut entry) => {
                let merged = entry.value().apply(patch);
                *entry.value_mut() = merged;
                Ok(())
            }
            None => Err(RepositoryError::NotFound(id)),
        }
    }
}

/// Notifier that records every message for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    successes: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn successes(&self) -> Vec<String> {
        self.successes.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn success(&self, message: &str) {
        self.successes.lock().unwrap().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}
