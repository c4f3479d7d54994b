// Auth manager
// Sole writer of the session store; orchestrates bootstrap, provider
// events, sign-in with role verification, sign-out, and profile updates

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{mpsc, Mutex};

use super::store::{SessionReader, SessionStore};
use super::types::{AuthEvent, Destination, Profile, ProfilePatch, Role, Session, SessionStatus};
use crate::error::AuthError;
use crate::notify::Notifier;
use crate::profile::ProfileRepository;
use crate::provider::IdentityProvider;

/// Receiving end of the navigation-intent signal.
pub struct NavigationIntents {
    rx: mpsc::UnboundedReceiver<Destination>,
}

impl NavigationIntents {
    pub async fn recv(&mut self) -> Option<Destination> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Destination> {
        self.rx.try_recv().ok()
    }
}

/// Orchestrator of the session lifecycle.
///
/// Owns the session store's write side; everything else observes through
/// [`SessionReader`] handles. One instance lives for the whole process.
pub struct AuthManager {
    provider: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileRepository>,
    notifier: Arc<dyn Notifier>,
    store: SessionStore,
    nav_tx: mpsc::UnboundedSender<Destination>,
    // Held across the whole credential-check -> profile-fetch -> commit
    // sequence; a second sign-in must fail fast, not queue behind it.
    sign_in_gate: Mutex<()>,
}

impl AuthManager {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileRepository>,
        notifier: Arc<dyn Notifier>,
    ) -> (Self, NavigationIntents) {
        let (nav_tx, nav_rx) = mpsc::unbounded_channel();
        let manager = Self {
            provider,
            profiles,
            notifier,
            store: SessionStore::new(),
            nav_tx,
            sign_in_gate: Mutex::new(()),
        };
        (manager, NavigationIntents { rx: nav_rx })
    }

    /// A reader handle onto the session store.
    pub fn session(&self) -> SessionReader {
        self.store.reader()
    }

    /// Latest committed session status.
    pub fn status(&self) -> SessionStatus {
        self.store.read()
    }

    /// Check for an existing provider session and settle the store.
    ///
    /// Runs once at startup. Failures here were not triggered by a user
    /// action, so they are logged rather than notified.
    pub async fn bootstrap(&self) {
        self.store.write(SessionStatus::Loading);

        match self.provider.current_session().await {
            Ok(Some(identity)) => match self.profiles.fetch(identity.id).await {
                Ok(profile) => {
                    tracing::info!(user = %identity.id, "Restored existing session");
                    self.store
                        .write(SessionStatus::Authenticated(Session { identity, profile }));
                }
                Err(err) => {
                    tracing::warn!(user = %identity.id, "Profile fetch failed during bootstrap: {}", err);
                    self.store.write(SessionStatus::Anonymous);
                }
            },
            Ok(None) => {
                self.store.write(SessionStatus::Anonymous);
            }
            Err(err) => {
                tracing::warn!("Session check failed during bootstrap: {}", err);
                self.store.write(SessionStatus::Anonymous);
            }
        }
    }

    /// Bootstrap, then apply provider events until the subscription ends.
    ///
    /// The subscription is taken before bootstrap so events raised while
    /// bootstrap is in flight queue behind it instead of racing it; each
    /// event's commit completes before the next event is received.
    pub async fn run(&self) {
        let mut events = self.provider.subscribe();
        self.bootstrap().await;
        while let Some(event) = events.next().await {
            self.apply_event(event).await;
        }
        tracing::debug!("Provider event stream closed");
    }

    async fn apply_event(&self, event: AuthEvent) {
        match event {
            AuthEvent::SignedIn(identity) => match self.profiles.fetch(identity.id).await {
                Ok(profile) => {
                    tracing::debug!(user = %identity.id, "Applying signed-in event");
                    self.store
                        .write(SessionStatus::Authenticated(Session { identity, profile }));
                }
                Err(err) => {
                    // Leave whatever was committed last in place
                    tracing::warn!(user = %identity.id, "Profile fetch failed while applying sign-in event: {}", err);
                }
            },
            AuthEvent::SignedOut => {
                tracing::debug!("Applying signed-out event");
                self.store.write(SessionStatus::Anonymous);
            }
        }
    }

    /// Verify credentials, check the account role, and establish the
    /// session. Returns the role-keyed destination on success.
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
        requested: Role,
    ) -> Result<Destination, AuthError> {
        let Ok(_guard) = self.sign_in_gate.try_lock() else {
            return Err(self.fail(AuthError::OperationInProgress));
        };

        let identity = match self.provider.verify_credentials(email, password).await {
            Ok(identity) => identity,
            Err(err) => return Err(self.fail(err.into())),
        };

        let profile = match self.profiles.fetch(identity.id).await {
            Ok(profile) => profile,
            Err(err) => return Err(self.fail(AuthError::ProfileFetch(err))),
        };

        if profile.role != requested {
            // The provider session was just established; tear it down
            // before reporting the mismatch.
            if let Err(revoke_err) = self.provider.revoke_session().await {
                tracing::warn!("Session revoke after role mismatch failed: {}", revoke_err);
            }
            self.store.write(SessionStatus::Anonymous);
            return Err(self.fail(AuthError::RoleMismatch {
                requested,
                actual: profile.role,
            }));
        }

        let role = profile.role;
        let destination = role.destination();
        self.store
            .write(SessionStatus::Authenticated(Session { identity, profile }));
        self.notifier.success(&format!("Logged in as {}", role));
        let _ = self.nav_tx.send(destination);

        Ok(destination)
    }

    /// Revoke the provider session and settle the store anonymous.
    ///
    /// Calling while already anonymous is a no-op success.
    pub async fn sign_out(&self) -> Result<Destination, AuthError> {
        if !self.store.read().is_authenticated() {
            return Ok(Destination::Home);
        }

        if let Err(err) = self.provider.revoke_session().await {
            // Store keeps its last-known-good state
            return Err(self.fail(err.into()));
        }

        self.store.write(SessionStatus::Anonymous);
        self.notifier.success("Logged out successfully");
        let _ = self.nav_tx.send(Destination::Home);

        Ok(Destination::Home)
    }

    /// Write a partial update to the repository, then merge it into the
    /// cached profile. No re-fetch.
    pub async fn update_profile(&self, patch: ProfilePatch) -> Result<Profile, AuthError> {
        let session = match self.store.read() {
            SessionStatus::Authenticated(session) => session,
            _ => return Err(self.fail(AuthError::NotAuthenticated)),
        };

        if patch.is_empty() {
            return Ok(session.profile);
        }

        if let Err(err) = self.profiles.update(session.identity.id, &patch).await {
            return Err(self.fail(AuthError::ProfileUpdate(err)));
        }

        let profile = session.profile.apply(&patch);
        self.store.write(SessionStatus::Authenticated(Session {
            identity: session.identity,
            profile: profile.clone(),
        }));
        self.notifier.success("Profile updated successfully");

        Ok(profile)
    }

    fn fail(&self, err: AuthError) -> AuthError {
        self.notifier.error(&err.to_string());
        err
    }
}
