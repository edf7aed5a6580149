// Copyright (c) 2025 MovieMind
// Licensed under the MIT License. See LICENSE file for details.

//! Session and token lifecycle.
//!
//! [`SessionManager`] owns the authenticated session: the bearer token, the
//! cached user snapshot, and the token metadata used to compute remaining
//! lifetime without decoding the opaque token. It schedules proactive
//! refreshes, collapses concurrent refresh triggers onto a single network
//! call, and broadcasts [`SessionEvent`]s to any number of observers.
//!
//! ## Invariants
//!
//! - Token and user are present together or not at all; readers see one
//!   atomic snapshot.
//! - At most one refresh timer exists; starting a new one aborts the
//!   previous handle first.
//! - At most one refresh network call is in flight; late arrivals await the
//!   same outcome.
//!
//! The manager never navigates anywhere. Expiry is reported through the
//! subscription interface and the presentation layer decides what to do
//! with it.

pub mod store;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock};
use std::time::Duration;

use serde_json::json;
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use crate::config::{ClientConfig, MIN_PASSWORD_LEN};
use crate::error::ApiError;
use crate::gateway::{BackendClient, Method};
use crate::types::{Token, User, UserCreate, UserLogin};

pub use store::{CredentialStore, StoredSession, TokenMetadata};

/// Capacity of the event channel. Observers that fall this far behind lose
/// the oldest events, which for session state is harmless: the latest event
/// always wins.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Observable session transitions.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A login, registration, or refresh installed a new token. Observers
    /// converge on this state without re-fetching.
    Updated {
        user: User,
        access_token: String,
    },
    /// The session is gone: a refresh failed or the token expired. No
    /// payload. The active surface should navigate to login exactly once.
    Expired,
}

impl SessionEvent {
    /// Format for the structured log line emitted alongside the event.
    fn to_audit_string(&self) -> String {
        match self {
            SessionEvent::Updated { user, .. } => {
                format!("SESSION_UPDATED | user={}", user.username)
            }
            SessionEvent::Expired => "SESSION_EXPIRED".to_string(),
        }
    }
}

struct SessionInner {
    backend: BackendClient,
    credentials: CredentialStore,
    refresh_buffer_secs: i64,
    /// The one atomic snapshot readers observe.
    state: RwLock<Option<StoredSession>>,
    /// The at-most-one scheduled refresh callback.
    refresh_timer: StdMutex<Option<JoinHandle<()>>>,
    /// Serializes refresh network calls.
    refresh_gate: AsyncMutex<()>,
    /// Bumped after every successful refresh, so gate waiters can tell a
    /// refresh completed while they were queued.
    refresh_generation: AtomicU64,
    events: broadcast::Sender<SessionEvent>,
}

/// Injectable, cloneable session service. All clones share one session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

impl SessionManager {
    /// Build a manager from configuration, reloading any persisted session.
    ///
    /// Does not start the refresh timer; call
    /// [`initialize_auto_refresh`](Self::initialize_auto_refresh) once at
    /// startup for that.
    pub fn new(config: &ClientConfig) -> anyhow::Result<Self> {
        let credentials = match &config.credentials_path {
            Some(path) => CredentialStore::at(path),
            None => CredentialStore::default_location()?,
        };
        let backend = BackendClient::new(config);
        Ok(Self::with_parts(
            backend,
            credentials,
            config.refresh_buffer_secs,
        ))
    }

    /// Build a manager from explicit parts. Used by tests to point at a
    /// fixture backend and a throwaway store.
    pub fn with_parts(
        backend: BackendClient,
        credentials: CredentialStore,
        refresh_buffer_secs: i64,
    ) -> Self {
        let state = match credentials.load() {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("CREDENTIALS_LOAD_FAILED | error={:#}", e);
                None
            }
        };
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            inner: Arc::new(SessionInner {
                backend,
                credentials,
                refresh_buffer_secs,
                state: RwLock::new(state),
                refresh_timer: StdMutex::new(None),
                refresh_gate: AsyncMutex::new(()),
                refresh_generation: AtomicU64::new(0),
                events,
            }),
        }
    }

    /// The raw backend client this session talks to.
    pub fn backend(&self) -> &BackendClient {
        &self.inner.backend
    }

    /// Subscribe to session transitions. Dropping the receiver
    /// unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    fn snapshot(&self) -> Option<StoredSession> {
        self.read_state().clone()
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, Option<StoredSession>> {
        // A poisoned lock means a panic elsewhere; the snapshot is still
        // the best state we have.
        self.inner
            .state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, Option<StoredSession>> {
        self.inner
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether a complete session (token + user + metadata) is present.
    pub fn is_authenticated(&self) -> bool {
        self.read_state().is_some()
    }

    /// The current user snapshot, if authenticated.
    pub fn current_user(&self) -> Option<User> {
        self.read_state().as_ref().map(|s| s.user.clone())
    }

    /// The current bearer token, if authenticated.
    pub fn access_token(&self) -> Option<String> {
        self.read_state().as_ref().map(|s| s.access_token.clone())
    }

    /// True when the remaining declared lifetime is within the refresh
    /// buffer. False when no metadata is present.
    pub fn should_refresh(&self) -> bool {
        self.read_state()
            .as_ref()
            .map(|s| s.metadata.remaining_secs() <= self.inner.refresh_buffer_secs)
            .unwrap_or(false)
    }

    /// True when the declared lifetime has fully elapsed, or when no
    /// metadata is present.
    pub fn is_expired(&self) -> bool {
        self.read_state()
            .as_ref()
            .map(|s| s.metadata.remaining_secs() <= 0)
            .unwrap_or(true)
    }

    /// Authenticate with credentials. On success the full session is
    /// replaced atomically, persisted, and the refresh timer restarted.
    /// On any failure the session is left unauthenticated.
    pub async fn login(&self, credentials: &UserLogin) -> Result<Token, ApiError> {
        let result = self
            .inner
            .backend
            .send(
                Method::Post,
                "/auth/login",
                Some(&json!(credentials)),
                None,
                None,
            )
            .await;

        match result {
            Ok(value) => {
                let token = decode_token(value)?;
                self.apply_token(&token);
                tracing::info!("SESSION_LOGIN | user={}", token.user.username);
                Ok(token)
            }
            Err(e) => {
                self.clear_local();
                Err(credential_rejection(e))
            }
        }
    }

    /// Register a new account. Password length is checked locally before
    /// any network call; otherwise the contract matches [`login`](Self::login).
    pub async fn register(&self, data: &UserCreate) -> Result<Token, ApiError> {
        if data.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ApiError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let result = self
            .inner
            .backend
            .send(
                Method::Post,
                "/auth/register",
                Some(&json!(data)),
                None,
                None,
            )
            .await;

        match result {
            Ok(value) => {
                let token = decode_token(value)?;
                self.apply_token(&token);
                tracing::info!("SESSION_REGISTER | user={}", token.user.username);
                Ok(token)
            }
            Err(e) => {
                self.clear_local();
                Err(credential_rejection(e))
            }
        }
    }

    /// Tear down the session. The backend invalidation call is best-effort:
    /// its failure is logged and never surfaced, and local teardown happens
    /// regardless. Does not emit [`SessionEvent::Expired`]; the caller
    /// initiated this and already knows.
    ///
    /// Does not abort an in-flight refresh; teardown waits for it to settle
    /// so its result cannot land after the session is cleared.
    pub async fn logout(&self) {
        if let Some(token) = self.access_token() {
            let result = self
                .inner
                .backend
                .send(
                    Method::Post,
                    "/auth/logout",
                    Some(&json!({})),
                    Some(&token),
                    None,
                )
                .await;
            if let Err(e) = result {
                tracing::warn!("SESSION_LOGOUT_BACKEND_FAILED | error={}", e);
            }
        }
        let _gate = self.inner.refresh_gate.lock().await;
        self.inner
            .refresh_generation
            .fetch_add(1, Ordering::Release);
        self.clear_local();
        tracing::info!("SESSION_LOGOUT");
    }

    /// Fetch a fresh profile snapshot for the authenticated user.
    pub async fn current_user_remote(&self) -> Result<User, ApiError> {
        let token = self.access_token().ok_or(ApiError::AuthExpired)?;
        let value = self
            .inner
            .backend
            .send(Method::Get, "/auth/me", None, Some(&token), None)
            .await?;
        serde_json::from_value(value)
            .map_err(|e| ApiError::Network(format!("Invalid response body: {}", e)))
    }

    /// Exchange the current token for a fresh one.
    ///
    /// Single-flight: concurrent callers collapse onto one network call and
    /// all resolve from its outcome. On success the session is overwritten,
    /// persisted, rescheduled, and [`SessionEvent::Updated`] is emitted. On
    /// failure [`handle_expiry`](Self::handle_expiry) runs and the error is
    /// re-raised.
    pub async fn refresh(&self) -> Result<Token, ApiError> {
        let observed = self.inner.refresh_generation.load(Ordering::Acquire);
        let _gate = self.inner.refresh_gate.lock().await;

        if self.inner.refresh_generation.load(Ordering::Acquire) != observed {
            // A refresh completed while we were queued; reuse its result.
            return self.current_token().ok_or(ApiError::AuthExpired);
        }

        let result = self.refresh_network().await;
        if result.is_ok() {
            self.inner
                .refresh_generation
                .fetch_add(1, Ordering::Release);
        }
        result
    }

    async fn refresh_network(&self) -> Result<Token, ApiError> {
        let Some(token) = self.access_token() else {
            self.handle_expiry();
            return Err(ApiError::AuthExpired);
        };

        let result = self
            .inner
            .backend
            .send(
                Method::Post,
                "/auth/refresh",
                Some(&json!({})),
                Some(&token),
                None,
            )
            .await;

        match result {
            Ok(value) => {
                let token = decode_token(value)?;
                self.apply_token(&token);
                tracing::info!(
                    "SESSION_REFRESHED | user={} expires_in={}s",
                    token.user.username,
                    token.expires_in
                );
                Ok(token)
            }
            Err(e) => {
                tracing::warn!("SESSION_REFRESH_FAILED | error={}", e);
                self.handle_expiry();
                Err(e)
            }
        }
    }

    /// Reconstruct a [`Token`] from the current snapshot.
    fn current_token(&self) -> Option<Token> {
        self.read_state().as_ref().map(|s| Token {
            access_token: s.access_token.clone(),
            token_type: s.metadata.token_type.clone(),
            expires_in: s.metadata.expires_in,
            user: s.user.clone(),
        })
    }

    /// Install a freshly issued token: overwrite the snapshot, persist all
    /// three parts together, restart the refresh timer, notify observers.
    fn apply_token(&self, token: &Token) {
        let session = StoredSession {
            access_token: token.access_token.clone(),
            user: token.user.clone(),
            metadata: TokenMetadata::issued_now(token.expires_in, token.token_type.clone()),
        };

        *self.write_state() = Some(session.clone());

        if let Err(e) = self.inner.credentials.save(&session) {
            // The in-memory session stays valid; only durability suffered.
            tracing::error!("CREDENTIALS_SAVE_FAILED | error={:#}", e);
        }

        self.schedule_refresh(token.expires_in - self.inner.refresh_buffer_secs);

        let event = SessionEvent::Updated {
            user: token.user.clone(),
            access_token: token.access_token.clone(),
        };
        tracing::debug!("{}", event.to_audit_string());
        let _ = self.inner.events.send(event);
    }

    /// Called once at startup when a persisted session exists. Schedules a
    /// timer for the remaining lifetime, or refreshes immediately if the
    /// token is already inside the buffer or past expiry.
    pub fn initialize_auto_refresh(&self) {
        let Some(session) = self.snapshot() else {
            return;
        };
        let delay = session.metadata.remaining_secs() - self.inner.refresh_buffer_secs;
        tracing::debug!(
            "SESSION_AUTO_REFRESH_INIT | remaining={}s delay={}s",
            session.metadata.remaining_secs(),
            delay
        );
        self.schedule_refresh(delay);
    }

    /// Start the one-shot refresh timer, cancelling any previous one.
    ///
    /// A non-positive delay refreshes immediately, fire-and-forget. The
    /// callback logs its outcome and never panics the runtime; a failed
    /// automatic refresh converges through [`handle_expiry`](Self::handle_expiry).
    fn schedule_refresh(&self, delay_secs: i64) {
        let manager = self.clone();
        let handle = tokio::spawn(async move {
            if delay_secs > 0 {
                tokio::time::sleep(Duration::from_secs(delay_secs as u64)).await;
            }
            match manager.refresh().await {
                Ok(_) => tracing::debug!("SESSION_AUTO_REFRESH | outcome=ok"),
                Err(e) => tracing::warn!("SESSION_AUTO_REFRESH | outcome=failed error={}", e),
            }
        });

        let mut timer = lock_timer(&self.inner.refresh_timer);
        if let Some(previous) = timer.replace(handle) {
            previous.abort();
        }
    }

    /// Abort any pending refresh timer.
    fn cancel_refresh_timer(&self) {
        if let Some(handle) = lock_timer(&self.inner.refresh_timer).take() {
            handle.abort();
        }
    }

    /// Converge to a clean logged-out state after expiry or refresh
    /// failure: cancel the timer, clear token + user + metadata together,
    /// and emit [`SessionEvent::Expired`] once. Safe to call repeatedly;
    /// only the transition out of an authenticated state emits.
    pub fn handle_expiry(&self) {
        self.cancel_refresh_timer();
        let was_authenticated = self.write_state().take().is_some();
        if let Err(e) = self.inner.credentials.clear() {
            tracing::warn!("CREDENTIALS_CLEAR_FAILED | error={:#}", e);
        }
        if was_authenticated {
            let event = SessionEvent::Expired;
            tracing::info!("{}", event.to_audit_string());
            let _ = self.inner.events.send(event);
        }
    }

    /// Silent teardown: timer, snapshot, and store, with no event.
    fn clear_local(&self) {
        self.cancel_refresh_timer();
        *self.write_state() = None;
        if let Err(e) = self.inner.credentials.clear() {
            tracing::warn!("CREDENTIALS_CLEAR_FAILED | error={:#}", e);
        }
    }
}

fn lock_timer(
    timer: &StdMutex<Option<JoinHandle<()>>>,
) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
    timer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn decode_token(value: serde_json::Value) -> Result<Token, ApiError> {
    serde_json::from_value(value)
        .map_err(|e| ApiError::Network(format!("Invalid token response: {}", e)))
}

/// Map a backend rejection of credentials to the auth error class, keeping
/// the backend-reported message. Transport failures pass through.
fn credential_rejection(e: ApiError) -> ApiError {
    match e {
        ApiError::Http {
            status: 401 | 403,
            message,
            ..
        } => ApiError::Auth(message),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    fn manager_with_store(dir: &std::path::Path) -> SessionManager {
        let config = ClientConfig::with_base_url("http://127.0.0.1:1"); // never dialed
        SessionManager::with_parts(BackendClient::new(&config), CredentialStore::at(dir), 300)
    }

    fn stored(expires_in: i64, age_secs: i64) -> StoredSession {
        let mut metadata = TokenMetadata::issued_now(expires_in, "bearer");
        metadata.stored_at -= age_secs;
        StoredSession {
            access_token: "tok".to_string(),
            user: serde_json::from_str(
                r#"{"_id":"u1","username":"alex","email":"alex@example.com"}"#,
            )
            .unwrap(),
            metadata,
        }
    }

    #[tokio::test]
    async fn test_unauthenticated_predicates() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_store(dir.path());

        assert!(!manager.is_authenticated());
        assert!(!manager.should_refresh());
        assert!(manager.is_expired());
        assert!(manager.access_token().is_none());
        assert!(manager.current_user().is_none());
    }

    #[tokio::test]
    async fn test_should_refresh_tracks_buffer() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = CredentialStore::at(dir.path());
            store.save(&stored(3600, 0)).unwrap();
        }
        let manager = manager_with_store(dir.path());

        // Fresh token: well outside the 300s buffer.
        assert!(manager.is_authenticated());
        assert!(!manager.should_refresh());
        assert!(!manager.is_expired());
    }

    #[tokio::test]
    async fn test_should_refresh_once_inside_buffer() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = CredentialStore::at(dir.path());
            // 3600s lifetime, 3301s elapsed: 299s remain, inside the buffer.
            store.save(&stored(3600, 3301)).unwrap();
        }
        let manager = manager_with_store(dir.path());

        assert!(manager.should_refresh());
        assert!(!manager.is_expired());
    }

    #[tokio::test]
    async fn test_is_expired_past_lifetime() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = CredentialStore::at(dir.path());
            store.save(&stored(3600, 3600)).unwrap();
        }
        let manager = manager_with_store(dir.path());

        assert!(manager.is_expired());
        assert!(manager.should_refresh());
    }

    #[tokio::test]
    async fn test_handle_expiry_emits_once() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = CredentialStore::at(dir.path());
            store.save(&stored(3600, 0)).unwrap();
        }
        let manager = manager_with_store(dir.path());
        let mut events = manager.subscribe();

        manager.handle_expiry();
        manager.handle_expiry();

        assert!(matches!(events.try_recv(), Ok(SessionEvent::Expired)));
        // The second call must not emit again.
        assert!(events.try_recv().is_err());
        assert!(!manager.is_authenticated());
        assert!(CredentialStore::at(dir.path()).load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_register_rejects_short_password_locally() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_store(dir.path());

        let err = manager
            .register(&UserCreate {
                username: "alex".into(),
                email: "alex@example.com".into(),
                password: "12345".into(),
                first_name: None,
                last_name: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn test_credential_rejection_mapping() {
        let err = credential_rejection(ApiError::Http {
            status: 401,
            code: "401".into(),
            message: "Invalid credentials".into(),
        });
        assert_eq!(err, ApiError::Auth("Invalid credentials".into()));

        let passthrough = credential_rejection(ApiError::Timeout);
        assert_eq!(passthrough, ApiError::Timeout);
    }
}
