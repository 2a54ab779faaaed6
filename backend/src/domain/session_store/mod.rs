//! Session and role synchroniser.
//!
//! [`SessionStore`] mirrors the hosted auth session, looks up the matching
//! profile, derives a [`Role`], and fans merged snapshots out to listeners.
//! Identity changes are shown as loading transitions that stay visible for
//! at least a configured floor.
//!
//! Each notification is classified on the listener task in delivery order
//! and tagged with an increasing token. Profile lookups run concurrently; a
//! lookup that finishes after a newer notification was classified is
//! discarded.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::port_errors::map_session_error;
use crate::domain::{AuthChange, AuthUser, Error, Profile, Role, Session, UserId};

mod classify;
mod loading_gate;
mod runtime;
mod subscribers;

use classify::classify;
use loading_gate::{LoadingGate, Settle};
pub use runtime::{
    DEFAULT_MIN_LOADING, DEFAULT_SIGN_OUT_GRACE, DelayScheduler, DelayedCallback,
    ScheduledCallback, SessionStoreConfig, SessionStorePorts, SessionStoreRuntime,
    TokioScheduler,
};
use subscribers::Subscribers;
pub use subscribers::{Listener, Subscription};

/// Snapshot of the synchronised session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    /// Session mirrored from the auth service.
    pub session: Option<Session>,
    /// Identity carried by the session.
    pub user: Option<AuthUser>,
    /// Profile looked up for the identity.
    pub profile: Option<Profile>,
    /// Role derived from identity and profile.
    pub role: Role,
    /// Whether a loading transition is visible.
    pub loading: bool,
    /// Whether at least one notification has been fully processed.
    pub is_initialized: bool,
}

struct StoreState {
    session: Option<Session>,
    user: Option<AuthUser>,
    profile: Option<Profile>,
    role: Role,
    is_initialized: bool,
    gate: LoadingGate,
    last_user: Option<UserId>,
    latest_token: u64,
    sign_out_fallback: Option<ScheduledCallback>,
}

impl StoreState {
    fn snapshot(&self) -> AuthState {
        AuthState {
            session: self.session.clone(),
            user: self.user.clone(),
            profile: self.profile.clone(),
            role: self.role,
            loading: self.gate.is_loading(),
            is_initialized: self.is_initialized,
        }
    }

    fn cancel_sign_out_fallback(&mut self) {
        if let Some(fallback) = self.sign_out_fallback.take() {
            fallback.cancel();
        }
    }
}

struct Inner {
    ports: SessionStorePorts,
    runtime: SessionStoreRuntime,
    config: SessionStoreConfig,
    state: Mutex<StoreState>,
    subscribers: Arc<Mutex<Subscribers>>,
    dispatch: Mutex<()>,
}

/// Process-wide session/role store.
///
/// Cloning is cheap; every clone shares the same state and listeners.
///
/// # Examples
/// ```
/// use std::sync::Arc;
///
/// use portal::domain::ports::{FixtureProfileRepository, FixtureSessionSource};
/// use portal::domain::{
///     AdminIdentifierPolicy, Role, SessionStore, SessionStoreConfig, SessionStorePorts,
///     SessionStoreRuntime,
/// };
///
/// let store = SessionStore::new(
///     SessionStorePorts::new(
///         Arc::new(FixtureSessionSource::default()),
///         Arc::new(FixtureProfileRepository::default()),
///         Arc::new(AdminIdentifierPolicy::new("")),
///     ),
///     SessionStoreRuntime::default(),
///     SessionStoreConfig::default(),
/// );
/// let state = store.state();
/// assert!(state.loading);
/// assert_eq!(state.role, Role::Guest);
/// ```
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl SessionStore {
    /// Build a store that is loading and signed out until the first
    /// notification is processed.
    pub fn new(
        ports: SessionStorePorts,
        runtime: SessionStoreRuntime,
        config: SessionStoreConfig,
    ) -> Self {
        let now = runtime.clock.utc();
        let state = StoreState {
            session: None,
            user: None,
            profile: None,
            role: Role::Guest,
            is_initialized: false,
            gate: LoadingGate::loading_since(now, config.min_loading),
            last_user: None,
            latest_token: 0,
            sign_out_fallback: None,
        };
        Self {
            inner: Arc::new(Inner {
                ports,
                runtime,
                config,
                state: Mutex::new(state),
                subscribers: Arc::new(Mutex::new(Subscribers::default())),
                dispatch: Mutex::new(()),
            }),
        }
    }

    /// Current snapshot.
    pub fn state(&self) -> AuthState {
        lock(&self.inner.state).snapshot()
    }

    /// Register `listener` and call it once with the current snapshot.
    pub fn subscribe(&self, listener: impl Fn(&AuthState) + Send + Sync + 'static) -> Subscription {
        let listener: Listener = Arc::new(listener);
        let id = lock(&self.inner.subscribers).add(Arc::clone(&listener));
        let subscription = Subscription::new(id, &self.inner.subscribers);
        listener(&self.state());
        subscription
    }

    /// Subscribe to the session source and process notifications until the
    /// source closes.
    ///
    /// The stored session is read first and announced as the initial
    /// notification. A failed read counts as no session.
    pub fn spawn_listener(&self) -> JoinHandle<()> {
        let store = self.clone();
        let mut changes = self.inner.ports.source.subscribe();
        tokio::spawn(async move {
            let initial = match store.inner.ports.source.current_session().await {
                Ok(session) => session,
                Err(error) => {
                    warn!(%error, "stored session could not be read; starting signed out");
                    None
                }
            };
            store.dispatch(AuthChange::initial(initial));

            loop {
                match changes.recv().await {
                    Ok(change) => store.dispatch(change),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "session listener lagged; notifications dropped");
                    }
                    Err(RecvError::Closed) => {
                        debug!("session source closed");
                        break;
                    }
                }
            }
        })
    }

    /// Process one notification to completion on the current task.
    pub async fn apply(&self, change: AuthChange) {
        let token = self.begin_event(&change);
        self.finish_event(token, change).await;
    }

    /// End the current session.
    ///
    /// Loading becomes visible immediately. State is reset by the sign-out
    /// notification; if none arrives within the grace period, loading is
    /// cleared anyway. A failed call clears loading and returns the error.
    pub async fn sign_out(&self) -> Result<(), Error> {
        let now = self.inner.runtime.clock.utc();
        let token = {
            let mut state = lock(&self.inner.state);
            state.cancel_sign_out_fallback();
            state.gate.begin(now, self.inner.config.min_loading);
            state.latest_token
        };
        self.publish();
        info!("signing out");

        if let Err(error) = self.inner.ports.source.sign_out().await {
            warn!(%error, "sign-out failed");
            let changed = lock(&self.inner.state).gate.force_idle();
            if changed {
                self.publish();
            }
            return Err(map_session_error(error));
        }

        let weak = Arc::downgrade(&self.inner);
        let fallback = self.inner.runtime.scheduler.schedule(
            self.inner.config.sign_out_grace,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    SessionStore { inner }.expire_sign_out(token);
                }
            }),
        );
        let mut state = lock(&self.inner.state);
        if state.latest_token == token {
            state.cancel_sign_out_fallback();
            state.sign_out_fallback = Some(fallback);
        } else {
            drop(state);
            fallback.cancel();
        }
        Ok(())
    }

    fn dispatch(&self, change: AuthChange) {
        let token = self.begin_event(&change);
        let store = self.clone();
        tokio::spawn(async move {
            store.finish_event(token, change).await;
        });
    }

    /// Classify a notification and start or skip its loading transition.
    fn begin_event(&self, change: &AuthChange) -> u64 {
        let now = self.inner.runtime.clock.utc();
        let incoming = change.session.as_ref().map(|session| session.user().id().clone());
        let (token, became_loading) = {
            let mut state = lock(&self.inner.state);
            let transition = classify(
                change.kind,
                state.last_user.as_ref(),
                incoming.as_ref(),
                self.inner.config.min_loading,
            );
            debug!(
                event = %change.kind,
                show = transition.show,
                floor_ms = u64::try_from(transition.floor.as_millis()).unwrap_or(u64::MAX),
                "classified session change"
            );
            state.last_user = incoming;
            state.latest_token = state.latest_token.wrapping_add(1);
            state.cancel_sign_out_fallback();
            let became_loading = if transition.show {
                state.gate.begin(now, transition.floor)
            } else {
                state.gate.override_floor(transition.floor);
                false
            };
            (state.latest_token, became_loading)
        };
        if became_loading {
            self.publish();
        }
        token
    }

    /// Resolve profile and role, publish, and settle loading.
    async fn finish_event(&self, token: u64, change: AuthChange) {
        let user = change.session.as_ref().map(|session| session.user().clone());
        let profile = match &user {
            Some(user) => self.lookup_profile(user.id()).await,
            None => None,
        };
        let role = self
            .inner
            .ports
            .policy
            .role_for(user.as_ref(), profile.as_ref());
        let now = self.inner.runtime.clock.utc();

        let settle = {
            let mut state = lock(&self.inner.state);
            if state.latest_token != token {
                debug!(
                    token,
                    latest = state.latest_token,
                    "discarding stale profile lookup"
                );
                return;
            }
            state.session = change.session;
            state.user = user;
            state.profile = profile;
            state.role = role;
            state.is_initialized = true;
            state.gate.settle(now)
        };
        debug!(event = %change.kind, %role, "session synchronised");
        self.publish();

        if let Settle::Wait {
            remaining,
            generation,
        } = settle
        {
            self.schedule_clear(remaining, generation);
        }
    }

    async fn lookup_profile(&self, user_id: &UserId) -> Option<Profile> {
        match self.inner.ports.profiles.find_by_user_id(user_id).await {
            Ok(profile) => profile,
            Err(error) => {
                warn!(%error, %user_id, "profile lookup failed; treating user as guest");
                None
            }
        }
    }

    fn schedule_clear(&self, remaining: Duration, generation: u64) {
        let weak = Arc::downgrade(&self.inner);
        let handle = self.inner.runtime.scheduler.schedule(
            remaining,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    SessionStore { inner }.expire_loading(generation);
                }
            }),
        );
        let stale = lock(&self.inner.state).gate.attach_pending(generation, handle);
        if let Some(stale) = stale {
            stale.cancel();
        }
    }

    fn expire_loading(&self, generation: u64) {
        let changed = lock(&self.inner.state).gate.expire(generation);
        if changed {
            self.publish();
        }
    }

    fn expire_sign_out(&self, token: u64) {
        let changed = {
            let mut state = lock(&self.inner.state);
            if state.latest_token != token {
                return;
            }
            state.sign_out_fallback = None;
            state.gate.force_idle()
        };
        if changed {
            warn!("no sign-out notification arrived; clearing loading");
            self.publish();
        }
    }

    fn publish(&self) {
        let _turn = lock(&self.inner.dispatch);
        let snapshot = self.state();
        let listeners = lock(&self.inner.subscribers).snapshot();
        for listener in listeners {
            listener(&snapshot);
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &self.state())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Lock `mutex`, recovering the data if a listener panicked while it was
/// held.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
