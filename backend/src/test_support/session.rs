//! Shared test doubles for session store and service tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;
use tokio::sync::{Notify, broadcast};

use crate::domain::ports::{
    AUTH_CHANGE_CAPACITY, ProfileRepository, ProfileRepositoryError, SessionSource,
    SessionSourceError,
};
use crate::domain::{
    AuthChange, AuthUser, DelayScheduler, DelayedCallback, LoginCredentials, Profile,
    ProfileDraft, ScheduledCallback, Session, UserId, VerificationStatus,
};

pub const ADMIN_ID: &str = "00000000-0000-4000-8000-0000000000ad";
pub const READER_ID: &str = "00000000-0000-4000-8000-000000000001";
pub const OTHER_READER_ID: &str = "00000000-0000-4000-8000-000000000002";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(_) => panic!("test double mutex poisoned"),
    }
}

fn user_id(raw: &str) -> UserId {
    match UserId::new(raw) {
        Ok(id) => id,
        Err(error) => panic!("invalid test user id {raw}: {error}"),
    }
}

/// Fixed instant used as the start of simulated time.
pub fn epoch() -> DateTime<Utc> {
    match Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single() {
        Some(instant) => instant,
        None => panic!("valid epoch"),
    }
}

/// Session for `raw_id` expiring an hour after [`epoch`].
pub fn session_for(raw_id: &str) -> Session {
    Session::new(
        format!("access-{raw_id}"),
        Some(format!("refresh-{raw_id}")),
        epoch() + TimeDelta::hours(1),
        AuthUser::new(user_id(raw_id)),
    )
}

/// Profile for `raw_id` in `status`.
pub fn profile_for(raw_id: &str, status: VerificationStatus) -> Profile {
    let draft = ProfileDraft::builder()
        .full_name("Test Reader")
        .domicile("Surakarta")
        .institution("Pura Mangkunegaran Library")
        .occupation("Researcher")
        .phone("081234567890")
        .build();
    let mut profile = match draft {
        Ok(draft) => draft.into_pending_profile(user_id(raw_id)),
        Err(error) => panic!("invalid test profile draft: {error}"),
    };
    profile.status = status;
    profile
}

/// Clock whose time only moves when told to.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn advance(&self, delta: Duration) {
        let delta = match TimeDelta::from_std(delta) {
            Ok(delta) => delta,
            Err(error) => {
                panic!("failed to convert Duration to TimeDelta: {error}; delta={delta:?}")
            }
        };
        *lock(&self.0) += delta;
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *lock(&self.0) = now;
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *lock(&self.0)
    }
}

struct ManualEntry {
    due: DateTime<Utc>,
    callback: DelayedCallback,
    cancelled: Arc<AtomicBool>,
}

/// Scheduler driven by a [`MutableClock`].
///
/// Callbacks run only from [`ManualScheduler::advance`], in due order, with
/// the clock set to each callback's due time.
pub struct ManualScheduler {
    clock: Arc<MutableClock>,
    entries: Mutex<Vec<ManualEntry>>,
}

impl ManualScheduler {
    pub fn new(clock: Arc<MutableClock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Move time forward by `by`, running every callback that falls due.
    pub fn advance(&self, by: Duration) {
        let target = self.clock.utc()
            + match TimeDelta::from_std(by) {
                Ok(delta) => delta,
                Err(error) => panic!("invalid advance {by:?}: {error}"),
            };
        while let Some(entry) = self.take_next_due(target) {
            self.clock.set(entry.due);
            (entry.callback)();
        }
        self.clock.set(target);
    }

    /// Number of callbacks still waiting and not cancelled.
    pub fn pending(&self) -> usize {
        lock(&self.entries)
            .iter()
            .filter(|entry| !entry.cancelled.load(Ordering::SeqCst))
            .count()
    }

    fn take_next_due(&self, target: DateTime<Utc>) -> Option<ManualEntry> {
        let mut entries = lock(&self.entries);
        entries.retain(|entry| !entry.cancelled.load(Ordering::SeqCst));
        let index = entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.due <= target)
            .min_by_key(|(_, entry)| entry.due)
            .map(|(index, _)| index)?;
        Some(entries.remove(index))
    }
}

impl DelayScheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, callback: DelayedCallback) -> ScheduledCallback {
        let due = self.clock.utc()
            + match TimeDelta::from_std(delay) {
                Ok(delta) => delta,
                Err(error) => panic!("invalid delay {delay:?}: {error}"),
            };
        let cancelled = Arc::new(AtomicBool::new(false));
        lock(&self.entries).push(ManualEntry {
            due,
            callback,
            cancelled: Arc::clone(&cancelled),
        });
        ScheduledCallback::new(move || cancelled.store(true, Ordering::SeqCst))
    }
}

/// Session source whose answers and notifications are scripted by the test.
pub struct ScriptedSessionSource {
    changes: broadcast::Sender<AuthChange>,
    current: Mutex<Result<Option<Session>, SessionSourceError>>,
    sign_in: Mutex<Result<Session, SessionSourceError>>,
    sign_out: Mutex<Result<(), SessionSourceError>>,
    announce_sign_out: AtomicBool,
    sign_out_calls: AtomicUsize,
}

impl Default for ScriptedSessionSource {
    fn default() -> Self {
        let (changes, _) = broadcast::channel(AUTH_CHANGE_CAPACITY);
        Self {
            changes,
            current: Mutex::new(Ok(None)),
            sign_in: Mutex::new(Err(SessionSourceError::rejected(
                "invalid login credentials",
            ))),
            sign_out: Mutex::new(Ok(())),
            announce_sign_out: AtomicBool::new(true),
            sign_out_calls: AtomicUsize::new(0),
        }
    }
}

impl ScriptedSessionSource {
    /// Source holding `session` as the stored session.
    pub fn with_current(session: Option<Session>) -> Self {
        let source = Self::default();
        *lock(&source.current) = Ok(session);
        source
    }

    /// Make `current_session` fail.
    pub fn fail_current(&self, error: SessionSourceError) {
        *lock(&self.current) = Err(error);
    }

    /// Accept any credentials and return `session`.
    pub fn accept_sign_in(&self, session: Session) {
        *lock(&self.sign_in) = Ok(session);
    }

    /// Make `sign_out` fail.
    pub fn fail_sign_out(&self, error: SessionSourceError) {
        *lock(&self.sign_out) = Err(error);
    }

    /// Let `sign_out` succeed without announcing anything.
    pub fn silent_sign_out(&self) {
        self.announce_sign_out.store(false, Ordering::SeqCst);
    }

    /// Broadcast `change` to subscribers.
    pub fn emit(&self, change: AuthChange) {
        let _ = self.changes.send(change);
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionSource for ScriptedSessionSource {
    async fn current_session(&self) -> Result<Option<Session>, SessionSourceError> {
        lock(&self.current).clone()
    }

    async fn sign_in_with_password(
        &self,
        _credentials: &LoginCredentials,
    ) -> Result<Session, SessionSourceError> {
        let session = lock(&self.sign_in).clone()?;
        *lock(&self.current) = Ok(Some(session.clone()));
        self.emit(AuthChange::new(
            crate::domain::AuthEventKind::SignedIn,
            Some(session.clone()),
        ));
        Ok(session)
    }

    async fn sign_up(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<AuthUser, SessionSourceError> {
        AuthUser::try_new(UserId::random(), Some(credentials.email()))
            .map_err(|error| SessionSourceError::protocol(error.to_string()))
    }

    async fn sign_out(&self) -> Result<(), SessionSourceError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.sign_out).clone()?;
        *lock(&self.current) = Ok(None);
        if self.announce_sign_out.load(Ordering::SeqCst) {
            self.emit(AuthChange::signed_out());
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.changes.subscribe()
    }
}

/// Profile repository with per-user failures and held lookups.
#[derive(Default)]
pub struct ScriptedProfileRepository {
    profiles: Mutex<HashMap<String, Profile>>,
    failing: Mutex<HashSet<String>>,
    held: Mutex<HashMap<String, Arc<Notify>>>,
    lookups: AtomicUsize,
}

impl ScriptedProfileRepository {
    pub fn with_profiles(profiles: impl IntoIterator<Item = Profile>) -> Self {
        let repo = Self::default();
        for profile in profiles {
            repo.put(profile);
        }
        repo
    }

    pub fn put(&self, profile: Profile) {
        lock(&self.profiles).insert(profile.user_id.to_string(), profile);
    }

    /// Make lookups for `raw_id` fail with a connection error.
    pub fn fail_for(&self, raw_id: &str) {
        lock(&self.failing).insert(raw_id.to_owned());
    }

    /// Hold lookups for `raw_id` until the returned handle is notified.
    pub fn hold(&self, raw_id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        lock(&self.held).insert(raw_id.to_owned(), Arc::clone(&gate));
        gate
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileRepository for ScriptedProfileRepository {
    async fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Profile>, ProfileRepositoryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let gate = lock(&self.held).get(user_id.as_ref()).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if lock(&self.failing).contains(user_id.as_ref()) {
            return Err(ProfileRepositoryError::connection("profiles table unreachable"));
        }
        Ok(lock(&self.profiles).get(user_id.as_ref()).cloned())
    }

    async fn insert(&self, profile: &Profile) -> Result<(), ProfileRepositoryError> {
        let mut profiles = lock(&self.profiles);
        let key = profile.user_id.to_string();
        if profiles.contains_key(&key) {
            return Err(ProfileRepositoryError::duplicate(key));
        }
        profiles.insert(key, profile.clone());
        Ok(())
    }

    async fn set_status(
        &self,
        user_id: &UserId,
        status: VerificationStatus,
    ) -> Result<bool, ProfileRepositoryError> {
        Ok(lock(&self.profiles)
            .get_mut(user_id.as_ref())
            .map(|profile| profile.status = status)
            .is_some())
    }

    async fn list_by_status(
        &self,
        status: VerificationStatus,
    ) -> Result<Vec<Profile>, ProfileRepositoryError> {
        Ok(lock(&self.profiles)
            .values()
            .filter(|profile| profile.status == status)
            .cloned()
            .collect())
    }
}
