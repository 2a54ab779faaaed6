//! Session store scenarios driven through the public API and shared doubles.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use portal::domain::ports::SessionSource;
use portal::domain::{
    AdminIdentifierPolicy, Area, AuthChange, AuthState, ErrorCode, LoginCredentials, Role,
    SessionStore, SessionStoreConfig, SessionStorePorts, SessionStoreRuntime, VerificationStatus,
    derive_role, require_area,
};
use portal::test_support::session::{
    ADMIN_ID, ManualScheduler, MutableClock, OTHER_READER_ID, READER_ID,
    ScriptedProfileRepository, ScriptedSessionSource, epoch, profile_for, session_for,
};
use rstest::{fixture, rstest};

const FLOOR: Duration = Duration::from_millis(500);
const GRACE: Duration = Duration::from_millis(1_500);

struct World {
    store: SessionStore,
    clock: Arc<MutableClock>,
    scheduler: Arc<ManualScheduler>,
    source: Arc<ScriptedSessionSource>,
    profiles: Arc<ScriptedProfileRepository>,
}

#[fixture]
fn world() -> World {
    let clock = Arc::new(MutableClock::new(epoch()));
    let scheduler = Arc::new(ManualScheduler::new(Arc::clone(&clock)));
    let source = Arc::new(ScriptedSessionSource::with_current(None));
    let profiles = Arc::new(ScriptedProfileRepository::with_profiles([
        profile_for(READER_ID, VerificationStatus::Verified),
        profile_for(OTHER_READER_ID, VerificationStatus::Pending),
    ]));
    let store = SessionStore::new(
        SessionStorePorts::new(
            Arc::clone(&source) as _,
            Arc::clone(&profiles) as _,
            Arc::new(AdminIdentifierPolicy::new(ADMIN_ID)),
        ),
        SessionStoreRuntime {
            clock: Arc::clone(&clock) as _,
            scheduler: Arc::clone(&scheduler) as _,
        },
        SessionStoreConfig {
            min_loading: FLOOR,
            sign_out_grace: GRACE,
        },
    );
    World {
        store,
        clock,
        scheduler,
        source,
        profiles,
    }
}

async fn wait_until(store: &SessionStore, predicate: impl Fn(&AuthState) -> bool) {
    for _ in 0..1_000 {
        if predicate(&store.state()) {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached; last state: {:?}", store.state());
}

fn credentials() -> LoginCredentials {
    LoginCredentials::try_from_parts("reader@archive.test", "password").expect("credentials")
}

#[rstest]
#[case(Some(ADMIN_ID), None, Role::Admin)]
#[case(Some(ADMIN_ID), Some(VerificationStatus::Rejected), Role::Admin)]
#[case(Some(READER_ID), None, Role::Guest)]
#[case(Some(READER_ID), Some(VerificationStatus::Verified), Role::VerifiedUser)]
#[case(Some(READER_ID), Some(VerificationStatus::Pending), Role::Pending)]
#[case(Some(READER_ID), Some(VerificationStatus::Rejected), Role::Guest)]
#[case(Some(READER_ID), Some(VerificationStatus::Unknown), Role::Guest)]
#[case(None, Some(VerificationStatus::Verified), Role::VerifiedUser)]
#[case(None, None, Role::Guest)]
fn role_derivation_is_total(
    #[case] user: Option<&str>,
    #[case] status: Option<VerificationStatus>,
    #[case] expected: Role,
) {
    let profile = status.map(|status| profile_for(user.unwrap_or(READER_ID), status));
    let padded_admin = format!("  {ADMIN_ID}\n");

    assert_eq!(derive_role(user, profile.as_ref(), ADMIN_ID), expected);
    assert_eq!(derive_role(user, profile.as_ref(), &padded_admin), expected);
    assert_eq!(
        derive_role(user, profile.as_ref(), ADMIN_ID),
        derive_role(user, profile.as_ref(), ADMIN_ID)
    );
}

#[rstest]
fn access_matrix_holds_for_every_pair() {
    let roles = [Role::Guest, Role::Pending, Role::VerifiedUser, Role::Admin];
    let expected = [
        // Public, Account, Contributor, Admin
        [true, false, false, false],
        [true, true, false, false],
        [true, true, true, false],
        [true, true, true, true],
    ];
    let areas = [Area::Public, Area::Account, Area::Contributor, Area::Admin];

    for (role, row) in roles.into_iter().zip(expected) {
        for (area, allowed) in areas.into_iter().zip(row) {
            let result = require_area(role, area);
            assert_eq!(result.is_ok(), allowed, "{role} in {area}");
            if let Err(error) = result {
                let code = if role == Role::Guest {
                    ErrorCode::Unauthorized
                } else {
                    ErrorCode::Forbidden
                };
                assert_eq!(error.code(), code, "{role} in {area}");
            }
        }
    }
}

#[rstest]
#[case(Duration::from_millis(100))]
#[case(Duration::from_millis(499))]
#[case(Duration::from_millis(900))]
#[tokio::test]
async fn loading_ends_at_the_later_of_lookup_and_floor(world: World, #[case] lookup: Duration) {
    let gate = world.profiles.hold(READER_ID);
    let store = world.store.clone();
    let applying = tokio::spawn(async move {
        store
            .apply(AuthChange::initial(Some(session_for(READER_ID))))
            .await;
    });
    wait_until(&world.store, |_| world.profiles.lookups() == 1).await;

    world.scheduler.advance(lookup);
    gate.notify_one();
    applying.await.expect("apply task");
    assert_eq!(world.store.state().role, Role::VerifiedUser);

    if lookup < FLOOR {
        assert!(world.store.state().loading, "floor still running");
        world.scheduler.advance(FLOOR - lookup - Duration::from_millis(1));
        assert!(world.store.state().loading, "one millisecond before the floor");
        world.scheduler.advance(Duration::from_millis(1));
    }
    assert!(!world.store.state().loading);
    assert_eq!(world.scheduler.pending(), 0);
}

#[rstest]
#[tokio::test]
async fn reader_journey_through_the_listener(world: World) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _subscription = world.store.subscribe(move |state| {
        sink.lock().expect("recorder").push(state.role);
    });
    let listener = world.store.spawn_listener();
    wait_until(&world.store, |state| state.is_initialized && !state.loading).await;
    assert_eq!(world.store.state().role, Role::Guest);

    world.source.accept_sign_in(session_for(READER_ID));
    world
        .source
        .sign_in_with_password(&credentials())
        .await
        .expect("sign in");
    wait_until(&world.store, |state| state.role == Role::VerifiedUser).await;
    assert!(world.store.state().loading, "different user shows loading");
    world.scheduler.advance(FLOOR);
    assert!(!world.store.state().loading);

    world.store.sign_out().await.expect("sign out");
    wait_until(&world.store, |state| state.user.is_none()).await;
    assert!(world.store.state().loading, "sign-out keeps the floor");
    world.scheduler.advance(FLOOR);
    let state = world.store.state();
    assert!(!state.loading);
    assert!(state.session.is_none() && state.profile.is_none());
    assert_eq!(state.role, Role::Guest);
    assert_eq!(world.source.sign_out_calls(), 1);

    let roles = seen.lock().expect("recorder").clone();
    assert_eq!(roles.first(), Some(&Role::Guest));
    assert!(roles.contains(&Role::VerifiedUser));
    assert_eq!(roles.last(), Some(&Role::Guest));
    listener.abort();
}

#[rstest]
#[tokio::test]
async fn silent_sign_out_falls_back_after_the_grace_period(world: World) {
    world
        .store
        .apply(AuthChange::initial(Some(session_for(ADMIN_ID))))
        .await;
    world.scheduler.advance(FLOOR);
    world.source.silent_sign_out();

    world.store.sign_out().await.expect("sign out");
    assert!(world.store.state().loading);

    world.scheduler.advance(GRACE - Duration::from_millis(1));
    assert!(world.store.state().loading);
    world.scheduler.advance(Duration::from_millis(1));
    assert!(!world.store.state().loading);
    assert!(world.clock_is_at(FLOOR + GRACE));
}

impl World {
    fn clock_is_at(&self, elapsed: Duration) -> bool {
        use mockable::Clock as _;
        let elapsed = chrono::TimeDelta::from_std(elapsed).expect("delta");
        self.clock.utc() == epoch() + elapsed
    }
}
