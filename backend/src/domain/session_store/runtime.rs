//! Port and runtime dependency bundles for the session store.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use mockable::{Clock, DefaultClock};

use crate::domain::AuthorizationPolicy;
use crate::domain::ports::{ProfileRepository, SessionSource};

/// Default minimum visible duration of a loading transition.
pub const DEFAULT_MIN_LOADING: Duration = Duration::from_millis(500);
/// Default wait for a sign-out notification before clearing loading anyway.
pub const DEFAULT_SIGN_OUT_GRACE: Duration = Duration::from_millis(1_500);

/// Port bundle required by the session store.
pub struct SessionStorePorts {
    /// Hosted auth service.
    pub source: Arc<dyn SessionSource>,
    /// Profile lookup.
    pub profiles: Arc<dyn ProfileRepository>,
    /// Role derivation policy.
    pub policy: Arc<dyn AuthorizationPolicy>,
}

impl SessionStorePorts {
    /// Build a strongly-typed store port bundle.
    pub fn new(
        source: Arc<dyn SessionSource>,
        profiles: Arc<dyn ProfileRepository>,
        policy: Arc<dyn AuthorizationPolicy>,
    ) -> Self {
        Self {
            source,
            profiles,
            policy,
        }
    }
}

/// Runtime helpers used for loading-floor timing.
pub struct SessionStoreRuntime {
    /// Wall-clock source.
    pub clock: Arc<dyn Clock>,
    /// Delayed callback scheduler.
    pub scheduler: Arc<dyn DelayScheduler>,
}

impl Default for SessionStoreRuntime {
    fn default() -> Self {
        Self {
            clock: Arc::new(DefaultClock),
            scheduler: Arc::new(TokioScheduler),
        }
    }
}

/// Timing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStoreConfig {
    /// Standard floor applied to visible transitions.
    pub min_loading: Duration,
    /// Fallback wait after a successful sign-out call.
    pub sign_out_grace: Duration,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            min_loading: DEFAULT_MIN_LOADING,
            sign_out_grace: DEFAULT_SIGN_OUT_GRACE,
        }
    }
}

/// Callback handed to a [`DelayScheduler`].
pub type DelayedCallback = Box<dyn FnOnce() + Send + 'static>;

/// Runs a callback once after a delay.
pub trait DelayScheduler: Send + Sync {
    /// Schedule `callback` to run after `delay`.
    fn schedule(&self, delay: Duration, callback: DelayedCallback) -> ScheduledCallback;
}

/// Handle to a scheduled callback.
///
/// Dropping the handle leaves the callback scheduled; call
/// [`ScheduledCallback::cancel`] to stop it.
pub struct ScheduledCallback {
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl ScheduledCallback {
    /// Wrap the scheduler-specific cancellation action.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Handle for a callback that cannot be cancelled.
    pub fn detached() -> Self {
        Self { cancel: None }
    }

    /// Stop the callback if it has not run yet.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for ScheduledCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledCallback")
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

/// Tokio-based scheduler: a sleeping task aborted on cancel.
///
/// Must be used from within a Tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl DelayScheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, callback: DelayedCallback) -> ScheduledCallback {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
        ScheduledCallback::new(move || task.abort())
    }
}
