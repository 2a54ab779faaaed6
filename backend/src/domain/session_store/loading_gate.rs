//! Loading flag with a minimum visible duration.
//!
//! The gate is a plain state machine: callers pass the current time in and
//! act on the returned [`Settle`] value. It never reads a clock or spawns a
//! timer itself.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::runtime::ScheduledCallback;

/// Outcome of trying to end a loading transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Settle {
    /// Nothing was loading.
    Idle,
    /// The floor had elapsed; loading is now false.
    Cleared,
    /// The floor has not elapsed; clear after `remaining` if `generation`
    /// is still current.
    Wait { remaining: Duration, generation: u64 },
}

#[derive(Debug)]
pub(crate) struct LoadingGate {
    loading: bool,
    started_at: Option<DateTime<Utc>>,
    floor: Duration,
    generation: u64,
    pending: Option<ScheduledCallback>,
}

impl LoadingGate {
    /// A gate that starts loading at `now`, as on first mount.
    pub(crate) fn loading_since(now: DateTime<Utc>, floor: Duration) -> Self {
        Self {
            loading: true,
            started_at: Some(now),
            floor,
            generation: 0,
            pending: None,
        }
    }

    pub(crate) fn is_loading(&self) -> bool {
        self.loading
    }

    #[cfg(test)]
    pub(crate) fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[cfg(test)]
    pub(crate) fn floor(&self) -> Duration {
        self.floor
    }

    /// Start a transition, or extend the active one.
    ///
    /// An active transition keeps its start time and only adopts `floor`
    /// when it differs. Any pending clear is cancelled either way. Returns
    /// `true` when the flag flipped from idle to loading.
    pub(crate) fn begin(&mut self, now: DateTime<Utc>, floor: Duration) -> bool {
        self.cancel_pending();
        self.generation = self.generation.wrapping_add(1);
        if self.loading {
            if self.floor != floor {
                self.floor = floor;
            }
            return false;
        }
        self.loading = true;
        self.started_at = Some(now);
        self.floor = floor;
        true
    }

    /// Replace the floor of an active transition.
    pub(crate) fn override_floor(&mut self, floor: Duration) {
        if self.loading {
            self.floor = floor;
        }
    }

    /// Clear the flag if the floor has elapsed at `now`.
    pub(crate) fn settle(&mut self, now: DateTime<Utc>) -> Settle {
        if !self.loading {
            return Settle::Idle;
        }
        let elapsed = self
            .started_at
            .and_then(|started| (now - started).to_std().ok())
            .unwrap_or(Duration::ZERO);
        if elapsed >= self.floor {
            self.clear();
            return Settle::Cleared;
        }
        Settle::Wait {
            remaining: self.floor - elapsed,
            generation: self.generation,
        }
    }

    /// Hold the timer handle for a scheduled clear.
    ///
    /// Returns the handle back when `generation` is stale so the caller can
    /// cancel it.
    pub(crate) fn attach_pending(
        &mut self,
        generation: u64,
        handle: ScheduledCallback,
    ) -> Option<ScheduledCallback> {
        if !self.loading || generation != self.generation {
            return Some(handle);
        }
        self.cancel_pending();
        self.pending = Some(handle);
        None
    }

    /// Timer callback: clear if `generation` is still current.
    pub(crate) fn expire(&mut self, generation: u64) -> bool {
        if !self.loading || generation != self.generation {
            return false;
        }
        self.pending = None;
        self.clear();
        true
    }

    /// Clear regardless of the floor. Returns `true` if the flag changed.
    pub(crate) fn force_idle(&mut self) -> bool {
        if !self.loading {
            self.cancel_pending();
            return false;
        }
        self.clear();
        true
    }

    fn clear(&mut self) {
        self.cancel_pending();
        self.generation = self.generation.wrapping_add(1);
        self.loading = false;
        self.started_at = None;
    }

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    //! State machine coverage; no clock or runtime involved.
    use super::*;
    use chrono::TimeZone;
    use rstest::{fixture, rstest};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    const FLOOR: Duration = Duration::from_millis(500);

    #[fixture]
    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
            .single()
            .expect("valid time")
    }

    fn at(t0: DateTime<Utc>, millis: i64) -> DateTime<Utc> {
        t0 + chrono::Duration::milliseconds(millis)
    }

    fn idle_gate(t0: DateTime<Utc>) -> LoadingGate {
        let mut gate = LoadingGate::loading_since(t0, Duration::ZERO);
        assert_eq!(gate.settle(t0), Settle::Cleared);
        gate
    }

    fn tracked_handle() -> (ScheduledCallback, Arc<AtomicBool>) {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        (
            ScheduledCallback::new(move || flag.store(true, Ordering::SeqCst)),
            cancelled,
        )
    }

    #[rstest]
    fn zero_floor_clears_immediately(t0: DateTime<Utc>) {
        let mut gate = LoadingGate::loading_since(t0, Duration::ZERO);
        assert!(gate.is_loading());
        assert_eq!(gate.settle(t0), Settle::Cleared);
        assert!(!gate.is_loading());
        assert_eq!(gate.started_at(), None);
        assert_eq!(gate.settle(t0), Settle::Idle);
    }

    #[rstest]
    #[case(0, Some(500))]
    #[case(200, Some(300))]
    #[case(500, None)]
    #[case(900, None)]
    fn settle_honours_floor(t0: DateTime<Utc>, #[case] work_ms: i64, #[case] wait_ms: Option<u64>) {
        let mut gate = idle_gate(t0);
        assert!(gate.begin(t0, FLOOR));

        match (gate.settle(at(t0, work_ms)), wait_ms) {
            (Settle::Wait { remaining, .. }, Some(expected)) => {
                assert_eq!(remaining, Duration::from_millis(expected));
                assert!(gate.is_loading());
            }
            (Settle::Cleared, None) => assert!(!gate.is_loading()),
            (other, expected) => panic!("unexpected settle {other:?} for wait {expected:?}"),
        }
    }

    #[rstest]
    fn begin_while_loading_keeps_start_and_updates_floor(t0: DateTime<Utc>) {
        let mut gate = idle_gate(t0);
        assert!(gate.begin(t0, FLOOR));
        assert!(!gate.begin(at(t0, 300), Duration::from_millis(800)));

        assert_eq!(gate.started_at(), Some(t0));
        assert_eq!(gate.floor(), Duration::from_millis(800));
        assert_eq!(
            gate.settle(at(t0, 600)),
            Settle::Wait {
                remaining: Duration::from_millis(200),
                generation: 3,
            }
        );
    }

    #[rstest]
    fn begin_cancels_pending_clear(t0: DateTime<Utc>) {
        let mut gate = idle_gate(t0);
        gate.begin(t0, FLOOR);
        let Settle::Wait { generation, .. } = gate.settle(t0) else {
            panic!("expected wait");
        };
        let (handle, cancelled) = tracked_handle();
        assert!(gate.attach_pending(generation, handle).is_none());

        gate.begin(at(t0, 100), FLOOR);
        assert!(cancelled.load(Ordering::SeqCst));
        assert!(!gate.expire(generation), "stale timer must be a no-op");
        assert!(gate.is_loading());
    }

    #[rstest]
    fn current_timer_clears(t0: DateTime<Utc>) {
        let mut gate = idle_gate(t0);
        gate.begin(t0, FLOOR);
        let Settle::Wait { generation, .. } = gate.settle(at(t0, 100)) else {
            panic!("expected wait");
        };
        assert!(gate.expire(generation));
        assert!(!gate.is_loading());
    }

    #[rstest]
    fn stale_handles_are_returned(t0: DateTime<Utc>) {
        let mut gate = idle_gate(t0);
        gate.begin(t0, FLOOR);
        let (handle, _) = tracked_handle();
        assert!(gate.attach_pending(99, handle).is_some());
    }

    #[rstest]
    fn override_floor_only_applies_while_loading(t0: DateTime<Utc>) {
        let mut gate = idle_gate(t0);
        gate.override_floor(FLOOR);
        assert_eq!(gate.floor(), Duration::ZERO);

        gate.begin(t0, FLOOR);
        gate.override_floor(Duration::ZERO);
        assert_eq!(gate.settle(t0), Settle::Cleared);
    }

    #[rstest]
    fn force_idle_reports_change(t0: DateTime<Utc>) {
        let mut gate = idle_gate(t0);
        assert!(!gate.force_idle());
        gate.begin(t0, FLOOR);
        assert!(gate.force_idle());
        assert!(!gate.is_loading());
    }
}
