//! Timed state engine.
//!
//! Tracks the current state, a one-shot "just entered" flag and the time of
//! the last transition. Domain controllers hold one of these and ask it
//! `on_enter()` / `elapsed()` from their state handlers.

use sortline_common::clock::SharedClock;
use std::time::Duration;

/// Current state plus entry flag and dwell timer.
///
/// All three fields change together in [`transition`](Self::transition);
/// there is no way to observe a half-applied transition.
pub struct TimedStateMachine<S> {
    state: S,
    just_entered: bool,
    state_since: Duration,
    clock: SharedClock,
}

impl<S: Copy + Eq> TimedStateMachine<S> {
    /// Start in `initial`, as if just transitioned into it.
    pub fn new(initial: S, clock: SharedClock) -> Self {
        let state_since = clock.now();
        Self {
            state: initial,
            just_entered: true,
            state_since,
            clock,
        }
    }

    /// Current state.
    #[inline]
    pub fn state(&self) -> S {
        self.state
    }

    /// Enter `next`: arms the entry flag and restarts the dwell timer.
    ///
    /// Re-entering the current state is allowed and behaves the same.
    pub fn transition(&mut self, next: S) {
        self.state = next;
        self.just_entered = true;
        self.state_since = self.clock.now();
    }

    /// True on the first call after a transition, false until the next one.
    pub fn on_enter(&mut self) -> bool {
        std::mem::replace(&mut self.just_entered, false)
    }

    /// Time spent in the current state.
    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_sub(self.state_since)
    }

    /// Clock time of the last transition.
    pub fn state_since(&self) -> Duration {
        self.state_since
    }

    /// Clock driving the dwell timer.
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for TimedStateMachine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedStateMachine")
            .field("state", &self.state)
            .field("just_entered", &self.just_entered)
            .field("state_since", &self.state_since)
            .finish()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sortline_common::clock::ManualClock;
    use std::sync::Arc;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Light {
        Red,
        Green,
    }

    fn machine() -> (Arc<ManualClock>, TimedStateMachine<Light>) {
        let clock = ManualClock::shared();
        let sm = TimedStateMachine::new(Light::Red, clock.clone());
        (clock, sm)
    }

    #[test]
    fn initial_state_counts_as_entered() {
        let (_clock, mut sm) = machine();
        assert_eq!(sm.state(), Light::Red);
        assert!(sm.on_enter());
        assert!(!sm.on_enter());
    }

    #[test]
    fn on_enter_fires_once_per_transition() {
        let (_clock, mut sm) = machine();
        sm.on_enter();

        sm.transition(Light::Green);
        assert!(sm.on_enter());
        assert!(!sm.on_enter());
        assert!(!sm.on_enter());
    }

    #[test]
    fn self_transition_rearms_entry_and_timer() {
        let (clock, mut sm) = machine();
        sm.on_enter();
        clock.advance_secs(3.0);

        sm.transition(Light::Red);
        assert!(sm.on_enter());
        assert_eq!(sm.elapsed(), Duration::ZERO);
    }

    #[test]
    fn elapsed_tracks_clock_and_resets() {
        let (clock, mut sm) = machine();
        clock.advance_secs(1.5);
        assert_eq!(sm.elapsed(), Duration::from_millis(1500));
        clock.advance_secs(0.5);
        assert_eq!(sm.elapsed(), Duration::from_secs(2));

        sm.transition(Light::Green);
        assert_eq!(sm.elapsed(), Duration::ZERO);
        assert_eq!(sm.state_since(), Duration::from_secs(2));
    }

    proptest! {
        #[test]
        fn elapsed_is_monotonic(steps in proptest::collection::vec(0u64..5_000, 1..50)) {
            let (clock, sm) = machine();
            let mut last = sm.elapsed();
            for ms in steps {
                clock.advance(Duration::from_millis(ms));
                let now = sm.elapsed();
                prop_assert!(now >= last);
                last = now;
            }
        }

        #[test]
        fn transition_always_arms_entry(
            path in proptest::collection::vec(any::<bool>(), 1..20),
        ) {
            let (_clock, mut sm) = machine();
            for green in path {
                sm.on_enter();
                sm.transition(if green { Light::Green } else { Light::Red });
                prop_assert!(sm.on_enter());
                prop_assert!(!sm.on_enter());
            }
        }
    }
}
