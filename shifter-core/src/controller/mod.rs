//! Shift-cut state machine.
//!
//! [`ShiftCutController`] is driven once per control-loop iteration with a
//! fresh [`InputSnapshot`]. It decides when to assert the ignition-limit bits
//! for a clutchless upshift, when to release them, and when the next trigger
//! may be honoured. The free-running tick counter inside the snapshot is the
//! only clock; every duration is measured with wrapping subtraction so a
//! counter overflow never shortens or stretches a cut.
//!
//! # Liveness
//!
//! The controller releases the ignition cut only from inside
//! [`ShiftCutController::tick`]. A host that stops calling `tick` while a cut
//! is active leaves the limit bits asserted indefinitely; integrators must
//! guarantee a tick cadence well below the configured kill time.

use core::fmt;

use crate::config::{ConfigError, ShiftCutConfig};
use crate::signals::{IgnitionLimitFlags, InputSnapshot, LIMIT_ENABLE_MASK, TickInstant};

pub mod eligibility;

pub use eligibility::{Ineligible, check_eligibility};

/// Controller phases.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ShiftState {
    /// Armed and waiting for a sensor trigger.
    Ready,
    /// Ignition cut in progress.
    Active,
    /// Rearm delay after a cut or a rejected trigger.
    Cooldown,
}

impl ShiftState {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            ShiftState::Ready => "ready",
            ShiftState::Active => "active",
            ShiftState::Cooldown => "cooldown",
        }
    }

    /// Returns `true` while the limit bits must be asserted.
    #[must_use]
    pub const fn is_cutting(self) -> bool {
        matches!(self, ShiftState::Active)
    }
}

impl fmt::Display for ShiftState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// State change reported by [`ShiftCutController::tick_observed`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transition {
    /// Ready -> Active.
    CutStarted { at: TickInstant, target_ticks: u32 },
    /// Ready -> Cooldown without cutting.
    CutRejected { at: TickInstant, reason: Ineligible },
    /// Active -> Cooldown.
    CutReleased { at: TickInstant, held_ticks: u32 },
    /// Cooldown -> Ready.
    Rearmed { at: TickInstant, waited_ticks: u32 },
}

impl Transition {
    /// Counter value of the tick that produced the transition.
    #[must_use]
    pub const fn at(&self) -> TickInstant {
        match *self {
            Transition::CutStarted { at, .. }
            | Transition::CutRejected { at, .. }
            | Transition::CutReleased { at, .. }
            | Transition::Rearmed { at, .. } => at,
        }
    }

    /// State the controller entered.
    #[must_use]
    pub const fn next_state(&self) -> ShiftState {
        match self {
            Transition::CutStarted { .. } => ShiftState::Active,
            Transition::CutRejected { .. } | Transition::CutReleased { .. } => ShiftState::Cooldown,
            Transition::Rearmed { .. } => ShiftState::Ready,
        }
    }
}

/// Receives every transition as it happens.
pub trait TransitionObserver {
    fn on_transition(&mut self, transition: Transition);
}

impl<T> TransitionObserver for &mut T
where
    T: TransitionObserver + ?Sized,
{
    fn on_transition(&mut self, transition: Transition) {
        (**self).on_transition(transition);
    }
}

/// Observer that discards transitions.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopObserver;

impl TransitionObserver for NoopObserver {
    fn on_transition(&mut self, _: Transition) {}
}

/// Point-in-time view of the controller for status reporting.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerSnapshot {
    pub state: ShiftState,
    pub kill_start: TickInstant,
    pub kill_target_duration: u32,
    pub cooldown_start: TickInstant,
    /// Ticks left before the current timed phase can end, if one is running.
    pub remaining_ticks: Option<u32>,
}

/// Ignition-cut controller for a single shift sensor.
#[derive(Clone, Debug)]
pub struct ShiftCutController {
    config: ShiftCutConfig,
    state: ShiftState,
    kill_start: TickInstant,
    kill_target_duration: u32,
    cooldown_start: TickInstant,
}

impl ShiftCutController {
    /// Creates a controller in [`ShiftState::Ready`] with validated tunables.
    ///
    /// # Errors
    ///
    /// Propagates [`ShiftCutConfig::validate`] failures.
    pub fn new(config: ShiftCutConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_validated(config))
    }

    /// Creates a controller using the stock calibration.
    #[must_use]
    pub const fn with_defaults() -> Self {
        Self::from_validated(ShiftCutConfig::DEFAULT)
    }

    const fn from_validated(config: ShiftCutConfig) -> Self {
        Self {
            config,
            state: ShiftState::Ready,
            kill_start: TickInstant::ZERO,
            kill_target_duration: 0,
            cooldown_start: TickInstant::ZERO,
        }
    }

    /// Returns to the power-on state, keeping the current tunables.
    pub(crate) fn restart(&mut self) {
        *self = Self::from_validated(self.config);
    }

    #[must_use]
    pub const fn config(&self) -> &ShiftCutConfig {
        &self.config
    }

    /// Replaces the tunables.
    ///
    /// A cut already in progress keeps the target latched when it started;
    /// an in-progress cooldown is measured against the new value.
    ///
    /// # Errors
    ///
    /// Leaves the current tunables in place and returns the validation error
    /// when `config` is rejected.
    pub fn set_config(&mut self, config: ShiftCutConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    #[must_use]
    pub const fn state(&self) -> ShiftState {
        self.state
    }

    #[must_use]
    pub const fn kill_start(&self) -> TickInstant {
        self.kill_start
    }

    /// Ticks the current cut must last; zero outside [`ShiftState::Active`].
    #[must_use]
    pub const fn kill_target_duration(&self) -> u32 {
        self.kill_target_duration
    }

    #[must_use]
    pub const fn cooldown_start(&self) -> TickInstant {
        self.cooldown_start
    }

    /// Captures the controller state as seen at `now`.
    #[must_use]
    pub fn snapshot(&self, now: TickInstant) -> ControllerSnapshot {
        let remaining_ticks = match self.state {
            ShiftState::Ready => None,
            ShiftState::Active => Some(
                self.kill_target_duration
                    .saturating_sub(now.ticks_since(self.kill_start)),
            ),
            ShiftState::Cooldown => Some(
                self.config
                    .cooldown_ticks()
                    .saturating_sub(now.ticks_since(self.cooldown_start)),
            ),
        };

        ControllerSnapshot {
            state: self.state,
            kill_start: self.kill_start,
            kill_target_duration: self.kill_target_duration,
            cooldown_start: self.cooldown_start,
            remaining_ticks,
        }
    }

    /// Runs one control-loop iteration.
    ///
    /// Must not be called re-entrantly, and must keep being called while a
    /// cut is active (see the module-level liveness note).
    pub fn tick<F>(&mut self, inputs: &InputSnapshot, flags: &mut F)
    where
        F: IgnitionLimitFlags + ?Sized,
    {
        self.tick_observed(inputs, flags, &mut NoopObserver);
    }

    /// Runs one control-loop iteration and reports any transition.
    ///
    /// Phases are evaluated in order within the same call, so a phase entered
    /// earlier in the call is also serviced by it: a cut asserts the limit
    /// bits on the very tick it starts.
    pub fn tick_observed<F, O>(&mut self, inputs: &InputSnapshot, flags: &mut F, observer: &mut O)
    where
        F: IgnitionLimitFlags + ?Sized,
        O: TransitionObserver + ?Sized,
    {
        let now = inputs.tick_counter;

        if self.state == ShiftState::Ready && inputs.sensor_triggered {
            match check_eligibility(&self.config, inputs) {
                Ok(()) => self.start_cut(now, observer),
                Err(reason) => self.reject_trigger(now, reason, observer),
            }
        }

        if self.state == ShiftState::Active {
            flags.set_bits(LIMIT_ENABLE_MASK);

            let held_ticks = now.ticks_since(self.kill_start);
            if held_ticks > self.kill_target_duration {
                flags.clear_bits(LIMIT_ENABLE_MASK);
                self.release_cut(now, held_ticks, observer);
            }
        }

        if self.state == ShiftState::Cooldown {
            let waited_ticks = now.ticks_since(self.cooldown_start);
            if waited_ticks > self.config.cooldown_ticks() {
                self.rearm(now, waited_ticks, observer);
            }
        }
    }

    fn start_cut<O>(&mut self, now: TickInstant, observer: &mut O)
    where
        O: TransitionObserver + ?Sized,
    {
        self.state = ShiftState::Active;
        self.kill_start = now;
        self.kill_target_duration = self.config.kill_ticks();
        emit(
            observer,
            Transition::CutStarted {
                at: now,
                target_ticks: self.kill_target_duration,
            },
        );
    }

    fn reject_trigger<O>(&mut self, now: TickInstant, reason: Ineligible, observer: &mut O)
    where
        O: TransitionObserver + ?Sized,
    {
        self.state = ShiftState::Cooldown;
        self.cooldown_start = now;
        emit(observer, Transition::CutRejected { at: now, reason });
    }

    fn release_cut<O>(&mut self, now: TickInstant, held_ticks: u32, observer: &mut O)
    where
        O: TransitionObserver + ?Sized,
    {
        self.state = ShiftState::Cooldown;
        self.kill_start = TickInstant::ZERO;
        self.kill_target_duration = 0;
        self.cooldown_start = now;
        emit(observer, Transition::CutReleased { at: now, held_ticks });
    }

    fn rearm<O>(&mut self, now: TickInstant, waited_ticks: u32, observer: &mut O)
    where
        O: TransitionObserver + ?Sized,
    {
        self.state = ShiftState::Ready;
        self.cooldown_start = TickInstant::ZERO;
        emit(observer, Transition::Rearmed { at: now, waited_ticks });
    }
}

impl Default for ShiftCutController {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn emit<O>(observer: &mut O, transition: Transition)
where
    O: TransitionObserver + ?Sized,
{
    log_transition(&transition);
    observer.on_transition(transition);
}

#[cfg(feature = "defmt")]
fn log_transition(transition: &Transition) {
    match *transition {
        Transition::CutStarted { at, target_ticks } => {
            defmt::info!(
                "shift cut started at {=u32} for {=u32} ticks",
                at.ticks(),
                target_ticks
            );
        }
        Transition::CutRejected { at, reason } => {
            defmt::info!("shift trigger rejected at {=u32}: {}", at.ticks(), reason);
        }
        Transition::CutReleased { at, held_ticks } => {
            defmt::info!(
                "shift cut released at {=u32} after {=u32} ticks",
                at.ticks(),
                held_ticks
            );
        }
        Transition::Rearmed { at, waited_ticks } => {
            defmt::debug!(
                "shifter rearmed at {=u32} after {=u32} ticks",
                at.ticks(),
                waited_ticks
            );
        }
    }
}

#[cfg(not(feature = "defmt"))]
fn log_transition(_: &Transition) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::limit_asserted;
    use heapless::Vec;

    const KILL_TICKS: u32 = 700_000;
    const COOLDOWN_TICKS: u32 = 3_000_000;

    #[derive(Default)]
    struct Recorded {
        transitions: Vec<Transition, 8>,
    }

    impl TransitionObserver for Recorded {
        fn on_transition(&mut self, transition: Transition) {
            self.transitions
                .push(transition)
                .expect("test observer capacity");
        }
    }

    fn eligible(at: u32) -> InputSnapshot {
        InputSnapshot::new(true, 0x4000, 0, 2, TickInstant::from_ticks(at))
    }

    #[test]
    fn starts_ready_with_zeroed_timing() {
        let controller = ShiftCutController::with_defaults();

        assert_eq!(controller.state(), ShiftState::Ready);
        assert_eq!(controller.kill_start(), TickInstant::ZERO);
        assert_eq!(controller.kill_target_duration(), 0);
        assert_eq!(controller.cooldown_start(), TickInstant::ZERO);
    }

    #[test]
    fn new_rejects_invalid_config() {
        let config = ShiftCutConfig {
            ticks_per_ms: 0,
            ..ShiftCutConfig::DEFAULT
        };

        assert_eq!(
            ShiftCutController::new(config).err(),
            Some(ConfigError::ZeroTickRate)
        );
    }

    #[test]
    fn eligible_trigger_cuts_on_same_tick() {
        let mut controller = ShiftCutController::with_defaults();
        let mut flags = 0u8;

        controller.tick(&eligible(1_000), &mut flags);

        assert_eq!(controller.state(), ShiftState::Active);
        assert!(limit_asserted(flags));
        assert_eq!(controller.kill_start(), TickInstant::from_ticks(1_000));
        assert_eq!(controller.kill_target_duration(), KILL_TICKS);
    }

    #[test]
    fn ineligible_trigger_enters_cooldown_without_cutting() {
        let mut controller = ShiftCutController::with_defaults();
        let mut flags = 0u8;
        let mut observer = Recorded::default();
        let inputs = InputSnapshot::new(true, 0x100, 0, 2, TickInstant::from_ticks(50));

        controller.tick_observed(&inputs, &mut flags, &mut observer);

        assert_eq!(controller.state(), ShiftState::Cooldown);
        assert_eq!(controller.cooldown_start(), TickInstant::from_ticks(50));
        assert_eq!(controller.kill_target_duration(), 0);
        assert_eq!(flags, 0);
        assert_eq!(
            observer.transitions.as_slice(),
            &[Transition::CutRejected {
                at: TickInstant::from_ticks(50),
                reason: Ineligible::SpeedTooLow,
            }]
        );
    }

    #[test]
    fn cut_holds_until_target_is_exceeded() {
        let mut controller = ShiftCutController::with_defaults();
        let mut flags = 0u8;

        controller.tick(&eligible(0), &mut flags);

        // Elapsed equal to the target is not yet past it.
        controller.tick(&eligible(KILL_TICKS), &mut flags);
        assert_eq!(controller.state(), ShiftState::Active);
        assert!(limit_asserted(flags));

        controller.tick(&eligible(KILL_TICKS + 1), &mut flags);
        assert_eq!(controller.state(), ShiftState::Cooldown);
        assert!(!limit_asserted(flags));
        assert_eq!(controller.kill_target_duration(), 0);
        assert_eq!(controller.kill_start(), TickInstant::ZERO);
        assert_eq!(
            controller.cooldown_start(),
            TickInstant::from_ticks(KILL_TICKS + 1)
        );
    }

    #[test]
    fn mask_is_reasserted_every_active_tick() {
        let mut controller = ShiftCutController::with_defaults();
        let mut flags = 0u8;

        controller.tick(&eligible(0), &mut flags);
        // Something else clears our bits mid-cut.
        flags = 0;
        controller.tick(&eligible(10), &mut flags);

        assert!(limit_asserted(flags));
    }

    #[test]
    fn cooldown_rearms_after_configured_delay() {
        let mut controller = ShiftCutController::with_defaults();
        let mut flags = 0u8;
        let mut observer = Recorded::default();

        controller.tick_observed(&eligible(0), &mut flags, &mut observer);
        let released_at = KILL_TICKS + 1;
        controller.tick_observed(&eligible(released_at), &mut flags, &mut observer);

        // Sensor still held: cooldown ignores it.
        controller.tick_observed(
            &eligible(released_at + COOLDOWN_TICKS),
            &mut flags,
            &mut observer,
        );
        assert_eq!(controller.state(), ShiftState::Cooldown);
        assert!(!limit_asserted(flags));

        let rearm_at = released_at + COOLDOWN_TICKS + 1;
        controller.tick_observed(
            &InputSnapshot::idle(TickInstant::from_ticks(rearm_at)),
            &mut flags,
            &mut observer,
        );
        assert_eq!(controller.state(), ShiftState::Ready);
        assert_eq!(controller.cooldown_start(), TickInstant::ZERO);

        assert_eq!(
            observer.transitions.as_slice(),
            &[
                Transition::CutStarted {
                    at: TickInstant::ZERO,
                    target_ticks: KILL_TICKS,
                },
                Transition::CutReleased {
                    at: TickInstant::from_ticks(released_at),
                    held_ticks: released_at,
                },
                Transition::Rearmed {
                    at: TickInstant::from_ticks(rearm_at),
                    waited_ticks: COOLDOWN_TICKS + 1,
                },
            ]
        );
    }

    #[test]
    fn held_trigger_cuts_again_after_rearm() {
        let mut controller = ShiftCutController::with_defaults();
        let mut flags = 0u8;

        controller.tick(&eligible(0), &mut flags);
        controller.tick(&eligible(KILL_TICKS + 1), &mut flags);
        let rearm_at = KILL_TICKS + 1 + COOLDOWN_TICKS + 1;
        controller.tick(&eligible(rearm_at), &mut flags);

        // Rearm happens at the end of the tick; the next tick sees the trigger.
        assert_eq!(controller.state(), ShiftState::Ready);
        controller.tick(&eligible(rearm_at + 1), &mut flags);
        assert_eq!(controller.state(), ShiftState::Active);
    }

    #[test]
    fn idle_ready_is_idempotent() {
        let mut controller = ShiftCutController::with_defaults();
        let mut flags = 0b1000_0000u8;

        for at in (0..10_000u32).step_by(997) {
            controller.tick(&InputSnapshot::idle(TickInstant::from_ticks(at)), &mut flags);
            assert_eq!(controller.state(), ShiftState::Ready);
            assert_eq!(flags, 0b1000_0000);
        }
    }

    #[test]
    fn release_preserves_foreign_flag_bits() {
        let mut controller = ShiftCutController::with_defaults();
        let mut flags = 0b0101_0000u8;

        controller.tick(&eligible(0), &mut flags);
        assert_eq!(flags, 0b0101_0011);

        controller.tick(&eligible(KILL_TICKS + 1), &mut flags);
        assert_eq!(flags, 0b0101_0000);
    }

    #[test]
    fn set_config_keeps_latched_kill_target() {
        let mut controller = ShiftCutController::with_defaults();
        let mut flags = 0u8;

        controller.tick(&eligible(0), &mut flags);
        controller
            .set_config(ShiftCutConfig {
                kill_time_ms: 10,
                ..ShiftCutConfig::DEFAULT
            })
            .expect("valid config");

        controller.tick(&eligible(200_000), &mut flags);
        assert_eq!(controller.state(), ShiftState::Active);
        assert_eq!(controller.kill_target_duration(), KILL_TICKS);
    }

    #[test]
    fn restart_clears_timing_but_keeps_tunables() {
        let mut controller = ShiftCutController::with_defaults();
        let mut flags = 0u8;
        let config = ShiftCutConfig {
            kill_time_ms: 25,
            ..ShiftCutConfig::DEFAULT
        };
        controller.set_config(config).expect("valid config");
        controller.tick(&eligible(900), &mut flags);
        assert_eq!(controller.state(), ShiftState::Active);

        controller.restart();

        assert_eq!(controller.state(), ShiftState::Ready);
        assert_eq!(controller.kill_start(), TickInstant::ZERO);
        assert_eq!(controller.kill_target_duration(), 0);
        assert_eq!(controller.cooldown_start(), TickInstant::ZERO);
        assert_eq!(controller.config(), &config);
    }

    #[test]
    fn set_config_rejects_invalid_values() {
        let mut controller = ShiftCutController::with_defaults();
        let result = controller.set_config(ShiftCutConfig {
            ticks_per_ms: 0,
            ..ShiftCutConfig::DEFAULT
        });

        assert_eq!(result, Err(ConfigError::ZeroTickRate));
        assert_eq!(controller.config(), &ShiftCutConfig::DEFAULT);
    }

    #[test]
    fn snapshot_reports_remaining_ticks() {
        let mut controller = ShiftCutController::with_defaults();
        let mut flags = 0u8;

        assert_eq!(controller.snapshot(TickInstant::ZERO).remaining_ticks, None);

        controller.tick(&eligible(100), &mut flags);
        let snapshot = controller.snapshot(TickInstant::from_ticks(100 + 200_000));
        assert_eq!(snapshot.state, ShiftState::Active);
        assert_eq!(snapshot.remaining_ticks, Some(KILL_TICKS - 200_000));

        controller.tick(&eligible(100 + KILL_TICKS + 1), &mut flags);
        let snapshot = controller.snapshot(TickInstant::from_ticks(100 + KILL_TICKS + 1));
        assert_eq!(snapshot.state, ShiftState::Cooldown);
        assert_eq!(snapshot.remaining_ticks, Some(COOLDOWN_TICKS));
    }

    #[test]
    fn transition_reports_entered_state() {
        let at = TickInstant::from_ticks(7);
        assert_eq!(
            Transition::CutRejected {
                at,
                reason: Ineligible::TopGear
            }
            .next_state(),
            ShiftState::Cooldown
        );
        assert_eq!(
            Transition::Rearmed {
                at,
                waited_ticks: 0
            }
            .at(),
            at
        );
    }
}
