//! Telemetry event catalog and transition history.
//!
//! Every controller transition can be captured into a fixed-size ring so a
//! diagnostics front-end (the bench emulator, or a debugger attached to the
//! firmware) can replay recent shift activity. Event kinds encode to compact
//! numeric codes for transport, and timestamps are raw tick counter values.

use core::fmt;

use heapless::HistoryBuf;

use crate::controller::{Ineligible, Transition, TransitionObserver};
use crate::signals::TickInstant;

/// Identifier assigned to each recorded event.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryEventKind {
    CutStarted,
    CutRejected(Ineligible),
    CutReleased,
    Rearmed,
    Custom(u16),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::CutStarted => f.write_str("cut-started"),
            TelemetryEventKind::CutRejected(reason) => write!(f, "cut-rejected {reason}"),
            TelemetryEventKind::CutReleased => f.write_str("cut-released"),
            TelemetryEventKind::Rearmed => f.write_str("rearmed"),
            TelemetryEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl TelemetryEventKind {
    const CUT_STARTED_CODE: u16 = 0x0001;
    const CUT_RELEASED_CODE: u16 = 0x0002;
    const REARMED_CODE: u16 = 0x0003;
    const CUT_REJECTED_BASE: u16 = 0x0010;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::CutStarted => Self::CUT_STARTED_CODE,
            TelemetryEventKind::CutReleased => Self::CUT_RELEASED_CODE,
            TelemetryEventKind::Rearmed => Self::REARMED_CODE,
            TelemetryEventKind::CutRejected(reason) => {
                Self::CUT_REJECTED_BASE + reason_index(reason)
            }
            TelemetryEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`TelemetryEventKind::Custom`].
    #[must_use]
    pub fn from_raw(code: u16) -> Self {
        match code {
            Self::CUT_STARTED_CODE => TelemetryEventKind::CutStarted,
            Self::CUT_RELEASED_CODE => TelemetryEventKind::CutReleased,
            Self::REARMED_CODE => TelemetryEventKind::Rearmed,
            value if (Self::CUT_REJECTED_BASE..Self::CUT_REJECTED_BASE + 3).contains(&value) => {
                reason_from_index(value - Self::CUT_REJECTED_BASE)
                    .map_or(TelemetryEventKind::Custom(value), TelemetryEventKind::CutRejected)
            }
            other => TelemetryEventKind::Custom(other),
        }
    }

    /// Maps a controller transition onto its event kind.
    #[must_use]
    pub const fn from_transition(transition: &Transition) -> Self {
        match *transition {
            Transition::CutStarted { .. } => TelemetryEventKind::CutStarted,
            Transition::CutRejected { reason, .. } => TelemetryEventKind::CutRejected(reason),
            Transition::CutReleased { .. } => TelemetryEventKind::CutReleased,
            Transition::Rearmed { .. } => TelemetryEventKind::Rearmed,
        }
    }
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetryRecord {
    pub id: EventId,
    pub timestamp: TickInstant,
    pub event: TelemetryEventKind,
    /// Cut target for `CutStarted`, hold time for `CutReleased`, wait time
    /// for `Rearmed`, zero otherwise.
    pub phase_ticks: u32,
    /// Ticks since the previous record, if any.
    pub elapsed_since_previous: Option<u32>,
}

/// Lifetime counters that survive ring overwrites.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ShiftCounters {
    pub cuts: u32,
    pub rejections: u32,
}

/// Records controller transitions into a fixed-size ring buffer.
pub struct TelemetryRecorder<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: HistoryBuf<TelemetryRecord, CAPACITY>,
    last_event_at: Option<TickInstant>,
    next_event_id: EventId,
    counters: ShiftCounters,
}

impl<const CAPACITY: usize> TelemetryRecorder<CAPACITY> {
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            last_event_at: None,
            next_event_id: 0,
            counters: ShiftCounters {
                cuts: 0,
                rejections: 0,
            },
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> impl Iterator<Item = &TelemetryRecord> + '_ {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn counters(&self) -> ShiftCounters {
        self.counters
    }

    /// Records a controller transition.
    pub fn record_transition(&mut self, transition: &Transition) -> EventId {
        let phase_ticks = match *transition {
            Transition::CutStarted { target_ticks, .. } => {
                self.counters.cuts = self.counters.cuts.wrapping_add(1);
                target_ticks
            }
            Transition::CutRejected { .. } => {
                self.counters.rejections = self.counters.rejections.wrapping_add(1);
                0
            }
            Transition::CutReleased { held_ticks, .. } => held_ticks,
            Transition::Rearmed { waited_ticks, .. } => waited_ticks,
        };

        self.record(
            TelemetryEventKind::from_transition(transition),
            phase_ticks,
            transition.at(),
        )
    }

    /// Records an arbitrary telemetry event.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        phase_ticks: u32,
        timestamp: TickInstant,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        let elapsed_since_previous = self
            .last_event_at
            .map(|previous| timestamp.ticks_since(previous));
        self.last_event_at = Some(timestamp);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            phase_ticks,
            elapsed_since_previous,
        });

        id
    }
}

impl<const CAPACITY: usize> Default for TelemetryRecorder<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAPACITY: usize> TransitionObserver for TelemetryRecorder<CAPACITY> {
    fn on_transition(&mut self, transition: Transition) {
        self.record_transition(&transition);
    }
}

const fn reason_index(reason: Ineligible) -> u16 {
    match reason {
        Ineligible::SpeedTooLow => 0,
        Ineligible::TopGear => 1,
        Ineligible::ThrottleTooLow => 2,
    }
}

fn reason_from_index(index: u16) -> Option<Ineligible> {
    match index {
        0 => Some(Ineligible::SpeedTooLow),
        1 => Some(Ineligible::TopGear),
        2 => Some(Ineligible::ThrottleTooLow),
        _ => None,
    }
}
