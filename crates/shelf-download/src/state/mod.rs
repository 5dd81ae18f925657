//! Per-item lifecycle.
//!
//! Every tracked item carries an [`ItemPhase`]. Phases only move through
//! [`ItemPhase::apply`]; a pair that is not in the transition table is
//! rejected and the phase stays where it was.
//!
//! ```text
//! Idle|Complete|Failed|Blocked --Enqueue--> Queued
//! Queued --BeginSchedule--> Scheduling --Submitted--> InFlight
//! Scheduling --ScheduleRejected--> Queued
//! InFlight --TrackFinished--> Queued
//! Queued|Scheduling|InFlight --AllTracksPresent--> Complete
//! Scheduling|InFlight --TransferFailed--> Failed
//! * --Cancel--> Blocked
//! ```

mod guards;

use std::fmt;

use thiserror::Error;

pub use guards::{HaltWindow, LiveActivity, RescheduleGate};

/// Where an item is in its download lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ItemPhase {
    /// Known but never queued.
    #[default]
    Idle,
    /// Waiting in the global queue or between tracks.
    Queued,
    /// A schedule attempt is running for the item.
    Scheduling,
    /// A task was submitted to the engine.
    InFlight,
    /// Every track is on disk.
    Complete,
    /// The last transfer failed.
    Failed,
    /// Canceled by the user; excluded from chaining.
    Blocked,
}

/// Events that move an item between phases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemTransition {
    Enqueue,
    BeginSchedule,
    Submitted,
    ScheduleRejected,
    TrackFinished,
    AllTracksPresent,
    TransferFailed,
    Cancel,
}

/// A transition that is not allowed from the current phase.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("transition {transition:?} not allowed from {from}")]
pub struct InvalidTransition {
    pub from: ItemPhase,
    pub transition: ItemTransition,
}

impl ItemPhase {
    /// Target phase for `transition`, or `None` if the pair is not allowed.
    #[must_use]
    pub const fn apply(self, transition: ItemTransition) -> Option<Self> {
        use ItemPhase as P;
        use ItemTransition as T;

        match (self, transition) {
            (_, T::Cancel) => Some(P::Blocked),
            (P::Idle | P::Complete | P::Failed | P::Blocked, T::Enqueue) => Some(P::Queued),
            (P::Queued, T::BeginSchedule) => Some(P::Scheduling),
            (P::Scheduling, T::Submitted) => Some(P::InFlight),
            (P::Scheduling, T::ScheduleRejected) | (P::InFlight, T::TrackFinished) => {
                Some(P::Queued)
            }
            (P::Queued | P::Scheduling | P::InFlight, T::AllTracksPresent) => Some(P::Complete),
            (P::Scheduling | P::InFlight, T::TransferFailed) => Some(P::Failed),
            _ => None,
        }
    }

    /// Apply `transition` in place.
    pub fn transition(&mut self, transition: ItemTransition) -> Result<Self, InvalidTransition> {
        let next = self.apply(transition).ok_or(InvalidTransition {
            from: *self,
            transition,
        })?;
        *self = next;
        Ok(next)
    }

    /// A schedule is pending or a task is submitted.
    #[must_use]
    pub const fn is_in_flight(self) -> bool {
        matches!(self, Self::Scheduling | Self::InFlight)
    }

    /// Queued or in flight.
    #[must_use]
    pub const fn is_activated(self) -> bool {
        matches!(self, Self::Queued | Self::Scheduling | Self::InFlight)
    }

    /// Convert to string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Queued => "queued",
            Self::Scheduling => "scheduling",
            Self::InFlight => "in_flight",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
        }
    }
}

impl fmt::Display for ItemPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_PHASES: [ItemPhase; 7] = [
        ItemPhase::Idle,
        ItemPhase::Queued,
        ItemPhase::Scheduling,
        ItemPhase::InFlight,
        ItemPhase::Complete,
        ItemPhase::Failed,
        ItemPhase::Blocked,
    ];

    #[test]
    fn test_happy_path_chain() {
        let mut phase = ItemPhase::Idle;
        phase.transition(ItemTransition::Enqueue).unwrap();
        phase.transition(ItemTransition::BeginSchedule).unwrap();
        phase.transition(ItemTransition::Submitted).unwrap();
        assert!(phase.is_in_flight());

        phase.transition(ItemTransition::TrackFinished).unwrap();
        assert_eq!(phase, ItemPhase::Queued);
        phase.transition(ItemTransition::AllTracksPresent).unwrap();
        assert_eq!(phase, ItemPhase::Complete);
        assert!(!phase.is_activated());
    }

    #[test]
    fn test_cancel_from_anywhere() {
        for phase in ALL_PHASES {
            assert_eq!(phase.apply(ItemTransition::Cancel), Some(ItemPhase::Blocked));
        }
    }

    #[test]
    fn test_rejected_pair_leaves_phase() {
        let mut phase = ItemPhase::Queued;
        let err = phase.transition(ItemTransition::Submitted).unwrap_err();
        assert_eq!(err.from, ItemPhase::Queued);
        assert_eq!(phase, ItemPhase::Queued);

        assert_eq!(ItemPhase::Complete.apply(ItemTransition::AllTracksPresent), None);
        assert_eq!(ItemPhase::Queued.apply(ItemTransition::Enqueue), None);
        assert_eq!(ItemPhase::Blocked.apply(ItemTransition::TransferFailed), None);
        assert_eq!(ItemPhase::Queued.apply(ItemTransition::TransferFailed), None);
    }

    #[test]
    fn test_schedule_rejection_returns_to_queue() {
        assert_eq!(
            ItemPhase::Scheduling.apply(ItemTransition::ScheduleRejected),
            Some(ItemPhase::Queued)
        );
        assert_eq!(
            ItemPhase::InFlight.apply(ItemTransition::TransferFailed),
            Some(ItemPhase::Failed)
        );
    }

    #[test]
    fn test_activation_predicates() {
        let activated: Vec<_> = ALL_PHASES.into_iter().filter(|p| p.is_activated()).collect();
        assert_eq!(
            activated,
            vec![ItemPhase::Queued, ItemPhase::Scheduling, ItemPhase::InFlight]
        );
        assert!(!ItemPhase::Queued.is_in_flight());
    }
}
