use serde::{Deserialize, Serialize};

use super::range::DefiningRange;
use crate::models::Direction;

/// A phase flag flipping false -> true
///
/// Diagnostics and counters hang off these edges; each fires at most once
/// per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseTransition {
    /// Phase 1: the session range is valid
    RangeEstablished,
    /// Phase 2: first close outside the DR
    DirectionConfirmed(Direction),
    /// Phase 3: close back through the opposite DR edge
    SignalFailed(Direction),
    /// Phase 4: close beyond a half-std bound
    HalfStdReached,
}

/// Per-session phase flags
///
/// Flags only ever go from false to true; the whole value is discarded at
/// session reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseState {
    phase1: bool,
    phase2: bool,
    phase3: bool,
    phase4: bool,
    direction: Option<Direction>,
}

impl PhaseState {
    /// Start a session: phase 1 holds only for a non-degenerate DR
    pub fn establish(dr: &DefiningRange) -> (Self, Option<PhaseTransition>) {
        if dr.is_degenerate() {
            (Self::default(), None)
        } else {
            (
                Self {
                    phase1: true,
                    ..Self::default()
                },
                Some(PhaseTransition::RangeEstablished),
            )
        }
    }

    pub fn phase1(&self) -> bool {
        self.phase1
    }

    pub fn phase2(&self) -> bool {
        self.phase2
    }

    pub fn phase3(&self) -> bool {
        self.phase3
    }

    pub fn phase4(&self) -> bool {
        self.phase4
    }

    /// Session direction, fixed by the first breakout
    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    /// Breakout confirmed and not yet invalidated
    pub fn is_live_signal(&self) -> bool {
        self.phase2 && !self.phase3
    }

    /// Advance on a completed aggregated bar close
    ///
    /// Returns the transitions this bar caused, in the order they fired.
    pub fn advance(&mut self, close: f64, dr: &DefiningRange) -> Vec<PhaseTransition> {
        let mut transitions = Vec::new();
        if !self.phase1 {
            return transitions;
        }

        if !self.phase2 {
            let breakout = if close > dr.high {
                Some(Direction::Long)
            } else if close < dr.low {
                Some(Direction::Short)
            } else {
                None
            };
            if let Some(direction) = breakout {
                self.phase2 = true;
                self.direction = Some(direction);
                transitions.push(PhaseTransition::DirectionConfirmed(direction));
            }
        }

        let Some(direction) = self.direction else {
            return transitions;
        };

        if !self.phase3 {
            let failed = match direction {
                Direction::Long => close < dr.low,
                Direction::Short => close > dr.high,
            };
            if failed {
                self.phase3 = true;
                transitions.push(PhaseTransition::SignalFailed(direction));
            }
        }

        if !self.phase4 && (close >= dr.half_std_high || close <= dr.half_std_low) {
            self.phase4 = true;
            transitions.push(PhaseTransition::HalfStdReached);
        }

        transitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dr() -> DefiningRange {
        DefiningRange::from_extremes(4500.0, 4490.0)
    }

    fn established() -> PhaseState {
        PhaseState::establish(&dr()).0
    }

    #[test]
    fn test_establish_requires_positive_range() {
        let (state, edge) = PhaseState::establish(&DefiningRange::from_extremes(4500.0, 4500.0));
        assert!(!state.phase1());
        assert!(edge.is_none());

        let (state, edge) = PhaseState::establish(&dr());
        assert!(state.phase1());
        assert_eq!(edge, Some(PhaseTransition::RangeEstablished));
    }

    #[test]
    fn test_no_advance_without_phase1() {
        let mut state = PhaseState::default();
        assert!(state.advance(4600.0, &dr()).is_empty());
        assert!(!state.phase2());
    }

    #[test]
    fn test_close_inside_range_does_nothing() {
        let mut state = established();
        assert!(state.advance(4495.0, &dr()).is_empty());
        // touching the edge is not a break
        assert!(state.advance(4500.0, &dr()).is_empty());
        assert!(state.advance(4490.0, &dr()).is_empty());
        assert_eq!(state.direction(), None);
    }

    #[test]
    fn test_long_breakout_then_failure() {
        let mut state = established();

        let edges = state.advance(4501.0, &dr());
        assert_eq!(edges, vec![PhaseTransition::DirectionConfirmed(Direction::Long)]);
        assert!(state.is_live_signal());

        let edges = state.advance(4489.0, &dr());
        assert_eq!(edges, vec![PhaseTransition::SignalFailed(Direction::Long)]);
        assert!(state.phase3());
        assert!(!state.is_live_signal());

        // direction never flips
        state.advance(4520.0, &dr());
        assert_eq!(state.direction(), Some(Direction::Long));
    }

    #[test]
    fn test_short_breakout_then_failure() {
        let mut state = established();
        state.advance(4489.0, &dr());
        assert_eq!(state.direction(), Some(Direction::Short));

        let edges = state.advance(4500.25, &dr());
        assert_eq!(edges, vec![PhaseTransition::SignalFailed(Direction::Short)]);
    }

    #[test]
    fn test_half_std_on_breakout_bar() {
        let mut state = established();
        let edges = state.advance(4505.0, &dr());
        assert_eq!(
            edges,
            vec![
                PhaseTransition::DirectionConfirmed(Direction::Long),
                PhaseTransition::HalfStdReached
            ]
        );
        assert!(state.phase4());
    }

    #[test]
    fn test_half_std_after_failure() {
        let mut state = established();
        state.advance(4501.0, &dr());
        state.advance(4489.0, &dr());
        assert!(!state.phase4());

        // opposite half-std bound still counts once phase 3 is set
        let edges = state.advance(4485.0, &dr());
        assert_eq!(edges, vec![PhaseTransition::HalfStdReached]);
    }

    #[test]
    fn test_edges_fire_once() {
        let mut state = established();
        state.advance(4506.0, &dr());
        assert!(state.advance(4507.0, &dr()).is_empty());
        state.advance(4480.0, &dr());
        assert!(state.advance(4470.0, &dr()).is_empty());
        assert!(state.phase1() && state.phase2() && state.phase3() && state.phase4());
    }
}
