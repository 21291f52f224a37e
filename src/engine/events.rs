use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::models::{Candle, Session};
use crate::strategy::{BoundaryKind, SessionBoundary, SessionSchedule};

/// Everything the engine reacts to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
    Bar(Candle),
    SessionStart { session: Session, at: DateTime<Utc> },
    SessionEnd { session: Session, at: DateTime<Utc> },
}

impl EngineEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            EngineEvent::Bar(bar) => bar.timestamp,
            EngineEvent::SessionStart { at, .. } | EngineEvent::SessionEnd { at, .. } => *at,
        }
    }
}

impl From<SessionBoundary> for EngineEvent {
    fn from(boundary: SessionBoundary) -> Self {
        match boundary.kind {
            BoundaryKind::Start => EngineEvent::SessionStart {
                session: boundary.session,
                at: boundary.at,
            },
            BoundaryKind::End => EngineEvent::SessionEnd {
                session: boundary.session,
                at: boundary.at,
            },
        }
    }
}

/// Interleaves session boundaries into a bar stream
///
/// A boundary at T comes after every bar closing at or before T and before
/// the first bar closing after T. Nothing is emitted before the first bar.
pub struct EventSequencer<I> {
    bars: I,
    schedule: SessionSchedule,
    last_bar_at: Option<DateTime<Utc>>,
    queue: VecDeque<EngineEvent>,
}

impl<I> EventSequencer<I>
where
    I: Iterator<Item = Candle>,
{
    pub fn new(bars: I, schedule: SessionSchedule) -> Self {
        Self {
            bars,
            schedule,
            last_bar_at: None,
            queue: VecDeque::new(),
        }
    }
}

impl<I> Iterator for EventSequencer<I>
where
    I: Iterator<Item = Candle>,
{
    type Item = EngineEvent;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(event) = self.queue.pop_front() {
            return Some(event);
        }

        let bar = self.bars.next()?;
        match self.last_bar_at {
            Some(previous) if bar.timestamp > previous => {
                self.queue.extend(
                    self.schedule
                        .boundaries_between(previous, bar.timestamp)
                        .into_iter()
                        .map(EngineEvent::from),
                );
                self.last_bar_at = Some(bar.timestamp);
            }
            Some(previous) => {
                tracing::warn!(
                    "Bar at {} is not after {}, delivered without boundaries",
                    bar.timestamp,
                    previous
                );
            }
            None => self.last_bar_at = Some(bar.timestamp),
        }

        self.queue.push_back(EngineEvent::Bar(bar));
        self.queue.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn bars(from: DateTime<Utc>, count: i64) -> Vec<Candle> {
        (0..count)
            .map(|i| Candle {
                symbol: "ESZ3".to_string(),
                timestamp: from + Duration::minutes(i),
                open: 4500.0,
                high: 4501.0,
                low: 4499.0,
                close: 4500.0,
                volume: 1.0,
                open_interest: 500.0,
            })
            .collect()
    }

    fn label(event: &EngineEvent) -> String {
        match event {
            EngineEvent::Bar(bar) => bar.timestamp.format("%H:%M").to_string(),
            EngineEvent::SessionStart { session, .. } => format!("{} start", session),
            EngineEvent::SessionEnd { session, .. } => format!("{} end", session),
        }
    }

    #[test]
    fn test_boundary_after_bar_at_same_instant() {
        let start = Utc.with_ymd_and_hms(2023, 9, 1, 3, 59, 0).unwrap();
        let events: Vec<String> = EventSequencer::new(bars(start, 3).into_iter(), SessionSchedule::default())
            .map(|e| label(&e))
            .collect();
        assert_eq!(events, vec!["03:59", "04:00", "ODR start", "04:01"]);
    }

    #[test]
    fn test_gap_delivers_all_boundaries_in_order() {
        let first = Utc.with_ymd_and_hms(2023, 9, 1, 8, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2023, 9, 1, 11, 0, 0).unwrap();
        let mut data = bars(first, 1);
        data.extend(bars(second, 1));

        let events: Vec<String> = EventSequencer::new(data.into_iter(), SessionSchedule::default())
            .map(|e| label(&e))
            .collect();
        assert_eq!(events, vec!["08:00", "ODR end", "RDR start", "11:00"]);
    }

    #[test]
    fn test_nothing_before_first_bar() {
        // the 04:00 start precedes the first bar, so it is never delivered
        let start = Utc.with_ymd_and_hms(2023, 9, 1, 4, 1, 0).unwrap();
        let events: Vec<EngineEvent> =
            EventSequencer::new(bars(start, 2).into_iter(), SessionSchedule::default()).collect();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| matches!(e, EngineEvent::Bar(_))));
    }

    #[test]
    fn test_event_timestamps_non_decreasing() {
        let start = Utc.with_ymd_and_hms(2023, 9, 1, 0, 0, 0).unwrap();
        let events: Vec<EngineEvent> =
            EventSequencer::new(bars(start, 48 * 60).into_iter(), SessionSchedule::default()).collect();
        let boundaries = events
            .iter()
            .filter(|e| !matches!(e, EngineEvent::Bar(_)))
            .count();
        // six per day
        assert_eq!(boundaries, 12);
        assert!(events.windows(2).all(|w| w[0].timestamp() <= w[1].timestamp()));
    }
}
