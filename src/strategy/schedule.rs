use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{SessionConfig, SessionWindowConfig};
use crate::error::EngineError;
use crate::models::Session;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BoundaryKind {
    // End sorts first so a session closes before one opening at the same instant
    End,
    Start,
}

/// A session opening or closing at a concrete instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionBoundary {
    pub at: DateTime<Utc>,
    pub session: Session,
    pub kind: BoundaryKind,
}

/// Wall-clock window of a session in exchange time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    pub session: Session,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl SessionWindow {
    /// True when the window runs past midnight (end before start)
    pub fn wraps_midnight(&self) -> bool {
        self.end <= self.start
    }

    /// Whether a time of day falls inside the window, ends inclusive
    pub fn contains_time(&self, t: NaiveTime) -> bool {
        if self.wraps_midnight() {
            t >= self.start || t <= self.end
        } else {
            t >= self.start && t <= self.end
        }
    }
}

/// Fixed daily session timetable
#[derive(Debug, Clone)]
pub struct SessionSchedule {
    windows: [SessionWindow; 3],
    offset: FixedOffset,
}

impl Default for SessionSchedule {
    fn default() -> Self {
        let time = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN);
        Self {
            windows: [
                SessionWindow {
                    session: Session::Overnight,
                    start: time(4, 0),
                    end: time(8, 30),
                },
                SessionWindow {
                    session: Session::Regular,
                    start: time(10, 30),
                    end: time(16, 0),
                },
                SessionWindow {
                    session: Session::After,
                    start: time(20, 30),
                    end: time(2, 0),
                },
            ],
            offset: Utc.fix(),
        }
    }
}

impl SessionSchedule {
    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        let offset = FixedOffset::east_opt(config.utc_offset_minutes * 60).ok_or_else(|| {
            EngineError::InvalidConfig(format!(
                "sessions.utc_offset_minutes out of range: {}",
                config.utc_offset_minutes
            ))
        })?;

        Ok(Self {
            windows: [
                parse_window(Session::Overnight, &config.overnight)?,
                parse_window(Session::Regular, &config.regular)?,
                parse_window(Session::After, &config.after)?,
            ],
            offset,
        })
    }

    pub fn window(&self, session: Session) -> &SessionWindow {
        match session {
            Session::Overnight => &self.windows[0],
            Session::Regular => &self.windows[1],
            Session::After => &self.windows[2],
        }
    }

    pub fn windows(&self) -> &[SessionWindow] {
        &self.windows
    }

    /// Exchange-local wall-clock time of an instant
    pub fn local_time(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        at.with_timezone(&self.offset)
    }

    /// Start and end instants of a session opening at `start`
    ///
    /// The end is the first occurrence of the window's end time after the
    /// start, so the After session ends on the following day.
    pub fn interval_from(&self, session: Session, start: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let window = self.window(session);
        let local_day = self.local_time(start).date_naive();
        let mut end = self.instant(local_day, window.end)?;
        if end <= start {
            end += Duration::days(1);
        }
        Some((start, end))
    }

    /// Every boundary with `from <= at < to`, in temporal order
    pub fn boundaries_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<SessionBoundary> {
        let mut boundaries = Vec::new();
        if to <= from {
            return boundaries;
        }

        let first_day = self.local_time(from).date_naive();
        let last_day = self.local_time(to).date_naive();

        let mut day = first_day;
        while day <= last_day {
            for window in &self.windows {
                for (time, kind) in [(window.start, BoundaryKind::Start), (window.end, BoundaryKind::End)] {
                    if let Some(at) = self.instant(day, time) {
                        if from <= at && at < to {
                            boundaries.push(SessionBoundary {
                                at,
                                session: window.session,
                                kind,
                            });
                        }
                    }
                }
            }
            day += Duration::days(1);
        }

        boundaries.sort_by(|a, b| a.at.cmp(&b.at).then(a.kind.cmp(&b.kind)));
        boundaries
    }

    /// UTC instant of an exchange-local date and time
    pub fn instant(&self, day: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
        self.offset
            .from_local_datetime(&day.and_time(time))
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

fn parse_window(session: Session, config: &SessionWindowConfig) -> Result<SessionWindow> {
    let parse = |value: &str| {
        NaiveTime::parse_from_str(value, "%H:%M").map_err(|e| {
            EngineError::InvalidConfig(format!("{} session time '{}': {}", session, value, e))
        })
    };
    Ok(SessionWindow {
        session,
        start: parse(&config.start)?,
        end: parse(&config.end)?,
    })
}
