use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use std::path::Path;

use super::schedule::SessionSchedule;
use crate::error::EngineError;
use crate::models::Session;
use crate::Result;

/// Event titles that block entries
pub const BLOCKING_TITLES: [&str; 7] = [
    "CPI m/m",
    "CPI q/q",
    "CPI y/y",
    "Core CPI m/m",
    "Core CPI y/y",
    "Non-Farm Employment Change",
    "FOMC Meeting Minutes",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTime {
    At(NaiveTime),
    AllDay,
    /// "Tentative" and friends: listed without a usable time
    Unscheduled,
}

/// One economic calendar row, in exchange-local time
#[derive(Debug, Clone, PartialEq)]
pub struct NewsEvent {
    pub date: NaiveDate,
    pub time: EventTime,
    pub currency: String,
    pub impact: String,
    pub title: String,
}

#[derive(Debug, Deserialize)]
struct CalendarRow {
    date: String,
    time: String,
    currency: String,
    impact: String,
    event: String,
}

impl NewsEvent {
    fn from_row(row: CalendarRow) -> Result<Self> {
        let date = NaiveDate::parse_from_str(row.date.trim(), "%b %d %Y")
            .map_err(|e| EngineError::InvalidCalendar(format!("date '{}': {}", row.date, e)))?;
        Ok(Self {
            date,
            time: parse_event_time(&row.time),
            currency: row.currency.trim().to_string(),
            impact: row.impact.trim().to_string(),
            title: row.event.trim().to_string(),
        })
    }
}

fn parse_event_time(raw: &str) -> EventTime {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("all day") {
        return EventTime::AllDay;
    }
    match NaiveTime::parse_from_str(&raw.to_ascii_lowercase(), "%I:%M%p") {
        Ok(time) => EventTime::At(time),
        Err(_) => EventTime::Unscheduled,
    }
}

/// High-impact news filter for session entries
#[derive(Debug, Clone, Default)]
pub struct NewsCalendar {
    events: Vec<NewsEvent>,
}

impl NewsCalendar {
    pub fn new(events: Vec<NewsEvent>) -> Self {
        Self { events }
    }

    /// Load `date,time,currency,impact,event` rows
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path.as_ref())?;
        Self::from_csv_reader(reader)
    }

    pub fn from_csv_reader<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Self> {
        let mut events = Vec::new();
        for row in reader.deserialize::<CalendarRow>() {
            events.push(NewsEvent::from_row(row?)?);
        }
        tracing::info!("📅 Loaded {} economic calendar events", events.len());
        Ok(Self { events })
    }

    pub fn events(&self) -> &[NewsEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Keep only USD high-impact CPI, NFP and FOMC minutes events
    pub fn high_impact_usd(self) -> Self {
        let events = self
            .events
            .into_iter()
            .filter(|e| {
                e.currency == "USD" && e.impact == "High" && BLOCKING_TITLES.contains(&e.title.as_str())
            })
            .collect();
        Self { events }
    }

    /// Whether a session opening at `opened_at` may take entries
    ///
    /// Blocked by an all-day event on the session's trading date, or by a
    /// timed event between the start of the DR look-back and the session end.
    pub fn allows_entries(
        &self,
        session: Session,
        opened_at: DateTime<Utc>,
        schedule: &SessionSchedule,
        lookback: Duration,
    ) -> bool {
        let trading_date = schedule.local_time(opened_at).date_naive();
        let Some((start, end)) = schedule.interval_from(session, opened_at) else {
            return true;
        };
        let window_start = start - lookback;

        for event in &self.events {
            let blocked = match event.time {
                EventTime::AllDay => event.date == trading_date,
                EventTime::At(time) => schedule
                    .instant(event.date, time)
                    .is_some_and(|at| window_start <= at && at <= end),
                EventTime::Unscheduled => false,
            };
            if blocked {
                tracing::info!(
                    "📰 High impact news for {} session: {} ({})",
                    session,
                    event.title,
                    event.date
                );
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE: &str = "date,time,currency,impact,event
Jan 12 2023,8:30am,USD,High,CPI m/m
Jan 12 2023,8:30am,EUR,High,CPI m/m
Jan 13 2023,10:00am,USD,Medium,Prelim UoM Consumer Sentiment
Feb 3 2023,All Day,USD,High,Non-Farm Employment Change
Feb 22 2023,2:00pm,USD,High,FOMC Meeting Minutes
Mar 1 2023,Tentative,USD,High,CPI y/y
";

    fn calendar() -> NewsCalendar {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(SAMPLE.as_bytes());
        NewsCalendar::from_csv_reader(reader).unwrap().high_impact_usd()
    }

    fn lookback() -> Duration {
        Duration::minutes(60)
    }

    #[test]
    fn test_parse_and_filter() {
        let cal = calendar();
        assert_eq!(cal.len(), 4);
        assert_eq!(
            cal.events()[0].time,
            EventTime::At(NaiveTime::from_hms_opt(8, 30, 0).unwrap())
        );
        assert_eq!(cal.events()[1].time, EventTime::AllDay);
        assert_eq!(cal.events()[3].time, EventTime::Unscheduled);
    }

    #[test]
    fn test_timed_event_blocks_only_its_session() {
        let cal = calendar();
        let schedule = SessionSchedule::default();

        let odr_open = Utc.with_ymd_and_hms(2023, 1, 12, 4, 0, 0).unwrap();
        assert!(!cal.allows_entries(Session::Overnight, odr_open, &schedule, lookback()));

        let rdr_open = Utc.with_ymd_and_hms(2023, 1, 12, 10, 30, 0).unwrap();
        assert!(cal.allows_entries(Session::Regular, rdr_open, &schedule, lookback()));

        let fomc_rdr = Utc.with_ymd_and_hms(2023, 2, 22, 10, 30, 0).unwrap();
        assert!(!cal.allows_entries(Session::Regular, fomc_rdr, &schedule, lookback()));
    }

    #[test]
    fn test_all_day_event_blocks_every_session() {
        let cal = calendar();
        let schedule = SessionSchedule::default();
        for (session, h, m) in [
            (Session::Overnight, 4, 0),
            (Session::Regular, 10, 30),
            (Session::After, 20, 30),
        ] {
            let at = Utc.with_ymd_and_hms(2023, 2, 3, h, m, 0).unwrap();
            assert!(!cal.allows_entries(session, at, &schedule, lookback()));
        }
    }

    #[test]
    fn test_lookback_extends_window() {
        let event = NewsEvent {
            date: NaiveDate::from_ymd_opt(2023, 5, 2).unwrap(),
            time: EventTime::At(NaiveTime::from_hms_opt(9, 45, 0).unwrap()),
            currency: "USD".to_string(),
            impact: "High".to_string(),
            title: "CPI m/m".to_string(),
        };
        let cal = NewsCalendar::new(vec![event]);
        let schedule = SessionSchedule::default();
        let rdr_open = Utc.with_ymd_and_hms(2023, 5, 2, 10, 30, 0).unwrap();

        // 09:45 falls in the hour before the 10:30 open
        assert!(!cal.allows_entries(Session::Regular, rdr_open, &schedule, lookback()));
        assert!(cal.allows_entries(Session::Regular, rdr_open, &schedule, Duration::minutes(30)));
    }

    #[test]
    fn test_after_session_window_crosses_midnight() {
        let event = NewsEvent {
            date: NaiveDate::from_ymd_opt(2023, 5, 3).unwrap(),
            time: EventTime::At(NaiveTime::from_hms_opt(1, 0, 0).unwrap()),
            currency: "USD".to_string(),
            impact: "High".to_string(),
            title: "FOMC Meeting Minutes".to_string(),
        };
        let cal = NewsCalendar::new(vec![event]);
        let schedule = SessionSchedule::default();
        let adr_open = Utc.with_ymd_and_hms(2023, 5, 2, 20, 30, 0).unwrap();
        assert!(!cal.allows_entries(Session::After, adr_open, &schedule, lookback()));
    }

    #[test]
    fn test_bad_date_is_an_error() {
        let data = "date,time,currency,impact,event\nsometime,8:30am,USD,High,CPI m/m\n";
        let reader = csv::ReaderBuilder::new().from_reader(data.as_bytes());
        assert!(NewsCalendar::from_csv_reader(reader).is_err());
    }
}
