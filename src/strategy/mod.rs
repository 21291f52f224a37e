// Session range-breakout strategy
pub mod calendar;
pub mod entry;
pub mod phase;
pub mod range;
pub mod schedule;
pub mod session;

pub use calendar::{EventTime, NewsCalendar, NewsEvent};
pub use entry::{verify_rr, EntryModel, TradeProposal};
pub use phase::{PhaseState, PhaseTransition};
pub use range::{DefiningRange, ImpliedDefiningRange, RangeSnapshot, RangeTracker};
pub use schedule::{BoundaryKind, SessionBoundary, SessionSchedule, SessionWindow};
pub use session::{DailyRanges, EntryModelOutcome, SessionContext};
