// Price helpers for range tracking
// Tick rounding and rolling extremum windows

pub mod rolling;
pub mod tick;

pub use rolling::{Extremum, RollingExtremum};
pub use tick::{round_to_increment, round_to_tick, TICK_SIZE};
