use std::collections::VecDeque;

/// Which extreme a rolling window reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
    Max,
    Min,
}

/// Rolling maximum or minimum over the last `period` samples
///
/// Keeps a bounded window; once full, each new sample evicts the oldest.
/// Reports the extreme of whatever it holds, so a partially filled window
/// still yields a value (check `is_ready` for a full look-back).
#[derive(Debug, Clone)]
pub struct RollingExtremum {
    kind: Extremum,
    period: usize,
    samples: VecDeque<f64>,
}

impl RollingExtremum {
    pub fn new(kind: Extremum, period: usize) -> Self {
        Self {
            kind,
            period: period.max(1),
            samples: VecDeque::with_capacity(period.max(1)),
        }
    }

    pub fn max(period: usize) -> Self {
        Self::new(Extremum::Max, period)
    }

    pub fn min(period: usize) -> Self {
        Self::new(Extremum::Min, period)
    }

    /// Push a new sample, evicting the oldest once the window is full
    pub fn update(&mut self, value: f64) {
        self.samples.push_back(value);
        while self.samples.len() > self.period {
            self.samples.pop_front();
        }
    }

    /// Current extreme, or None before the first sample
    pub fn current(&self) -> Option<f64> {
        let mut iter = self.samples.iter().copied();
        let first = iter.next()?;
        Some(match self.kind {
            Extremum::Max => iter.fold(first, f64::max),
            Extremum::Min => iter.fold(first, f64::min),
        })
    }

    /// True once the window holds `period` samples
    pub fn is_ready(&self) -> bool {
        self.samples.len() >= self.period
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
