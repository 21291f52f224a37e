use serde::{Deserialize, Serialize};

use super::entry::{EntryModel, TradeProposal};
use super::phase::{PhaseState, PhaseTransition};
use super::range::{DefiningRange, ImpliedDefiningRange, RangeSnapshot};
use crate::models::Session;

/// Result of running the one-shot entry model for a session
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntryModelOutcome {
    /// Passed the RR gate and is now the session's proposal
    Published(TradeProposal),
    /// Failed the RR gate; nothing is retried this session
    Rejected(TradeProposal),
}

/// Everything the engine knows about the session in progress
///
/// Owned by the engine and replaced wholesale at reset, so a session can
/// never see another session's ranges, phases or latches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionContext {
    session: Option<Session>,
    ranges: Option<RangeSnapshot>,
    phase: PhaseState,
    proposal: Option<TradeProposal>,
    entry_models_initialized: bool,
    can_trade: bool,
    news_block_announced: bool,
}

impl SessionContext {
    /// Open a session with the ranges frozen at its start
    ///
    /// Without ranges (trackers still empty) or with a degenerate DR the
    /// context is current but phase 1 never sets, so nothing trades.
    pub fn open(session: Session, ranges: Option<RangeSnapshot>) -> (Self, Option<PhaseTransition>) {
        let (phase, edge) = match &ranges {
            Some(snapshot) => PhaseState::establish(&snapshot.dr),
            None => (PhaseState::default(), None),
        };
        let context = Self {
            session: Some(session),
            ranges,
            phase,
            can_trade: true,
            ..Self::default()
        };
        (context, edge)
    }

    /// Drop all per-session state; calling it twice is the same as once
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn session(&self) -> Option<Session> {
        self.session
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn ranges(&self) -> Option<&RangeSnapshot> {
        self.ranges.as_ref()
    }

    pub fn dr(&self) -> Option<&DefiningRange> {
        self.ranges.as_ref().map(|r| &r.dr)
    }

    pub fn idr(&self) -> Option<&ImpliedDefiningRange> {
        self.ranges.as_ref().map(|r| &r.idr)
    }

    pub fn phase(&self) -> &PhaseState {
        &self.phase
    }

    pub fn proposal(&self) -> Option<&TradeProposal> {
        self.proposal.as_ref()
    }

    pub fn entry_models_initialized(&self) -> bool {
        self.entry_models_initialized
    }

    pub fn can_trade(&self) -> bool {
        self.can_trade
    }

    /// Feed a completed aggregated close to the phase machine
    pub fn advance(&mut self, close: f64) -> Vec<PhaseTransition> {
        match self.ranges {
            Some(snapshot) => self.phase.advance(close, &snapshot.dr),
            None => Vec::new(),
        }
    }

    /// Run the entry model once, for the confirmed direction
    ///
    /// Returns None when the latch is already consumed or there is no live
    /// signal yet. Both outcomes consume the latch.
    pub fn initialize_entry_model(&mut self, model: &EntryModel) -> Option<EntryModelOutcome> {
        if self.entry_models_initialized || !self.phase.is_live_signal() {
            return None;
        }
        let direction = self.phase.direction()?;
        let idr = self.ranges?.idr;

        self.entry_models_initialized = true;
        let levels = model.levels(direction, &idr);
        match model.propose(direction, &idr) {
            Some(proposal) => {
                self.proposal = Some(proposal);
                Some(EntryModelOutcome::Published(proposal))
            }
            None => Some(EntryModelOutcome::Rejected(levels)),
        }
    }

    /// Close the can-trade latch; true if it was open
    pub fn take_trade_slot(&mut self) -> bool {
        std::mem::replace(&mut self.can_trade, false)
    }

    /// True the first time a news block is seen this session
    pub fn note_news_block(&mut self) -> bool {
        !std::mem::replace(&mut self.news_block_announced, true)
    }
}

/// Ranges frozen for each session of the current trading day
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyRanges {
    pub overnight: Option<RangeSnapshot>,
    pub regular: Option<RangeSnapshot>,
    pub after: Option<RangeSnapshot>,
}

impl DailyRanges {
    pub fn record(&mut self, session: Session, snapshot: RangeSnapshot) {
        *self.slot_mut(session) = Some(snapshot);
    }

    pub fn get(&self, session: Session) -> Option<&RangeSnapshot> {
        match session {
            Session::Overnight => self.overnight.as_ref(),
            Session::Regular => self.regular.as_ref(),
            Session::After => self.after.as_ref(),
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.overnight.is_none() && self.regular.is_none() && self.after.is_none()
    }

    fn slot_mut(&mut self, session: Session) -> &mut Option<RangeSnapshot> {
        match session {
            Session::Overnight => &mut self.overnight,
            Session::Regular => &mut self.regular,
            Session::After => &mut self.after,
        }
    }
}
