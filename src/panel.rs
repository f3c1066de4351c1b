//! Request lifecycle shared by the panel orchestrators.
//!
//! Every panel result area follows `Idle -> Pending -> {Success, Error}`,
//! re-entered on the next trigger. A [`Slot`] holds that state for one
//! result area and hands out tickets: only the most recent ticket may settle
//! it, and [`Slot::reset`] (on a context change) voids every outstanding
//! ticket. A response for a voided ticket is dropped.

/// Lifecycle phase of a panel result area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Pending,
    Success,
    Error,
}

/// Visible state of one result area.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelState<T> {
    pub phase: Phase,
    pub result: Option<T>,
    pub error: Option<String>,
}

impl<T> Default for PanelState<T> {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            result: None,
            error: None,
        }
    }
}

impl<T> PanelState<T> {
    pub fn is_pending(&self) -> bool {
        self.phase == Phase::Pending
    }

    pub fn has_error(&self) -> bool {
        self.phase == Phase::Error
    }
}

/// What to do with the previous result when a request fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OnFailure {
    KeepResult,
    ClearResult,
}

#[derive(Debug)]
pub(crate) struct Slot<T> {
    state: PanelState<T>,
    ticket: u64,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            state: PanelState::default(),
            ticket: 0,
        }
    }
}

impl<T: Clone> Slot<T> {
    pub(crate) fn state(&self) -> PanelState<T> {
        self.state.clone()
    }

    /// Enter `Pending` and return the ticket that may settle this request.
    pub(crate) fn begin(&mut self) -> u64 {
        self.ticket += 1;
        self.state.phase = Phase::Pending;
        self.state.error = None;
        self.ticket
    }

    /// Store `value` if `ticket` is still current. Returns whether it was.
    pub(crate) fn succeed(&mut self, ticket: u64, value: T) -> bool {
        if ticket != self.ticket {
            return false;
        }
        self.state.phase = Phase::Success;
        self.state.result = Some(value);
        true
    }

    pub(crate) fn fail(&mut self, ticket: u64, message: String, on_failure: OnFailure) -> bool {
        if ticket != self.ticket {
            return false;
        }
        self.state.phase = Phase::Error;
        self.state.error = Some(message);
        if on_failure == OnFailure::ClearResult {
            self.state.result = None;
        }
        true
    }

    /// Back to `Idle` with no result; outstanding tickets are voided.
    pub(crate) fn reset(&mut self) {
        self.ticket += 1;
        self.state = PanelState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_ticket_wins() {
        let mut slot = Slot::<u32>::default();
        let first = slot.begin();
        let second = slot.begin();
        assert!(!slot.succeed(first, 1));
        assert!(slot.state().is_pending());
        assert!(slot.succeed(second, 2));
        assert_eq!(slot.state().result, Some(2));
        assert_eq!(slot.state().phase, Phase::Success);
    }

    #[test]
    fn test_failure_keeps_or_clears_result() {
        let mut slot = Slot::<u32>::default();
        let t = slot.begin();
        slot.succeed(t, 1);

        let t = slot.begin();
        assert!(slot.fail(t, "boom".into(), OnFailure::KeepResult));
        assert!(slot.state().has_error());
        assert_eq!(slot.state().result, Some(1));

        let t = slot.begin();
        assert!(slot.state().error.is_none());
        slot.fail(t, "boom".into(), OnFailure::ClearResult);
        assert_eq!(slot.state().result, None);
    }

    #[test]
    fn test_reset_voids_outstanding_ticket() {
        let mut slot = Slot::<u32>::default();
        let t = slot.begin();
        slot.reset();
        assert!(!slot.succeed(t, 9));
        assert_eq!(slot.state(), PanelState::default());
    }
}
