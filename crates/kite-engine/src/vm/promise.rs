//! Promise state
//!
//! A promise is a heap object holding its settlement state and the
//! reactions waiting for it. Settling hands the waiting reactions back to
//! the caller, which queues one microtask per reaction; subscribing to an
//! already settled promise queues the reaction immediately. Reactions never
//! run synchronously.

use super::interpreter::Frame;
use super::value::{ObjRef, Value};

/// Final outcome of a promise
#[derive(Debug, Clone)]
pub enum Settled {
    /// Resolved with a value
    Fulfilled(Value),
    /// Rejected with a reason
    Rejected(Value),
}

/// Settlement state
#[derive(Debug, Clone)]
pub enum PromiseState {
    /// Not settled yet
    Pending,
    /// Settled
    Settled(Settled),
}

/// Continuation waiting on a promise
#[derive(Debug)]
pub enum Reaction {
    /// `then(onFulfilled, onRejected)`; `derived` is the promise `then` returned
    Then {
        /// Fulfillment handler (non-callable passes the value through)
        on_fulfilled: Value,
        /// Rejection handler (non-callable passes the reason through)
        on_rejected: Value,
        /// Promise settled with the handler's outcome
        derived: ObjRef,
    },
    /// `finally(callback)`
    Finally {
        /// Callback run on either outcome
        callback: Value,
        /// Promise settled like the source once the callback returned
        derived: ObjRef,
    },
    /// Settle `target` the same way as the source promise
    Adopt {
        /// Promise following the source
        target: ObjRef,
    },
    /// Resume a suspended async function
    Resume(Box<Frame>),
}

/// Promise payload of a heap object
#[derive(Debug)]
pub struct PromiseData {
    /// Settlement state
    pub state: PromiseState,
    /// Reactions registered while pending
    pub reactions: Vec<Reaction>,
    /// Whether any reaction was ever attached
    pub handled: bool,
}

impl Default for PromiseData {
    fn default() -> Self {
        Self::new()
    }
}

impl PromiseData {
    /// Pending promise
    pub fn new() -> Self {
        Self {
            state: PromiseState::Pending,
            reactions: Vec::new(),
            handled: false,
        }
    }

    /// Promise settled from the start
    pub fn settled(outcome: Settled) -> Self {
        Self {
            state: PromiseState::Settled(outcome),
            reactions: Vec::new(),
            handled: false,
        }
    }

    /// Whether the promise is still pending
    pub fn is_pending(&self) -> bool {
        matches!(self.state, PromiseState::Pending)
    }

    /// Outcome, once settled
    pub fn outcome(&self) -> Option<&Settled> {
        match &self.state {
            PromiseState::Pending => None,
            PromiseState::Settled(outcome) => Some(outcome),
        }
    }

    /// Settle a pending promise and take its reactions. Settling twice is
    /// a no-op.
    pub fn settle(&mut self, outcome: Settled) -> Vec<Reaction> {
        if !self.is_pending() {
            return Vec::new();
        }
        self.state = PromiseState::Settled(outcome);
        std::mem::take(&mut self.reactions)
    }

    /// Attach a reaction. Returns it with the outcome when the promise is
    /// already settled, so the caller can queue it.
    pub fn subscribe(&mut self, reaction: Reaction) -> Option<(Reaction, Settled)> {
        self.handled = true;
        match &self.state {
            PromiseState::Pending => {
                self.reactions.push(reaction);
                None
            }
            PromiseState::Settled(outcome) => Some((reaction, outcome.clone())),
        }
    }

    /// Rejected without any reaction attached
    pub fn is_unhandled_rejection(&self) -> bool {
        !self.handled && matches!(self.state, PromiseState::Settled(Settled::Rejected(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::object::{Object, ObjectKind};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn promise() -> ObjRef {
        Rc::new(RefCell::new(Object::new(ObjectKind::Promise(PromiseData::new()))))
    }

    #[test]
    fn test_reactions_are_released_once() {
        let mut data = PromiseData::new();
        assert!(data.subscribe(Reaction::Adopt { target: promise() }).is_none());
        assert_eq!(data.settle(Settled::Fulfilled(Value::Number(1.0))).len(), 1);
        assert!(data.settle(Settled::Rejected(Value::Null)).is_empty());
        assert!(matches!(data.outcome(), Some(Settled::Fulfilled(Value::Number(n))) if *n == 1.0));
    }

    #[test]
    fn test_subscribing_late_returns_the_outcome() {
        let mut data = PromiseData::settled(Settled::Rejected(Value::from("boom")));
        assert!(data.is_unhandled_rejection());
        let queued = data.subscribe(Reaction::Adopt { target: promise() });
        assert!(matches!(queued, Some((_, Settled::Rejected(_)))));
        assert!(!data.is_unhandled_rejection());
    }
}
