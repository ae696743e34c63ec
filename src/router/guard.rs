// Callback authentication guard
// This file implements the single-slot register that authenticates settlement
// callbacks: armed before a venue is called, consumed by the callback, and
// required to be empty again before the arming step returns
//
// Numan Thabit 2025 Nov

use alloy_primitives::Address;
use tracing::{debug, warn};

use crate::errors::RouteError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallbackSlot {
    #[default]
    Disarmed,
    Armed(Address),
}

/// Owned by the route processor; handlers only reach it through these methods.
#[derive(Debug, Default)]
pub struct CallbackGuard {
    slot: CallbackSlot,
}

impl CallbackGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self) -> CallbackSlot {
        self.slot
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.slot, CallbackSlot::Armed(_))
    }

    /// Expect exactly one callback from `expected`. Nested arming is refused.
    pub fn arm(&mut self, expected: Address) -> Result<(), RouteError> {
        if let CallbackSlot::Armed(armed) = self.slot {
            return Err(RouteError::CallbackAlreadyArmed {
                armed,
                requested: expected,
            });
        }
        debug!(expected = %expected, "callback guard armed");
        self.slot = CallbackSlot::Armed(expected);
        Ok(())
    }

    /// First action of every callback entry point. Clears the slot on success.
    pub fn verify_and_consume(&mut self, actual: Address) -> Result<(), RouteError> {
        match self.slot {
            CallbackSlot::Armed(expected) if expected == actual => {
                self.slot = CallbackSlot::Disarmed;
                debug!(caller = %actual, "callback guard consumed");
                Ok(())
            }
            CallbackSlot::Armed(expected) => {
                warn!(actual = %actual, expected = %expected, "callback from unexpected sender");
                Err(RouteError::UnexpectedCallbackSender {
                    actual,
                    expected: Some(expected),
                })
            }
            CallbackSlot::Disarmed => {
                warn!(actual = %actual, "callback while no callback is expected");
                Err(RouteError::UnexpectedCallbackSender {
                    actual,
                    expected: None,
                })
            }
        }
    }

    /// Called after the venue returns: a still-armed slot means no settlement.
    pub fn assert_disarmed(&self) -> Result<(), RouteError> {
        match self.slot {
            CallbackSlot::Disarmed => Ok(()),
            CallbackSlot::Armed(expected) => Err(RouteError::CallbackNotExecuted { expected }),
        }
    }

    /// Drop any armed expectation. Only used when a whole call is rolled back.
    pub(crate) fn reset(&mut self) {
        self.slot = CallbackSlot::Disarmed;
    }
}
