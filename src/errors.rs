// Error types and error handling module
// This file defines the failure taxonomy of the route processor: decode errors,
// invariant violations, callback-security violations and venue failures
//
// Numan Thabit 2025 Nov

use alloy_primitives::{Address, U256};
use thiserror::Error;

use crate::router::decoder::DecodeError;
use crate::signing::PermitError;

/// Coarse classification used by logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Decode,
    Invariant,
    CallbackSecurity,
    Venue,
    Asset,
    Access,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Decode => "decode",
            ErrorClass::Invariant => "invariant",
            ErrorClass::CallbackSecurity => "callback_security",
            ErrorClass::Venue => "venue",
            ErrorClass::Asset => "asset",
            ErrorClass::Access => "access",
        }
    }
}

/// Failures raised by the asset transfer primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("unknown asset {0}")]
    UnknownAsset(Address),
    #[error("insufficient balance of {asset} at {account}: have {available}, need {required}")]
    InsufficientBalance {
        asset: Address,
        account: Address,
        available: U256,
        required: U256,
    },
    #[error("insufficient allowance of {token} from {owner} to {spender}: have {available}, need {required}")]
    InsufficientAllowance {
        token: Address,
        owner: Address,
        spender: Address,
        available: U256,
        required: U256,
    },
    #[error("token {token} reported a failed transfer")]
    TransferFailed { token: Address },
    #[error("token {0} is not a wrapped native token")]
    NotWrappedNative(Address),
    #[error("balance overflow for {asset} at {account}")]
    Overflow { asset: Address, account: Address },
}

/// Failures raised by simulated exchange venues. These are propagated as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VenueError {
    #[error("venue {0} does not exist")]
    UnknownVenue(Address),
    #[error("pair {pair}: insufficient output amount")]
    InsufficientOutputAmount { pair: Address },
    #[error("pair {pair}: insufficient liquidity")]
    InsufficientLiquidity { pair: Address },
    #[error("pair {pair}: insufficient input amount")]
    InsufficientInputAmount { pair: Address },
    #[error("pair {pair}: constant product invariant violated")]
    InvariantK { pair: Address },
    #[error("pool {pool}: owed {owed} of {token} but received {received}")]
    InsufficientPayment {
        pool: Address,
        token: Address,
        owed: U256,
        received: U256,
    },
    #[error("venue {venue} rejected swap: {reason}")]
    Rejected { venue: Address, reason: String },
}

/// Every way a routing call can fail. A failed call leaves no state behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("unknown handler selector 0x{}", hex::encode(.0))]
    UnknownSelector([u8; 4]),

    #[error("handler {handler}: malformed payload: {reason}")]
    InvalidPayload {
        handler: &'static str,
        reason: String,
    },

    #[error("handler {handler} does not accept funds from {funds}")]
    UnsupportedFundsSource {
        handler: &'static str,
        funds: &'static str,
    },

    #[error("minimal input balance violation: available {available}, required {required}")]
    MinimalInputBalanceViolation { available: U256, required: U256 },

    #[error("minimal output balance violation: received {0}")]
    MinimalOutputBalanceViolation(U256),

    #[error("wrong pool reserves at {pool}")]
    WrongPoolReserves { pool: Address },

    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),

    #[error("unexpected callback sender {actual} (expected {expected:?})")]
    UnexpectedCallbackSender {
        actual: Address,
        expected: Option<Address>,
    },

    #[error("callback from {expected} was never executed")]
    CallbackNotExecuted { expected: Address },

    #[error("callback slot already armed for {armed} while arming for {requested}")]
    CallbackAlreadyArmed { armed: Address, requested: Address },

    #[error("callback owed amount is not positive")]
    NonPositiveCallbackAmount,

    #[error(transparent)]
    Venue(#[from] VenueError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Permit(#[from] PermitError),

    #[error("route processor is paused")]
    Paused,

    #[error("{0} is not privileged for this operation")]
    NotPrivileged(Address),
}

impl RouteError {
    pub fn class(&self) -> ErrorClass {
        match self {
            RouteError::Decode(_)
            | RouteError::UnknownSelector(_)
            | RouteError::InvalidPayload { .. }
            | RouteError::UnsupportedFundsSource { .. } => ErrorClass::Decode,
            RouteError::MinimalInputBalanceViolation { .. }
            | RouteError::MinimalOutputBalanceViolation(_)
            | RouteError::WrongPoolReserves { .. }
            | RouteError::Overflow(_) => ErrorClass::Invariant,
            RouteError::UnexpectedCallbackSender { .. }
            | RouteError::CallbackNotExecuted { .. }
            | RouteError::CallbackAlreadyArmed { .. }
            | RouteError::NonPositiveCallbackAmount => ErrorClass::CallbackSecurity,
            RouteError::Venue(_) => ErrorClass::Venue,
            RouteError::Ledger(_) | RouteError::Permit(_) => ErrorClass::Asset,
            RouteError::Paused | RouteError::NotPrivileged(_) => ErrorClass::Access,
        }
    }
}
