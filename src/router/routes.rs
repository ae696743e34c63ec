// Route types and route encoding
// This file defines the decoded form of a route (commands, steps, splits) and
// the builder that produces the binary wire format consumed by the decoder
//
// Numan Thabit 2025 Nov

use alloy_primitives::{Address, U256};
use thiserror::Error;

use crate::quant::FULL_SCALE;

/// Size of the handler selector that prefixes every split payload.
pub const SELECTOR_LEN: usize = 4;

/// Fixed size of the permit payload: value, deadline, v, r, s.
pub const PERMIT_LEN: usize = 32 + 32 + 1 + 32 + 32;

/// Closed set of step commands. Code 0 is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandCode {
    /// Spend the router's own balance of the asset.
    OwnBalance = 1,
    /// Pull the asset from the caller.
    PullFromCaller = 2,
    /// Spend native value held by the router.
    Native = 3,
    /// Consume funds already sitting with an upstream pool.
    Continuation = 4,
    /// Apply an off-band signed allowance.
    Permit = 5,
}

impl CommandCode {
    pub fn from_byte(code: u8) -> Option<Self> {
        match code {
            1 => Some(CommandCode::OwnBalance),
            2 => Some(CommandCode::PullFromCaller),
            3 => Some(CommandCode::Native),
            4 => Some(CommandCode::Continuation),
            5 => Some(CommandCode::Permit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandCode::OwnBalance => "own_balance",
            CommandCode::PullFromCaller => "pull_from_caller",
            CommandCode::Native => "native",
            CommandCode::Continuation => "continuation",
            CommandCode::Permit => "permit",
        }
    }

    /// Whether the command is followed by a 20-byte asset address.
    pub fn carries_asset(&self) -> bool {
        matches!(
            self,
            CommandCode::OwnBalance | CommandCode::PullFromCaller | CommandCode::Continuation
        )
    }

    /// Whether the command body is a counted list of weighted splits.
    pub fn carries_split_list(&self) -> bool {
        matches!(self, CommandCode::OwnBalance | CommandCode::PullFromCaller)
    }
}

/// Who supplies the funds a split spends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundsSource {
    /// The original caller, through the router's allowance.
    Caller(Address),
    /// The router itself (own balance or attached native value).
    Router,
    /// Funds already transferred to the venue by a previous step.
    Upstream,
}

impl FundsSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FundsSource::Caller(_) => "caller",
            FundsSource::Router => "router",
            FundsSource::Upstream => "upstream",
        }
    }
}

/// One weighted allocation of a step's input to one handler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split<'a> {
    pub weight: u16,
    pub selector: [u8; SELECTOR_LEN],
    /// Payload bytes after the selector.
    pub data: &'a [u8],
}

/// Decoded signed allowance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermitPayload {
    pub value: U256,
    pub deadline: U256,
    pub v: u8,
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl PermitPayload {
    pub fn signature_bytes(&self) -> [u8; 64] {
        let mut sig = [0u8; 64];
        sig[..32].copy_from_slice(&self.r);
        sig[32..].copy_from_slice(&self.s);
        sig
    }
}

/// One decoded unit of a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<'a> {
    Swap {
        command: CommandCode,
        asset: Address,
        splits: Vec<Split<'a>>,
    },
    Permit(PermitPayload),
}

impl Step<'_> {
    pub fn command(&self) -> CommandCode {
        match self {
            Step::Swap { command, .. } => *command,
            Step::Permit(_) => CommandCode::Permit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("split payload of {0} bytes exceeds the 2-byte length prefix")]
    PayloadTooLong(usize),
    #[error("step has {0} splits, at most 255 fit the count byte")]
    TooManySplits(usize),
}

/// Assembles routes in the wire format understood by the decoder.
#[derive(Debug, Default)]
pub struct RouteBuilder {
    buf: Vec<u8>,
    error: Option<EncodeError>,
}

impl RouteBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pull-from-caller step with explicit weighted splits.
    pub fn pull(self, asset: Address, splits: &[(u16, Vec<u8>)]) -> Self {
        self.funded(CommandCode::PullFromCaller, asset, splits)
    }

    /// Own-balance step with explicit weighted splits.
    pub fn own_balance(self, asset: Address, splits: &[(u16, Vec<u8>)]) -> Self {
        self.funded(CommandCode::OwnBalance, asset, splits)
    }

    /// Pull-from-caller step sending everything to one handler.
    pub fn pull_one(self, asset: Address, payload: Vec<u8>) -> Self {
        self.pull(asset, &[(FULL_SCALE, payload)])
    }

    /// Native value step; a single implicit full-weight split.
    pub fn native(mut self, payload: &[u8]) -> Self {
        self.buf.push(CommandCode::Native as u8);
        self.prefixed(payload);
        self
    }

    /// Continuation step; a single implicit full-weight split.
    pub fn continuation(mut self, asset: Address, payload: &[u8]) -> Self {
        self.buf.push(CommandCode::Continuation as u8);
        self.buf.extend_from_slice(asset.as_slice());
        self.prefixed(payload);
        self
    }

    pub fn permit(mut self, permit: &PermitPayload) -> Self {
        self.buf.push(CommandCode::Permit as u8);
        self.buf.extend_from_slice(&permit.value.to_be_bytes::<32>());
        self.buf.extend_from_slice(&permit.deadline.to_be_bytes::<32>());
        self.buf.push(permit.v);
        self.buf.extend_from_slice(&permit.r);
        self.buf.extend_from_slice(&permit.s);
        self
    }

    /// Raw bytes, for routes the typed helpers cannot express.
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Result<Vec<u8>, EncodeError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.buf),
        }
    }

    fn funded(mut self, command: CommandCode, asset: Address, splits: &[(u16, Vec<u8>)]) -> Self {
        self.buf.push(command as u8);
        self.buf.extend_from_slice(asset.as_slice());
        match u8::try_from(splits.len()) {
            Ok(count) => self.buf.push(count),
            Err(_) => {
                self.error.get_or_insert(EncodeError::TooManySplits(splits.len()));
                return self;
            }
        }
        for (weight, payload) in splits {
            self.buf.extend_from_slice(&weight.to_be_bytes());
            self.prefixed(payload);
        }
        self
    }

    fn prefixed(&mut self, payload: &[u8]) {
        match u16::try_from(payload.len()) {
            Ok(len) => {
                self.buf.extend_from_slice(&len.to_be_bytes());
                self.buf.extend_from_slice(payload);
            }
            Err(_) => {
                self.error
                    .get_or_insert(EncodeError::PayloadTooLong(payload.len()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_codes_are_a_closed_set() {
        assert_eq!(CommandCode::from_byte(0), None);
        assert_eq!(CommandCode::from_byte(6), None);
        for code in 1..=5u8 {
            let cmd = CommandCode::from_byte(code).unwrap();
            assert_eq!(cmd as u8, code);
        }
    }

    #[test]
    fn builder_lays_out_pull_step() {
        let asset = Address::repeat_byte(0x11);
        let route = RouteBuilder::new()
            .pull(asset, &[(FULL_SCALE, vec![1, 2, 3, 4, 9])])
            .build()
            .unwrap();
        let mut expected = vec![2u8];
        expected.extend_from_slice(asset.as_slice());
        expected.extend_from_slice(&[1, 0xff, 0xff, 0x00, 0x05, 1, 2, 3, 4, 9]);
        assert_eq!(route, expected);
    }

    #[test]
    fn builder_rejects_oversized_payload() {
        let err = RouteBuilder::new()
            .native(&vec![0u8; 70_000])
            .build()
            .unwrap_err();
        assert_eq!(err, EncodeError::PayloadTooLong(70_000));
    }
}
