// Wrapped native venue module
// This file implements the step handler that converts between the native asset
// and its wrapped token
//
// Numan Thabit 2025 Nov

use alloy_primitives::{Address, U256};

use crate::errors::RouteError;
use crate::ledger::NATIVE;
use crate::router::routes::FundsSource;
use crate::venues::adapter::{realized, PayloadReader, StepContext, StepHandler, StepInput};

pub const WRAP_NATIVE: [u8; 4] = [0xd0, 0xe3, 0x0d, 0xb0];

const DIRECTION_WRAP: u8 = 0x01;
const SKIP_CONVERSION: u8 = 0x02;

/// Decoded wrap payload: `flags(1) to(20) [wrapped(20)]`.
///
/// Bit 0 selects wrapping, bit 1 skips the deposit/withdraw call and only moves
/// the already converted funds. The wrapped token is only carried when wrapping;
/// unwrapping spends the step's asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapPayload {
    Wrap {
        to: Address,
        wrapped: Address,
        skip_conversion: bool,
    },
    Unwrap {
        to: Address,
        skip_conversion: bool,
    },
}

impl WrapPayload {
    pub fn parse(data: &[u8]) -> Result<Self, RouteError> {
        let mut reader = PayloadReader::new(WrapHandler::NAME, data);
        let flags = reader.u8()?;
        let to = reader.address()?;
        let skip_conversion = flags & SKIP_CONVERSION != 0;
        let payload = if flags & DIRECTION_WRAP != 0 {
            WrapPayload::Wrap {
                to,
                wrapped: reader.address()?,
                skip_conversion,
            }
        } else {
            WrapPayload::Unwrap { to, skip_conversion }
        };
        reader.finish()?;
        Ok(payload)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = WRAP_NATIVE.to_vec();
        match self {
            WrapPayload::Wrap {
                to,
                wrapped,
                skip_conversion,
            } => {
                out.push(DIRECTION_WRAP | if *skip_conversion { SKIP_CONVERSION } else { 0 });
                out.extend_from_slice(to.as_slice());
                out.extend_from_slice(wrapped.as_slice());
            }
            WrapPayload::Unwrap { to, skip_conversion } => {
                out.push(if *skip_conversion { SKIP_CONVERSION } else { 0 });
                out.extend_from_slice(to.as_slice());
            }
        }
        out
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WrapHandler;

impl WrapHandler {
    pub const NAME: &'static str = "wrap_native";
}

impl StepHandler for WrapHandler {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn validate(&self, data: &[u8]) -> Result<(), RouteError> {
        WrapPayload::parse(data).map(|_| ())
    }

    fn execute(&self, ctx: &mut StepContext<'_>, input: StepInput<'_>) -> Result<U256, RouteError> {
        let router = ctx.router;
        match WrapPayload::parse(input.data)? {
            WrapPayload::Wrap {
                to,
                wrapped,
                skip_conversion,
            } => {
                if input.asset != NATIVE || input.source != FundsSource::Router {
                    return Err(RouteError::UnsupportedFundsSource {
                        handler: Self::NAME,
                        funds: input.source.as_str(),
                    });
                }
                let before = ctx.world.ledger.balance_of(wrapped, to)?;
                if !skip_conversion {
                    ctx.world.ledger.deposit(wrapped, router, input.amount)?;
                }
                if to != router {
                    ctx.world.ledger.safe_transfer(wrapped, router, to, input.amount)?;
                }
                realized(&ctx.world.ledger, wrapped, to, before)
            }
            WrapPayload::Unwrap { to, skip_conversion } => {
                if input.asset == NATIVE {
                    return Err(RouteError::InvalidPayload {
                        handler: Self::NAME,
                        reason: "cannot unwrap the native asset".into(),
                    });
                }
                let before = ctx.world.ledger.balance_of(NATIVE, to)?;
                if !skip_conversion {
                    match input.source {
                        FundsSource::Caller(payer) => ctx.world.ledger.safe_transfer_from(
                            input.asset,
                            router,
                            payer,
                            router,
                            input.amount,
                        )?,
                        FundsSource::Router => {}
                        FundsSource::Upstream => {
                            return Err(RouteError::UnsupportedFundsSource {
                                handler: Self::NAME,
                                funds: input.source.as_str(),
                            })
                        }
                    }
                    ctx.world.ledger.withdraw(input.asset, router, input.amount)?;
                }
                if to != router {
                    ctx.world.ledger.safe_transfer(NATIVE, router, to, input.amount)?;
                }
                realized(&ctx.world.ledger, NATIVE, to, before)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwrap_payload_has_no_token() {
        let to = Address::repeat_byte(0x33);
        let payload = WrapPayload::Unwrap {
            to,
            skip_conversion: false,
        };
        let bytes = payload.encode();
        assert_eq!(bytes.len(), 4 + 21);
        assert_eq!(WrapPayload::parse(&bytes[4..]).unwrap(), payload);
    }

    #[test]
    fn wrap_flags_are_bit_fields() {
        let mut data = vec![DIRECTION_WRAP | SKIP_CONVERSION];
        data.extend_from_slice(Address::repeat_byte(1).as_slice());
        data.extend_from_slice(Address::repeat_byte(2).as_slice());
        assert_eq!(
            WrapPayload::parse(&data).unwrap(),
            WrapPayload::Wrap {
                to: Address::repeat_byte(1),
                wrapped: Address::repeat_byte(2),
                skip_conversion: true,
            }
        );
        // wrap without the token address is truncated
        assert!(WrapPayload::parse(&data[..21]).is_err());
    }
}
