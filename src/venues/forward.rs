// Forwarding venue module
// This file implements the plain transfer step: the split's funds are sent to a
// recipient, usually the next pool of a chained route
//
// Numan Thabit 2025 Nov

use alloy_primitives::{Address, U256};

use crate::errors::RouteError;
use crate::router::routes::FundsSource;
use crate::venues::adapter::{deliver, realized, PayloadReader, StepContext, StepHandler, StepInput};

pub const FORWARD: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

/// Payload: `to(20)`.
pub fn forward_payload(to: Address) -> Vec<u8> {
    let mut out = FORWARD.to_vec();
    out.extend_from_slice(to.as_slice());
    out
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ForwardHandler;

impl ForwardHandler {
    pub const NAME: &'static str = "forward";

    fn recipient(data: &[u8]) -> Result<Address, RouteError> {
        let mut reader = PayloadReader::new(Self::NAME, data);
        let to = reader.address()?;
        reader.finish()?;
        Ok(to)
    }
}

impl StepHandler for ForwardHandler {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn validate(&self, data: &[u8]) -> Result<(), RouteError> {
        Self::recipient(data).map(|_| ())
    }

    fn execute(&self, ctx: &mut StepContext<'_>, input: StepInput<'_>) -> Result<U256, RouteError> {
        let to = Self::recipient(input.data)?;
        if input.source == FundsSource::Upstream {
            return Err(RouteError::UnsupportedFundsSource {
                handler: Self::NAME,
                funds: input.source.as_str(),
            });
        }
        let before = ctx.world.ledger.balance_of(input.asset, to)?;
        deliver(ctx, Self::NAME, &input, to)?;
        realized(&ctx.world.ledger, input.asset, to, before)
    }
}
