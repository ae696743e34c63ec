// Venue adapter module
// This file defines the uniform contract every step handler implements and the
// execution context the interpreter hands to it
//
// Numan Thabit 2025 Nov

use alloy_primitives::{Address, I256, U256};

use crate::errors::RouteError;
use crate::ledger::{Ledger, NATIVE};
use crate::router::decoder::RouteStream;
use crate::router::guard::CallbackGuard;
use crate::router::routes::FundsSource;
use crate::state::World;

/// What a handler may touch while executing one split.
pub struct StepContext<'w> {
    pub world: &'w mut World,
    pub guard: &'w mut CallbackGuard,
    /// Address of the route processor itself.
    pub router: Address,
    /// Immediate caller of the routing call.
    pub caller: Address,
}

/// One split's worth of input for a handler.
#[derive(Debug, Clone, Copy)]
pub struct StepInput<'a> {
    pub source: FundsSource,
    pub asset: Address,
    pub amount: U256,
    /// Split payload after the selector.
    pub data: &'a [u8],
}

/// Adapter between the interpreter and one venue family.
///
/// Handlers report the realized output upward and never judge it: a zero
/// output is a valid result, the interpreter decides if the route is acceptable.
pub trait StepHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Check the payload shape before anything executes.
    fn validate(&self, _data: &[u8]) -> Result<(), RouteError> {
        Ok(())
    }

    /// Live amount of `asset` already delivered to the venue named in `data`
    /// and not yet accounted for. Drives continuation steps.
    fn upstream_amount(&self, _world: &World, _asset: Address, _data: &[u8]) -> Result<U256, RouteError> {
        Err(RouteError::UnsupportedFundsSource {
            handler: self.name(),
            funds: "upstream",
        })
    }

    fn execute(&self, ctx: &mut StepContext<'_>, input: StepInput<'_>) -> Result<U256, RouteError>;
}

/// Venue-side view of the router's settlement entry point.
pub trait SwapCallback {
    fn swap_callback(
        &mut self,
        ledger: &mut Ledger,
        caller: Address,
        amount0_delta: I256,
        amount1_delta: I256,
        data: &[u8],
    ) -> Result<(), RouteError>;
}

/// Move the split's funds from wherever the command says they are to `to`.
pub fn deliver(
    ctx: &mut StepContext<'_>,
    handler: &'static str,
    input: &StepInput<'_>,
    to: Address,
) -> Result<(), RouteError> {
    match input.source {
        FundsSource::Caller(_) if input.asset == NATIVE => Err(RouteError::UnsupportedFundsSource {
            handler,
            funds: "caller native",
        }),
        FundsSource::Caller(payer) => Ok(ctx.world.ledger.safe_transfer_from(
            input.asset,
            ctx.router,
            payer,
            to,
            input.amount,
        )?),
        FundsSource::Router if to == ctx.router => Ok(()),
        FundsSource::Router => Ok(ctx
            .world
            .ledger
            .safe_transfer(input.asset, ctx.router, to, input.amount)?),
        FundsSource::Upstream => Ok(()),
    }
}

/// Payload reader that maps truncation onto the handler's own error.
pub(crate) struct PayloadReader<'a> {
    handler: &'static str,
    stream: RouteStream<'a>,
}

impl<'a> PayloadReader<'a> {
    pub(crate) fn new(handler: &'static str, data: &'a [u8]) -> Self {
        Self {
            handler,
            stream: RouteStream::new(data),
        }
    }

    fn invalid(&self, reason: String) -> RouteError {
        RouteError::InvalidPayload {
            handler: self.handler,
            reason,
        }
    }

    pub(crate) fn u8(&mut self) -> Result<u8, RouteError> {
        self.stream.read_u8().map_err(|e| self.invalid(e.to_string()))
    }

    pub(crate) fn u24(&mut self) -> Result<u32, RouteError> {
        self.stream.read_u24().map_err(|e| self.invalid(e.to_string()))
    }

    pub(crate) fn address(&mut self) -> Result<Address, RouteError> {
        self.stream
            .read_address()
            .map_err(|e| self.invalid(e.to_string()))
    }

    /// Payloads must be consumed exactly.
    pub(crate) fn finish(self) -> Result<(), RouteError> {
        if self.stream.has_more() {
            return Err(self.invalid(format!(
                "{} trailing bytes",
                self.stream.remaining()
            )));
        }
        Ok(())
    }
}

/// Live balance delta helper: `after - before`, never negative.
pub(crate) fn realized(ledger: &Ledger, asset: Address, account: Address, before: U256) -> Result<U256, RouteError> {
    Ok(ledger.balance_of(asset, account)?.saturating_sub(before))
}
