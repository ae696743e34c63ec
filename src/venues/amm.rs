// AMM venue module
// This file implements the constant-product pair venue and the step handler
// that routes into it. Pairs settle by balance difference: the input is paid
// in first, the pair measures what arrived and pays out against its reserves
//
// Numan Thabit 2025 Nov

use alloy_primitives::{Address, U256};
use tracing::debug;

use crate::errors::{RouteError, VenueError};
use crate::ledger::Ledger;
use crate::quant::{constant_product_out, FEE_DENOMINATOR};
use crate::state::World;
use crate::venues::adapter::{deliver, realized, PayloadReader, StepContext, StepHandler, StepInput};

/// Selector of the constant-product pair handler.
pub const PAIR_SWAP: [u8; 4] = [0x02, 0x2c, 0x0d, 0x9f];

/// Two-token pool holding `reserve0 * reserve1` constant across swaps.
#[derive(Debug, Clone)]
pub struct ConstantProductPair {
    address: Address,
    token0: Address,
    token1: Address,
    reserve0: U256,
    reserve1: U256,
    /// Swap fee in millionths.
    fee: u32,
}

impl ConstantProductPair {
    pub fn new(address: Address, token0: Address, token1: Address, fee: u32) -> Self {
        Self {
            address,
            token0,
            token1,
            reserve0: U256::ZERO,
            reserve1: U256::ZERO,
            fee,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn tokens(&self) -> (Address, Address) {
        (self.token0, self.token1)
    }

    pub fn reserves(&self) -> (U256, U256) {
        (self.reserve0, self.reserve1)
    }

    pub fn fee(&self) -> u32 {
        self.fee
    }

    /// Recorded reserve of `token`, if the pair trades it.
    pub fn reserve_of(&self, token: Address) -> Option<U256> {
        if token == self.token0 {
            Some(self.reserve0)
        } else if token == self.token1 {
            Some(self.reserve1)
        } else {
            None
        }
    }

    /// Align reserves with the pair's live balances.
    pub fn sync(&mut self, ledger: &Ledger) -> Result<(), RouteError> {
        self.reserve0 = ledger.balance_of(self.token0, self.address)?;
        self.reserve1 = ledger.balance_of(self.token1, self.address)?;
        Ok(())
    }

    /// Pay out the requested amounts, then require the fee-adjusted product of
    /// the new balances to cover the old one.
    pub fn swap(
        &mut self,
        ledger: &mut Ledger,
        amount0_out: U256,
        amount1_out: U256,
        to: Address,
    ) -> Result<(), RouteError> {
        let pair = self.address;
        if amount0_out.is_zero() && amount1_out.is_zero() {
            return Err(VenueError::InsufficientOutputAmount { pair }.into());
        }
        if amount0_out >= self.reserve0 || amount1_out >= self.reserve1 {
            return Err(VenueError::InsufficientLiquidity { pair }.into());
        }
        if to == self.token0 || to == self.token1 {
            return Err(VenueError::Rejected {
                venue: pair,
                reason: "recipient is a pair token".into(),
            }
            .into());
        }

        if !amount0_out.is_zero() {
            ledger.safe_transfer(self.token0, pair, to, amount0_out)?;
        }
        if !amount1_out.is_zero() {
            ledger.safe_transfer(self.token1, pair, to, amount1_out)?;
        }

        let balance0 = ledger.balance_of(self.token0, pair)?;
        let balance1 = ledger.balance_of(self.token1, pair)?;
        let amount0_in = balance0.saturating_sub(self.reserve0 - amount0_out);
        let amount1_in = balance1.saturating_sub(self.reserve1 - amount1_out);
        if amount0_in.is_zero() && amount1_in.is_zero() {
            return Err(VenueError::InsufficientInputAmount { pair }.into());
        }

        let scale = U256::from(FEE_DENOMINATOR);
        let fee = U256::from(self.fee);
        let adjusted0 = balance0
            .checked_mul(scale)
            .and_then(|b| b.checked_sub(amount0_in.checked_mul(fee)?))
            .ok_or(RouteError::Overflow("pair balance0"))?;
        let adjusted1 = balance1
            .checked_mul(scale)
            .and_then(|b| b.checked_sub(amount1_in.checked_mul(fee)?))
            .ok_or(RouteError::Overflow("pair balance1"))?;
        let lhs = adjusted0
            .checked_mul(adjusted1)
            .ok_or(RouteError::Overflow("pair invariant"))?;
        let rhs = self
            .reserve0
            .checked_mul(self.reserve1)
            .and_then(|k| k.checked_mul(scale * scale))
            .ok_or(RouteError::Overflow("pair invariant"))?;
        if lhs < rhs {
            return Err(VenueError::InvariantK { pair }.into());
        }

        self.reserve0 = balance0;
        self.reserve1 = balance1;
        Ok(())
    }
}

/// Decoded pair swap payload: `pool(20) direction(1) to(20) fee(3)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairSwapPayload {
    pub pool: Address,
    /// `true` sells token0 for token1.
    pub zero_for_one: bool,
    pub to: Address,
    pub fee: u32,
}

impl PairSwapPayload {
    pub fn parse(data: &[u8]) -> Result<Self, RouteError> {
        let mut reader = PayloadReader::new(PairSwapHandler::NAME, data);
        let payload = Self {
            pool: reader.address()?,
            zero_for_one: reader.u8()? == 1,
            to: reader.address()?,
            fee: reader.u24()?,
        };
        reader.finish()?;
        if payload.fee >= FEE_DENOMINATOR {
            return Err(RouteError::InvalidPayload {
                handler: PairSwapHandler::NAME,
                reason: format!("fee {} is not below {}", payload.fee, FEE_DENOMINATOR),
            });
        }
        Ok(payload)
    }

    /// Selector-prefixed split payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = PAIR_SWAP.to_vec();
        out.extend_from_slice(self.pool.as_slice());
        out.push(u8::from(self.zero_for_one));
        out.extend_from_slice(self.to.as_slice());
        out.extend_from_slice(&self.fee.to_be_bytes()[1..]);
        out
    }
}

/// Routes a split through a [`ConstantProductPair`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PairSwapHandler;

impl PairSwapHandler {
    pub const NAME: &'static str = "pair_swap";
}

impl StepHandler for PairSwapHandler {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn validate(&self, data: &[u8]) -> Result<(), RouteError> {
        PairSwapPayload::parse(data).map(|_| ())
    }

    fn upstream_amount(&self, world: &World, asset: Address, data: &[u8]) -> Result<U256, RouteError> {
        let p = PairSwapPayload::parse(data)?;
        let pair = world.pair(p.pool)?;
        let reserve = pair.reserve_of(asset).ok_or_else(|| RouteError::InvalidPayload {
            handler: Self::NAME,
            reason: format!("pair {} does not trade {}", p.pool, asset),
        })?;
        Ok(world.ledger.balance_of(asset, p.pool)?.saturating_sub(reserve))
    }

    fn execute(&self, ctx: &mut StepContext<'_>, input: StepInput<'_>) -> Result<U256, RouteError> {
        let p = PairSwapPayload::parse(input.data)?;
        let (token0, token1) = ctx.world.pair(p.pool)?.tokens();
        let (token_in, token_out) = if p.zero_for_one {
            (token0, token1)
        } else {
            (token1, token0)
        };
        if token_in != input.asset {
            return Err(RouteError::InvalidPayload {
                handler: Self::NAME,
                reason: format!("pair {} sells {}, step spends {}", p.pool, token_in, input.asset),
            });
        }

        if !input.amount.is_zero() {
            deliver(ctx, Self::NAME, &input, p.pool)?;
        }

        let (reserve0, reserve1) = ctx.world.pair(p.pool)?.reserves();
        if reserve0.is_zero() || reserve1.is_zero() {
            return Err(RouteError::WrongPoolReserves { pool: p.pool });
        }
        let (reserve_in, reserve_out) = if p.zero_for_one {
            (reserve0, reserve1)
        } else {
            (reserve1, reserve0)
        };

        // measured, not assumed: fee-on-transfer tokens deliver less
        let amount_in = ctx
            .world
            .ledger
            .balance_of(token_in, p.pool)?
            .saturating_sub(reserve_in);
        let amount_out = constant_product_out(amount_in, reserve_in, reserve_out, p.fee)?;
        debug!(
            pool = %p.pool,
            amount_in = %amount_in,
            amount_out = %amount_out,
            "pair swap quoted"
        );
        if amount_out.is_zero() {
            return Ok(U256::ZERO);
        }

        let before = ctx.world.ledger.balance_of(token_out, p.to)?;
        let (amount0_out, amount1_out) = if p.zero_for_one {
            (U256::ZERO, amount_out)
        } else {
            (amount_out, U256::ZERO)
        };
        let (pair, ledger) = ctx.world.pair_mut(p.pool)?;
        pair.swap(ledger, amount0_out, amount1_out, p.to)?;
        realized(&ctx.world.ledger, token_out, p.to, before)
    }
}
