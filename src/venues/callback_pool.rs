// Callback pool venue module
// This file implements venues that pay out first and collect the input through
// a settlement callback into the router, plus the step handler that arms the
// callback guard around them
//
// Numan Thabit 2025 Nov

use alloy_primitives::{Address, I256, U256};
use std::fmt;
use tracing::debug;

use crate::errors::{RouteError, VenueError};
use crate::ledger::{Ledger, NATIVE};
use crate::quant::constant_product_out;
use crate::router::execution::RouterCallback;
use crate::router::routes::FundsSource;
use crate::venues::adapter::{realized, PayloadReader, StepContext, StepHandler, StepInput, SwapCallback};

/// Selector of the callback pool handler.
pub const CALLBACK_SWAP: [u8; 4] = [0x12, 0x8a, 0xcb, 0x08];

/// A venue that settles through [`SwapCallback`].
///
/// `data` must be handed back to the callback untouched. The returned deltas
/// are from the pool's point of view: positive is owed to the pool.
pub trait CallbackVenue: Send + Sync + fmt::Debug {
    fn address(&self) -> Address;

    fn tokens(&self) -> (Address, Address);

    fn swap(
        &mut self,
        ledger: &mut Ledger,
        callback: &mut dyn SwapCallback,
        recipient: Address,
        zero_for_one: bool,
        amount_in: U256,
        data: &[u8],
    ) -> Result<(I256, I256), RouteError>;

    fn clone_box(&self) -> Box<dyn CallbackVenue>;
}

impl Clone for Box<dyn CallbackVenue> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Constant-product pool priced off its live balances and settled by callback.
#[derive(Debug, Clone)]
pub struct CallbackPool {
    address: Address,
    token0: Address,
    token1: Address,
    fee: u32,
}

impl CallbackPool {
    pub fn new(address: Address, token0: Address, token1: Address, fee: u32) -> Self {
        Self {
            address,
            token0,
            token1,
            fee,
        }
    }
}

fn signed(amount: U256) -> Result<I256, RouteError> {
    I256::try_from(amount).map_err(|_| RouteError::Overflow("signed delta"))
}

impl CallbackVenue for CallbackPool {
    fn address(&self) -> Address {
        self.address
    }

    fn tokens(&self) -> (Address, Address) {
        (self.token0, self.token1)
    }

    fn swap(
        &mut self,
        ledger: &mut Ledger,
        callback: &mut dyn SwapCallback,
        recipient: Address,
        zero_for_one: bool,
        amount_in: U256,
        data: &[u8],
    ) -> Result<(I256, I256), RouteError> {
        if amount_in.is_zero() {
            return Err(VenueError::Rejected {
                venue: self.address,
                reason: "zero amount specified".into(),
            }
            .into());
        }
        let (token_in, token_out) = if zero_for_one {
            (self.token0, self.token1)
        } else {
            (self.token1, self.token0)
        };
        let reserve_in = ledger.balance_of(token_in, self.address)?;
        let reserve_out = ledger.balance_of(token_out, self.address)?;
        let amount_out = constant_product_out(amount_in, reserve_in, reserve_out, self.fee)?;
        if amount_out >= reserve_out {
            return Err(VenueError::InsufficientLiquidity { pair: self.address }.into());
        }
        if !amount_out.is_zero() {
            ledger.safe_transfer(token_out, self.address, recipient, amount_out)?;
        }

        let owed = signed(amount_in)?;
        let paid_out = -signed(amount_out)?;
        let (delta0, delta1) = if zero_for_one {
            (owed, paid_out)
        } else {
            (paid_out, owed)
        };

        let before = ledger.balance_of(token_in, self.address)?;
        callback.swap_callback(ledger, self.address, delta0, delta1, data)?;
        let received = ledger.balance_of(token_in, self.address)?.saturating_sub(before);
        if received < amount_in {
            return Err(VenueError::InsufficientPayment {
                pool: self.address,
                token: token_in,
                owed: amount_in,
                received,
            }
            .into());
        }
        Ok((delta0, delta1))
    }

    fn clone_box(&self) -> Box<dyn CallbackVenue> {
        Box::new(self.clone())
    }
}

/// Decoded callback swap payload: `pool(20) zeroForOne(1) recipient(20)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackSwapPayload {
    pub pool: Address,
    pub zero_for_one: bool,
    pub recipient: Address,
}

impl CallbackSwapPayload {
    pub fn parse(data: &[u8]) -> Result<Self, RouteError> {
        let mut reader = PayloadReader::new(CallbackSwapHandler::NAME, data);
        let payload = Self {
            pool: reader.address()?,
            zero_for_one: reader.u8()? != 0,
            recipient: reader.address()?,
        };
        reader.finish()?;
        Ok(payload)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = CALLBACK_SWAP.to_vec();
        out.extend_from_slice(self.pool.as_slice());
        out.push(u8::from(self.zero_for_one));
        out.extend_from_slice(self.recipient.as_slice());
        out
    }
}

/// Routes a split through a [`CallbackVenue`]. Funds must sit with the router
/// because the venue collects them during the callback.
#[derive(Debug, Default, Clone, Copy)]
pub struct CallbackSwapHandler;

impl CallbackSwapHandler {
    pub const NAME: &'static str = "callback_swap";
}

impl StepHandler for CallbackSwapHandler {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn validate(&self, data: &[u8]) -> Result<(), RouteError> {
        CallbackSwapPayload::parse(data).map(|_| ())
    }

    fn execute(&self, ctx: &mut StepContext<'_>, input: StepInput<'_>) -> Result<U256, RouteError> {
        let p = CallbackSwapPayload::parse(input.data)?;
        if input.asset == NATIVE {
            return Err(RouteError::UnsupportedFundsSource {
                handler: Self::NAME,
                funds: "native",
            });
        }
        let (token0, token1) = ctx.world.callback_pool(p.pool)?.tokens();
        let (token_in, token_out) = if p.zero_for_one {
            (token0, token1)
        } else {
            (token1, token0)
        };
        if token_in != input.asset {
            return Err(RouteError::InvalidPayload {
                handler: Self::NAME,
                reason: format!("pool {} sells {}, step spends {}", p.pool, token_in, input.asset),
            });
        }
        if input.amount.is_zero() {
            return Ok(U256::ZERO);
        }

        match input.source {
            FundsSource::Caller(payer) => ctx.world.ledger.safe_transfer_from(
                input.asset,
                ctx.router,
                payer,
                ctx.router,
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

        let before = ctx.world.ledger.balance_of(token_out, p.recipient)?;
        ctx.guard.arm(p.pool)?;
        let (pool, ledger) = ctx.world.callback_pool_mut(p.pool)?;
        let mut sink = RouterCallback::new(&mut *ctx.guard, ctx.router);
        let (delta0, delta1) = pool.swap(
            ledger,
            &mut sink,
            p.recipient,
            p.zero_for_one,
            input.amount,
            input.asset.as_slice(),
        )?;
        ctx.guard.assert_disarmed()?;
        debug!(pool = %p.pool, delta0 = %delta0, delta1 = %delta1, "callback pool settled");
        realized(&ctx.world.ledger, token_out, p.recipient, before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::TokenBehavior;

    /// Records the deltas and pays `pay` of the token named in `data`.
    struct Payer {
        router: Address,
        pay: U256,
        seen: Option<(I256, I256)>,
    }

    impl SwapCallback for Payer {
        fn swap_callback(
            &mut self,
            ledger: &mut Ledger,
            caller: Address,
            amount0_delta: I256,
            amount1_delta: I256,
            data: &[u8],
        ) -> Result<(), RouteError> {
            self.seen = Some((amount0_delta, amount1_delta));
            ledger.safe_transfer(Address::from_slice(data), self.router, caller, self.pay)?;
            Ok(())
        }
    }

    fn setup() -> (CallbackPool, Ledger, Address, Address, Address) {
        let t0 = Address::repeat_byte(0x01);
        let t1 = Address::repeat_byte(0x02);
        let router = Address::repeat_byte(0xaa);
        let pool = CallbackPool::new(Address::repeat_byte(0x60), t0, t1, 3_000);
        let mut ledger = Ledger::new();
        ledger.register_token(t0, "T0", TokenBehavior::Standard);
        ledger.register_token(t1, "T1", TokenBehavior::Standard);
        ledger.mint(t0, pool.address(), U256::from(1_000_000u64)).unwrap();
        ledger.mint(t1, pool.address(), U256::from(1_000_000u64)).unwrap();
        ledger.mint(t0, router, U256::from(5_000u64)).unwrap();
        (pool, ledger, t0, t1, router)
    }

    #[test]
    fn pool_pays_out_then_collects() {
        let (mut pool, mut ledger, t0, t1, router) = setup();
        let recipient = Address::repeat_byte(0xb0);
        let mut payer = Payer {
            router,
            pay: U256::from(1_000u64),
            seen: None,
        };
        let (d0, d1) = pool
            .swap(&mut ledger, &mut payer, recipient, true, U256::from(1_000u64), t0.as_slice())
            .unwrap();
        assert_eq!(d0, I256::try_from(1_000i64).unwrap());
        assert_eq!(d1, I256::try_from(-996i64).unwrap());
        assert_eq!(payer.seen, Some((d0, d1)));
        assert_eq!(ledger.balance_of(t1, recipient).unwrap(), U256::from(996u64));
    }

    #[test]
    fn short_payment_is_refused() {
        let (mut pool, mut ledger, t0, _, router) = setup();
        let mut payer = Payer {
            router,
            pay: U256::from(999u64),
            seen: None,
        };
        let err = pool
            .swap(&mut ledger, &mut payer, router, true, U256::from(1_000u64), t0.as_slice())
            .unwrap_err();
        assert_eq!(
            err,
            RouteError::from(VenueError::InsufficientPayment {
                pool: pool.address(),
                token: t0,
                owed: U256::from(1_000u64),
                received: U256::from(999u64),
            })
        );
    }
}
