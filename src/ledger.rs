// Asset ledger module
// This file implements the asset transfer primitives the router relies on:
// pull from a holder, push to a recipient and read a balance, for both the
// native asset and fungible tokens with non-standard transfer behaviour
//
// Numan Thabit 2025 Nov

use alloy_primitives::{address, Address, U256};
use serde::Deserialize;
use std::collections::HashMap;

use crate::errors::LedgerError;

/// Sentinel address standing for the native asset.
pub const NATIVE: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

const BPS: u64 = 10_000;

/// How a token contract behaves when asked to move funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TokenBehavior {
    /// Returns `true` on success, reverts on failure.
    Standard,
    /// Returns nothing on success, reverts on failure.
    NoReturn,
    /// Returns `false` instead of reverting.
    FalseOnFailure,
    /// Burns `fee_bps` of every transferred amount.
    FeeOnTransfer { fee_bps: u16 },
    /// Standard token backed 1:1 by the native asset.
    WrappedNative,
}

#[derive(Debug, Clone)]
struct TokenState {
    symbol: String,
    behavior: TokenBehavior,
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
    nonces: HashMap<Address, u64>,
}

impl TokenState {
    fn balance(&self, account: &Address) -> U256 {
        self.balances.get(account).copied().unwrap_or(U256::ZERO)
    }
}

/// In-memory balances for the native asset and every registered token.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    native: HashMap<Address, U256>,
    tokens: HashMap<Address, TokenState>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_token(&mut self, token: Address, symbol: &str, behavior: TokenBehavior) {
        self.tokens.insert(
            token,
            TokenState {
                symbol: symbol.to_string(),
                behavior,
                balances: HashMap::new(),
                allowances: HashMap::new(),
                nonces: HashMap::new(),
            },
        );
    }

    pub fn symbol(&self, asset: Address) -> Option<&str> {
        if asset == NATIVE {
            return Some("NATIVE");
        }
        self.tokens.get(&asset).map(|t| t.symbol.as_str())
    }

    pub fn behavior(&self, token: Address) -> Option<TokenBehavior> {
        self.tokens.get(&token).map(|t| t.behavior)
    }

    /// Credit `amount` out of thin air. Used by genesis and tests.
    pub fn mint(&mut self, asset: Address, account: Address, amount: U256) -> Result<(), LedgerError> {
        let slot = if asset == NATIVE {
            self.native.entry(account).or_default()
        } else {
            self.token_mut(asset)?.balances.entry(account).or_default()
        };
        *slot = slot
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { asset, account })?;
        Ok(())
    }

    /// Live balance read. Unknown tokens read as an error, never as zero.
    pub fn balance_of(&self, asset: Address, account: Address) -> Result<U256, LedgerError> {
        if asset == NATIVE {
            return Ok(self.native.get(&account).copied().unwrap_or(U256::ZERO));
        }
        Ok(self.token(asset)?.balance(&account))
    }

    pub fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256, LedgerError> {
        Ok(self
            .token(token)?
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or(U256::ZERO))
    }

    pub fn approve(
        &mut self,
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), LedgerError> {
        self.token_mut(token)?
            .allowances
            .insert((owner, spender), amount);
        Ok(())
    }

    pub fn nonce(&self, token: Address, owner: Address) -> Result<u64, LedgerError> {
        Ok(self.token(token)?.nonces.get(&owner).copied().unwrap_or(0))
    }

    pub fn bump_nonce(&mut self, token: Address, owner: Address) -> Result<u64, LedgerError> {
        let nonce = self.token_mut(token)?.nonces.entry(owner).or_insert(0);
        *nonce += 1;
        Ok(*nonce)
    }

    /// Raw `transfer` as the token contract would execute it.
    ///
    /// `Err` is a revert, `Ok(None)` is a successful call without return data and
    /// `Ok(Some(flag))` is the returned boolean.
    pub fn token_transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<Option<bool>, LedgerError> {
        let state = self.token_mut(token)?;
        let available = state.balance(&from);
        if available < amount {
            return match state.behavior {
                TokenBehavior::FalseOnFailure => Ok(Some(false)),
                _ => Err(LedgerError::InsufficientBalance {
                    asset: token,
                    account: from,
                    available,
                    required: amount,
                }),
            };
        }

        let received = match state.behavior {
            TokenBehavior::FeeOnTransfer { fee_bps } => {
                let fee = amount
                    .checked_mul(U256::from(fee_bps))
                    .ok_or(LedgerError::Overflow { asset: token, account: from })?
                    / U256::from(BPS);
                amount - fee
            }
            _ => amount,
        };

        state.balances.insert(from, available - amount);
        let to_balance = state.balance(&to);
        let credited = to_balance
            .checked_add(received)
            .ok_or(LedgerError::Overflow { asset: token, account: to })?;
        state.balances.insert(to, credited);

        Ok(match state.behavior {
            TokenBehavior::NoReturn => None,
            _ => Some(true),
        })
    }

    /// Raw `transferFrom`. The allowance is consumed unless it is infinite or the
    /// spender moves its own funds.
    pub fn token_transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<Option<bool>, LedgerError> {
        if spender != from {
            let state = self.token_mut(token)?;
            let allowed = state
                .allowances
                .get(&(from, spender))
                .copied()
                .unwrap_or(U256::ZERO);
            if allowed < amount {
                return match state.behavior {
                    TokenBehavior::FalseOnFailure => Ok(Some(false)),
                    _ => Err(LedgerError::InsufficientAllowance {
                        token,
                        owner: from,
                        spender,
                        available: allowed,
                        required: amount,
                    }),
                };
            }
            let result = self.token_transfer(token, from, to, amount)?;
            if result != Some(false) && allowed != U256::MAX {
                self.token_mut(token)?
                    .allowances
                    .insert((from, spender), allowed - amount);
            }
            return Ok(result);
        }
        self.token_transfer(token, from, to, amount)
    }

    /// Push `amount` of `asset` from `from` to `to`, tolerating tokens without
    /// return data and rejecting tokens that report failure.
    pub fn safe_transfer(
        &mut self,
        asset: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), LedgerError> {
        if asset == NATIVE {
            return self.native_transfer(from, to, amount);
        }
        match self.token_transfer(asset, from, to, amount)? {
            Some(false) => Err(LedgerError::TransferFailed { token: asset }),
            _ => Ok(()),
        }
    }

    /// Pull `amount` of `token` from `owner` to `to` using `spender`'s allowance.
    pub fn safe_transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        owner: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), LedgerError> {
        match self.token_transfer_from(token, spender, owner, to, amount)? {
            Some(false) => Err(LedgerError::TransferFailed { token }),
            _ => Ok(()),
        }
    }

    fn native_transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<(), LedgerError> {
        let available = self.native.get(&from).copied().unwrap_or(U256::ZERO);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                asset: NATIVE,
                account: from,
                available,
                required: amount,
            });
        }
        self.native.insert(from, available - amount);
        let slot = self.native.entry(to).or_default();
        *slot = slot.checked_add(amount).ok_or(LedgerError::Overflow {
            asset: NATIVE,
            account: to,
        })?;
        Ok(())
    }

    /// Wrap `amount` of `who`'s native balance into `wrapped`.
    pub fn deposit(&mut self, wrapped: Address, who: Address, amount: U256) -> Result<(), LedgerError> {
        if self.behavior(wrapped) != Some(TokenBehavior::WrappedNative) {
            return Err(LedgerError::NotWrappedNative(wrapped));
        }
        self.native_transfer(who, wrapped, amount)?;
        self.mint(wrapped, who, amount)
    }

    /// Unwrap `amount` of `wrapped` held by `who` back into native value.
    pub fn withdraw(&mut self, wrapped: Address, who: Address, amount: U256) -> Result<(), LedgerError> {
        if self.behavior(wrapped) != Some(TokenBehavior::WrappedNative) {
            return Err(LedgerError::NotWrappedNative(wrapped));
        }
        let state = self.token_mut(wrapped)?;
        let available = state.balance(&who);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                asset: wrapped,
                account: who,
                available,
                required: amount,
            });
        }
        state.balances.insert(who, available - amount);
        self.native_transfer(wrapped, who, amount)
    }

    fn token(&self, token: Address) -> Result<&TokenState, LedgerError> {
        self.tokens.get(&token).ok_or(LedgerError::UnknownAsset(token))
    }

    fn token_mut(&mut self, token: Address) -> Result<&mut TokenState, LedgerError> {
        self.tokens
            .get_mut(&token)
            .ok_or(LedgerError::UnknownAsset(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(behavior: TokenBehavior) -> (Ledger, Address, Address, Address) {
        let token = Address::repeat_byte(0x70);
        let alice = Address::repeat_byte(0xa1);
        let bob = Address::repeat_byte(0xb0);
        let mut ledger = Ledger::new();
        ledger.register_token(token, "TKN", behavior);
        ledger.mint(token, alice, U256::from(1_000u64)).unwrap();
        (ledger, token, alice, bob)
    }

    #[test]
    fn fee_on_transfer_credits_less_than_sent() {
        let (mut ledger, token, alice, bob) = setup(TokenBehavior::FeeOnTransfer { fee_bps: 500 });
        ledger
            .safe_transfer(token, alice, bob, U256::from(1_000u64))
            .unwrap();
        assert_eq!(ledger.balance_of(token, alice).unwrap(), U256::ZERO);
        assert_eq!(ledger.balance_of(token, bob).unwrap(), U256::from(950u64));
    }

    #[test]
    fn fee_on_huge_amount_is_an_overflow_not_a_panic() {
        let (mut ledger, token, alice, bob) = setup(TokenBehavior::FeeOnTransfer { fee_bps: 500 });
        ledger.mint(token, alice, U256::MAX - U256::from(1_000u64)).unwrap();
        let err = ledger.safe_transfer(token, alice, bob, U256::MAX).unwrap_err();
        assert_eq!(err, LedgerError::Overflow { asset: token, account: alice });
        assert_eq!(ledger.balance_of(token, alice).unwrap(), U256::MAX);
        assert_eq!(ledger.balance_of(token, bob).unwrap(), U256::ZERO);
    }

    #[test]
    fn no_return_token_is_treated_as_success() {
        let (mut ledger, token, alice, bob) = setup(TokenBehavior::NoReturn);
        assert_eq!(
            ledger.token_transfer(token, alice, bob, U256::from(10u64)).unwrap(),
            None
        );
        ledger
            .safe_transfer(token, alice, bob, U256::from(10u64))
            .unwrap();
        assert_eq!(ledger.balance_of(token, bob).unwrap(), U256::from(20u64));
    }

    #[test]
    fn false_return_is_a_failed_transfer() {
        let (mut ledger, token, alice, bob) = setup(TokenBehavior::FalseOnFailure);
        let err = ledger
            .safe_transfer(token, alice, bob, U256::from(5_000u64))
            .unwrap_err();
        assert_eq!(err, LedgerError::TransferFailed { token });
        assert_eq!(ledger.balance_of(token, alice).unwrap(), U256::from(1_000u64));
    }

    #[test]
    fn transfer_from_consumes_finite_allowance_only() {
        let (mut ledger, token, alice, bob) = setup(TokenBehavior::Standard);
        let router = Address::repeat_byte(0x99);
        ledger.approve(token, alice, router, U256::from(300u64)).unwrap();
        ledger
            .safe_transfer_from(token, router, alice, bob, U256::from(200u64))
            .unwrap();
        assert_eq!(
            ledger.allowance(token, alice, router).unwrap(),
            U256::from(100u64)
        );

        ledger.approve(token, alice, router, U256::MAX).unwrap();
        ledger
            .safe_transfer_from(token, router, alice, bob, U256::from(200u64))
            .unwrap();
        assert_eq!(ledger.allowance(token, alice, router).unwrap(), U256::MAX);

        let err = ledger
            .safe_transfer_from(token, bob, alice, bob, U256::from(1u64))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientAllowance { .. }));
    }

    #[test]
    fn wrap_and_unwrap_round_through_native() {
        let weth = Address::repeat_byte(0xe0);
        let alice = Address::repeat_byte(0xa1);
        let mut ledger = Ledger::new();
        ledger.register_token(weth, "WETH", TokenBehavior::WrappedNative);
        ledger.mint(NATIVE, alice, U256::from(50u64)).unwrap();

        ledger.deposit(weth, alice, U256::from(20u64)).unwrap();
        assert_eq!(ledger.balance_of(NATIVE, alice).unwrap(), U256::from(30u64));
        assert_eq!(ledger.balance_of(weth, alice).unwrap(), U256::from(20u64));

        ledger.withdraw(weth, alice, U256::from(5u64)).unwrap();
        assert_eq!(ledger.balance_of(NATIVE, alice).unwrap(), U256::from(35u64));
        assert_eq!(ledger.balance_of(weth, alice).unwrap(), U256::from(15u64));
    }

    #[test]
    fn unknown_token_is_an_error() {
        let ledger = Ledger::new();
        let token = Address::repeat_byte(0x01);
        assert_eq!(
            ledger.balance_of(token, token).unwrap_err(),
            LedgerError::UnknownAsset(token)
        );
    }
}
