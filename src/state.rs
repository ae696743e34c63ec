// World state and genesis loading
//
// Holds everything a routing call can touch: the asset ledger, the pair and
// callback venues, the keys permit signatures are checked against and the
// clock. Routing calls are all-or-nothing, so the whole world is cheap to
// checkpoint and restore.
//
// Numan Thabit 2025 Nov

use alloy_primitives::{Address, U256};
use anyhow::{Context, Result};
use ed25519_dalek::VerifyingKey;
use hex::FromHex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::errors::{RouteError, VenueError};
use crate::ledger::{Ledger, TokenBehavior};
use crate::signing::signer_address;
use crate::venues::amm::ConstantProductPair;
use crate::venues::callback_pool::{CallbackPool, CallbackVenue};

#[derive(Debug, Clone, Default)]
pub struct World {
	pub ledger: Ledger,
	pairs: HashMap<Address, ConstantProductPair>,
	callback_pools: HashMap<Address, Box<dyn CallbackVenue>>,
	signers: HashMap<Address, VerifyingKey>,
	timestamp: u64,
}

/// Opaque copy of a [`World`] taken before a routing call.
#[derive(Debug, Clone)]
pub struct Checkpoint(World);

impl World {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn timestamp(&self) -> u64 {
		self.timestamp
	}

	pub fn set_timestamp(&mut self, timestamp: u64) {
		self.timestamp = timestamp;
	}

	pub fn checkpoint(&self) -> Checkpoint {
		Checkpoint(self.clone())
	}

	pub fn restore(&mut self, checkpoint: Checkpoint) {
		*self = checkpoint.0;
	}

	/// Register a pair and sync its reserves to whatever it already holds.
	pub fn add_pair(&mut self, mut pair: ConstantProductPair) -> Result<(), RouteError> {
		pair.sync(&self.ledger)?;
		self.pairs.insert(pair.address(), pair);
		Ok(())
	}

	pub fn pair(&self, address: Address) -> Result<&ConstantProductPair, RouteError> {
		self.pairs
			.get(&address)
			.ok_or_else(|| VenueError::UnknownVenue(address).into())
	}

	/// Pair plus the ledger it settles against.
	pub fn pair_mut(&mut self, address: Address) -> Result<(&mut ConstantProductPair, &mut Ledger), RouteError> {
		let pair = self
			.pairs
			.get_mut(&address)
			.ok_or(VenueError::UnknownVenue(address))?;
		Ok((pair, &mut self.ledger))
	}

	pub fn add_callback_pool(&mut self, pool: Box<dyn CallbackVenue>) {
		self.callback_pools.insert(pool.address(), pool);
	}

	pub fn callback_pool(&self, address: Address) -> Result<&dyn CallbackVenue, RouteError> {
		self.callback_pools
			.get(&address)
			.map(|p| p.as_ref())
			.ok_or_else(|| VenueError::UnknownVenue(address).into())
	}

	pub fn callback_pool_mut(
		&mut self,
		address: Address,
	) -> Result<(&mut dyn CallbackVenue, &mut Ledger), RouteError> {
		let pool = self
			.callback_pools
			.get_mut(&address)
			.ok_or(VenueError::UnknownVenue(address))?;
		Ok((pool.as_mut(), &mut self.ledger))
	}

	/// Register a permit key; returns the account address it controls.
	pub fn register_signer(&mut self, key: VerifyingKey) -> Address {
		let address = signer_address(&key);
		self.signers.insert(address, key);
		address
	}

	pub fn signer(&self, account: Address) -> Option<&VerifyingKey> {
		self.signers.get(&account)
	}

	pub fn from_genesis(genesis: &Genesis) -> Result<Self> {
		let mut world = World::new();
		world.timestamp = genesis.timestamp;

		for token in &genesis.tokens {
			world
				.ledger
				.register_token(token.address, &token.symbol, token.behavior);
		}
		for entry in &genesis.balances {
			let amount = parse_amount(&entry.amount)?;
			world
				.ledger
				.mint(entry.asset, entry.account, amount)
				.with_context(|| format!("minting genesis balance for {}", entry.account))?;
		}
		for entry in &genesis.allowances {
			let amount = parse_amount(&entry.amount)?;
			world
				.ledger
				.approve(entry.token, entry.owner, entry.spender, amount)
				.with_context(|| format!("genesis allowance for {}", entry.owner))?;
		}
		for pair in &genesis.pairs {
			world
				.ledger
				.mint(pair.token0, pair.address, parse_amount(&pair.reserve0)?)?;
			world
				.ledger
				.mint(pair.token1, pair.address, parse_amount(&pair.reserve1)?)?;
			world
				.add_pair(ConstantProductPair::new(pair.address, pair.token0, pair.token1, pair.fee))
				.with_context(|| format!("registering pair {}", pair.address))?;
		}
		for pool in &genesis.callback_pools {
			world
				.ledger
				.mint(pool.token0, pool.address, parse_amount(&pool.reserve0)?)?;
			world
				.ledger
				.mint(pool.token1, pool.address, parse_amount(&pool.reserve1)?)?;
			world.add_callback_pool(Box::new(CallbackPool::new(
				pool.address,
				pool.token0,
				pool.token1,
				pool.fee,
			)));
		}
		for signer in &genesis.signers {
			let bytes = <[u8; 32]>::from_hex(signer.public_key.trim_start_matches("0x"))
				.context("signer public key must be 32 hex bytes")?;
			let key = VerifyingKey::from_bytes(&bytes).context("invalid ed25519 public key")?;
			world.register_signer(key);
		}

		info!(
			tokens = genesis.tokens.len(),
			pairs = world.pairs.len(),
			callback_pools = world.callback_pools.len(),
			signers = world.signers.len(),
			"world loaded from genesis"
		);
		Ok(world)
	}
}

fn parse_amount(raw: &str) -> Result<U256> {
	raw.trim()
		.parse::<U256>()
		.with_context(|| format!("invalid amount {raw:?}"))
}

/// Initial world description, loaded from YAML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Genesis {
	pub timestamp: u64,
	pub tokens: Vec<GenesisToken>,
	pub balances: Vec<GenesisBalance>,
	pub allowances: Vec<GenesisAllowance>,
	pub pairs: Vec<GenesisPool>,
	pub callback_pools: Vec<GenesisPool>,
	pub signers: Vec<GenesisSigner>,
}

impl Genesis {
	pub fn from_yaml(raw: &str) -> Result<Self> {
		serde_yaml::from_str(raw).context("parsing genesis yaml")
	}

	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let raw = std::fs::read_to_string(path)
			.with_context(|| format!("reading genesis file {}", path.display()))?;
		Self::from_yaml(&raw)
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenesisToken {
	pub address: Address,
	pub symbol: String,
	#[serde(default = "standard_behavior")]
	pub behavior: TokenBehavior,
}

fn standard_behavior() -> TokenBehavior {
	TokenBehavior::Standard
}

/// Amounts are decimal or `0x` strings so they survive YAML's integer limits.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisBalance {
	pub asset: Address,
	pub account: Address,
	pub amount: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenesisAllowance {
	pub token: Address,
	pub owner: Address,
	pub spender: Address,
	pub amount: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenesisPool {
	pub address: Address,
	pub token0: Address,
	pub token1: Address,
	pub reserve0: String,
	pub reserve1: String,
	/// Fee in millionths.
	#[serde(default = "default_pool_fee")]
	pub fee: u32,
}

fn default_pool_fee() -> u32 {
	3_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenesisSigner {
	pub public_key: String,
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ledger::NATIVE;

	const GENESIS: &str = r#"
timestamp: 1700000000
tokens:
  - address: "0x1111111111111111111111111111111111111111"
    symbol: AAA
  - address: "0x2222222222222222222222222222222222222222"
    symbol: FOT
    behavior: { kind: fee_on_transfer, fee_bps: 500 }
balances:
  - asset: "0x1111111111111111111111111111111111111111"
    account: "0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1"
    amount: "1000"
  - asset: "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE"
    account: "0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1"
    amount: "0x10"
pairs:
  - address: "0x5050505050505050505050505050505050505050"
    token0: "0x1111111111111111111111111111111111111111"
    token1: "0x2222222222222222222222222222222222222222"
    reserve0: "1000000"
    reserve1: "2000000"
"#;

	#[test]
	fn genesis_builds_world() {
		let genesis = Genesis::from_yaml(GENESIS).unwrap();
		let world = World::from_genesis(&genesis).unwrap();
		let alice = Address::repeat_byte(0xa1);
		assert_eq!(world.timestamp(), 1_700_000_000);
		assert_eq!(
			world.ledger.balance_of(Address::repeat_byte(0x11), alice).unwrap(),
			U256::from(1_000u64)
		);
		assert_eq!(world.ledger.balance_of(NATIVE, alice).unwrap(), U256::from(16u64));
		let pair = world.pair(Address::repeat_byte(0x50)).unwrap();
		assert_eq!(pair.reserves(), (U256::from(1_000_000u64), U256::from(2_000_000u64)));
		assert_eq!(pair.fee(), 3_000);
		assert_eq!(
			world.ledger.behavior(Address::repeat_byte(0x22)),
			Some(TokenBehavior::FeeOnTransfer { fee_bps: 500 })
		);
	}

	#[test]
	fn restore_discards_changes() {
		let mut world = World::from_genesis(&Genesis::from_yaml(GENESIS).unwrap()).unwrap();
		let alice = Address::repeat_byte(0xa1);
		let token = Address::repeat_byte(0x11);
		let checkpoint = world.checkpoint();
		world
			.ledger
			.safe_transfer(token, alice, Address::repeat_byte(0xb0), U256::from(400u64))
			.unwrap();
		world.restore(checkpoint);
		assert_eq!(world.ledger.balance_of(token, alice).unwrap(), U256::from(1_000u64));
	}

	#[test]
	fn unknown_venue_is_an_error() {
		let world = World::new();
		let missing = Address::repeat_byte(0x99);
		assert!(matches!(
			world.pair(missing),
			Err(RouteError::Venue(VenueError::UnknownVenue(a))) if a == missing
		));
	}
}
