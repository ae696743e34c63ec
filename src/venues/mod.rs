// Venues module - step handlers and the simulated exchange venues behind them
//
// Numan Thabit 2025 Nov

pub mod adapter;
pub mod amm;
pub mod callback_pool;
pub mod forward;
pub mod wrap;

pub use adapter::{StepContext, StepHandler, StepInput, SwapCallback};
pub use amm::{ConstantProductPair, PairSwapHandler, PairSwapPayload, PAIR_SWAP};
pub use callback_pool::{CallbackPool, CallbackSwapHandler, CallbackSwapPayload, CallbackVenue, CALLBACK_SWAP};
pub use forward::{forward_payload, ForwardHandler, FORWARD};
pub use wrap::{WrapHandler, WrapPayload, WRAP_NATIVE};
