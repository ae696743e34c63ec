// Router module - route decoding, callback authentication and execution
// This file wires the route wire format, the decoder, the callback guard,
// the interpreter and its HTTP surface together
//
// Numan Thabit 2025 Nov

pub mod decoder;
pub mod execution;
pub mod guard;
pub mod routes;
pub mod selector;
pub mod validation;

#[allow(clippy::module_inception)]
pub mod router;

pub use decoder::{DecodeError, RouteDecoder, RouteStream};
pub use execution::{RouteCall, RouteProcessor, RouteReceipt, RouteStats, StepReport, SplitReport, ValueTransfer};
pub use guard::{CallbackGuard, CallbackSlot};
pub use router::{create_api_router, Router};
pub use routes::{CommandCode, FundsSource, PermitPayload, RouteBuilder, Split, Step};
pub use selector::SelectorRegistry;
