// Handler selector registry
// Maps the 4-byte selector at the head of every split payload to the step
// handler that executes it
//
// Numan Thabit 2025 Nov

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::venues::adapter::StepHandler;
use crate::venues::amm::{PairSwapHandler, PAIR_SWAP};
use crate::venues::callback_pool::{CallbackSwapHandler, CALLBACK_SWAP};
use crate::venues::forward::{ForwardHandler, FORWARD};
use crate::venues::wrap::{WrapHandler, WRAP_NATIVE};

#[derive(Clone, Default)]
pub struct SelectorRegistry {
    handlers: HashMap<[u8; 4], Arc<dyn StepHandler>>,
}

impl SelectorRegistry {
    /// Empty registry; every selector is unknown.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the bundled handlers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(PAIR_SWAP, Arc::new(PairSwapHandler));
        registry.register(CALLBACK_SWAP, Arc::new(CallbackSwapHandler));
        registry.register(WRAP_NATIVE, Arc::new(WrapHandler));
        registry.register(FORWARD, Arc::new(ForwardHandler));
        registry
    }

    /// Returns the handler previously bound to `selector`, if any.
    pub fn register(&mut self, selector: [u8; 4], handler: Arc<dyn StepHandler>) -> Option<Arc<dyn StepHandler>> {
        debug!(selector = %hex::encode(selector), handler = handler.name(), "handler registered");
        self.handlers.insert(selector, handler)
    }

    pub fn resolve(&self, selector: [u8; 4]) -> Option<Arc<dyn StepHandler>> {
        self.handlers.get(&selector).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for SelectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<(String, &'static str)> = self
            .handlers
            .iter()
            .map(|(sel, h)| (hex::encode(sel), h.name()))
            .collect();
        entries.sort();
        f.debug_map().entries(entries).finish()
    }
}
