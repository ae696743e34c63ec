// Library root module for ultra-route
// This file defines the public API and module structure for the ultra-route library
// It exports the route processor and the simulated world it executes against
//
// Numan Thabit 2025 Nov

pub mod config;
pub mod control;
pub mod errors;
pub mod ledger;
pub mod metrics;
pub mod quant;
pub mod router;
pub mod signing;
pub mod state;
pub mod venues;
