// Router HTTP API implementation
// This file provides HTTP endpoints for processing routes against the
// in-memory world and inspecting balances and statistics
//
// Numan Thabit 2025 Nov

use alloy_primitives::{Address, U256};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router as AxumRouter,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::execution::{RouteCall, RouteProcessor, RouteReceipt, RouteStats, ValueTransfer};
use crate::errors::RouteError;
use crate::state::World;

/// High-level Router that ties the route processor to the world it runs on
pub struct Router {
    inner: Mutex<Inner>,
}

struct Inner {
    processor: RouteProcessor,
    world: World,
}

impl Router {
    pub fn new(processor: RouteProcessor, world: World) -> Self {
        Self {
            inner: Mutex::new(Inner { processor, world }),
        }
    }

    pub async fn process(&self, call: &RouteCall<'_>, transfer: Option<ValueTransfer>) -> Result<RouteReceipt, RouteError> {
        let mut inner = self.inner.lock().await;
        let Inner { processor, world } = &mut *inner;
        processor.transfer_value_and_process_route(world, call, transfer)
    }

    pub async fn stats(&self) -> RouteStats {
        self.inner.lock().await.processor.get_stats()
    }

    pub async fn balance(&self, asset: Address, account: Address) -> Result<U256, RouteError> {
        Ok(self.inner.lock().await.world.ledger.balance_of(asset, account)?)
    }

    pub async fn set_paused(&self, caller: Address, paused: bool) -> Result<(), RouteError> {
        let mut inner = self.inner.lock().await;
        if paused {
            inner.processor.pause(caller)
        } else {
            inner.processor.resume(caller)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProcessRouteRequest {
    pub caller: Address,
    /// Decimal or 0x amounts.
    #[serde(default)]
    pub value: Option<String>,
    pub token_in: Address,
    pub amount_in: String,
    pub token_out: Address,
    pub amount_out_min: String,
    pub to: Address,
    /// Hex-encoded route bytes.
    pub route: String,
    #[serde(default)]
    pub transfer_value_to: Option<Address>,
    #[serde(default)]
    pub transfer_value_amount: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProcessRouteResponse {
    pub amount_in: String,
    pub amount_out: String,
    pub steps: usize,
    pub receipt: RouteReceipt,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub asset: Address,
    pub account: Address,
    pub balance: String,
}

#[derive(Debug, Deserialize)]
pub struct PauseRequest {
    pub caller: Address,
    pub paused: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<&'static str>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(error: String) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse { error, class: None }),
    )
}

fn route_error(err: RouteError) -> ApiError {
    let status = match &err {
        RouteError::Paused | RouteError::NotPrivileged(_) => StatusCode::FORBIDDEN,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    };
    (
        status,
        Json(ErrorResponse {
            class: Some(err.class().as_str()),
            error: err.to_string(),
        }),
    )
}

fn parse_amount(field: &str, raw: &str) -> Result<U256, ApiError> {
    U256::from_str(raw.trim()).map_err(|e| bad_request(format!("invalid {field}: {e}")))
}

fn parse_address(field: &str, raw: &str) -> Result<Address, ApiError> {
    Address::from_str(raw).map_err(|e| bad_request(format!("invalid {field}: {e}")))
}

/// Create the HTTP router with API endpoints
pub fn create_api_router(router: Arc<Router>) -> AxumRouter {
    AxumRouter::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_text))
        .route("/api/v1/route", post(process_route))
        .route("/api/v1/stats", get(get_stats))
        .route("/api/v1/balance/:asset/:account", get(get_balance))
        .route("/api/v1/pause", post(set_paused))
        .with_state(router)
}

/// Health check endpoint
async fn health_check() -> StatusCode {
    StatusCode::OK
}

async fn metrics_text() -> Result<String, ApiError> {
    crate::metrics::render().map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
                class: None,
            }),
        )
    })
}

/// Process a route and return its receipt
async fn process_route(
    State(router): State<Arc<Router>>,
    Json(req): Json<ProcessRouteRequest>,
) -> Result<Json<ProcessRouteResponse>, ApiError> {
    let route = hex::decode(req.route.trim_start_matches("0x"))
        .map_err(|e| bad_request(format!("invalid route hex: {e}")))?;
    let value = match &req.value {
        Some(raw) => parse_amount("value", raw)?,
        None => U256::ZERO,
    };
    let transfer = match (req.transfer_value_to, &req.transfer_value_amount) {
        (Some(to), Some(raw)) => Some(ValueTransfer {
            to,
            amount: parse_amount("transfer_value_amount", raw)?,
        }),
        (None, None) => None,
        _ => {
            return Err(bad_request(
                "transfer_value_to and transfer_value_amount go together".to_string(),
            ))
        }
    };
    let call = RouteCall {
        caller: req.caller,
        value,
        token_in: req.token_in,
        amount_in: parse_amount("amount_in", &req.amount_in)?,
        token_out: req.token_out,
        amount_out_min: parse_amount("amount_out_min", &req.amount_out_min)?,
        to: req.to,
        route: &route,
    };

    let receipt = router.process(&call, transfer).await.map_err(route_error)?;
    Ok(Json(ProcessRouteResponse {
        amount_in: receipt.amount_in.to_string(),
        amount_out: receipt.amount_out.to_string(),
        steps: receipt.steps.len(),
        receipt,
    }))
}

/// Get route statistics
async fn get_stats(State(router): State<Arc<Router>>) -> Json<RouteStats> {
    Json(router.stats().await)
}

async fn get_balance(
    State(router): State<Arc<Router>>,
    Path((asset, account)): Path<(String, String)>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let asset = parse_address("asset", &asset)?;
    let account = parse_address("account", &account)?;
    let balance = router.balance(asset, account).await.map_err(route_error)?;
    Ok(Json(BalanceResponse {
        asset,
        account,
        balance: balance.to_string(),
    }))
}

async fn set_paused(
    State(router): State<Arc<Router>>,
    Json(req): Json<PauseRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    router
        .set_paused(req.caller, req.paused)
        .await
        .map_err(route_error)?;
    Ok(Json(serde_json::json!({ "paused": req.paused })))
}
