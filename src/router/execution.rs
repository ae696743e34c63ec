// Execution engine - interprets routes against the world
// This file implements the route processor: plan the whole route, execute it
// step by step through the registered handlers, enforce the input and output
// balance invariants and roll everything back on any failure
//
// Numan Thabit 2025 Nov

use alloy_primitives::{Address, I256, U256};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::control::RouteGate;
use crate::errors::RouteError;
use crate::ledger::{Ledger, NATIVE};
use crate::metrics;
use crate::quant::split_amounts;
use crate::router::decoder::RouteDecoder;
use crate::router::guard::CallbackGuard;
use crate::router::routes::{CommandCode, FundsSource, PermitPayload, Split, Step};
use crate::router::selector::SelectorRegistry;
use crate::router::validation::{check_input_conservation, check_output_minimum, input_anchor};
use crate::signing::{verify_permit, PermitError, PermitRequest};
use crate::state::World;
use crate::venues::adapter::{StepContext, StepHandler, StepInput, SwapCallback};

/// Arguments of one routing call.
#[derive(Debug, Clone)]
pub struct RouteCall<'a> {
    pub caller: Address,
    /// Native value attached to the call.
    pub value: U256,
    pub token_in: Address,
    pub amount_in: U256,
    pub token_out: Address,
    pub amount_out_min: U256,
    pub to: Address,
    pub route: &'a [u8],
}

/// Part of the attached value sent onward before the route runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueTransfer {
    pub to: Address,
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitReport {
    pub handler: &'static str,
    pub amount: U256,
    pub output: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub command: &'static str,
    pub asset: Address,
    pub attributed: U256,
    pub splits: Vec<SplitReport>,
}

/// Outcome of a successful routing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteReceipt {
    pub amount_in: U256,
    /// Net increase of `token_out` at the recipient.
    pub amount_out: U256,
    pub steps: Vec<StepReport>,
}

/// Route statistics for monitoring
#[derive(Debug, Clone, Serialize)]
pub struct RouteStats {
    pub total_routes: u64,
    pub successful_routes: u64,
    pub failed_routes: u64,
    pub success_rate: f64,
}

/// A decoded step with its handlers resolved.
struct PlannedStep<'a> {
    step: Step<'a>,
    handlers: Vec<Arc<dyn StepHandler>>,
}

/// The router's settlement entry point as seen by a venue mid-swap.
pub struct RouterCallback<'g> {
    guard: &'g mut CallbackGuard,
    router: Address,
}

impl<'g> RouterCallback<'g> {
    pub fn new(guard: &'g mut CallbackGuard, router: Address) -> Self {
        Self { guard, router }
    }
}

impl SwapCallback for RouterCallback<'_> {
    fn swap_callback(
        &mut self,
        ledger: &mut Ledger,
        caller: Address,
        amount0_delta: I256,
        amount1_delta: I256,
        data: &[u8],
    ) -> Result<(), RouteError> {
        settle_swap_callback(self.guard, ledger, self.router, caller, amount0_delta, amount1_delta, data)
    }
}

/// Pay a callback venue what it is owed. The guard check comes before anything else.
fn settle_swap_callback(
    guard: &mut CallbackGuard,
    ledger: &mut Ledger,
    router: Address,
    caller: Address,
    amount0_delta: I256,
    amount1_delta: I256,
    data: &[u8],
) -> Result<(), RouteError> {
    guard.verify_and_consume(caller)?;

    let owed = if amount0_delta.is_positive() {
        amount0_delta
    } else {
        amount1_delta
    };
    if !owed.is_positive() {
        return Err(RouteError::NonPositiveCallbackAmount);
    }
    if data.len() != 20 {
        return Err(RouteError::InvalidPayload {
            handler: "swap_callback",
            reason: format!("callback data is {} bytes, expected a token address", data.len()),
        });
    }
    let token = Address::from_slice(data);
    let amount = owed.unsigned_abs();
    debug!(pool = %caller, token = %token, amount = %amount, "settling swap callback");
    ledger.safe_transfer(token, router, caller, amount)?;
    Ok(())
}

/// Interprets routes. One processor owns one callback guard, so it can only
/// run one route at a time.
pub struct RouteProcessor {
    address: Address,
    registry: SelectorRegistry,
    guard: CallbackGuard,
    gate: RouteGate,
    total_routes: AtomicU64,
    successful_routes: AtomicU64,
    failed_routes: AtomicU64,
}

impl RouteProcessor {
    pub fn new(address: Address, owner: Address, registry: SelectorRegistry) -> Self {
        Self {
            address,
            registry,
            guard: CallbackGuard::new(),
            gate: RouteGate::new(owner),
            total_routes: AtomicU64::new(0),
            successful_routes: AtomicU64::new(0),
            failed_routes: AtomicU64::new(0),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn registry(&self) -> &SelectorRegistry {
        &self.registry
    }

    pub fn gate(&self) -> &RouteGate {
        &self.gate
    }

    pub fn guard(&self) -> &CallbackGuard {
        &self.guard
    }

    pub fn pause(&mut self, caller: Address) -> Result<(), RouteError> {
        self.gate.pause(caller)
    }

    pub fn resume(&mut self, caller: Address) -> Result<(), RouteError> {
        self.gate.resume(caller)
    }

    pub fn set_privilege(&mut self, caller: Address, user: Address, privileged: bool) -> Result<(), RouteError> {
        self.gate.set_privilege(caller, user, privileged)
    }

    /// Owner-only allowance from the router's own balance to `spender`.
    pub fn set_approval(
        &self,
        world: &mut World,
        caller: Address,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), RouteError> {
        self.gate.ensure_owner(caller)?;
        world.ledger.approve(token, self.address, spender, amount)?;
        info!(token = %token, spender = %spender, amount = %amount, "router approval set");
        Ok(())
    }

    /// Get route statistics
    pub fn get_stats(&self) -> RouteStats {
        let total = self.total_routes.load(Ordering::Relaxed);
        let successful = self.successful_routes.load(Ordering::Relaxed);
        let failed = self.failed_routes.load(Ordering::Relaxed);
        RouteStats {
            total_routes: total,
            successful_routes: successful,
            failed_routes: failed,
            success_rate: if total > 0 {
                successful as f64 / total as f64
            } else {
                0.0
            },
        }
    }

    /// Execute `call.route`, delivering at least `amount_out_min` of
    /// `token_out` to `call.to`. Either everything happens or nothing does.
    pub fn process_route(&mut self, world: &mut World, call: &RouteCall<'_>) -> Result<RouteReceipt, RouteError> {
        self.transfer_value_and_process_route(world, call, None)
    }

    /// Like [`Self::process_route`], but first forwards `transfer` out of the
    /// attached value.
    #[tracing::instrument(
        skip_all,
        fields(caller = %call.caller, token_in = %call.token_in, token_out = %call.token_out, to = %call.to)
    )]
    pub fn transfer_value_and_process_route(
        &mut self,
        world: &mut World,
        call: &RouteCall<'_>,
        transfer: Option<ValueTransfer>,
    ) -> Result<RouteReceipt, RouteError> {
        self.total_routes.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();

        let checkpoint = world.checkpoint();
        let result = self.gate.ensure_open().and_then(|_| self.run(world, call, transfer));
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(receipt) => {
                self.successful_routes.fetch_add(1, Ordering::Relaxed);
                metrics::ROUTES.with_label_values(&["success"]).inc();
                metrics::ROUTE_LATENCY.with_label_values(&["success"]).observe(elapsed);
                info!(
                    amount_in = %call.amount_in,
                    amount_out_min = %call.amount_out_min,
                    amount_out = %receipt.amount_out,
                    steps = receipt.steps.len(),
                    "route processed"
                );
            }
            Err(err) => {
                world.restore(checkpoint);
                self.guard.reset();
                self.failed_routes.fetch_add(1, Ordering::Relaxed);
                let class = err.class().as_str();
                metrics::ROUTES.with_label_values(&["failure"]).inc();
                metrics::ROUTE_ERRORS.with_label_values(&[class]).inc();
                metrics::ROUTE_LATENCY.with_label_values(&["failure"]).observe(elapsed);
                warn!(class, error = %err, "route failed, state rolled back");
            }
        }
        result
    }

    /// The router's swap callback entry point. Venues reach it through the
    /// sink handed to them; anyone else calling it is rejected by the guard.
    pub fn swap_callback(
        &mut self,
        world: &mut World,
        caller: Address,
        amount0_delta: I256,
        amount1_delta: I256,
        data: &[u8],
    ) -> Result<(), RouteError> {
        let checkpoint = world.checkpoint();
        let result = settle_swap_callback(
            &mut self.guard,
            &mut world.ledger,
            self.address,
            caller,
            amount0_delta,
            amount1_delta,
            data,
        );
        if let Err(err) = &result {
            world.restore(checkpoint);
            metrics::ROUTE_ERRORS.with_label_values(&[err.class().as_str()]).inc();
        }
        result
    }

    fn plan<'a>(&self, route: &'a [u8]) -> Result<Vec<PlannedStep<'a>>, RouteError> {
        let steps = RouteDecoder::new(route).decode_all()?;
        steps
            .into_iter()
            .map(|step| {
                let handlers = match &step {
                    Step::Permit(_) => Vec::new(),
                    Step::Swap { splits, .. } => splits
                        .iter()
                        .map(|split| {
                            let handler = self
                                .registry
                                .resolve(split.selector)
                                .ok_or(RouteError::UnknownSelector(split.selector))?;
                            handler.validate(split.data)?;
                            Ok(handler)
                        })
                        .collect::<Result<Vec<_>, RouteError>>()?,
                };
                Ok(PlannedStep { step, handlers })
            })
            .collect()
    }

    fn run(
        &mut self,
        world: &mut World,
        call: &RouteCall<'_>,
        transfer: Option<ValueTransfer>,
    ) -> Result<RouteReceipt, RouteError> {
        let plan = self.plan(call.route)?;

        let anchor = input_anchor(plan.iter().map(|p| p.step.command()), call.caller, self.address);
        let input_before = world.ledger.balance_of(call.token_in, anchor)?;
        // pull steps after a router-funded first step still draw on the caller
        let pulls_from_caller = plan
            .iter()
            .any(|p| p.step.command() == CommandCode::PullFromCaller);
        let payer_before = if anchor != call.caller && pulls_from_caller {
            Some(world.ledger.balance_of(call.token_in, call.caller)?)
        } else {
            None
        };
        let output_before = world.ledger.balance_of(call.token_out, call.to)?;

        if !call.value.is_zero() {
            world
                .ledger
                .safe_transfer(NATIVE, call.caller, self.address, call.value)?;
        }
        let mut exempt = U256::ZERO;
        if let Some(t) = transfer {
            world.ledger.safe_transfer(NATIVE, self.address, t.to, t.amount)?;
            if call.token_in == NATIVE {
                exempt = t.amount;
            }
        }

        let mut reports = Vec::with_capacity(plan.len());
        let mut funded = false;
        let mut executed = Vec::with_capacity(plan.len());
        for PlannedStep { step, handlers } in plan {
            let command_name = step.command().as_str();
            match step {
                Step::Permit(permit) => self.apply_permit(world, call, &permit)?,
                Step::Swap {
                    command,
                    asset,
                    splits,
                } => {
                    let attributed = self.attributed_amount(world, call, command, asset, &handlers, &splits, funded)?;
                    if command != CommandCode::Continuation {
                        funded = true;
                    }
                    let source = match command {
                        CommandCode::PullFromCaller => FundsSource::Caller(call.caller),
                        CommandCode::Continuation => FundsSource::Upstream,
                        _ => FundsSource::Router,
                    };
                    let weights: Vec<u16> = splits.iter().map(|s| s.weight).collect();
                    let shares = split_amounts(attributed, &weights)?;

                    let mut split_reports = Vec::with_capacity(splits.len());
                    for ((split, handler), amount) in splits.iter().zip(&handlers).zip(shares) {
                        let mut ctx = StepContext {
                            world: &mut *world,
                            guard: &mut self.guard,
                            router: self.address,
                            caller: call.caller,
                        };
                        let output = handler.execute(
                            &mut ctx,
                            StepInput {
                                source,
                                asset,
                                amount,
                                data: split.data,
                            },
                        )?;
                        self.guard.assert_disarmed()?;
                        debug!(
                            command = command.as_str(),
                            handler = handler.name(),
                            amount = %amount,
                            output = %output,
                            "split executed"
                        );
                        split_reports.push(SplitReport {
                            handler: handler.name(),
                            amount,
                            output,
                        });
                    }
                    reports.push(StepReport {
                        command: command.as_str(),
                        asset,
                        attributed,
                        splits: split_reports,
                    });
                }
            }
            executed.push(command_name);
        }

        let input_after = world.ledger.balance_of(call.token_in, anchor)?;
        check_input_conservation(input_before, input_after, call.amount_in, exempt)?;
        if let Some(before) = payer_before {
            let after = world.ledger.balance_of(call.token_in, call.caller)?;
            check_input_conservation(before, after, call.amount_in, exempt)?;
        }
        let output_after = world.ledger.balance_of(call.token_out, call.to)?;
        let amount_out = check_output_minimum(output_before, output_after, call.amount_out_min)?;

        for command in executed {
            metrics::ROUTE_STEPS.with_label_values(&[command]).inc();
        }

        Ok(RouteReceipt {
            amount_in: call.amount_in,
            amount_out,
            steps: reports,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn attributed_amount(
        &self,
        world: &World,
        call: &RouteCall<'_>,
        command: CommandCode,
        asset: Address,
        handlers: &[Arc<dyn StepHandler>],
        splits: &[Split<'_>],
        funded: bool,
    ) -> Result<U256, RouteError> {
        match command {
            CommandCode::Continuation => match (handlers.first(), splits.first()) {
                (Some(handler), Some(split)) => handler.upstream_amount(world, asset, split.data),
                _ => Ok(U256::ZERO),
            },
            CommandCode::PullFromCaller => Ok(call.amount_in),
            CommandCode::OwnBalance | CommandCode::Native if !funded => Ok(call.amount_in),
            CommandCode::OwnBalance | CommandCode::Native => {
                Ok(world.ledger.balance_of(asset, self.address)?)
            }
            CommandCode::Permit => Ok(U256::ZERO),
        }
    }

    fn apply_permit(&self, world: &mut World, call: &RouteCall<'_>, permit: &PermitPayload) -> Result<(), RouteError> {
        let owner = call.caller;
        let key = world
            .signer(owner)
            .cloned()
            .ok_or(PermitError::UnknownSigner(owner))?;
        let request = PermitRequest {
            token: call.token_in,
            owner,
            spender: self.address,
            value: permit.value,
            nonce: world.ledger.nonce(call.token_in, owner)?,
            deadline: permit.deadline,
        };
        verify_permit(&key, &request, permit, world.timestamp())?;
        world
            .ledger
            .approve(call.token_in, owner, self.address, permit.value)?;
        world.ledger.bump_nonce(call.token_in, owner)?;
        debug!(owner = %owner, token = %call.token_in, value = %permit.value, "permit applied");
        Ok(())
    }
}
