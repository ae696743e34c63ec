// Post-trade validation module
// Balance invariants checked once every step of a route has executed
//
// Numan Thabit 2025 Nov

use alloy_primitives::{Address, U256};
use tracing::warn;

use crate::errors::RouteError;
use crate::router::routes::CommandCode;

/// Account whose input balance the conservation check watches: the caller
/// when the first funding step spends the caller's funds, the router otherwise.
pub fn input_anchor(
    commands: impl IntoIterator<Item = CommandCode>,
    caller: Address,
    router: Address,
) -> Address {
    commands
        .into_iter()
        .find_map(|command| match command {
            CommandCode::Permit => None,
            CommandCode::PullFromCaller | CommandCode::Native => Some(caller),
            CommandCode::OwnBalance | CommandCode::Continuation => Some(router),
        })
        .unwrap_or(caller)
}

/// The anchor may not lose more than `amount_in` (plus any value forwarded
/// out of a native input).
pub fn check_input_conservation(
    before: U256,
    after: U256,
    amount_in: U256,
    exempt: U256,
) -> Result<(), RouteError> {
    let available = after.saturating_add(amount_in).saturating_add(exempt);
    if available < before {
        warn!(before = %before, after = %after, amount_in = %amount_in, "input conservation violated");
        return Err(RouteError::MinimalInputBalanceViolation {
            available,
            required: before,
        });
    }
    Ok(())
}

/// The recipient must gain at least `amount_out_min`. Returns the gain.
pub fn check_output_minimum(before: U256, after: U256, amount_out_min: U256) -> Result<U256, RouteError> {
    let received = after.saturating_sub(before);
    if after < before || received < amount_out_min {
        warn!(received = %received, min = %amount_out_min, "output below minimum");
        return Err(RouteError::MinimalOutputBalanceViolation(received));
    }
    Ok(received)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(v: u64) -> U256 {
        U256::from(v)
    }

    #[test]
    fn anchor_follows_first_funding_step() {
        let caller = Address::repeat_byte(1);
        let router = Address::repeat_byte(2);
        assert_eq!(
            input_anchor([CommandCode::Permit, CommandCode::PullFromCaller], caller, router),
            caller
        );
        assert_eq!(
            input_anchor([CommandCode::OwnBalance, CommandCode::PullFromCaller], caller, router),
            router
        );
        assert_eq!(input_anchor([], caller, router), caller);
    }

    #[test]
    fn spending_exactly_amount_in_is_allowed() {
        check_input_conservation(u(1_000), u(0), u(1_000), U256::ZERO).unwrap();
        assert_eq!(
            check_input_conservation(u(1_000), u(0), u(999), U256::ZERO).unwrap_err(),
            RouteError::MinimalInputBalanceViolation {
                available: u(999),
                required: u(1_000)
            }
        );
        // forwarded native value is not counted against the route
        check_input_conservation(u(1_000), u(0), u(900), u(100)).unwrap();
    }

    #[test]
    fn output_minimum_is_inclusive() {
        assert_eq!(check_output_minimum(u(10), u(1_007), u(997)).unwrap(), u(997));
        assert_eq!(
            check_output_minimum(u(10), u(1_006), u(997)).unwrap_err(),
            RouteError::MinimalOutputBalanceViolation(u(996))
        );
        assert!(check_output_minimum(u(10), u(9), U256::ZERO).is_err());
    }
}
