// Quantization module for route shares and pool fees
// This file handles the fixed-point arithmetic shared by the interpreter and
// the bundled handlers: 16-bit split weights and fees expressed in millionths
//
// Numan Thabit 2025 Nov

use alloy_primitives::U256;

use crate::errors::RouteError;

/// 100% expressed as a split weight.
pub const FULL_SCALE: u16 = u16::MAX;

/// Fee denominator (fees are given in millionths).
pub const FEE_DENOMINATOR: u32 = 1_000_000;

/// `floor(amount * weight / FULL_SCALE)`.
pub fn weighted_share(amount: U256, weight: u16) -> Result<U256, RouteError> {
    let scaled = amount
        .checked_mul(U256::from(weight))
        .ok_or(RouteError::Overflow("split weight"))?;
    Ok(scaled / U256::from(FULL_SCALE))
}

/// Amount attributed to every split of a step.
///
/// When the weights add up to exactly [`FULL_SCALE`] the last split absorbs the
/// rounding remainder, so the step attributes its whole input. Otherwise every
/// split gets its plain floored share and the rest stays where it is.
pub fn split_amounts(amount: U256, weights: &[u16]) -> Result<Vec<U256>, RouteError> {
    let mut shares = weights
        .iter()
        .map(|w| weighted_share(amount, *w))
        .collect::<Result<Vec<_>, _>>()?;

    let total_weight: u32 = weights.iter().map(|w| u32::from(*w)).sum();
    if total_weight == u32::from(FULL_SCALE) {
        let assigned = shares
            .iter()
            .try_fold(U256::ZERO, |acc, s| acc.checked_add(*s))
            .ok_or(RouteError::Overflow("split sum"))?;
        if let Some(last) = shares.last_mut() {
            *last += amount.saturating_sub(assigned);
        }
    }
    Ok(shares)
}

/// Constant-product output for `amount_in` against `(reserve_in, reserve_out)`
/// with a fee in millionths.
pub fn constant_product_out(
    amount_in: U256,
    reserve_in: U256,
    reserve_out: U256,
    fee: u32,
) -> Result<U256, RouteError> {
    if fee >= FEE_DENOMINATOR {
        return Ok(U256::ZERO);
    }
    let amount_in_with_fee = amount_in
        .checked_mul(U256::from(FEE_DENOMINATOR - fee))
        .ok_or(RouteError::Overflow("amount with fee"))?;
    let numerator = amount_in_with_fee
        .checked_mul(reserve_out)
        .ok_or(RouteError::Overflow("swap numerator"))?;
    let denominator = reserve_in
        .checked_mul(U256::from(FEE_DENOMINATOR))
        .and_then(|r| r.checked_add(amount_in_with_fee))
        .ok_or(RouteError::Overflow("swap denominator"))?;
    if denominator.is_zero() {
        return Ok(U256::ZERO);
    }
    Ok(numerator / denominator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_weight_takes_everything() {
        let shares = split_amounts(U256::from(1_000u64), &[FULL_SCALE]).unwrap();
        assert_eq!(shares, vec![U256::from(1_000u64)]);
    }

    #[test]
    fn last_split_absorbs_rounding_when_weights_are_complete() {
        // 1/3 + 1/3 + 1/3 of 100 floors to 33 each
        let shares = split_amounts(U256::from(100u64), &[21845, 21845, 21845]).unwrap();
        assert_eq!(
            shares,
            vec![U256::from(33u64), U256::from(33u64), U256::from(34u64)]
        );
        let total: U256 = shares.iter().copied().fold(U256::ZERO, |a, b| a + b);
        assert_eq!(total, U256::from(100u64));
    }

    #[test]
    fn partial_weights_keep_plain_floor() {
        let shares = split_amounts(U256::from(100u64), &[32767]).unwrap();
        assert_eq!(shares, vec![U256::from(49u64)]);
    }

    #[test]
    fn constant_product_matches_reference_values() {
        // 0.3% fee, 1_000 into a 1_000_000 / 1_000_000 pool
        let out = constant_product_out(
            U256::from(1_000u64),
            U256::from(1_000_000u64),
            U256::from(1_000_000u64),
            3_000,
        )
        .unwrap();
        assert_eq!(out, U256::from(996u64));
        let none = constant_product_out(U256::from(1u64), U256::ZERO, U256::ZERO, 3_000).unwrap();
        assert_eq!(none, U256::ZERO);
    }
}
