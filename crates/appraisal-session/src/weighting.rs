use crate::types::SessionCore;
use crate::{EngineError, Result};
use appraisal_economics::Amount;
use tracing::debug;

/// Integer square root, rounded down.
pub fn isqrt(n: u64) -> u64 {
    if n < 2 {
        return n;
    }
    // Newton iteration from an upper bound; widened so x + n / x cannot overflow
    let n = n as u128;
    let mut x = n;
    let mut y = (x + n / x) / 2;
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x as u64
}

/// Number of unit votes a stake is worth: `floor(sqrt(stake / lowest_stake))`.
///
/// Sub-linear in stake, so sixteen times the lowest stake counts four times,
/// not sixteen. A zero denominator yields zero weight.
pub fn voting_weight(stake: Amount, lowest_stake: Amount) -> u64 {
    if lowest_stake.is_zero() {
        return 0;
    }
    isqrt(stake.to_base_units() / lowest_stake.to_base_units())
}

/// Fold one revealed appraisal into the running weighted totals.
pub fn accumulate(core: &mut SessionCore, weight: u64, appraisal: Amount) -> Result<()> {
    let contribution = (weight as u128)
        .checked_mul(appraisal.to_base_units() as u128)
        .ok_or_else(|| EngineError::overflow("weighted appraisal"))?;
    core.total_appraisal_value = core
        .total_appraisal_value
        .checked_add(contribution)
        .ok_or_else(|| EngineError::overflow("total appraisal value"))?;
    core.total_votes = core
        .total_votes
        .checked_add(weight)
        .ok_or_else(|| EngineError::overflow("total votes"))?;

    debug!(
        weight,
        appraisal = appraisal.to_units(),
        total_votes = core.total_votes,
        "Appraisal accumulated"
    );
    Ok(())
}

/// `total_appraisal_value / total_votes`, truncated. Fails when nobody revealed.
pub fn weighted_average(total_appraisal_value: u128, total_votes: u64) -> Result<Amount> {
    if total_votes == 0 {
        return Err(EngineError::ArithmeticFault(
            "division by zero: no revealed votes".to_string(),
        ));
    }
    let average = total_appraisal_value / total_votes as u128;
    u64::try_from(average)
        .map(Amount::from_base_units)
        .map_err(|_| EngineError::overflow("final appraisal"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isqrt() {
        assert_eq!(isqrt(0), 0);
        assert_eq!(isqrt(1), 1);
        assert_eq!(isqrt(3), 1);
        assert_eq!(isqrt(4), 2);
        assert_eq!(isqrt(15), 3);
        assert_eq!(isqrt(16), 4);
        assert_eq!(isqrt(u64::MAX), 4_294_967_295);
    }

    #[test]
    fn test_voting_weight_is_sublinear() {
        let lowest = Amount::from_whole_units(1);

        assert_eq!(voting_weight(Amount::from_whole_units(1), lowest), 1);
        assert_eq!(voting_weight(Amount::from_whole_units(4), lowest), 2);
        assert_eq!(voting_weight(Amount::from_whole_units(16), lowest), 4);
        // 10,000x more stake → only 100x more influence
        assert_eq!(voting_weight(Amount::from_whole_units(10_000), lowest), 100);
        // ratio is floored before the root
        assert_eq!(voting_weight(Amount::from_units(3.9), lowest), 1);
        assert_eq!(voting_weight(Amount::from_whole_units(1), Amount::ZERO), 0);
    }

    #[test]
    fn test_weighted_average() {
        // weights 1 and 4, appraisals 100 and 200
        let total = 100u128 + 4 * 200;
        assert_eq!(
            weighted_average(total, 5).unwrap(),
            Amount::from_base_units(180)
        );
        assert_eq!(
            weighted_average(10, 3).unwrap(),
            Amount::from_base_units(3)
        );
        assert!(matches!(
            weighted_average(0, 0),
            Err(EngineError::ArithmeticFault(_))
        ));
    }
}
