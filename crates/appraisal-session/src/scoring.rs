//! Accuracy scoring and loss harvesting.
//!
//! A revealed appraisal is judged by its margin to the final appraisal,
//! measured in basis points of the final appraisal:
//!
//! | margin            | base |
//! |-------------------|------|
//! | exact             | 6    |
//! | ≤ 1%              | 5    |
//! | ≤ 2%              | 4    |
//! | ≤ 3%              | 3    |
//! | ≤ 4%              | 2    |
//! | ≤ 5%              | 1    |
//! | > 5%              | 0    |
//!
//! Voters scoring 0 lose `(margin - 5%) * stake`.

use appraisal_economics::{Amount, BPS_DENOMINATOR};

/// Highest base score, awarded for an exact match.
pub const MAX_BASE_SCORE: u8 = 6;
/// Margin (bps) at which a voter stops being correct.
pub const CORRECT_MARGIN_BPS: u64 = 500;
const SCORE_STEP_BPS: u64 = 100;

pub trait ScoringModel: Send + Sync {
    /// Discrete 0..=6 accuracy score.
    fn score_base(&self, final_appraisal: Amount, revealed: Amount) -> u8;

    /// Loss deducted from an incorrect voter's stake.
    fn harvest_loss(&self, stake: Amount, revealed: Amount, final_appraisal: Amount) -> Amount;

    /// Commission on harvested funds, in basis points, given the treasury balance.
    fn commission_rate(&self, treasury_balance: Amount) -> u32;
}

/// `|revealed - final| * 10000 / final`, truncated. `None` when the final appraisal is zero.
pub fn margin_bps(final_appraisal: Amount, revealed: Amount) -> Option<u64> {
    if final_appraisal.is_zero() {
        return None;
    }
    let final_base = final_appraisal.to_base_units() as u128;
    let diff = final_base.abs_diff(revealed.to_base_units() as u128);
    let bps = diff * BPS_DENOMINATOR as u128 / final_base;
    Some(u64::try_from(bps).unwrap_or(u64::MAX))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardScoring;

impl ScoringModel for StandardScoring {
    fn score_base(&self, final_appraisal: Amount, revealed: Amount) -> u8 {
        if revealed == final_appraisal {
            return MAX_BASE_SCORE;
        }
        let Some(margin) = margin_bps(final_appraisal, revealed) else {
            return 0;
        };
        if margin > CORRECT_MARGIN_BPS {
            return 0;
        }
        // 0..=100 → 5, 101..=200 → 4, ... 401..=500 → 1
        let band = margin.saturating_sub(1) / SCORE_STEP_BPS;
        (MAX_BASE_SCORE as u64 - 1 - band) as u8
    }

    fn harvest_loss(&self, stake: Amount, revealed: Amount, final_appraisal: Amount) -> Amount {
        let excess_bps = match margin_bps(final_appraisal, revealed) {
            Some(margin) => margin.saturating_sub(CORRECT_MARGIN_BPS),
            None if revealed.is_zero() => 0,
            None => BPS_DENOMINATOR,
        };
        if excess_bps == 0 {
            return Amount::ZERO;
        }
        stake
            .mul_div(excess_bps.min(BPS_DENOMINATOR), BPS_DENOMINATOR)
            .unwrap_or(stake)
    }

    fn commission_rate(&self, treasury_balance: Amount) -> u32 {
        match treasury_balance.whole_units() {
            0..=999 => 200,
            1_000..=9_999 => 100,
            10_000..=99_999 => 50,
            _ => 25,
        }
    }
}
