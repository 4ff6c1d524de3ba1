//! Reward-unit pricing curve.
//!
//! One whole reward unit costs `BASE_PRICE` base-currency units plus
//! `PRICE_STEP` for every whole reward unit already issued, so the price rises
//! linearly with issuance.

use crate::types::{Amount, BASE_UNIT};

/// 0.002 base currency per reward unit before anything is issued.
pub const BASE_PRICE: u64 = 2_000_000;
/// Added per whole reward unit issued.
pub const PRICE_STEP: u64 = 1;

/// Current price of one whole reward unit, in base-currency base units.
pub fn unit_price(reward_units_issued: Amount) -> Amount {
    let step = reward_units_issued.whole_units().saturating_mul(PRICE_STEP);
    Amount::from_base_units(BASE_PRICE.saturating_add(step))
}

/// Reward base units bought by `amount` of base currency at the current price.
pub fn currency_to_reward_units(amount: Amount, reward_units_issued: Amount) -> Amount {
    let price = unit_price(reward_units_issued).to_base_units();
    amount
        .mul_div(BASE_UNIT, price)
        .unwrap_or(Amount::MAX)
}

/// Base-currency value of `reward_units` (reward base units), truncated.
pub fn reward_units_to_currency(reward_units: Amount, reward_units_issued: Amount) -> Amount {
    let price = unit_price(reward_units_issued).to_base_units();
    reward_units
        .mul_div(price, BASE_UNIT)
        .unwrap_or(Amount::MAX)
}
