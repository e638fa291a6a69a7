//! Pricing calculator
//!
//! Pure functions over exact decimals. The 5% marketplace fee splits a
//! sale three ways: the buyer pays 105% of the price, the seller keeps
//! 95%, the platform takes both 5% cuts. For every price `p`:
//!
//! `buyer_charge(p) - seller_payment(p) == platform_fee(p) == 2 × fee(p)`

use crate::config::RateTable;
use crate::error::{Error, Result};
use parcel_core::ParcelClass;
use rust_decimal::Decimal;

/// Marketplace fee rate (5%)
pub fn fee_rate() -> Decimal {
    Decimal::new(5, 2)
}

/// Fee taken from each side of a sale
pub fn fee(price: Decimal) -> Decimal {
    price * fee_rate()
}

/// Amount the buyer pays: price plus the buyer-side fee
pub fn buyer_charge(price: Decimal) -> Decimal {
    price + fee(price)
}

/// Amount the seller receives: price minus the seller-side fee
pub fn seller_payment(price: Decimal) -> Decimal {
    price - fee(price)
}

/// Amount the platform keeps: both fees
pub fn platform_fee(price: Decimal) -> Decimal {
    fee(price) * Decimal::TWO
}

/// Reference-unit value of a parcel, derived from its stability
pub fn parcel_value(stability: Decimal, class: ParcelClass, rates: &RateTable) -> Decimal {
    stability * rates.rate_of(class.yield_asset())
}

/// Reference-unit value of a two-currency price
pub fn effective_price(psc: Decimal, irr: Decimal, rates: &RateTable) -> Decimal {
    irr + psc * rates.psc
}

/// A price as a percentage of a parcel's value
///
/// A zero-value parcel prices at 100% so it can always be listed.
pub fn price_pct(offered: Decimal, value: Decimal) -> Decimal {
    if value.is_zero() {
        Decimal::ONE_HUNDRED
    } else {
        offered / value * Decimal::ONE_HUNDRED
    }
}

/// Reject prices below the floor percentage
pub fn check_floor(pct: Decimal, floor_pct: Decimal) -> Result<()> {
    if pct < floor_pct {
        return Err(Error::Policy(format!(
            "price at {:.0}% of parcel value is below the {:.0}% minimum",
            pct, floor_pct
        )));
    }
    Ok(())
}
