//! Turns cart lines into priced order items.
//!
//! Prices always come from the current catalogue. The amount a customer was shown (and signed) at initiation is never
//! trusted as the order total.
use std::collections::HashMap;

use cpg_common::MINOR_UNITS_PER_MAJOR;

use crate::{
    checkout_api::errors::CheckoutError,
    db_types::{CartLine, Money, OrderItem, ProductPricing},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedCart {
    pub items: Vec<OrderItem>,
    pub total: Money,
}

/// The selling price of a single unit.
///
/// An explicit price wins. Otherwise the discount is applied to the MRP and rounded to the nearest whole rupee, with
/// halves rounding up. Discounts are clamped to `0..=100` and the result is never negative.
pub fn unit_price(product: &ProductPricing) -> Money {
    if let Some(price) = product.price {
        return price.max(Money::default());
    }
    let mrp = i128::from(product.mrp.value().max(0));
    let keep = i128::from(100 - product.discount_percent.clamp(0, 100));
    let per_major = i128::from(MINOR_UNITS_PER_MAJOR);
    let scale = 100 * per_major;
    let rounded = (mrp * keep + scale / 2) / scale * per_major;
    Money::from(i64::try_from(rounded).unwrap_or(i64::MAX))
}

/// Prices `lines` against `catalogue`.
///
/// Lines with a non-positive quantity, or whose product is not in the catalogue, are dropped. Line order is
/// preserved. Fails with [`CheckoutError::EmptyCart`] if the remaining lines do not add up to a positive total.
pub fn price_cart(lines: &[CartLine], catalogue: &[ProductPricing]) -> Result<PricedCart, CheckoutError> {
    let prices = catalogue.iter().map(|p| (p.product_id, unit_price(p))).collect::<HashMap<i64, Money>>();
    let items = lines
        .iter()
        .filter(|line| line.quantity > 0)
        .filter_map(|line| {
            prices.get(&line.product_id).map(|&unit_price| OrderItem {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price,
            })
        })
        .collect::<Vec<_>>();
    let total = items.iter().map(OrderItem::line_total).sum::<Money>();
    if !total.is_positive() {
        return Err(CheckoutError::EmptyCart);
    }
    Ok(PricedCart { items, total })
}
