use rust_decimal::Decimal;

use super::errors::PricingError;
use super::value_objects::*;

// ============================================================================
// Pricing Resolver - pure functions, no hidden state
// ============================================================================

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Base price plus the additive adjustment of every selected attribute value.
pub fn adjusted_unit_price(
    base_price: Decimal,
    groups: &[AttributeGroup],
    selection: &AttributeSelection,
) -> Result<Decimal, PricingError> {
    for group_id in selection.keys() {
        if !groups.iter().any(|g| g.id == *group_id) {
            return Err(PricingError::UnknownAttributeGroup(*group_id));
        }
    }

    let mut unit_price = base_price;

    for group in groups {
        match selection.get(&group.id) {
            Some(value_id) => {
                let value = group.value(*value_id).ok_or(PricingError::UnknownAttributeValue {
                    group: group.id,
                    value: *value_id,
                })?;
                unit_price += value.price_adjustment.unwrap_or(Decimal::ZERO);
            }
            None if group.required => {
                return Err(PricingError::MissingRequiredAttribute(group.name.clone()));
            }
            None => {}
        }
    }

    Ok(unit_price)
}

/// Discount a coupon grants against `order_amount`.
pub fn coupon_discount(order_amount: Decimal, coupon: &Coupon) -> CouponOutcome {
    if let Some(min) = coupon.min_order_amount {
        if order_amount < min {
            return CouponOutcome::ineligible();
        }
    }

    let value = coupon.value.max(Decimal::ZERO);

    let raw = match coupon.kind {
        CouponKind::Percent => {
            let percent = round_money(order_amount * value / HUNDRED);
            match coupon.max_discount {
                Some(cap) => percent.min(cap.max(Decimal::ZERO)),
                None => percent,
            }
        }
        CouponKind::Fixed => value,
    };

    CouponOutcome {
        eligible: true,
        discount: raw.min(order_amount.max(Decimal::ZERO)),
    }
}

/// Price of a single configured product with an optional coupon.
pub fn resolve_price(
    base_price: Decimal,
    groups: &[AttributeGroup],
    selection: &AttributeSelection,
    coupon: Option<&Coupon>,
) -> Result<ResolvedPrice, PricingError> {
    let unit_price = adjusted_unit_price(base_price, groups, selection)?;
    let discount = coupon
        .map(|c| coupon_discount(unit_price, c).discount)
        .unwrap_or(Decimal::ZERO);

    Ok(ResolvedPrice {
        unit_price,
        discount,
        total: unit_price - discount,
    })
}

impl PricingPolicy {
    pub fn tax_for(&self, taxable: Decimal) -> Decimal {
        round_money(taxable.max(Decimal::ZERO) * self.tax_rate_percent / HUNDRED)
    }

    pub fn shipping_for(&self, subtotal: Decimal) -> Decimal {
        match self.free_shipping_threshold {
            Some(threshold) if subtotal >= threshold => Decimal::ZERO,
            _ => self.shipping_flat_fee,
        }
    }

    /// Totals for an order whose line totals sum to `subtotal`.
    pub fn order_totals(&self, subtotal: Decimal, coupon: Option<&Coupon>) -> OrderTotals {
        let discount = coupon
            .map(|c| coupon_discount(subtotal, c).discount)
            .unwrap_or(Decimal::ZERO);

        OrderTotals::new(
            subtotal,
            self.tax_for(subtotal - discount),
            self.shipping_for(subtotal),
            discount,
        )
    }
}
