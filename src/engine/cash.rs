//! Cash deals: no amortization.

use crate::domain::{DealInputs, Decimal, DerivedOutputs};

pub(crate) fn derive(inputs: &DealInputs) -> DerivedOutputs {
    let trade_equity = inputs.trade_equity();
    let aftermarket_total = inputs.aftermarket_total();
    let reductions = inputs.manufacturer_rebate + inputs.other_incentives + trade_equity;

    let total_cost = inputs.selling_price()
        + aftermarket_total
        + inputs.total_fees
        + inputs.total_tax
        - reductions;

    DerivedOutputs {
        trade_equity,
        aftermarket_total,
        amount_financed: Decimal::zero(),
        monthly_payment: Decimal::zero(),
        total_cost,
        lease: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProductLine;
    use rust_decimal_macros::dec;

    #[test]
    fn test_cash_total_cost() {
        let inputs = DealInputs {
            vehicle_price: Some(Decimal::new(dec!(25000))),
            total_fees: Decimal::new(dec!(499)),
            total_tax: Decimal::new(dec!(1562.50)),
            manufacturer_rebate: Decimal::new(dec!(1000)),
            other_incentives: Decimal::new(dec!(250)),
            trade_allowance: Decimal::new(dec!(6000)),
            trade_payoff: Decimal::new(dec!(2000)),
            products: vec![ProductLine::new("Tint", Decimal::new(dec!(299)))],
            ..Default::default()
        };

        let out = derive(&inputs);
        // 25000 + 299 + 499 + 1562.50 - (1000 + 250 + 4000)
        assert_eq!(out.total_cost, Decimal::new(dec!(22110.50)));
        assert_eq!(out.aftermarket_total, Decimal::new(dec!(299)));
        assert!(out.amount_financed.is_zero());
    }

    #[test]
    fn test_upside_down_trade_adds_to_cash_cost() {
        let inputs = DealInputs {
            vehicle_price: Some(Decimal::new(dec!(10000))),
            trade_allowance: Decimal::new(dec!(1000)),
            trade_payoff: Decimal::new(dec!(3000)),
            ..Default::default()
        };
        assert_eq!(derive(&inputs).total_cost, Decimal::new(dec!(12000)));
    }
}
