//! Retail installment (finance) deals.

use super::{term_or_warn, CalcWarning};
use crate::domain::{DealInputs, Decimal, DerivedOutputs, FinanceTerms};

/// Months in a year; APR is annual.
const PERIODS_PER_YEAR: u32 = 12;

pub(crate) fn derive(
    inputs: &DealInputs,
    terms: &FinanceTerms,
    warnings: &mut Vec<CalcWarning>,
) -> DerivedOutputs {
    let aftermarket_total = inputs.aftermarket_total();
    let amount_financed = amount_financed(inputs, aftermarket_total);
    if amount_financed.is_negative() {
        warnings.push(CalcWarning::NegativeAmountFinanced {
            amount: amount_financed,
        });
    }

    let term = term_or_warn(inputs.term_months, warnings);
    let apr = terms.apr.unwrap_or_default();
    let monthly_payment = if term == 0 {
        Decimal::zero()
    } else {
        match monthly_payment(amount_financed, apr, term) {
            Some(payment) => payment,
            None => {
                warnings.push(CalcWarning::AmortizationOverflow);
                Decimal::zero()
            }
        }
    };

    let total_cost = match monthly_payment
        .checked_mul(Decimal::from(term))
        .and_then(|paid| paid.checked_add(inputs.down_payment))
    {
        Some(total) => total,
        None => {
            warnings.push(CalcWarning::AmortizationOverflow);
            inputs.down_payment
        }
    };

    DerivedOutputs {
        trade_equity: inputs.trade_equity(),
        aftermarket_total,
        amount_financed,
        monthly_payment,
        total_cost,
        lease: None,
    }
}

/// Price plus tax, fees, products and payoff, less down payment, rebate and
/// trade allowance.
fn amount_financed(inputs: &DealInputs, aftermarket_total: Decimal) -> Decimal {
    inputs.selling_price()
        + inputs.total_tax
        + inputs.total_fees
        + aftermarket_total
        + inputs.trade_payoff
        - inputs.down_payment
        - inputs.manufacturer_rebate
        - inputs.trade_allowance
}

/// Level monthly payment for `principal` at `apr` percent over `term` months.
///
/// `term` must be non-zero. Returns `None` if any step overflows.
pub fn monthly_payment(principal: Decimal, apr: Decimal, term: u32) -> Option<Decimal> {
    let term_dec = Decimal::from(term);
    if apr.is_zero() {
        return principal.checked_div(term_dec);
    }

    let rate = apr / Decimal::hundred() / Decimal::from(PERIODS_PER_YEAR);
    let growth = (Decimal::one() + rate).checked_powu(u64::from(term))?;
    // growth / (growth - 1) tends to 1 on long terms, so divide before scaling
    let annuity = growth.checked_div(growth - Decimal::one())?;
    principal.checked_mul(rate)?.checked_mul(annuity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(v: rust_decimal::Decimal) -> Decimal {
        Decimal::new(v)
    }

    fn inputs() -> DealInputs {
        DealInputs {
            vehicle_price: Some(d(dec!(20000))),
            total_tax: d(dec!(1200)),
            total_fees: d(dec!(500)),
            down_payment: d(dec!(2000)),
            term_months: Some(60),
            ..Default::default()
        }
    }

    #[test]
    fn test_worked_example_six_percent_sixty_months() {
        let mut warnings = Vec::new();
        let terms = FinanceTerms {
            apr: Some(d(dec!(6))),
        };
        let out = derive(&inputs(), &terms, &mut warnings);

        assert_eq!(out.amount_financed, d(dec!(19700.00)));
        assert_eq!(out.monthly_payment.round_cents(), d(dec!(380.86)));
        assert_eq!(out.total_cost.round_cents(), d(dec!(24851.37)));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_zero_apr_payment_times_term_equals_principal() {
        for (principal, term) in [
            (dec!(19700), 60u32),
            (dec!(10000), 7),
            (dec!(33333.33), 72),
            (dec!(0.01), 3),
        ] {
            let payment = monthly_payment(d(principal), Decimal::zero(), term).unwrap();
            let diff = (payment * Decimal::from(term) - d(principal)).abs();
            assert!(diff <= d(dec!(0.01)), "{} over {} drifted by {}", principal, term, diff);
        }
    }

    #[test]
    fn test_zero_term_returns_zero_with_warning() {
        let mut warnings = Vec::new();
        let mut inputs = inputs();
        inputs.term_months = Some(0);
        let terms = FinanceTerms {
            apr: Some(d(dec!(6))),
        };
        let out = derive(&inputs, &terms, &mut warnings);

        assert!(out.monthly_payment.is_zero());
        assert_eq!(warnings, vec![CalcWarning::ZeroTerm]);
        assert_eq!(out.total_cost, d(dec!(2000)));
    }

    #[test]
    fn test_negative_amount_financed_warns() {
        let mut warnings = Vec::new();
        let mut inputs = inputs();
        inputs.down_payment = d(dec!(30000));
        let out = derive(&inputs, &FinanceTerms::default(), &mut warnings);

        assert!(out.amount_financed.is_negative());
        assert!(warnings
            .iter()
            .any(|w| matches!(w, CalcWarning::NegativeAmountFinanced { .. })));
    }

    #[test]
    fn test_very_long_term_does_not_overflow() {
        let mut warnings = Vec::new();
        let inputs = DealInputs {
            vehicle_price: Some(d(dec!(100000))),
            term_months: Some(2000),
            ..Default::default()
        };
        let terms = FinanceTerms {
            apr: Some(d(dec!(36))),
        };
        let out = derive(&inputs, &terms, &mut warnings);

        // interest only, to the cent
        assert_eq!(out.monthly_payment.round_cents(), d(dec!(3000.00)));
        assert_eq!(out.total_cost.round_cents(), d(dec!(6000000.00)));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_unrepresentable_payment_warns_instead_of_panicking() {
        let terms = FinanceTerms {
            apr: Some(d(dec!(2400))),
        };
        let huge = DealInputs {
            vehicle_price: Some(d(dec!(50000000000000000000000000000))),
            term_months: Some(12),
            ..Default::default()
        };
        let mut warnings = Vec::new();
        let out = derive(&huge, &terms, &mut warnings);
        assert!(out.monthly_payment.is_zero());
        assert!(warnings.contains(&CalcWarning::AmortizationOverflow));

        let long = DealInputs {
            vehicle_price: Some(d(dec!(20000))),
            term_months: Some(5000),
            ..Default::default()
        };
        let mut warnings = Vec::new();
        let out = derive(&long, &terms, &mut warnings);
        assert!(out.monthly_payment.is_zero());
        assert_eq!(warnings, vec![CalcWarning::AmortizationOverflow]);
    }

    #[test]
    fn test_products_and_payoff_are_financed() {
        let mut warnings = Vec::new();
        let mut inputs = inputs();
        inputs.products = vec![
            crate::domain::ProductLine::new("Service contract", d(dec!(1995))),
            crate::domain::ProductLine::new("GAP", d(dec!(795))),
        ];
        inputs.trade_payoff = d(dec!(4000));
        inputs.trade_allowance = d(dec!(4500));
        let out = derive(&inputs, &FinanceTerms::default(), &mut warnings);

        assert_eq!(out.amount_financed, d(dec!(21990)));
        assert_eq!(out.aftermarket_total, d(dec!(2790)));
    }
}
