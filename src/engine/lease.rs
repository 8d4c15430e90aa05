//! Closed-end leases, computed step by step the way a desking worksheet does.

use super::tax::{strategy_for, LeaseTaxBasis};
use super::{term_or_warn, CalcWarning, TaxContext};
use crate::domain::{DealInputs, Decimal, DerivedOutputs, LeaseBreakdown, LeaseTerms, TaxMethod};

pub(crate) fn derive(
    inputs: &DealInputs,
    terms: &LeaseTerms,
    tax: &TaxContext,
    warnings: &mut Vec<CalcWarning>,
) -> DerivedOutputs {
    let trade_equity = inputs.trade_equity();
    let aftermarket_total = inputs.aftermarket_total();
    let cash_down = inputs.down_payment;
    let rebates = inputs.manufacturer_rebate;

    let gross_cap_cost = inputs.selling_price() + terms.acquisition_fee + aftermarket_total;
    let cap_reductions = cash_down + trade_equity + rebates + inputs.other_incentives;
    if cap_reductions > gross_cap_cost {
        warnings.push(CalcWarning::CapReductionsExceedGrossCap {
            reductions: cap_reductions,
            gross: gross_cap_cost,
        });
    }

    let adjusted_cap_cost = gross_cap_cost - cap_reductions;
    if adjusted_cap_cost.is_negative() {
        warnings.push(CalcWarning::NegativeAdjustedCapCost {
            amount: adjusted_cap_cost,
        });
    }

    let residual_value =
        terms.msrp * terms.residual_percent.unwrap_or_default() / Decimal::hundred();
    if residual_value > adjusted_cap_cost {
        warnings.push(CalcWarning::ResidualExceedsAdjustedCap {
            residual: residual_value,
            adjusted: adjusted_cap_cost,
        });
    }
    let depreciation = adjusted_cap_cost - residual_value;

    let term = term_or_warn(inputs.term_months, warnings);
    let monthly_depreciation_charge = depreciation
        .checked_div(Decimal::from(term))
        .unwrap_or_default();
    let monthly_rent_charge =
        (adjusted_cap_cost + residual_value) * terms.money_factor.unwrap_or_default();
    let base_monthly_payment = monthly_depreciation_charge + monthly_rent_charge;

    let (method, rate, rules) = match &tax.profile {
        Some(profile) => (profile.method, profile.combined_rate, profile.rules),
        None => (TaxMethod::OnPayment, tax.placeholder_rate, Default::default()),
    };
    let basis = LeaseTaxBasis {
        selling_price: inputs.selling_price(),
        trade_allowance: inputs.trade_allowance,
        cash_down,
        rebates,
        fees: inputs.total_fees,
        adjusted_cap_cost,
        base_payment: base_monthly_payment,
    };
    let lease_tax = strategy_for(method).assess(&basis, rate, &rules);

    let monthly_payment = base_monthly_payment + lease_tax.monthly;
    let drive_off_total = monthly_payment + cash_down + lease_tax.upfront;
    let total_cost = monthly_payment * Decimal::from(term) + drive_off_total;

    DerivedOutputs {
        trade_equity,
        aftermarket_total,
        amount_financed: adjusted_cap_cost,
        monthly_payment,
        total_cost,
        lease: Some(LeaseBreakdown {
            gross_cap_cost,
            cap_reductions,
            adjusted_cap_cost,
            residual_value,
            depreciation,
            monthly_depreciation_charge,
            monthly_rent_charge,
            base_monthly_payment,
            monthly_tax: lease_tax.monthly,
            upfront_tax: lease_tax.upfront,
            drive_off_total,
        }),
    }
}
