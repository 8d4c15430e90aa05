//! Lease tax step, one strategy per jurisdiction tax method.

use crate::domain::{Decimal, TaxMethod, TaxRules};

/// Amounts a lease tax strategy may tax.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaseTaxBasis {
    pub selling_price: Decimal,
    pub trade_allowance: Decimal,
    pub cash_down: Decimal,
    pub rebates: Decimal,
    pub fees: Decimal,
    pub adjusted_cap_cost: Decimal,
    pub base_payment: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaseTax {
    pub monthly: Decimal,
    pub upfront: Decimal,
}

pub trait LeaseTaxStrategy: Send + Sync {
    fn assess(&self, basis: &LeaseTaxBasis, rate: Decimal, rules: &TaxRules) -> LeaseTax;
}

/// Tax each payment; cap cost reductions paid in cash are taxed at signing.
pub struct OnPayment;

/// Tax the adjusted cap cost in full at signing.
pub struct OnCapCost;

/// Tax the selling price in full at signing.
pub struct OnPrice;

pub struct Exempt;

static ON_PAYMENT: OnPayment = OnPayment;
static ON_CAP_COST: OnCapCost = OnCapCost;
static ON_PRICE: OnPrice = OnPrice;
static EXEMPT: Exempt = Exempt;

pub fn strategy_for(method: TaxMethod) -> &'static dyn LeaseTaxStrategy {
    match method {
        TaxMethod::OnPayment => &ON_PAYMENT,
        TaxMethod::OnCapCost => &ON_CAP_COST,
        TaxMethod::OnPrice => &ON_PRICE,
        TaxMethod::Exempt => &EXEMPT,
    }
}

fn floor_zero(value: Decimal) -> Decimal {
    if value.is_negative() {
        Decimal::zero()
    } else {
        value
    }
}

fn taxable_fees(basis: &LeaseTaxBasis, rules: &TaxRules) -> Decimal {
    if rules.fees_taxable {
        basis.fees
    } else {
        Decimal::zero()
    }
}

impl LeaseTaxStrategy for OnPayment {
    fn assess(&self, basis: &LeaseTaxBasis, rate: Decimal, rules: &TaxRules) -> LeaseTax {
        let mut upfront_base = basis.cash_down + taxable_fees(basis, rules);
        if rules.rebates_taxable {
            upfront_base = upfront_base + basis.rebates;
        }
        LeaseTax {
            monthly: floor_zero(basis.base_payment) * rate,
            upfront: floor_zero(upfront_base) * rate,
        }
    }
}

impl LeaseTaxStrategy for OnCapCost {
    fn assess(&self, basis: &LeaseTaxBasis, rate: Decimal, rules: &TaxRules) -> LeaseTax {
        let base = basis.adjusted_cap_cost + taxable_fees(basis, rules);
        LeaseTax {
            monthly: Decimal::zero(),
            upfront: floor_zero(base) * rate,
        }
    }
}

impl LeaseTaxStrategy for OnPrice {
    fn assess(&self, basis: &LeaseTaxBasis, rate: Decimal, rules: &TaxRules) -> LeaseTax {
        let mut base = basis.selling_price + taxable_fees(basis, rules);
        if rules.trade_in_reduces_base {
            base = base - basis.trade_allowance;
        }
        if !rules.rebates_taxable {
            base = base - basis.rebates;
        }
        LeaseTax {
            monthly: Decimal::zero(),
            upfront: floor_zero(base) * rate,
        }
    }
}

impl LeaseTaxStrategy for Exempt {
    fn assess(&self, _basis: &LeaseTaxBasis, _rate: Decimal, _rules: &TaxRules) -> LeaseTax {
        LeaseTax::default()
    }
}
