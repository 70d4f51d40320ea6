use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::mortgage::amortization;
use crate::types::{ratio, EngineContext, Money, PropertyFinancials, Ratio};
use crate::EngineResult;

/// Conservatism buffer applied to an actual county tax bill.
const TAX_BILL_BUFFER: f64 = 1.05;

/// Rent haircut used for the downside cash-flow stress.
const DOWNSIDE_RENT_FACTOR: f64 = 0.9;

/// Share of gross rent FHA counts toward self-sufficiency.
const FHA_RENT_CREDIT: f64 = 0.75;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Acquisition and monthly carrying costs for one property under one loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MortgageCosts {
    pub down_payment: Money,
    pub closing_costs: Money,
    /// Closing costs plus down payment
    pub cash_needed: Money,
    /// Price less down payment plus any financed upfront MIP
    pub loan_amount: Money,
    pub monthly_mortgage: Money,
    pub monthly_mip: Money,
    pub monthly_taxes: Money,
    pub monthly_insurance: Money,
}

impl MortgageCosts {
    /// Principal, interest, taxes and insurance (MIP included).
    pub fn piti(&self) -> Money {
        self.monthly_mortgage + self.monthly_mip + self.monthly_taxes + self.monthly_insurance
    }
}

/// Single-period metrics for one (property, loan, assumptions) triple.
///
/// Y1 is the house-hacking year (owner occupies the cheapest unit), Y2 is
/// fully rented. Ratios that cannot be computed yet are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub address: String,
    pub is_single_family: bool,
    pub purchase_price: Money,
    pub home_age: i32,
    pub cost_per_sqrft: f64,

    pub costs: MortgageCosts,
    pub piti: Money,

    pub total_rent: Money,
    pub min_rent: Money,
    pub net_rent_y1: Money,
    pub annual_rent_y1: Money,
    pub annual_rent_y2: Money,

    pub monthly_vacancy_costs: Money,
    pub monthly_repair_costs: Money,
    pub operating_expenses: Money,
    pub total_monthly_cost: Money,

    pub monthly_noi: Money,
    pub annual_noi_y1: Money,
    pub annual_noi_y2: Money,
    pub monthly_cash_flow_y1: Money,
    pub monthly_cash_flow_y2: Money,
    pub annual_cash_flow_y1: Money,
    pub annual_cash_flow_y2: Money,

    pub cap_rate_y1: Ratio,
    pub cap_rate_y2: Ratio,
    pub coc_y1: Ratio,
    pub coc_y2: Ratio,
    pub grm_y1: Ratio,
    pub grm_y2: Ratio,
    /// Monthly gross rent / price ("1% rule")
    pub mgr_pp: Ratio,
    /// Operating expenses / gross rent ("50% rule")
    pub opex_rent: Ratio,
    /// Gross rent / mortgage payment
    pub dscr: Ratio,

    pub ltv_ratio: f64,
    pub price_per_door: Ratio,
    pub rent_per_sqft: f64,
    pub break_even_occupancy: Ratio,
    pub break_even_vacancy: Ratio,
    pub egi: Money,
    pub debt_yield: Ratio,
    pub cash_flow_y1_downside_10pct: Money,
    pub cash_flow_y2_downside_10pct: Money,
    pub monthly_depreciation: Money,
    pub tax_savings_monthly: Money,
    pub after_tax_cash_flow_y1: Money,
    pub after_tax_cash_flow_y2: Money,
    pub fha_self_sufficiency_ratio: Ratio,
}

impl DerivedMetrics {
    /// True when rent and cash-invested denominators are both non-zero.
    pub fn is_scorable(&self) -> bool {
        self.total_rent > 0.0 && self.costs.cash_needed > 0.0
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Price, loan and tax/insurance cost stack.
pub fn mortgage_costs(property: &PropertyFinancials, ctx: &EngineContext) -> EngineResult<MortgageCosts> {
    let price = property.price;
    let loan = &ctx.loan;
    let a = &ctx.assumptions;

    let down_payment = price * loan.down_payment_rate;
    let closing_costs = price * a.closing_costs_rate + loan.lender_fees;
    let loan_amount = price - down_payment + price * loan.mip_upfront_rate;
    if loan_amount < 0.0 {
        return Err(EngineError::domain(
            "down_payment_rate",
            "Down payment exceeds the financed price",
        ));
    }
    let monthly_mortgage = amortization::monthly_payment(loan_amount, loan.annual_rate, loan.years)?;

    let monthly_taxes = match property.annual_tax_amount {
        Some(bill) => bill * TAX_BILL_BUFFER / 12.0,
        None => price * a.property_tax_rate / 12.0,
    };

    Ok(MortgageCosts {
        down_payment,
        closing_costs,
        cash_needed: closing_costs + down_payment,
        loan_amount,
        monthly_mortgage,
        monthly_mip: loan_amount * loan.mip_annual_rate / 12.0,
        monthly_taxes,
        monthly_insurance: price * a.home_insurance_rate / 12.0,
    })
}

/// Compute every single-period metric for a property.
///
/// Validation failures are `DomainError`s. A property with no rent yet, or a
/// loan that needs no cash at closing, still yields metrics: the affected
/// ratios come back as `None`.
pub fn compute_metrics(property: &PropertyFinancials, ctx: &EngineContext) -> EngineResult<DerivedMetrics> {
    property.validate()?;
    ctx.validate()?;

    let a = &ctx.assumptions;
    let price = property.price;
    let costs = mortgage_costs(property, ctx)?;

    // --- Rent roll ---
    let total_rent = property.total_rent();
    let min_rent = property.min_rent();
    let net_rent_y1 = total_rent - min_rent;

    // --- Operating expenses (monthly) ---
    let monthly_vacancy_costs = total_rent * a.vacancy_rate;
    let monthly_repair_costs = total_rent * a.repair_savings_rate;
    let operating_expenses =
        monthly_vacancy_costs + monthly_repair_costs + costs.monthly_taxes + costs.monthly_insurance;
    let total_monthly_cost = costs.monthly_mortgage + costs.monthly_mip + operating_expenses;

    // --- NOI and cash flow, both horizons ---
    let monthly_noi = total_rent - operating_expenses;
    let annual_noi_y1 = (net_rent_y1 - operating_expenses) * 12.0;
    let annual_noi_y2 = monthly_noi * 12.0;
    let monthly_cash_flow_y1 = net_rent_y1 - total_monthly_cost;
    let monthly_cash_flow_y2 = total_rent - total_monthly_cost;
    let annual_cash_flow_y1 = monthly_cash_flow_y1 * 12.0;
    let annual_cash_flow_y2 = monthly_cash_flow_y2 * 12.0;
    let annual_rent_y1 = net_rent_y1 * 12.0;
    let annual_rent_y2 = total_rent * 12.0;

    // --- Scoring ratios: undefined until there is rent and cash invested ---
    let scorable = total_rent > 0.0 && costs.cash_needed > 0.0;
    let guarded = |value: Ratio| if scorable { value } else { None };

    let cap_rate_y1 = guarded(ratio(annual_noi_y1, price));
    let cap_rate_y2 = guarded(ratio(annual_noi_y2, price));
    let coc_y1 = guarded(ratio(annual_cash_flow_y1, costs.cash_needed));
    let coc_y2 = guarded(ratio(annual_cash_flow_y2, costs.cash_needed));
    let grm_y1 = guarded(ratio(price, annual_rent_y1));
    let grm_y2 = guarded(ratio(price, annual_rent_y2));
    let mgr_pp = guarded(ratio(total_rent, price));
    let opex_rent = guarded(ratio(operating_expenses, total_rent));
    let dscr = guarded(ratio(total_rent, costs.monthly_mortgage));

    // --- Supplementary metrics ---
    let doors = if property.is_single_family() {
        property.beds
    } else {
        property.units
    };
    let break_even_occupancy = ratio(total_monthly_cost, total_rent);
    let monthly_depreciation = price * (1.0 - a.land_value_rate) / a.depreciation_years / 12.0;
    let tax_savings_monthly = monthly_depreciation * a.marginal_tax_rate;
    let piti = costs.piti();

    Ok(DerivedMetrics {
        address: property.address.clone(),
        is_single_family: property.is_single_family(),
        purchase_price: price,
        home_age: ctx.as_of_year - property.built_in,
        cost_per_sqrft: price / property.square_feet,
        piti,
        total_rent,
        min_rent,
        net_rent_y1,
        annual_rent_y1,
        annual_rent_y2,
        monthly_vacancy_costs,
        monthly_repair_costs,
        operating_expenses,
        total_monthly_cost,
        monthly_noi,
        annual_noi_y1,
        annual_noi_y2,
        monthly_cash_flow_y1,
        monthly_cash_flow_y2,
        annual_cash_flow_y1,
        annual_cash_flow_y2,
        cap_rate_y1,
        cap_rate_y2,
        coc_y1,
        coc_y2,
        grm_y1,
        grm_y2,
        mgr_pp,
        opex_rent,
        dscr,
        ltv_ratio: costs.loan_amount / price,
        price_per_door: ratio(price, doors as f64),
        rent_per_sqft: total_rent / property.square_feet,
        break_even_occupancy,
        break_even_vacancy: break_even_occupancy.map(|o| 1.0 - o),
        egi: total_rent - monthly_vacancy_costs,
        debt_yield: ratio(annual_noi_y2, costs.loan_amount),
        cash_flow_y1_downside_10pct: net_rent_y1 * DOWNSIDE_RENT_FACTOR - total_monthly_cost,
        cash_flow_y2_downside_10pct: total_rent * DOWNSIDE_RENT_FACTOR - total_monthly_cost,
        monthly_depreciation,
        tax_savings_monthly,
        after_tax_cash_flow_y1: monthly_cash_flow_y1 + tax_savings_monthly,
        after_tax_cash_flow_y2: monthly_cash_flow_y2 + tax_savings_monthly,
        fha_self_sufficiency_ratio: ratio(total_rent * FHA_RENT_CREDIT, piti),
        costs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AssumptionSet, LoanTerms, UnitRent};
    use crate::EngineError;

    fn context() -> EngineContext {
        EngineContext {
            assumptions: AssumptionSet {
                property_tax_rate: 0.02,
                home_insurance_rate: 0.006,
                vacancy_rate: 0.05,
                repair_savings_rate: 0.05,
                closing_costs_rate: 0.03,
                ..AssumptionSet::default()
            },
            loan: LoanTerms {
                name: "FHA".into(),
                annual_rate: 0.06,
                years: 30,
                down_payment_rate: 0.035,
                mip_upfront_rate: 0.0175,
                mip_annual_rate: 0.0055,
                lender_fees: 0.0,
            },
            as_of_year: 2025,
        }
    }

    fn triplex() -> PropertyFinancials {
        PropertyFinancials {
            address: "401 Oak Ave".into(),
            price: 300_000.0,
            square_feet: 2_400.0,
            beds: 6,
            baths: 3.0,
            built_in: 1960,
            units: 3,
            rent_roll: vec![
                UnitRent { unit: "A".into(), beds: 2, rent_estimate: 1_200.0 },
                UnitRent { unit: "B".into(), beds: 2, rent_estimate: 1_000.0 },
                UnitRent { unit: "C".into(), beds: 2, rent_estimate: 1_100.0 },
            ],
            annual_tax_amount: None,
            mobility: None,
        }
    }

    #[test]
    fn test_cost_stack() {
        let c = mortgage_costs(&triplex(), &context()).unwrap();
        assert!((c.down_payment - 10_500.0).abs() < 1e-9);
        assert!((c.closing_costs - 9_000.0).abs() < 1e-9);
        assert!((c.cash_needed - 19_500.0).abs() < 1e-9);
        // 300000 - 10500 + 5250
        assert!((c.loan_amount - 294_750.0).abs() < 1e-9);
        assert!((c.monthly_taxes - 500.0).abs() < 1e-9);
        assert!((c.monthly_insurance - 150.0).abs() < 1e-9);
        assert!((c.monthly_mip - 294_750.0 * 0.0055 / 12.0).abs() < 1e-9);
        let expected = amortization::monthly_payment(294_750.0, 0.06, 30).unwrap();
        assert!((c.monthly_mortgage - expected).abs() < 1e-9);
    }

    #[test]
    fn test_tax_bill_overrides_rate() {
        let mut p = triplex();
        p.annual_tax_amount = Some(4_800.0);
        let c = mortgage_costs(&p, &context()).unwrap();
        assert!((c.monthly_taxes - 420.0).abs() < 1e-9);
    }

    #[test]
    fn test_house_hacking_excludes_cheapest_unit() {
        let m = compute_metrics(&triplex(), &context()).unwrap();
        assert_eq!(m.total_rent, 3_300.0);
        assert_eq!(m.min_rent, 1_000.0);
        assert_eq!(m.net_rent_y1, 2_300.0);
        assert!((m.monthly_cash_flow_y2 - m.monthly_cash_flow_y1 - 1_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_operating_expenses_and_noi() {
        let m = compute_metrics(&triplex(), &context()).unwrap();
        // vacancy 165 + repairs 165 + taxes 500 + insurance 150
        assert!((m.operating_expenses - 980.0).abs() < 1e-9);
        assert!((m.monthly_noi - 2_320.0).abs() < 1e-9);
        assert!((m.annual_noi_y2 - 27_840.0).abs() < 1e-9);
        assert!((m.cap_rate_y2.unwrap() - 0.0928).abs() < 1e-9);
    }

    #[test]
    fn test_ratios() {
        let m = compute_metrics(&triplex(), &context()).unwrap();
        assert!((m.mgr_pp.unwrap() - 0.011).abs() < 1e-12);
        assert!((m.grm_y2.unwrap() - 300_000.0 / 39_600.0).abs() < 1e-9);
        assert!((m.opex_rent.unwrap() - 980.0 / 3_300.0).abs() < 1e-12);
        let dscr = 3_300.0 / m.costs.monthly_mortgage;
        assert!((m.dscr.unwrap() - dscr).abs() < 1e-12);
        let coc = m.annual_cash_flow_y2 / 19_500.0;
        assert!((m.coc_y2.unwrap() - coc).abs() < 1e-12);
        assert_eq!(m.home_age, 65);
        assert!((m.cost_per_sqrft - 125.0).abs() < 1e-12);
        assert!((m.price_per_door.unwrap() - 100_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_rent_leaves_ratios_undefined() {
        let mut p = triplex();
        p.rent_roll.clear();
        let m = compute_metrics(&p, &context()).unwrap();
        assert!(!m.is_scorable());
        assert_eq!(m.coc_y2, None);
        assert_eq!(m.coc_y1, None);
        assert_eq!(m.grm_y2, None);
        assert_eq!(m.mgr_pp, None);
        assert_eq!(m.opex_rent, None);
        assert_eq!(m.dscr, None);
        assert_eq!(m.cap_rate_y2, None);
        assert_eq!(m.break_even_occupancy, None);
    }

    #[test]
    fn test_zero_cash_needed_leaves_coc_undefined() {
        let mut ctx = context();
        ctx.loan.down_payment_rate = 0.0;
        ctx.assumptions.closing_costs_rate = 0.0;
        let m = compute_metrics(&triplex(), &ctx).unwrap();
        assert_eq!(m.costs.cash_needed, 0.0);
        assert_eq!(m.coc_y2, None);
    }

    #[test]
    fn test_single_family_price_per_door_uses_beds() {
        let mut p = triplex();
        p.units = 0;
        let m = compute_metrics(&p, &context()).unwrap();
        assert!(m.is_single_family);
        assert!((m.price_per_door.unwrap() - 50_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_price_rejected() {
        let mut p = triplex();
        p.price = 0.0;
        assert!(matches!(
            compute_metrics(&p, &context()),
            Err(EngineError::Domain { .. })
        ));
    }

    #[test]
    fn test_down_payment_over_price_is_rejected_not_clamped() {
        let mut ctx = context();
        ctx.loan.down_payment_rate = 1.5;
        assert!(matches!(
            compute_metrics(&triplex(), &ctx),
            Err(EngineError::Domain { .. })
        ));
        // The cost stack alone also refuses a negative loan.
        assert!(matches!(
            mortgage_costs(&triplex(), &ctx),
            Err(EngineError::Domain { .. })
        ));
    }

    #[test]
    fn test_depreciation_tax_shield() {
        let m = compute_metrics(&triplex(), &context()).unwrap();
        let dep = 300_000.0 * 0.8 / 27.5 / 12.0;
        assert!((m.monthly_depreciation - dep).abs() < 1e-9);
        assert!((m.after_tax_cash_flow_y2 - m.monthly_cash_flow_y2 - dep * 0.22).abs() < 1e-9);
    }
}
