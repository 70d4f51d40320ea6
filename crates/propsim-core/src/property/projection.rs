use serde::{Deserialize, Serialize};

use super::metrics::{compute_metrics, DerivedMetrics};
use crate::error::EngineError;
use crate::mortgage::amortization;
use crate::types::{ratio, AssumptionSet, EngineContext, Money, PropertyFinancials, Rate, Ratio};
use crate::EngineResult;

const IRR_TOLERANCE: f64 = 1e-7;
const MAX_IRR_ITERATIONS: u32 = 100;
const IRR_LOWER_BOUND: f64 = -0.99;
const IRR_UPPER_BOUND: f64 = 10.0;

/// Horizons reported when the caller does not ask for specific ones.
pub const DEFAULT_HORIZONS: [u32; 3] = [5, 10, 20];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Years until the cash invested is recovered from operating cash flow.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "years")]
pub enum PaybackPeriod {
    Years(f64),
    /// Year-2 cash flow is not positive
    Never,
}

/// Hold-then-sell outcome over one horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonProjection {
    pub years: u32,
    pub cumulative_cash_flow: Money,
    pub appreciation: Money,
    pub principal_paydown: Money,
    /// Undiscounted sum of the three components above
    pub expected_gain: Money,
    pub future_value: Money,
    pub remaining_loan_balance: Money,
    pub net_sale_proceeds: Money,
    pub npv: Money,
    pub irr: Ratio,
    pub equity_multiple: Ratio,
    pub avg_annual_return: Ratio,
    /// Price plus NPV
    pub fair_value: Money,
    /// NPV per dollar of cash invested
    pub value_gap: Ratio,
}

// ---------------------------------------------------------------------------
// Cash flow sequence
// ---------------------------------------------------------------------------

/// Annual cash flows for years 1..=N.
///
/// Year 1 is the house-hacking cash flow grown once by rent appreciation;
/// year k >= 2 is the fully rented cash flow grown `k - 1` times.
pub fn projected_annual_cash_flows(
    metrics: &DerivedMetrics,
    assumptions: &AssumptionSet,
    years: u32,
) -> Vec<Money> {
    let growth = 1.0 + assumptions.rent_appreciation_rate;
    (1..=years)
        .map(|year| {
            if year == 1 {
                metrics.annual_cash_flow_y1 * growth
            } else {
                metrics.annual_cash_flow_y2 * growth.powi(year as i32 - 1)
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Gain components
// ---------------------------------------------------------------------------

fn ensure_horizon(years: u32) -> EngineResult<()> {
    if years == 0 {
        return Err(EngineError::domain("years", "Projection horizon must be at least one year"));
    }
    Ok(())
}

/// Loan balance still owed after `years` of scheduled payments.
pub fn remaining_loan_balance(metrics: &DerivedMetrics, ctx: &EngineContext, years: u32) -> EngineResult<Money> {
    amortization::remaining_balance(
        metrics.costs.loan_amount,
        ctx.loan.annual_rate,
        ctx.loan.years,
        years.saturating_mul(12),
    )
}

pub fn future_value(price: Money, appreciation_rate: Rate, years: u32) -> Money {
    price * (1.0 + appreciation_rate).powi(years as i32)
}

/// Sale price less loan payoff, selling costs and tax on any appreciation.
pub fn net_sale_proceeds(
    property: &PropertyFinancials,
    metrics: &DerivedMetrics,
    ctx: &EngineContext,
    years: u32,
) -> EngineResult<Money> {
    let a = &ctx.assumptions;
    let fv = future_value(property.price, a.appreciation_for(property), years);
    let balance = remaining_loan_balance(metrics, ctx, years)?;
    let capital_gain = (fv - property.price).max(0.0);
    Ok(fv - balance - fv * a.selling_costs_rate - capital_gain * a.capital_gains_tax_rate)
}

/// Cumulative cash flow plus appreciation plus principal paydown over `years`.
pub fn expected_gain(property: &PropertyFinancials, ctx: &EngineContext, years: u32) -> EngineResult<Money> {
    let metrics = compute_metrics(property, ctx)?;
    expected_gain_from_metrics(property, &metrics, ctx, years)
}

pub fn expected_gain_from_metrics(
    property: &PropertyFinancials,
    metrics: &DerivedMetrics,
    ctx: &EngineContext,
    years: u32,
) -> EngineResult<Money> {
    ensure_horizon(years)?;
    let cash_flow: Money = projected_annual_cash_flows(metrics, &ctx.assumptions, years).iter().sum();
    let appreciation = future_value(property.price, ctx.assumptions.appreciation_for(property), years) - property.price;
    let paydown = metrics.costs.loan_amount - remaining_loan_balance(metrics, ctx, years)?;
    Ok(cash_flow + appreciation + paydown)
}

// ---------------------------------------------------------------------------
// Discounted measures
// ---------------------------------------------------------------------------

/// Net present value of `flows[t]` received at the end of year `t`.
pub fn npv(rate: Rate, flows: &[Money]) -> EngineResult<Money> {
    if rate <= -1.0 {
        return Err(EngineError::domain("discount_rate", "Discount rate must be greater than -100%"));
    }
    let one_plus_r = 1.0 + rate;
    Ok(flows
        .iter()
        .enumerate()
        .map(|(t, cf)| cf / one_plus_r.powi(t as i32))
        .sum())
}

fn npv_and_derivative(rate: Rate, flows: &[Money]) -> (f64, f64) {
    let one_plus_r = 1.0 + rate;
    let mut value = 0.0;
    let mut slope = 0.0;
    for (t, cf) in flows.iter().enumerate() {
        let discount = one_plus_r.powi(t as i32);
        value += cf / discount;
        if t > 0 {
            slope -= t as f64 * cf / (discount * one_plus_r);
        }
    }
    (value, slope)
}

/// Internal rate of return.
///
/// Newton-Raphson from 10%, falling back to bisection over (-99%, 1000%).
/// `None` when the flows never change sign or no root is bracketed.
pub fn irr(flows: &[Money]) -> Option<Rate> {
    if flows.len() < 2 {
        return None;
    }
    let has_inflow = flows.iter().any(|cf| *cf > 0.0);
    let has_outflow = flows.iter().any(|cf| *cf < 0.0);
    if !(has_inflow && has_outflow) {
        return None;
    }

    let mut rate = 0.1;
    for _ in 0..MAX_IRR_ITERATIONS {
        let (value, slope) = npv_and_derivative(rate, flows);
        if value.abs() < IRR_TOLERANCE {
            return Some(rate);
        }
        if slope == 0.0 || !slope.is_finite() {
            break;
        }
        rate = (rate - value / slope).clamp(IRR_LOWER_BOUND, IRR_UPPER_BOUND);
    }

    let (mut lo, mut hi) = (IRR_LOWER_BOUND, IRR_UPPER_BOUND);
    let mut f_lo = npv_and_derivative(lo, flows).0;
    let f_hi = npv_and_derivative(hi, flows).0;
    if f_lo.signum() == f_hi.signum() {
        return None;
    }
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        let f_mid = npv_and_derivative(mid, flows).0;
        if f_mid.abs() < IRR_TOLERANCE || (hi - lo) < 1e-12 {
            return Some(mid);
        }
        if f_mid.signum() == f_lo.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }
    Some(0.5 * (lo + hi))
}

/// Year-0 outflow, annual cash flows, and sale proceeds in the final year.
pub fn hold_period_flows(
    property: &PropertyFinancials,
    metrics: &DerivedMetrics,
    ctx: &EngineContext,
    years: u32,
) -> EngineResult<Vec<Money>> {
    ensure_horizon(years)?;
    let mut flows = Vec::with_capacity(years as usize + 1);
    flows.push(-metrics.costs.cash_needed);
    flows.extend(projected_annual_cash_flows(metrics, &ctx.assumptions, years));
    let proceeds = net_sale_proceeds(property, metrics, ctx, years)?;
    if let Some(last) = flows.last_mut() {
        *last += proceeds;
    }
    Ok(flows)
}

// ---------------------------------------------------------------------------
// Single-period return measures
// ---------------------------------------------------------------------------

pub fn payback_period(metrics: &DerivedMetrics) -> PaybackPeriod {
    if metrics.annual_cash_flow_y2 <= 0.0 {
        return PaybackPeriod::Never;
    }
    let y1 = metrics.annual_cash_flow_y1;
    // A losing first year adds to what must be recovered.
    let to_recover = if y1 < 0.0 {
        metrics.costs.cash_needed + y1.abs()
    } else {
        metrics.costs.cash_needed - y1
    };
    PaybackPeriod::Years(1.0 + to_recover / metrics.annual_cash_flow_y2)
}

/// Year-2 cash flow over equity (down payment plus Year-1 principal paydown).
pub fn roe_y2(metrics: &DerivedMetrics, ctx: &EngineContext) -> EngineResult<Ratio> {
    let paydown_y1 = metrics.costs.loan_amount - remaining_loan_balance(metrics, ctx, 1)?;
    let equity = metrics.costs.down_payment + paydown_y1;
    if equity <= 0.0 {
        return Ok(None);
    }
    Ok(ratio(metrics.annual_cash_flow_y2, equity))
}

/// How much leverage adds to the unlevered yield.
pub fn leverage_benefit(metrics: &DerivedMetrics) -> Ratio {
    Some(metrics.coc_y2? - metrics.cap_rate_y2?)
}

// ---------------------------------------------------------------------------
// Horizons
// ---------------------------------------------------------------------------

pub fn project_horizon(
    property: &PropertyFinancials,
    metrics: &DerivedMetrics,
    ctx: &EngineContext,
    years: u32,
) -> EngineResult<HorizonProjection> {
    ensure_horizon(years)?;
    let a = &ctx.assumptions;
    let cash_needed = metrics.costs.cash_needed;

    let cumulative_cash_flow: Money = projected_annual_cash_flows(metrics, a, years).iter().sum();
    let fv = future_value(property.price, a.appreciation_for(property), years);
    let remaining = remaining_loan_balance(metrics, ctx, years)?;
    let appreciation = fv - property.price;
    let principal_paydown = metrics.costs.loan_amount - remaining;
    let expected_gain = cumulative_cash_flow + appreciation + principal_paydown;

    let flows = hold_period_flows(property, metrics, ctx, years)?;
    let npv_value = npv(a.discount_rate, &flows)?;

    Ok(HorizonProjection {
        years,
        cumulative_cash_flow,
        appreciation,
        principal_paydown,
        expected_gain,
        future_value: fv,
        remaining_loan_balance: remaining,
        net_sale_proceeds: net_sale_proceeds(property, metrics, ctx, years)?,
        npv: npv_value,
        irr: irr(&flows),
        equity_multiple: ratio(expected_gain + cash_needed, cash_needed),
        avg_annual_return: ratio(expected_gain, cash_needed).map(|r| r / years as f64),
        fair_value: property.price + npv_value,
        value_gap: ratio(npv_value, cash_needed),
    })
}

pub fn project_horizons(
    property: &PropertyFinancials,
    metrics: &DerivedMetrics,
    ctx: &EngineContext,
    horizons: &[u32],
) -> EngineResult<Vec<HorizonProjection>> {
    horizons
        .iter()
        .map(|&years| project_horizon(property, metrics, ctx, years))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LoanTerms, UnitRent};

    fn context() -> EngineContext {
        EngineContext {
            assumptions: AssumptionSet {
                appreciation_rate: 0.03,
                rent_appreciation_rate: 0.02,
                discount_rate: 0.08,
                ..AssumptionSet::default()
            },
            loan: LoanTerms {
                name: "Conventional".into(),
                annual_rate: 0.065,
                years: 30,
                down_payment_rate: 0.2,
                mip_upfront_rate: 0.0,
                mip_annual_rate: 0.0,
                lender_fees: 0.0,
            },
            as_of_year: 2025,
        }
    }

    fn fourplex() -> PropertyFinancials {
        PropertyFinancials {
            address: "88 Division St".into(),
            price: 400_000.0,
            square_feet: 3_600.0,
            beds: 8,
            baths: 4.0,
            built_in: 1978,
            units: 4,
            rent_roll: (1..=4)
                .map(|u| UnitRent {
                    unit: u.to_string(),
                    beds: 2,
                    rent_estimate: 1_250.0,
                })
                .collect(),
            annual_tax_amount: None,
            mobility: None,
        }
    }

    #[test]
    fn test_cash_flow_sequence_growth() {
        let ctx = context();
        let m = compute_metrics(&fourplex(), &ctx).unwrap();
        let flows = projected_annual_cash_flows(&m, &ctx.assumptions, 3);
        assert_eq!(flows.len(), 3);
        assert!((flows[0] - m.annual_cash_flow_y1 * 1.02).abs() < 1e-9);
        assert!((flows[1] - m.annual_cash_flow_y2 * 1.02).abs() < 1e-9);
        assert!((flows[2] - m.annual_cash_flow_y2 * 1.02 * 1.02).abs() < 1e-9);
    }

    #[test]
    fn test_expected_gain_components() {
        let ctx = context();
        let p = fourplex();
        let m = compute_metrics(&p, &ctx).unwrap();
        let gain = expected_gain(&p, &ctx, 10).unwrap();

        let cash: f64 = projected_annual_cash_flows(&m, &ctx.assumptions, 10).iter().sum();
        let appreciation = 400_000.0 * (1.03f64.powi(10) - 1.0);
        let remaining = amortization::remaining_balance(320_000.0, 0.065, 30, 120).unwrap();
        let expected = cash + appreciation + (320_000.0 - remaining);
        assert!((gain - expected).abs() < 1e-6);
    }

    #[test]
    fn test_zero_horizon_rejected() {
        let ctx = context();
        assert!(matches!(
            expected_gain(&fourplex(), &ctx, 0),
            Err(EngineError::Domain { .. })
        ));
    }

    #[test]
    fn test_expected_gain_past_loan_term() {
        let mut ctx = context();
        ctx.loan.years = 15;
        let p = fourplex();
        let m = compute_metrics(&p, &ctx).unwrap();
        let h = project_horizon(&p, &m, &ctx, 20).unwrap();
        assert_eq!(h.remaining_loan_balance, 0.0);
        assert!((h.principal_paydown - m.costs.loan_amount).abs() < 1e-9);
    }

    #[test]
    fn test_npv_matches_hand_discounting() {
        let v = npv(0.1, &[-100.0, 55.0, 60.5]).unwrap();
        assert!((v - 0.0).abs() < 1e-9);
        assert!(npv(-1.0, &[1.0]).is_err());
    }

    #[test]
    fn test_irr_simple() {
        let r = irr(&[-100.0, 110.0]).unwrap();
        assert!((r - 0.1).abs() < 1e-6);
        let r = irr(&[-1_000.0, 300.0, 400.0, 500.0]).unwrap();
        assert!(npv(r, &[-1_000.0, 300.0, 400.0, 500.0]).unwrap().abs() < 1e-5);
    }

    #[test]
    fn test_irr_no_sign_change() {
        assert_eq!(irr(&[100.0, 50.0]), None);
        assert_eq!(irr(&[-100.0, -50.0]), None);
        assert_eq!(irr(&[-100.0]), None);
    }

    #[test]
    fn test_irr_zeroes_npv_of_hold_flows() {
        let ctx = context();
        let p = fourplex();
        let m = compute_metrics(&p, &ctx).unwrap();
        let h = project_horizon(&p, &m, &ctx, 10).unwrap();
        let flows = hold_period_flows(&p, &m, &ctx, 10).unwrap();
        let r = h.irr.unwrap();
        assert!(npv(r, &flows).unwrap().abs() < 1e-3);
        assert!((h.fair_value - 400_000.0 - h.npv).abs() < 1e-9);
    }

    #[test]
    fn test_net_proceeds_no_tax_on_loss() {
        let mut ctx = context();
        ctx.assumptions.appreciation_rate = -0.02;
        let p = fourplex();
        let m = compute_metrics(&p, &ctx).unwrap();
        let proceeds = net_sale_proceeds(&p, &m, &ctx, 5).unwrap();
        let fv = 400_000.0 * 0.98f64.powi(5);
        let bal = remaining_loan_balance(&m, &ctx, 5).unwrap();
        assert!((proceeds - (fv - bal - fv * 0.07)).abs() < 1e-6);
    }

    #[test]
    fn test_payback_never_when_y2_negative() {
        let ctx = context();
        let mut p = fourplex();
        for u in &mut p.rent_roll {
            u.rent_estimate = 300.0;
        }
        let m = compute_metrics(&p, &ctx).unwrap();
        assert!(m.annual_cash_flow_y2 <= 0.0);
        assert_eq!(payback_period(&m), PaybackPeriod::Never);
    }

    #[test]
    fn test_payback_adds_year_one_loss() {
        let ctx = context();
        let mut m = compute_metrics(&fourplex(), &ctx).unwrap();
        m.costs.cash_needed = 20_000.0;
        m.annual_cash_flow_y1 = -4_000.0;
        m.annual_cash_flow_y2 = 6_000.0;
        assert_eq!(payback_period(&m), PaybackPeriod::Years(5.0));
        m.annual_cash_flow_y1 = 2_000.0;
        assert_eq!(payback_period(&m), PaybackPeriod::Years(4.0));
    }

    #[test]
    fn test_default_horizons() {
        let ctx = context();
        let p = fourplex();
        let m = compute_metrics(&p, &ctx).unwrap();
        let hs = project_horizons(&p, &m, &ctx, &DEFAULT_HORIZONS).unwrap();
        let years: Vec<u32> = hs.iter().map(|h| h.years).collect();
        assert_eq!(years, vec![5, 10, 20]);
        assert!(hs[2].future_value > hs[0].future_value);
    }

    #[test]
    fn test_leverage_benefit_needs_both_ratios() {
        let ctx = context();
        let mut p = fourplex();
        p.rent_roll.clear();
        let m = compute_metrics(&p, &ctx).unwrap();
        assert_eq!(leverage_benefit(&m), None);
    }
}
