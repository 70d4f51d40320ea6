use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::debt::ledger::{InterestAccrual, LoanLedger, LoanLedgerEntry};
use crate::error::EngineError;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::EngineResult;

/// Student-loan interest deduction ceiling per 12-month block.
pub const DEFAULT_DEDUCTION_CAP: Money = 2_500.0;

fn default_deduction_cap() -> Money {
    DEFAULT_DEDUCTION_CAP
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Lump sum arriving every 12th month, split between debt and investments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnualBonus {
    pub amount: Money,
    /// Share routed through the avalanche allocator, in [0, 1]
    pub debt_fraction: Rate,
}

/// How a fixed monthly budget is split between debt and the brokerage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoffStrategy {
    pub name: String,
    pub monthly_debt_allocation: Money,
    pub monthly_investment: Money,
}

impl PayoffStrategy {
    pub fn new(name: impl Into<String>, monthly_debt_allocation: Money, monthly_investment: Money) -> Self {
        Self {
            name: name.into(),
            monthly_debt_allocation,
            monthly_investment,
        }
    }
}

/// Everything held fixed while strategies are compared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoffScenario {
    pub loans: Vec<LoanLedgerEntry>,
    /// Horizon in months (480 = 40 years)
    pub total_months: u32,
    pub annual_market_return: Rate,
    #[serde(default)]
    pub expense_ratio: Rate,
    #[serde(default)]
    pub inflation_rate: Rate,
    #[serde(default)]
    pub marginal_tax_rate: Rate,
    #[serde(default)]
    pub capital_gains_tax_rate: Rate,
    #[serde(default = "default_deduction_cap")]
    pub annual_deduction_cap: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annual_bonus: Option<AnnualBonus>,
}

impl PayoffScenario {
    pub fn validate(&self) -> EngineResult<()> {
        if self.total_months == 0 {
            return Err(EngineError::config("total_months", "Horizon must be at least one month"));
        }
        config_non_negative("annual_market_return", self.annual_market_return)?;
        config_non_negative("inflation_rate", self.inflation_rate)?;
        for (field, value) in [
            ("expense_ratio", self.expense_ratio),
            ("marginal_tax_rate", self.marginal_tax_rate),
            ("capital_gains_tax_rate", self.capital_gains_tax_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::config(field, "Must be between 0 and 1"));
            }
        }
        config_non_negative("annual_deduction_cap", self.annual_deduction_cap)?;
        if let Some(bonus) = &self.annual_bonus {
            config_non_negative("annual_bonus.amount", bonus.amount)?;
            if !(0.0..=1.0).contains(&bonus.debt_fraction) {
                return Err(EngineError::config(
                    "annual_bonus.debt_fraction",
                    "Must be between 0 and 1",
                ));
            }
        }
        for loan in &self.loans {
            config_non_negative(&format!("loan:{}:balance", loan.name), loan.balance)?;
            config_non_negative(&format!("loan:{}:annual_rate", loan.name), loan.annual_rate)?;
            config_non_negative(&format!("loan:{}:min_payment", loan.name), loan.min_payment)?;
        }
        Ok(())
    }

    /// Same scenario under a different flat market return.
    pub fn with_market_return(&self, annual_market_return: Rate) -> Self {
        Self {
            annual_market_return,
            ..self.clone()
        }
    }

    pub fn total_starting_debt(&self) -> Money {
        self.loans.iter().map(|l| l.balance).sum()
    }

    pub fn total_min_payment(&self) -> Money {
        self.loans.iter().map(|l| l.min_payment).sum()
    }
}

fn config_non_negative(field: &str, value: f64) -> EngineResult<()> {
    if value < 0.0 || !value.is_finite() {
        return Err(EngineError::config(field, "Must be a non-negative number"));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtState {
    /// At least one loan still carries a balance
    Accumulating,
    /// Every loan is at or below the paid-off threshold
    AllDebtPaidOff,
}

/// Month-end balances of one loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanTrace {
    pub name: String,
    pub balances: Vec<Money>,
}

/// Liquidation figures at the end of the horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub final_investment_balance: Money,
    pub final_debt: Money,
    pub cost_basis: Money,
    pub capital_gains: Money,
    pub capital_gains_tax: Money,
    pub total_interest_paid: Money,
    /// Tax value of the capped interest deduction, reported but never reinvested
    pub cumulative_deduction_value: Money,
    pub inflation_factor: f64,
    pub final_net_worth_nominal: Money,
    pub final_net_worth_real: Money,
    pub final_net_worth_after_tax: Money,
    pub final_net_worth_after_tax_real: Money,
}

/// Month-by-month record of one strategy run. Index `i` is month `i + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationHistory {
    pub strategy: String,
    pub total_debt: Vec<Money>,
    pub investment_balance: Vec<Money>,
    pub net_worth: Vec<Money>,
    pub cumulative_interest: Vec<Money>,
    pub cumulative_invested: Vec<Money>,
    pub monthly_to_investments: Vec<Money>,
    pub debt_by_loan: Vec<LoanTrace>,
    /// Month in which the last loan was cleared; `Some(0)` if there was no debt
    pub debt_payoff_month: Option<u32>,
    pub summary: SimulationSummary,
}

impl SimulationHistory {
    pub fn months(&self) -> usize {
        self.net_worth.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoffInput {
    pub scenario: PayoffScenario,
    pub strategy: PayoffStrategy,
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// Equivalent monthly rate of an annual compound rate.
pub fn monthly_rate_from_annual(annual: Rate) -> Rate {
    (1.0 + annual).powf(1.0 / 12.0) - 1.0
}

/// One strategy applied to one scenario. Every run builds a fresh ledger.
#[derive(Debug, Clone, Copy)]
pub struct PayoffSimulator<'a> {
    scenario: &'a PayoffScenario,
    strategy: &'a PayoffStrategy,
}

impl<'a> PayoffSimulator<'a> {
    /// Validates both inputs; no month runs on a bad configuration.
    pub fn new(scenario: &'a PayoffScenario, strategy: &'a PayoffStrategy) -> EngineResult<Self> {
        scenario.validate()?;
        config_non_negative("monthly_debt_allocation", strategy.monthly_debt_allocation)?;
        config_non_negative("monthly_investment", strategy.monthly_investment)?;
        Ok(Self { scenario, strategy })
    }

    /// Run at the scenario's flat market return.
    pub fn run(&self) -> EngineResult<SimulationHistory> {
        let r_m = monthly_rate_from_annual(self.scenario.annual_market_return);
        self.simulate(|_| r_m)
    }

    /// Run against an explicit per-month return path, one entry per month.
    pub fn run_with_returns(&self, monthly_returns: &[Rate]) -> EngineResult<SimulationHistory> {
        if monthly_returns.len() != self.scenario.total_months as usize {
            return Err(EngineError::config(
                "monthly_returns",
                format!(
                    "Expected {} monthly returns, got {}",
                    self.scenario.total_months,
                    monthly_returns.len()
                ),
            ));
        }
        self.simulate(|month| monthly_returns[(month - 1) as usize])
    }

    fn simulate(&self, monthly_return: impl Fn(u32) -> Rate) -> EngineResult<SimulationHistory> {
        let s = self.scenario;
        let st = self.strategy;
        let n = s.total_months as usize;

        let mut ledger = LoanLedger::new(
            s.loans
                .iter()
                .cloned()
                .map(|l| l.with_accrual(InterestAccrual::Daily))
                .collect(),
        )?;

        debug!(
            strategy = %st.name,
            months = s.total_months,
            loans = s.loans.len(),
            "starting payoff simulation"
        );

        let expense_drag = 1.0 - s.expense_ratio / 12.0;
        let mut state = if ledger.all_paid_off() {
            DebtState::AllDebtPaidOff
        } else {
            DebtState::Accumulating
        };
        let mut debt_payoff_month = (state == DebtState::AllDebtPaidOff).then_some(0);

        let mut investment: Money = 0.0;
        let mut cumulative_interest: Money = 0.0;
        let mut cumulative_invested: Money = 0.0;
        let mut deduction_remaining: Money = 0.0;
        let mut deduction_value: Money = 0.0;

        let mut total_debt = Vec::with_capacity(n);
        let mut investment_balance = Vec::with_capacity(n);
        let mut net_worth = Vec::with_capacity(n);
        let mut cumulative_interest_trace = Vec::with_capacity(n);
        let mut cumulative_invested_trace = Vec::with_capacity(n);
        let mut monthly_to_investments = Vec::with_capacity(n);
        let mut debt_by_loan: Vec<LoanTrace> = ledger
            .entries()
            .iter()
            .map(|l| LoanTrace {
                name: l.name.clone(),
                balances: Vec::with_capacity(n),
            })
            .collect();

        for month in 1..=s.total_months {
            if (month - 1) % 12 == 0 {
                deduction_remaining = s.annual_deduction_cap;
            }
            let growth = (1.0 + monthly_return(month)) * expense_drag;

            let mut to_invest = match state {
                DebtState::Accumulating => {
                    let interest = ledger.accrue_month();
                    cumulative_interest += interest;

                    let deductible = interest.min(deduction_remaining);
                    deduction_remaining -= deductible;
                    deduction_value += deductible * s.marginal_tax_rate;

                    let outcome = ledger.allocate_avalanche(st.monthly_debt_allocation);
                    outcome.leftover + st.monthly_investment
                }
                DebtState::AllDebtPaidOff => st.monthly_debt_allocation + st.monthly_investment,
            };
            investment = investment * growth + to_invest;

            if let Some(bonus) = s.annual_bonus.filter(|_| month % 12 == 0) {
                let debt_share = if ledger.all_paid_off() {
                    0.0
                } else {
                    bonus.amount * bonus.debt_fraction
                };
                let unabsorbed = ledger.allocate_avalanche(debt_share).leftover;
                let bonus_invested = unabsorbed + (bonus.amount - debt_share);
                investment += bonus_invested;
                to_invest += bonus_invested;
            }
            cumulative_invested += to_invest;

            if state == DebtState::Accumulating && ledger.all_paid_off() {
                state = DebtState::AllDebtPaidOff;
                debt_payoff_month = Some(month);
                debug!(strategy = %st.name, month, "all debt paid off");
            }

            let debt = ledger.total_balance();
            total_debt.push(debt);
            investment_balance.push(investment);
            net_worth.push(investment - debt);
            cumulative_interest_trace.push(cumulative_interest);
            cumulative_invested_trace.push(cumulative_invested);
            monthly_to_investments.push(to_invest);
            for (trace, entry) in debt_by_loan.iter_mut().zip(ledger.entries()) {
                trace.balances.push(entry.balance);
            }
        }

        // Liquidation: gains are taxed once, here, never during accumulation.
        let final_debt = ledger.total_balance();
        let capital_gains = investment - cumulative_invested;
        let capital_gains_tax = capital_gains.max(0.0) * s.capital_gains_tax_rate;
        let inflation_factor = (1.0 + s.inflation_rate).powf(s.total_months as f64 / 12.0);
        let nominal = investment - final_debt;
        let after_tax = nominal - capital_gains_tax;

        let summary = SimulationSummary {
            final_investment_balance: investment,
            final_debt,
            cost_basis: cumulative_invested,
            capital_gains,
            capital_gains_tax,
            total_interest_paid: cumulative_interest,
            cumulative_deduction_value: deduction_value,
            inflation_factor,
            final_net_worth_nominal: nominal,
            final_net_worth_real: nominal / inflation_factor,
            final_net_worth_after_tax: after_tax,
            final_net_worth_after_tax_real: after_tax / inflation_factor,
        };

        debug!(
            strategy = %st.name,
            payoff_month = ?debt_payoff_month,
            net_worth = summary.final_net_worth_after_tax_real,
            "payoff simulation finished"
        );

        Ok(SimulationHistory {
            strategy: st.name.clone(),
            total_debt,
            investment_balance,
            net_worth,
            cumulative_interest: cumulative_interest_trace,
            cumulative_invested: cumulative_invested_trace,
            monthly_to_investments,
            debt_by_loan,
            debt_payoff_month,
            summary,
        })
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Simulate one strategy and wrap the history in the standard envelope.
pub fn run_payoff_simulation(input: &PayoffInput) -> EngineResult<ComputationOutput<SimulationHistory>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let history = PayoffSimulator::new(&input.scenario, &input.strategy)?.run()?;
    strategy_warnings(&input.scenario, &input.strategy, &history, &mut warnings);

    let elapsed = start.elapsed().as_micros() as u64;
    with_metadata(
        "Monthly avalanche debt payoff with taxable brokerage accumulation",
        input,
        warnings,
        elapsed,
        history,
    )
}

pub(crate) fn strategy_warnings(
    scenario: &PayoffScenario,
    strategy: &PayoffStrategy,
    history: &SimulationHistory,
    warnings: &mut Vec<String>,
) {
    let minimums = scenario.total_min_payment();
    if strategy.monthly_debt_allocation < minimums {
        warnings.push(format!(
            "{}: debt allocation {:.2} does not cover loan minimums {:.2}",
            strategy.name, strategy.monthly_debt_allocation, minimums
        ));
    }
    if history.debt_payoff_month.is_none() {
        warnings.push(format!(
            "{}: debt is not paid off within {} months",
            strategy.name, scenario.total_months
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn loan(name: &str, balance: f64, rate: f64, min: f64) -> LoanLedgerEntry {
        LoanLedgerEntry::new(name, balance, rate, min).unwrap()
    }

    fn scenario() -> PayoffScenario {
        PayoffScenario {
            loans: vec![
                loan("AA", 5_230.56, 0.025, 55.00),
                loan("AB", 5_318.72, 0.0348, 58.30),
                loan("AC", 10_119.74, 0.0474, 116.91),
                loan("AD", 6_572.16, 0.0525, 87.29),
            ],
            total_months: 480,
            annual_market_return: 0.07,
            expense_ratio: 0.0003,
            inflation_rate: 0.03,
            marginal_tax_rate: 0.22,
            capital_gains_tax_rate: 0.15,
            annual_deduction_cap: DEFAULT_DEDUCTION_CAP,
            annual_bonus: None,
        }
    }

    fn run(s: &PayoffScenario, debt: f64, invest: f64) -> SimulationHistory {
        let strategy = PayoffStrategy::new("test", debt, invest);
        PayoffSimulator::new(s, &strategy).unwrap().run().unwrap()
    }

    #[test]
    fn test_history_lengths_match_horizon() {
        let h = run(&scenario(), 1_500.0, 0.0);
        assert_eq!(h.months(), 480);
        assert_eq!(h.total_debt.len(), 480);
        assert_eq!(h.debt_by_loan.len(), 4);
        assert!(h.debt_by_loan.iter().all(|t| t.balances.len() == 480));
    }

    #[test]
    fn test_aggressive_pays_off_quickly() {
        let h = run(&scenario(), 1_500.0, 0.0);
        let month = h.debt_payoff_month.unwrap();
        // ~$27k of debt at $1,500/month
        assert!((18..=20).contains(&month), "payoff month {month}");
        assert!(h.total_debt[month as usize - 1] <= 0.05);
        // Before payoff nothing reaches the brokerage except the final month's leftover
        assert!(h.monthly_to_investments[..month as usize - 1].iter().all(|v| *v == 0.0));
        assert_eq!(h.monthly_to_investments[month as usize], 1_500.0);
    }

    #[test]
    fn test_highest_rate_loan_cleared_first() {
        let h = run(&scenario(), 1_500.0, 0.0);
        let cleared = |name: &str| {
            let trace = h.debt_by_loan.iter().find(|t| t.name == name).unwrap();
            trace.balances.iter().position(|b| *b <= 0.01).unwrap()
        };
        assert!(cleared("AD") < cleared("AC"));
        assert!(cleared("AC") < cleared("AB"));
    }

    #[test]
    fn test_no_growth_no_contribution_no_gain() {
        let mut s = scenario();
        s.annual_market_return = 0.0;
        let h = run(&s, 0.0, 0.0);
        assert_eq!(h.summary.final_investment_balance, 0.0);
        assert_eq!(h.summary.capital_gains_tax, 0.0);
        assert_eq!(h.debt_payoff_month, None);
    }

    #[test]
    fn test_gains_taxed_once_at_liquidation() {
        let mut s = scenario();
        s.loans.clear();
        s.total_months = 12;
        s.expense_ratio = 0.0;
        let h = run(&s, 0.0, 100.0);
        let r = monthly_rate_from_annual(0.07);
        let mut expected = 0.0;
        for _ in 0..12 {
            expected = expected * (1.0 + r) + 100.0;
        }
        assert!((h.summary.final_investment_balance - expected).abs() < 1e-9);
        assert!((h.summary.cost_basis - 1_200.0).abs() < 1e-9);
        let tax = (expected - 1_200.0) * 0.15;
        assert!((h.summary.capital_gains_tax - tax).abs() < 1e-9);
        assert!((h.summary.inflation_factor - 1.03).abs() < 1e-12);
        assert_eq!(h.debt_payoff_month, Some(0));
    }

    #[test]
    fn test_deduction_capped_per_year() {
        let mut s = scenario();
        s.loans = vec![loan("big", 200_000.0, 0.06, 0.0)];
        s.total_months = 24;
        let h = run(&s, 0.0, 0.0);
        // Interest far exceeds the cap both years
        assert!((h.summary.cumulative_deduction_value - 2.0 * 2_500.0 * 0.22).abs() < 1e-9);
    }

    #[test]
    fn test_annual_bonus_split() {
        let mut s = scenario();
        s.loans = vec![loan("only", 10_000.0, 0.05, 0.0)];
        s.total_months = 12;
        s.annual_market_return = 0.0;
        s.expense_ratio = 0.0;
        s.annual_bonus = Some(AnnualBonus {
            amount: 2_000.0,
            debt_fraction: 0.5,
        });
        let h = run(&s, 0.0, 0.0);
        assert_eq!(h.monthly_to_investments[11], 1_000.0);
        assert!((h.summary.final_investment_balance - 1_000.0).abs() < 1e-9);
        let before = h.total_debt[10];
        let interest = before * ((1.0 + 0.05 / 365.0f64).powi(30) - 1.0);
        assert!((h.total_debt[11] - (before + interest - 1_000.0)).abs() < 1e-6);
    }

    #[test]
    fn test_bonus_overflow_invested() {
        let mut s = scenario();
        s.loans = vec![loan("tiny", 100.0, 0.05, 0.0)];
        s.total_months = 12;
        s.annual_market_return = 0.0;
        s.expense_ratio = 0.0;
        s.annual_bonus = Some(AnnualBonus {
            amount: 1_000.0,
            debt_fraction: 1.0,
        });
        let h = run(&s, 0.0, 0.0);
        assert_eq!(h.debt_payoff_month, Some(12));
        let owed = h.total_debt[10] * (1.0 + 0.05 / 365.0f64).powi(30);
        assert!((h.summary.final_investment_balance - (1_000.0 - owed)).abs() < 1e-6);
    }

    #[test]
    fn test_zero_horizon_is_config_error() {
        let mut s = scenario();
        s.total_months = 0;
        let strategy = PayoffStrategy::new("x", 100.0, 0.0);
        assert!(matches!(
            PayoffSimulator::new(&s, &strategy),
            Err(EngineError::Config { .. })
        ));
    }

    #[test]
    fn test_negative_loan_rate_is_config_error() {
        let mut s = scenario();
        s.loans[0].annual_rate = -0.01;
        let strategy = PayoffStrategy::new("x", 100.0, 0.0);
        let err = PayoffSimulator::new(&s, &strategy).unwrap_err();
        match err {
            EngineError::Config { field, .. } => assert_eq!(field, "loan:AA:annual_rate"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_tax_rate_outside_unit_interval() {
        let mut s = scenario();
        s.capital_gains_tax_rate = 1.5;
        let strategy = PayoffStrategy::new("x", 100.0, 0.0);
        assert!(PayoffSimulator::new(&s, &strategy).is_err());
    }

    #[test]
    fn test_negative_market_return_and_inflation_fail_fast() {
        let strategy = PayoffStrategy::new("x", 1_500.0, 0.0);

        let mut s = scenario();
        s.annual_market_return = -0.2;
        match PayoffSimulator::new(&s, &strategy) {
            Err(EngineError::Config { field, .. }) => assert_eq!(field, "annual_market_return"),
            other => panic!("expected config error, got {other:?}"),
        }

        let mut s = scenario();
        s.inflation_rate = -0.05;
        match PayoffSimulator::new(&s, &strategy) {
            Err(EngineError::Config { field, .. }) => assert_eq!(field, "inflation_rate"),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_negative_monthly_draws_are_not_configuration() {
        let s = scenario();
        let strategy = PayoffStrategy::new("x", 1_500.0, 0.0);
        let sim = PayoffSimulator::new(&s, &strategy).unwrap();
        let path = vec![-0.01; 480];
        let h = sim.run_with_returns(&path).unwrap();
        assert!(h.summary.capital_gains <= 0.0);
        assert_eq!(h.summary.capital_gains_tax, 0.0);
    }

    #[test]
    fn test_return_path_length_checked() {
        let s = scenario();
        let strategy = PayoffStrategy::new("x", 100.0, 0.0);
        let sim = PayoffSimulator::new(&s, &strategy).unwrap();
        assert!(matches!(
            sim.run_with_returns(&[0.01; 12]),
            Err(EngineError::Config { .. })
        ));
    }

    #[test]
    fn test_flat_path_matches_flat_rate() {
        let s = scenario();
        let strategy = PayoffStrategy::new("balanced", 400.0, 1_100.0);
        let sim = PayoffSimulator::new(&s, &strategy).unwrap();
        let path = vec![monthly_rate_from_annual(0.07); 480];
        assert_eq!(sim.run().unwrap(), sim.run_with_returns(&path).unwrap());
    }

    #[test]
    fn test_envelope_warns_on_short_allocation() {
        let input = PayoffInput {
            scenario: scenario(),
            strategy: PayoffStrategy::new("thin", 200.0, 0.0),
        };
        let out = run_payoff_simulation(&input).unwrap();
        assert!(out.warnings.iter().any(|w| w.contains("minimums")));
    }
}
