use pretty_assertions::assert_eq;
use propsim_core::debt::ledger::{allocate_avalanche, LoanLedgerEntry};
use propsim_core::payoff::simulator::DEFAULT_DEDUCTION_CAP;
use propsim_core::payoff::{
    compare_strategies, run_payoff_simulation, ComparisonInput, PayoffInput, PayoffScenario,
    PayoffSimulator, PayoffStrategy,
};
use propsim_core::EngineError;

fn student_loans() -> Vec<LoanLedgerEntry> {
    vec![
        LoanLedgerEntry::new("AA", 5_230.56, 0.025, 55.00).unwrap(),
        LoanLedgerEntry::new("AB", 5_318.72, 0.0348, 58.30).unwrap(),
        LoanLedgerEntry::new("AC", 10_119.74, 0.0474, 116.91).unwrap(),
        LoanLedgerEntry::new("AD", 6_572.16, 0.0525, 87.29).unwrap(),
    ]
}

fn scenario(loans: Vec<LoanLedgerEntry>, months: u32, market_return: f64) -> PayoffScenario {
    PayoffScenario {
        loans,
        total_months: months,
        annual_market_return: market_return,
        expense_ratio: 0.0,
        inflation_rate: 0.0,
        marginal_tax_rate: 0.22,
        capital_gains_tax_rate: 0.15,
        annual_deduction_cap: DEFAULT_DEDUCTION_CAP,
        annual_bonus: None,
    }
}

// ===========================================================================
// Avalanche allocation
// ===========================================================================

#[test]
fn test_avalanche_pays_highest_rate_then_spills() {
    let mut loans = vec![
        LoanLedgerEntry::new("A", 1_000.0, 0.03, 0.0).unwrap(),
        LoanLedgerEntry::new("B", 1_000.0, 0.05, 0.0).unwrap(),
    ];

    let first = allocate_avalanche(&mut loans, 200.0);
    assert_eq!(first.leftover, 0.0);
    assert_eq!(loans[0].balance, 1_000.0);
    assert_eq!(loans[1].balance, 800.0);

    let second = allocate_avalanche(&mut loans, 900.0);
    assert_eq!(loans[1].balance, 0.0);
    assert!(loans[1].is_paid_off());
    assert_eq!(loans[0].balance, 900.0);
    assert_eq!(second.extra_paid, 900.0);
}

// ===========================================================================
// Simulator invariants
// ===========================================================================

#[test]
fn test_no_growth_no_contribution_leaves_nothing_to_tax() {
    let s = scenario(student_loans(), 240, 0.0);
    let strategy = PayoffStrategy::new("idle", 0.0, 0.0);
    let h = PayoffSimulator::new(&s, &strategy).unwrap().run().unwrap();
    assert_eq!(h.summary.final_investment_balance, 0.0);
    assert_eq!(h.summary.capital_gains_tax, 0.0);
    assert!(h.investment_balance.iter().all(|b| *b == 0.0));
}

#[test]
fn test_single_loan_end_to_end() {
    let loans = vec![LoanLedgerEntry::new("AA", 5_230.56, 0.025, 55.00).unwrap()];
    let s = scenario(loans, 120, 0.08);
    let strategy = PayoffStrategy::new("steady", 100.0, 0.0);
    let h = PayoffSimulator::new(&s, &strategy).unwrap().run().unwrap();

    let payoff = h.debt_payoff_month.expect("loan should be repaid");
    assert!(payoff < 120, "paid off in month {payoff}");

    let after = &h.investment_balance[payoff as usize..];
    assert!(!after.is_empty());
    assert!(after.windows(2).all(|w| w[1] > w[0]));
    assert!(h.total_debt[payoff as usize..].iter().all(|d| *d <= 0.01));
}

#[test]
fn test_net_worth_is_investments_minus_debt() {
    let s = scenario(student_loans(), 60, 0.07);
    let strategy = PayoffStrategy::new("balanced", 400.0, 1_100.0);
    let h = PayoffSimulator::new(&s, &strategy).unwrap().run().unwrap();
    for i in 0..h.months() {
        let expected = h.investment_balance[i] - h.total_debt[i];
        assert!((h.net_worth[i] - expected).abs() < 1e-9);
    }
    let loan_sum: f64 = h.debt_by_loan.iter().map(|t| t.balances[59]).sum();
    assert!((loan_sum - h.total_debt[59]).abs() < 1e-9);
}

#[test]
fn test_inflation_deflates_final_figures() {
    let mut s = scenario(student_loans(), 480, 0.07);
    s.inflation_rate = 0.03;
    let strategy = PayoffStrategy::new("aggressive", 1_500.0, 0.0);
    let h = PayoffSimulator::new(&s, &strategy).unwrap().run().unwrap();
    let factor = 1.03f64.powi(40);
    assert!((h.summary.inflation_factor - factor).abs() < 1e-9);
    assert!(
        (h.summary.final_net_worth_after_tax_real * factor - h.summary.final_net_worth_after_tax).abs()
            < 1e-6
    );
}

#[test]
fn test_invalid_configuration_fails_before_running() {
    let mut s = scenario(student_loans(), 480, 0.07);
    s.marginal_tax_rate = -0.1;
    let input = PayoffInput {
        scenario: s,
        strategy: PayoffStrategy::new("x", 1_500.0, 0.0),
    };
    assert!(matches!(
        run_payoff_simulation(&input),
        Err(EngineError::Config { .. })
    ));
}

// ===========================================================================
// Strategy comparison
// ===========================================================================

#[test]
fn test_aggressive_vs_balanced_comparison() {
    let input = ComparisonInput {
        scenario: scenario(student_loans(), 480, 0.07),
        strategy_a: PayoffStrategy::new("aggressive", 1_500.0, 0.0),
        strategy_b: PayoffStrategy::new("balanced", 400.0, 1_100.0),
    };
    let out = compare_strategies(&input).unwrap();
    let c = &out.result;

    let a_months = c.strategy_a.debt_payoff_month.unwrap();
    let b_months = c.strategy_b.debt_payoff_month.unwrap();
    assert!(a_months < b_months);
    assert_eq!(c.extra_months_in_debt, Some(i64::from(b_months) - i64::from(a_months)));
    assert!(c.extra_interest_paid > 0.0);
    assert!(out.warnings.is_empty());
}
