use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::simulator::{strategy_warnings, PayoffScenario, PayoffSimulator, PayoffStrategy, SimulationHistory};
use crate::types::{with_metadata, ComputationOutput, Money};
use crate::EngineResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonWinner {
    StrategyA,
    StrategyB,
    Tie,
}

impl ComparisonWinner {
    /// Winner given A's result minus B's.
    pub fn from_difference(difference: Money) -> Self {
        if difference > 0.0 {
            ComparisonWinner::StrategyA
        } else if difference < 0.0 {
            ComparisonWinner::StrategyB
        } else {
            ComparisonWinner::Tie
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonInput {
    pub scenario: PayoffScenario,
    pub strategy_a: PayoffStrategy,
    pub strategy_b: PayoffStrategy,
}

/// Head-to-head result, measured on post-tax real net worth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyComparison {
    pub winner: ComparisonWinner,
    /// A minus B
    pub net_worth_difference: Money,
    /// Interest B pays beyond A
    pub extra_interest_paid: Money,
    /// B's payoff month minus A's, when both pay off
    pub extra_months_in_debt: Option<i64>,
    /// First month in which B's net worth is strictly above A's
    pub crossover_month: Option<u32>,
    pub strategy_a: SimulationHistory,
    pub strategy_b: SimulationHistory,
}

/// Compare two finished runs of the same scenario.
pub fn summarize(a: SimulationHistory, b: SimulationHistory) -> StrategyComparison {
    let diff = a.summary.final_net_worth_after_tax_real - b.summary.final_net_worth_after_tax_real;
    let crossover_month = a
        .net_worth
        .iter()
        .zip(&b.net_worth)
        .position(|(na, nb)| nb > na)
        .map(|i| i as u32 + 1);

    let extra_months_in_debt = match (a.debt_payoff_month, b.debt_payoff_month) {
        (Some(ma), Some(mb)) => Some(i64::from(mb) - i64::from(ma)),
        _ => None,
    };

    StrategyComparison {
        winner: ComparisonWinner::from_difference(diff),
        net_worth_difference: diff,
        extra_interest_paid: b.summary.total_interest_paid - a.summary.total_interest_paid,
        extra_months_in_debt,
        crossover_month,
        strategy_a: a,
        strategy_b: b,
    }
}

/// Run both strategies over the shared scenario and compare them.
pub fn compare_strategies(input: &ComparisonInput) -> EngineResult<ComputationOutput<StrategyComparison>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let a = PayoffSimulator::new(&input.scenario, &input.strategy_a)?.run()?;
    let b = PayoffSimulator::new(&input.scenario, &input.strategy_b)?.run()?;
    strategy_warnings(&input.scenario, &input.strategy_a, &a, &mut warnings);
    strategy_warnings(&input.scenario, &input.strategy_b, &b, &mut warnings);

    let comparison = summarize(a, b);

    let elapsed = start.elapsed().as_micros() as u64;
    with_metadata(
        "Two-strategy payoff comparison on post-tax real net worth",
        input,
        warnings,
        elapsed,
        comparison,
    )
}
