use std::time::Instant;

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;
use tracing::debug;

use super::comparison::ComparisonWinner;
use super::simulator::{
    monthly_rate_from_annual, PayoffScenario, PayoffSimulator, PayoffStrategy, SimulationHistory,
    SimulationSummary,
};
use crate::error::EngineError;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

fn default_sweep_rates() -> Vec<Rate> {
    vec![0.05, 0.06, 0.07, 0.08, 0.09, 0.10]
}

fn default_num_simulations() -> u32 {
    1_000
}

fn default_seed() -> u64 {
    42
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityInput {
    pub scenario: PayoffScenario,
    pub strategy_a: PayoffStrategy,
    pub strategy_b: PayoffStrategy,
    /// Annual market returns to try, everything else held fixed
    #[serde(default = "default_sweep_rates")]
    pub rates: Vec<Rate>,
}

/// Terminal figures of one strategy run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyOutcome {
    pub name: String,
    pub debt_payoff_month: Option<u32>,
    pub summary: SimulationSummary,
}

impl From<SimulationHistory> for StrategyOutcome {
    fn from(h: SimulationHistory) -> Self {
        Self {
            name: h.strategy,
            debt_payoff_month: h.debt_payoff_month,
            summary: h.summary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityPoint {
    pub rate: Rate,
    pub strategy_a: StrategyOutcome,
    pub strategy_b: StrategyOutcome,
    pub winner: ComparisonWinner,
    /// A minus B, post-tax real
    pub difference: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloInput {
    pub scenario: PayoffScenario,
    pub strategy_a: PayoffStrategy,
    pub strategy_b: PayoffStrategy,
    #[serde(default = "default_num_simulations")]
    pub num_simulations: u32,
    /// Expected annual market return
    pub mean_return: Rate,
    /// Annualized standard deviation of returns
    pub volatility: Rate,
    /// Trial `i` draws from a generator seeded with `seed + i`
    #[serde(default = "default_seed")]
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionStats {
    pub percentiles: Percentiles,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDistribution {
    pub name: String,
    /// Final post-tax real net worth across trials
    pub net_worth: DistributionStats,
    /// Median over trials that paid the debt off
    pub median_payoff_month: Option<f64>,
    /// Share of trials in which the debt was paid off
    pub payoff_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloResult {
    pub num_simulations: u32,
    pub seed: u64,
    pub strategy_a: StrategyDistribution,
    pub strategy_b: StrategyDistribution,
    /// Fraction of trials where A ends strictly ahead of B
    pub win_probability_a: f64,
    /// Distribution of A minus B
    pub difference: DistributionStats,
}

#[derive(Debug, Clone, Copy)]
struct TrialOutcome {
    net_worth_a: f64,
    net_worth_b: f64,
    payoff_a: Option<u32>,
    payoff_b: Option<u32>,
}

// ---------------------------------------------------------------------------
// Statistics helpers
// ---------------------------------------------------------------------------

/// Linear interpolation between closest ranks; `p` in [0, 100].
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        len => {
            let rank = p / 100.0 * (len - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            if lower == upper {
                sorted[lower]
            } else {
                let frac = rank - lower as f64;
                sorted[lower] * (1.0 - frac) + sorted[upper] * frac
            }
        }
    }
}

fn describe(values: &mut [f64]) -> DistributionStats {
    values.sort_by(f64::total_cmp);
    let n = values.len().max(1) as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    DistributionStats {
        percentiles: Percentiles {
            p10: percentile_sorted(values, 10.0),
            p25: percentile_sorted(values, 25.0),
            p50: percentile_sorted(values, 50.0),
            p75: percentile_sorted(values, 75.0),
            p90: percentile_sorted(values, 90.0),
        },
        mean,
        std_dev: variance.sqrt(),
        min: values.first().copied().unwrap_or_default(),
        max: values.last().copied().unwrap_or_default(),
    }
}

fn payoff_stats(months: impl Iterator<Item = Option<u32>>, trials: usize) -> (Option<f64>, f64) {
    let mut paid: Vec<f64> = months.flatten().map(f64::from).collect();
    let rate = paid.len() as f64 / trials.max(1) as f64;
    if paid.is_empty() {
        return (None, rate);
    }
    paid.sort_by(f64::total_cmp);
    (Some(percentile_sorted(&paid, 50.0)), rate)
}

// ---------------------------------------------------------------------------
// Sensitivity sweep
// ---------------------------------------------------------------------------

/// Re-run both strategies once per annual return; results keep `rates` order.
pub fn sensitivity_sweep(
    scenario: &PayoffScenario,
    strategy_a: &PayoffStrategy,
    strategy_b: &PayoffStrategy,
    rates: &[Rate],
) -> EngineResult<Vec<SensitivityPoint>> {
    if rates.is_empty() {
        return Err(EngineError::config("rates", "At least one market return is required"));
    }
    debug!(points = rates.len(), "sensitivity sweep");

    rates
        .par_iter()
        .map(|&rate| {
            let s = scenario.with_market_return(rate);
            let a = PayoffSimulator::new(&s, strategy_a)?.run()?;
            let b = PayoffSimulator::new(&s, strategy_b)?.run()?;
            let difference =
                a.summary.final_net_worth_after_tax_real - b.summary.final_net_worth_after_tax_real;
            Ok(SensitivityPoint {
                rate,
                winner: ComparisonWinner::from_difference(difference),
                difference,
                strategy_a: a.into(),
                strategy_b: b.into(),
            })
        })
        .collect()
}

pub fn run_sensitivity_sweep(
    input: &SensitivityInput,
) -> EngineResult<ComputationOutput<Vec<SensitivityPoint>>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let points = sensitivity_sweep(&input.scenario, &input.strategy_a, &input.strategy_b, &input.rates)?;

    let flips = points.windows(2).filter(|w| w[0].winner != w[1].winner).count();
    if flips > 0 {
        warnings.push(format!(
            "Winner changes {flips} time(s) across the swept returns; the choice is return-sensitive"
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    with_metadata(
        "Deterministic market-return sensitivity sweep",
        input,
        warnings,
        elapsed,
        points,
    )
}

// ---------------------------------------------------------------------------
// Monte Carlo
// ---------------------------------------------------------------------------

/// Seeded Monte Carlo over i.i.d. Gaussian monthly returns.
///
/// Both strategies in a trial see the same return path. Trials run on the
/// rayon pool but each owns its generator, so output does not depend on
/// scheduling.
pub fn monte_carlo(input: &MonteCarloInput) -> EngineResult<MonteCarloResult> {
    if input.num_simulations == 0 {
        return Err(EngineError::config("num_simulations", "Must be at least 1"));
    }
    if input.mean_return < 0.0 || !input.mean_return.is_finite() {
        return Err(EngineError::config("mean_return", "Must be a non-negative number"));
    }
    if !(input.volatility > 0.0) || !input.volatility.is_finite() {
        return Err(EngineError::config("volatility", "Must be a positive number"));
    }

    let sim_a = PayoffSimulator::new(&input.scenario, &input.strategy_a)?;
    let sim_b = PayoffSimulator::new(&input.scenario, &input.strategy_b)?;

    let monthly_mean = monthly_rate_from_annual(input.mean_return);
    let monthly_sd = input.volatility / 12f64.sqrt();
    let normal = Normal::new(monthly_mean, monthly_sd)
        .map_err(|e| EngineError::config("volatility", e.to_string()))?;
    let months = input.scenario.total_months as usize;

    debug!(
        trials = input.num_simulations,
        months,
        seed = input.seed,
        "monte carlo fan-out"
    );

    let trials = (0..input.num_simulations)
        .into_par_iter()
        .map(|i| {
            let mut rng = StdRng::seed_from_u64(input.seed.wrapping_add(u64::from(i)));
            let path: Vec<Rate> = (0..months).map(|_| rng.sample(normal)).collect();
            let a = sim_a.run_with_returns(&path)?;
            let b = sim_b.run_with_returns(&path)?;
            Ok(TrialOutcome {
                net_worth_a: a.summary.final_net_worth_after_tax_real,
                net_worth_b: b.summary.final_net_worth_after_tax_real,
                payoff_a: a.debt_payoff_month,
                payoff_b: b.debt_payoff_month,
            })
        })
        .collect::<EngineResult<Vec<_>>>()?;

    let n = trials.len();
    let wins = trials.iter().filter(|t| t.net_worth_a > t.net_worth_b).count();

    let mut nw_a: Vec<f64> = trials.iter().map(|t| t.net_worth_a).collect();
    let mut nw_b: Vec<f64> = trials.iter().map(|t| t.net_worth_b).collect();
    let mut diff: Vec<f64> = trials.iter().map(|t| t.net_worth_a - t.net_worth_b).collect();
    let (median_a, rate_a) = payoff_stats(trials.iter().map(|t| t.payoff_a), n);
    let (median_b, rate_b) = payoff_stats(trials.iter().map(|t| t.payoff_b), n);

    Ok(MonteCarloResult {
        num_simulations: input.num_simulations,
        seed: input.seed,
        strategy_a: StrategyDistribution {
            name: input.strategy_a.name.clone(),
            net_worth: describe(&mut nw_a),
            median_payoff_month: median_a,
            payoff_rate: rate_a,
        },
        strategy_b: StrategyDistribution {
            name: input.strategy_b.name.clone(),
            net_worth: describe(&mut nw_b),
            median_payoff_month: median_b,
            payoff_rate: rate_b,
        },
        win_probability_a: wins as f64 / n as f64,
        difference: describe(&mut diff),
    })
}

pub fn run_monte_carlo(input: &MonteCarloInput) -> EngineResult<ComputationOutput<MonteCarloResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.num_simulations < 100 {
        warnings.push(format!(
            "Only {} trials; percentiles will be noisy",
            input.num_simulations
        ));
    }
    let result = monte_carlo(input)?;

    let elapsed = start.elapsed().as_micros() as u64;
    with_metadata(
        "Monte Carlo payoff comparison (Gaussian monthly returns, per-trial seeds)",
        input,
        warnings,
        elapsed,
        result,
    )
}
