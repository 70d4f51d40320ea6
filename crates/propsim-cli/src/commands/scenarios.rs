use clap::Args;
use serde_json::Value;

use propsim_core::payoff::{run_monte_carlo as monte_carlo_envelope, run_sensitivity_sweep};
use propsim_core::payoff::{MonteCarloInput, SensitivityInput};

use crate::input;

/// Arguments for the market-return sensitivity sweep
#[derive(Args)]
pub struct SensitivityArgs {
    /// Path to JSON/YAML input file ({ scenario, strategy_a, strategy_b, rates? })
    #[arg(long)]
    pub input: Option<String>,

    /// Annual market returns to sweep (e.g. "0.04,0.06,0.08")
    #[arg(long, value_delimiter = ',')]
    pub rates: Option<Vec<f64>>,
}

/// Arguments for the Monte Carlo comparison
#[derive(Args)]
pub struct MonteCarloArgs {
    /// Path to JSON/YAML input file ({ scenario, strategy_a, strategy_b, mean_return, volatility })
    #[arg(long)]
    pub input: Option<String>,

    /// Number of simulated return paths
    #[arg(long)]
    pub simulations: Option<u32>,

    /// Annual mean market return
    #[arg(long)]
    pub mean: Option<f64>,

    /// Annual volatility of market returns
    #[arg(long)]
    pub volatility: Option<f64>,

    /// RNG seed; equal seeds give identical results
    #[arg(long)]
    pub seed: Option<u64>,
}

pub fn run_sensitivity(args: SensitivityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut sweep_input: SensitivityInput =
        input::load(args.input.as_deref(), "sensitivity analysis")?;
    if let Some(rates) = args.rates {
        if rates.is_empty() {
            return Err("--rates must list at least one market return".into());
        }
        sweep_input.rates = rates;
    }
    let result = run_sensitivity_sweep(&sweep_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_monte_carlo(args: MonteCarloArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut mc_input: MonteCarloInput = input::load(args.input.as_deref(), "Monte Carlo simulation")?;
    if let Some(n) = args.simulations {
        mc_input.num_simulations = n;
    }
    if let Some(mean) = args.mean {
        mc_input.mean_return = mean;
    }
    if let Some(vol) = args.volatility {
        mc_input.volatility = vol;
    }
    if let Some(seed) = args.seed {
        mc_input.seed = seed;
    }
    let result = monte_carlo_envelope(&mc_input)?;
    Ok(serde_json::to_value(result)?)
}
