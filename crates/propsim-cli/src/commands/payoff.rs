use clap::Args;
use serde_json::Value;

use propsim_core::payoff::{compare_strategies, run_payoff_simulation, ComparisonInput, PayoffInput};

use crate::input;

/// Arguments for a single payoff simulation
#[derive(Args)]
pub struct PayoffArgs {
    /// Path to JSON/YAML input file ({ scenario, strategy })
    #[arg(long)]
    pub input: Option<String>,

    /// Override the scenario's annual market return
    #[arg(long)]
    pub market_return: Option<f64>,
}

/// Arguments for a two-strategy comparison
#[derive(Args)]
pub struct CompareArgs {
    /// Path to JSON/YAML input file ({ scenario, strategy_a, strategy_b })
    #[arg(long)]
    pub input: Option<String>,

    /// Override the scenario's annual market return
    #[arg(long)]
    pub market_return: Option<f64>,
}

pub fn run_payoff(args: PayoffArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut payoff_input: PayoffInput = input::load(args.input.as_deref(), "payoff simulation")?;
    if let Some(rate) = args.market_return {
        payoff_input.scenario = payoff_input.scenario.with_market_return(rate);
    }
    let result = run_payoff_simulation(&payoff_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_compare(args: CompareArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut compare_input: ComparisonInput =
        input::load(args.input.as_deref(), "strategy comparison")?;
    if let Some(rate) = args.market_return {
        compare_input.scenario = compare_input.scenario.with_market_return(rate);
    }
    let result = compare_strategies(&compare_input)?;
    Ok(serde_json::to_value(result)?)
}
