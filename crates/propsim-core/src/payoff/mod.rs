pub mod comparison;
pub mod simulator;

#[cfg(feature = "monte_carlo")]
pub mod scenarios;

pub use comparison::{compare_strategies, ComparisonInput, ComparisonWinner, StrategyComparison};
pub use simulator::{
    run_payoff_simulation, AnnualBonus, PayoffInput, PayoffScenario, PayoffSimulator, PayoffStrategy,
    SimulationHistory, SimulationSummary,
};

#[cfg(feature = "monte_carlo")]
pub use scenarios::{
    monte_carlo, run_monte_carlo, run_sensitivity_sweep, sensitivity_sweep, MonteCarloInput,
    MonteCarloResult, SensitivityInput, SensitivityPoint,
};
