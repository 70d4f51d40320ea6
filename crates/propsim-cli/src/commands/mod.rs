pub mod amortize;
pub mod payoff;
pub mod property;
pub mod scenarios;
