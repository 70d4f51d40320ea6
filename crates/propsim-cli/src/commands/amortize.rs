use std::time::Instant;

use clap::Args;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use propsim_core::mortgage::amortization::{amortization_schedule, monthly_payment, AmortizationRow};
use propsim_core::with_metadata;

/// Arguments for fixed-rate mortgage amortization
#[derive(Args, Serialize)]
pub struct AmortizeArgs {
    /// Loan principal
    #[arg(long)]
    pub principal: f64,

    /// Annual interest rate as a decimal (0.065 = 6.5%)
    #[arg(long)]
    pub rate: f64,

    /// Term in years
    #[arg(long, default_value = "30")]
    pub years: u32,

    /// Include the month-by-month schedule
    #[arg(long)]
    pub schedule: bool,
}

#[derive(Debug, Serialize)]
struct AmortizationSummary {
    monthly_payment: f64,
    total_paid: f64,
    total_interest: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    schedule: Option<Vec<AmortizationRow>>,
}

pub fn run_amortize(args: AmortizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();

    let payment = monthly_payment(args.principal, args.rate, args.years)?;
    let schedule = if args.schedule {
        Some(amortization_schedule(args.principal, args.rate, args.years)?)
    } else {
        None
    };
    // The schedule trims the final payment; without it, every payment is level.
    let total_paid: f64 = match &schedule {
        Some(rows) => rows.iter().map(|r| r.payment).sum(),
        None => payment * f64::from(args.years) * 12.0,
    };
    debug!(months = u64::from(args.years) * 12, "amortized loan");

    let summary = AmortizationSummary {
        monthly_payment: payment,
        total_paid,
        total_interest: total_paid - args.principal,
        schedule,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    let output = with_metadata(
        "Fixed-rate annuity, monthly nominal compounding",
        &args,
        Vec::new(),
        elapsed,
        summary,
    )?;
    Ok(serde_json::to_value(output)?)
}
