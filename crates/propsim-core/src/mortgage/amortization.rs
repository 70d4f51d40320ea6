use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::{Money, Rate};
use crate::EngineResult;

/// One month of a fixed-rate amortization schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationRow {
    pub month: u32,
    pub payment: Money,
    pub interest: Money,
    pub principal: Money,
    pub balance: Money,
}

/// Validates the terms and returns the number of monthly payments.
/// Longest term a full schedule is materialised for.
pub const MAX_SCHEDULE_YEARS: u32 = 100;

fn validate_terms(field: &str, amount: f64, annual_rate: Rate, years: u32) -> EngineResult<u32> {
    if annual_rate < 0.0 || !annual_rate.is_finite() {
        return Err(EngineError::domain("annual_rate", "Rate must be non-negative"));
    }
    if years == 0 {
        return Err(EngineError::domain("years", "Term must be at least 1 year"));
    }
    if amount < 0.0 || !amount.is_finite() {
        return Err(EngineError::domain(field, "Must be a non-negative amount"));
    }
    // Payment counts feed `powi`, which takes an i32.
    years
        .checked_mul(12)
        .filter(|n| i32::try_from(*n).is_ok())
        .ok_or_else(|| EngineError::domain("years", "Term is too long to amortize monthly"))
}

/// Standard fixed-rate mortgage payment: P * r(1+r)^n / ((1+r)^n - 1)
///
/// `r` is the monthly rate `annual_rate / 12` and `n` is `years * 12`.
/// Evaluated as `P * r / (1 - (1+r)^-n)`. A zero rate amortises straight-line.
pub fn monthly_payment(principal: Money, annual_rate: Rate, years: u32) -> EngineResult<Money> {
    let n = validate_terms("principal", principal, annual_rate, years)?;

    if annual_rate == 0.0 {
        return Ok(principal / n as f64);
    }

    let r = annual_rate / 12.0;
    let discount = (1.0 + r).powi(-(n as i32));
    Ok(principal * r / (1.0 - discount))
}

/// Inverse of [`monthly_payment`]: the principal a given payment can carry.
pub fn principal_from_payment(payment: Money, annual_rate: Rate, years: u32) -> EngineResult<Money> {
    let n = validate_terms("payment", payment, annual_rate, years)?;

    if annual_rate == 0.0 {
        return Ok(payment * n as f64);
    }

    let r = annual_rate / 12.0;
    let discount = (1.0 + r).powi(-(n as i32));
    Ok(payment * (1.0 - discount) / r)
}

/// Outstanding balance after `payments_elapsed` scheduled payments.
///
/// Uses the closed form `P * ((1+r)^n - (1+r)^k) / ((1+r)^n - 1)`, so no
/// month-by-month simulation is needed for a terminal balance. Returns zero
/// once the loan term has fully elapsed.
pub fn remaining_balance(
    principal: Money,
    annual_rate: Rate,
    years: u32,
    payments_elapsed: u32,
) -> EngineResult<Money> {
    let n = validate_terms("principal", principal, annual_rate, years)?;

    if payments_elapsed >= n {
        return Ok(0.0);
    }
    if annual_rate == 0.0 {
        return Ok(principal * (1.0 - payments_elapsed as f64 / n as f64));
    }

    // Same identity divided through by (1+r)^n, so very long terms stay finite.
    let growth = 1.0 + annual_rate / 12.0;
    let outstanding = growth.powi(payments_elapsed as i32 - n as i32);
    let discount = growth.powi(-(n as i32));
    Ok(principal * (1.0 - outstanding) / (1.0 - discount))
}

/// Full month-by-month schedule at the monthly nominal rate.
///
/// The final payment is trimmed to the residual balance.
pub fn amortization_schedule(
    principal: Money,
    annual_rate: Rate,
    years: u32,
) -> EngineResult<Vec<AmortizationRow>> {
    let n = validate_terms("principal", principal, annual_rate, years)?;
    if years > MAX_SCHEDULE_YEARS {
        return Err(EngineError::domain(
            "years",
            format!("Schedules are limited to {MAX_SCHEDULE_YEARS} years"),
        ));
    }
    let payment = monthly_payment(principal, annual_rate, years)?;
    let r = annual_rate / 12.0;

    let mut rows = Vec::with_capacity(n as usize);
    let mut balance = principal;
    for month in 1..=n {
        let interest = balance * r;
        let due = if month == n {
            balance + interest
        } else {
            payment.min(balance + interest)
        };
        let principal_part = due - interest;
        balance = (balance - principal_part).max(0.0);
        rows.push(AmortizationRow {
            month,
            payment: due,
            interest,
            principal: principal_part,
            balance,
        });
    }
    Ok(rows)
}
