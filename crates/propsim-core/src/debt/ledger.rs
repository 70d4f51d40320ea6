use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::{Money, Rate};
use crate::EngineResult;

/// Balances at or below this are treated as fully repaid.
pub const PAID_OFF_THRESHOLD: Money = 0.01;

const DAYS_PER_YEAR: f64 = 365.0;
const DAYS_PER_MONTH: u32 = 30;

/// How interest is charged when a month elapses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestAccrual {
    /// `(1 + r/365)^30` per month, how servicers charge student and consumer loans
    #[default]
    Daily,
    /// `r/12` per month, the convention the annuity formula assumes
    MonthlyNominal,
}

/// Mutable per-loan state, owned by exactly one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanLedgerEntry {
    pub name: String,
    pub balance: Money,
    pub annual_rate: Rate,
    pub min_payment: Money,
    #[serde(default)]
    pub accrual: InterestAccrual,
}

impl LoanLedgerEntry {
    pub fn new(
        name: impl Into<String>,
        balance: Money,
        annual_rate: Rate,
        min_payment: Money,
    ) -> EngineResult<Self> {
        let entry = Self {
            name: name.into(),
            balance,
            annual_rate,
            min_payment,
            accrual: InterestAccrual::Daily,
        };
        entry.validate()?;
        Ok(entry)
    }

    pub fn with_accrual(mut self, accrual: InterestAccrual) -> Self {
        self.accrual = accrual;
        self
    }

    pub fn validate(&self) -> EngineResult<()> {
        let field = |f: &str| format!("loan:{}:{f}", self.name);
        if self.balance < 0.0 || !self.balance.is_finite() {
            return Err(EngineError::domain(field("balance"), "Balance must be non-negative"));
        }
        if self.annual_rate < 0.0 || !self.annual_rate.is_finite() {
            return Err(EngineError::domain(field("annual_rate"), "Rate must be non-negative"));
        }
        if self.min_payment < 0.0 || !self.min_payment.is_finite() {
            return Err(EngineError::domain(
                field("min_payment"),
                "Minimum payment must be non-negative",
            ));
        }
        Ok(())
    }

    pub fn is_paid_off(&self) -> bool {
        self.balance <= PAID_OFF_THRESHOLD
    }

    /// Compound `days` of daily interest onto the balance; returns the interest added.
    pub fn accrue_daily_interest(&mut self, days: u32) -> Money {
        if self.is_paid_off() {
            return 0.0;
        }
        let before = self.balance;
        self.balance *= (1.0 + self.annual_rate / DAYS_PER_YEAR).powi(days as i32);
        self.balance - before
    }

    /// One month of interest under this entry's accrual convention.
    pub fn accrue_month(&mut self) -> Money {
        match self.accrual {
            InterestAccrual::Daily => self.accrue_daily_interest(DAYS_PER_MONTH),
            InterestAccrual::MonthlyNominal => {
                if self.is_paid_off() {
                    return 0.0;
                }
                let interest = self.balance * self.annual_rate / 12.0;
                self.balance += interest;
                interest
            }
        }
    }

    /// Pay up to `amount` against the balance; returns what was actually applied.
    pub fn apply_payment(&mut self, amount: Money) -> Money {
        if self.is_paid_off() || amount <= 0.0 {
            return 0.0;
        }
        let actual = amount.min(self.balance);
        self.balance -= actual;
        actual
    }
}

/// Where an allocation went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationOutcome {
    pub minimums_paid: Money,
    pub extra_paid: Money,
    /// Funds left after every active loan was repaid in full
    pub leftover: Money,
}

impl AllocationOutcome {
    pub fn total_paid(&self) -> Money {
        self.minimums_paid + self.extra_paid
    }
}

/// Minimums first, then everything else to the highest-rate balance.
///
/// Step 1 pays each active loan's `min_payment` in the order given, stopping
/// once funds run out. Step 2 orders the still-active loans by rate
/// descending (a stable sort, so equal rates keep their given order) and
/// pours the remainder into each in turn. Whatever survives both steps is
/// returned as `leftover`.
pub fn allocate_avalanche(entries: &mut [LoanLedgerEntry], total_available: Money) -> AllocationOutcome {
    let mut remaining = total_available.max(0.0);
    let mut outcome = AllocationOutcome::default();

    for loan in entries.iter_mut().filter(|l| !l.is_paid_off()) {
        if remaining <= 0.0 {
            break;
        }
        let paid = loan.apply_payment(loan.min_payment.min(remaining));
        outcome.minimums_paid += paid;
        remaining -= paid;
    }

    let mut order: Vec<usize> = (0..entries.len())
        .filter(|&i| !entries[i].is_paid_off())
        .collect();
    order.sort_by(|&a, &b| entries[b].annual_rate.total_cmp(&entries[a].annual_rate));

    for idx in order {
        if remaining <= 0.0 {
            break;
        }
        let paid = entries[idx].apply_payment(remaining);
        outcome.extra_paid += paid;
        remaining -= paid;
    }

    outcome.leftover = remaining.max(0.0);
    outcome
}

/// The set of loans one simulation run pays down.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoanLedger {
    entries: Vec<LoanLedgerEntry>,
}

impl LoanLedger {
    pub fn new(entries: Vec<LoanLedgerEntry>) -> EngineResult<Self> {
        for entry in &entries {
            entry.validate()?;
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[LoanLedgerEntry] {
        &self.entries
    }

    pub fn total_balance(&self) -> Money {
        self.entries.iter().map(|l| l.balance).sum()
    }

    pub fn all_paid_off(&self) -> bool {
        self.entries.iter().all(LoanLedgerEntry::is_paid_off)
    }

    pub fn total_min_payment(&self) -> Money {
        self.entries
            .iter()
            .filter(|l| !l.is_paid_off())
            .map(|l| l.min_payment)
            .sum()
    }

    /// Accrue one month on every active loan; returns total interest added.
    pub fn accrue_month(&mut self) -> Money {
        self.entries.iter_mut().map(LoanLedgerEntry::accrue_month).sum()
    }

    pub fn allocate_avalanche(&mut self, total_available: Money) -> AllocationOutcome {
        allocate_avalanche(&mut self.entries, total_available)
    }
}
