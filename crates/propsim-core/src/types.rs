use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::EngineResult;

/// All monetary values, in nominal dollars.
pub type Money = f64;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = f64;

/// A ratio whose denominator may legitimately be zero.
///
/// `None` means "undefined, cannot score yet". It is never coerced to zero
/// or infinity; callers branch on it explicitly.
pub type Ratio = Option<f64>;

/// Divide, yielding `None` when the denominator is zero or the result is not finite.
pub fn ratio(numerator: f64, denominator: f64) -> Ratio {
    if denominator == 0.0 {
        return None;
    }
    let value = numerator / denominator;
    value.is_finite().then_some(value)
}

// ---------------------------------------------------------------------------
// Input records
// ---------------------------------------------------------------------------

/// Fixed-rate loan product terms. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanTerms {
    #[serde(default)]
    pub name: String,
    /// Annual interest rate, in [0, 1)
    pub annual_rate: Rate,
    /// Amortization term in years (> 0)
    pub years: u32,
    pub down_payment_rate: Rate,
    #[serde(default)]
    pub mip_upfront_rate: Rate,
    #[serde(default)]
    pub mip_annual_rate: Rate,
    /// Flat lender fees added to closing costs
    #[serde(default)]
    pub lender_fees: Money,
}

impl LoanTerms {
    pub fn validate(&self) -> EngineResult<()> {
        if !(0.0..1.0).contains(&self.annual_rate) {
            return Err(EngineError::domain(
                "annual_rate",
                "Loan rate must be in [0, 1)",
            ));
        }
        if self.years == 0 {
            return Err(EngineError::domain("years", "Loan term must be positive"));
        }
        ensure_unit_interval("down_payment_rate", self.down_payment_rate)?;
        ensure_non_negative("mip_upfront_rate", self.mip_upfront_rate)?;
        ensure_non_negative("mip_annual_rate", self.mip_annual_rate)?;
        ensure_non_negative("lender_fees", self.lender_fees)?;
        Ok(())
    }
}

/// User-editable assumption record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssumptionSet {
    #[serde(default)]
    pub description: String,
    pub appreciation_rate: Rate,
    pub rent_appreciation_rate: Rate,
    pub property_tax_rate: Rate,
    pub home_insurance_rate: Rate,
    pub vacancy_rate: Rate,
    pub repair_savings_rate: Rate,
    pub closing_costs_rate: Rate,
    pub discount_rate: Rate,
    pub inflation_rate: Rate,
    pub marginal_tax_rate: Rate,
    pub capital_gains_tax_rate: Rate,
    pub expense_ratio: Rate,
    /// Subtracted from `appreciation_rate` for multifamily (units > 0)
    #[serde(default)]
    pub multifamily_appreciation_discount: Rate,
    #[serde(default = "default_selling_costs_rate")]
    pub selling_costs_rate: Rate,
    /// Share of the price that is land and therefore not depreciable
    #[serde(default = "default_land_value_rate")]
    pub land_value_rate: Rate,
    #[serde(default = "default_depreciation_years")]
    pub depreciation_years: f64,
}

fn default_selling_costs_rate() -> Rate {
    0.07
}

fn default_land_value_rate() -> Rate {
    0.20
}

fn default_depreciation_years() -> f64 {
    27.5
}

impl Default for AssumptionSet {
    fn default() -> Self {
        Self {
            description: "baseline".into(),
            appreciation_rate: 0.03,
            rent_appreciation_rate: 0.025,
            property_tax_rate: 0.018,
            home_insurance_rate: 0.004,
            vacancy_rate: 0.05,
            repair_savings_rate: 0.05,
            closing_costs_rate: 0.03,
            discount_rate: 0.07,
            inflation_rate: 0.03,
            marginal_tax_rate: 0.22,
            capital_gains_tax_rate: 0.15,
            expense_ratio: 0.0003,
            multifamily_appreciation_discount: 0.0,
            selling_costs_rate: default_selling_costs_rate(),
            land_value_rate: default_land_value_rate(),
            depreciation_years: default_depreciation_years(),
        }
    }
}

impl AssumptionSet {
    pub fn validate(&self) -> EngineResult<()> {
        ensure_non_negative("property_tax_rate", self.property_tax_rate)?;
        ensure_non_negative("home_insurance_rate", self.home_insurance_rate)?;
        ensure_unit_interval("vacancy_rate", self.vacancy_rate)?;
        ensure_unit_interval("repair_savings_rate", self.repair_savings_rate)?;
        ensure_non_negative("closing_costs_rate", self.closing_costs_rate)?;
        ensure_unit_interval("marginal_tax_rate", self.marginal_tax_rate)?;
        ensure_unit_interval("capital_gains_tax_rate", self.capital_gains_tax_rate)?;
        ensure_unit_interval("expense_ratio", self.expense_ratio)?;
        ensure_unit_interval("selling_costs_rate", self.selling_costs_rate)?;
        ensure_unit_interval("land_value_rate", self.land_value_rate)?;
        ensure_non_negative(
            "multifamily_appreciation_discount",
            self.multifamily_appreciation_discount,
        )?;
        for (field, value) in [
            ("appreciation_rate", self.appreciation_rate),
            ("rent_appreciation_rate", self.rent_appreciation_rate),
            ("discount_rate", self.discount_rate),
            ("inflation_rate", self.inflation_rate),
        ] {
            if value <= -1.0 || !value.is_finite() {
                return Err(EngineError::domain(field, "Growth rate must be greater than -100%"));
            }
        }
        if self.depreciation_years <= 0.0 {
            return Err(EngineError::domain(
                "depreciation_years",
                "Depreciation period must be positive",
            ));
        }
        Ok(())
    }

    /// Appreciation rate applied to a property, with the multifamily haircut.
    pub fn appreciation_for(&self, property: &PropertyFinancials) -> Rate {
        if property.is_single_family() {
            self.appreciation_rate
        } else {
            self.appreciation_rate - self.multifamily_appreciation_discount
        }
    }
}

/// Rent estimate for one rentable unit (or room, for single-family).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRent {
    pub unit: String,
    #[serde(default)]
    pub beds: u32,
    pub rent_estimate: Money,
}

/// Walk/transit/bike sub-scores, each in [0, 100].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MobilityInputs {
    pub walk_score: f64,
    pub transit_score: f64,
    pub bike_score: f64,
}

/// Snapshot of one property at scoring time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyFinancials {
    pub address: String,
    pub price: Money,
    pub square_feet: f64,
    pub beds: u32,
    pub baths: f64,
    pub built_in: i32,
    /// 0 denotes single-family (house-hacking by the room)
    pub units: u32,
    /// Ordered rent roll, one entry per unit or room
    #[serde(default)]
    pub rent_roll: Vec<UnitRent>,
    /// County tax bill, overrides the assumed property tax rate when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annual_tax_amount: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobility: Option<MobilityInputs>,
}

impl PropertyFinancials {
    pub fn is_single_family(&self) -> bool {
        self.units == 0
    }

    pub fn total_rent(&self) -> Money {
        self.rent_roll.iter().map(|u| u.rent_estimate).sum()
    }

    /// Rent of the cheapest unit, the one the owner occupies in Year 1.
    pub fn min_rent(&self) -> Money {
        self.rent_roll
            .iter()
            .map(|u| u.rent_estimate)
            .reduce(f64::min)
            .unwrap_or(0.0)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if !(self.price > 0.0) {
            return Err(EngineError::domain("price", "Price must be positive"));
        }
        if !(self.square_feet > 0.0) {
            return Err(EngineError::domain(
                "square_feet",
                "Square footage must be positive",
            ));
        }
        for unit in &self.rent_roll {
            if unit.rent_estimate < 0.0 || !unit.rent_estimate.is_finite() {
                return Err(EngineError::domain(
                    format!("rent_roll:{}", unit.unit),
                    "Rent estimate must be a non-negative number",
                ));
            }
        }
        if let Some(tax) = self.annual_tax_amount {
            ensure_non_negative("annual_tax_amount", tax)?;
        }
        Ok(())
    }
}

/// Everything a scoring call needs besides the property itself.
///
/// Passed explicitly into every call; the engine holds no process-wide state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineContext {
    pub assumptions: AssumptionSet,
    pub loan: LoanTerms,
    /// Calendar year used to derive `home_age`
    #[serde(default = "current_year")]
    pub as_of_year: i32,
}

/// The current calendar year (UTC).
pub fn current_year() -> i32 {
    chrono::Utc::now().year()
}

impl EngineContext {
    pub fn validate(&self) -> EngineResult<()> {
        self.assumptions.validate()?;
        self.loan.validate()
    }
}

// ---------------------------------------------------------------------------
// Output envelope
// ---------------------------------------------------------------------------

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata.
///
/// Fails with `Serialization` if the inputs cannot be echoed as JSON.
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> EngineResult<ComputationOutput<T>> {
    Ok(ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions)?,
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "ieee754_f64".to_string(),
        },
    })
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

pub(crate) fn ensure_non_negative(field: &str, value: f64) -> EngineResult<()> {
    if value < 0.0 || !value.is_finite() {
        return Err(EngineError::domain(field, "Must be a non-negative number"));
    }
    Ok(())
}

pub(crate) fn ensure_unit_interval(field: &str, value: f64) -> EngineResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(EngineError::domain(field, "Must be between 0 and 1"));
    }
    Ok(())
}
