use serde::{Deserialize, Serialize};

use super::metrics::DerivedMetrics;
use crate::error::EngineError;
use crate::types::MobilityInputs;
use crate::EngineResult;

/// Sum of every band's best outcome.
pub const MAX_DEAL_SCORE: u8 = 23;

/// The eleven scalar inputs the deal score looks at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DealScoreInputs {
    pub monthly_cash_flow_y1: f64,
    pub monthly_cash_flow_y2: f64,
    pub coc_y2: f64,
    pub cap_rate_y2: f64,
    pub mgr_pp: f64,
    pub opex_rent: f64,
    pub dscr: f64,
    pub cash_needed: f64,
    pub grm_y2: f64,
    pub cost_per_sqrft: f64,
    pub home_age: i32,
}

impl DealScoreInputs {
    /// `None` when any ratio the score depends on is undefined.
    pub fn from_metrics(metrics: &DerivedMetrics) -> Option<Self> {
        Some(Self {
            monthly_cash_flow_y1: metrics.monthly_cash_flow_y1,
            monthly_cash_flow_y2: metrics.monthly_cash_flow_y2,
            coc_y2: metrics.coc_y2?,
            cap_rate_y2: metrics.cap_rate_y2?,
            mgr_pp: metrics.mgr_pp?,
            opex_rent: metrics.opex_rent?,
            dscr: metrics.dscr?,
            cash_needed: metrics.costs.cash_needed,
            grm_y2: metrics.grm_y2?,
            cost_per_sqrft: metrics.cost_per_sqrft,
            home_age: metrics.home_age,
        })
    }
}

/// Per-band points, kept so a caller can see why a deal scored what it did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealScoreBreakdown {
    pub cash_flow_y2: u8,
    pub cash_flow_y1: u8,
    pub coc_y2: u8,
    pub cap_rate_y2: u8,
    pub mgr_pp: u8,
    pub opex_rent: u8,
    pub dscr: u8,
    pub cash_needed: u8,
    pub grm_y2: u8,
    pub cost_per_sqrft: u8,
    pub home_age: u8,
}

impl DealScoreBreakdown {
    pub fn total(&self) -> u8 {
        self.cash_flow_y2
            + self.cash_flow_y1
            + self.coc_y2
            + self.cap_rate_y2
            + self.mgr_pp
            + self.opex_rent
            + self.dscr
            + self.cash_needed
            + self.grm_y2
            + self.cost_per_sqrft
            + self.home_age
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealScore {
    pub total: u8,
    pub breakdown: DealScoreBreakdown,
}

// ---------------------------------------------------------------------------
// Deal score
// ---------------------------------------------------------------------------

/// Banded integer score over cash flow, return and risk ratios.
pub fn score_inputs(i: &DealScoreInputs) -> DealScore {
    let breakdown = DealScoreBreakdown {
        cash_flow_y2: match i.monthly_cash_flow_y2 {
            cf if cf > 500.0 => 3,
            cf if cf > 400.0 => 2,
            cf if cf > 200.0 => 1,
            _ => 0,
        },
        cash_flow_y1: match i.monthly_cash_flow_y1 {
            cf if cf > 0.0 => 3,
            cf if cf > -350.0 => 2,
            _ => 0,
        },
        coc_y2: match i.coc_y2 {
            r if r > 0.15 => 3,
            r if r > 0.12 => 2,
            r if r > 0.08 => 1,
            _ => 0,
        },
        cap_rate_y2: u8::from(i.cap_rate_y2 > 0.06),
        mgr_pp: match i.mgr_pp {
            r if r >= 0.01 => 2,
            r if r >= 0.008 => 1,
            _ => 0,
        },
        opex_rent: match i.opex_rent {
            r if (0.4..=0.6).contains(&r) => 2,
            r if (0.3..=0.7).contains(&r) => 1,
            _ => 0,
        },
        dscr: match i.dscr {
            r if r >= 1.25 => 2,
            r if r >= 1.1 => 1,
            _ => 0,
        },
        cash_needed: match i.cash_needed {
            c if c < 20_000.0 => 2,
            c if c < 30_000.0 => 1,
            _ => 0,
        },
        grm_y2: u8::from(i.grm_y2 < 12.0),
        cost_per_sqrft: match i.cost_per_sqrft {
            c if c < 100.0 => 2,
            c if c < 150.0 => 1,
            _ => 0,
        },
        home_age: if i.home_age < 20 { 2 } else { 0 },
    };

    DealScore {
        total: breakdown.total(),
        breakdown,
    }
}

/// Deal score for a metrics row, or `None` while any input ratio is undefined.
pub fn deal_score(metrics: &DerivedMetrics) -> Option<DealScore> {
    DealScoreInputs::from_metrics(metrics).map(|i| score_inputs(&i))
}

// ---------------------------------------------------------------------------
// Mobility
// ---------------------------------------------------------------------------

/// Weighted walk/transit/bike blend, 0.6 / 0.3 / 0.1.
pub fn mobility_score(inputs: &MobilityInputs) -> EngineResult<f64> {
    for (field, value) in [
        ("walk_score", inputs.walk_score),
        ("transit_score", inputs.transit_score),
        ("bike_score", inputs.bike_score),
    ] {
        if !(0.0..=100.0).contains(&value) {
            return Err(EngineError::domain(field, "Sub-score must be between 0 and 100"));
        }
    }
    Ok(inputs.walk_score * 0.6 + inputs.transit_score * 0.3 + inputs.bike_score * 0.1)
}
