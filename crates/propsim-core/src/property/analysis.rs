use std::cmp::Ordering;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::metrics::{compute_metrics, DerivedMetrics};
use super::projection::{
    leverage_benefit, payback_period, project_horizons, roe_y2, HorizonProjection, PaybackPeriod,
    DEFAULT_HORIZONS,
};
use super::scoring::{deal_score, mobility_score, DealScore};
use crate::types::{with_metadata, ComputationOutput, EngineContext, PropertyFinancials, Ratio};
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyAnalysisInput {
    pub property: PropertyFinancials,
    pub context: EngineContext,
    #[serde(default = "default_horizons")]
    pub horizons: Vec<u32>,
}

fn default_horizons() -> Vec<u32> {
    DEFAULT_HORIZONS.to_vec()
}

/// The "scored" view of one property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyAnalysis {
    pub metrics: DerivedMetrics,
    /// `None` until every ratio the score depends on is defined
    pub deal_score: Option<DealScore>,
    pub mobility_score: Option<f64>,
    pub payback_period: PaybackPeriod,
    pub roe_y2: Ratio,
    pub leverage_benefit: Ratio,
    pub projections: Vec<HorizonProjection>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Metrics, deal score and hold-period projections for one property.
pub fn analyze_property(
    input: &PropertyAnalysisInput,
) -> EngineResult<ComputationOutput<PropertyAnalysis>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let analysis = analyze(&input.property, &input.context, &input.horizons, &mut warnings)?;

    let elapsed = start.elapsed().as_micros() as u64;
    with_metadata(
        "House-hacking rental analysis (Y1 owner-occupied, Y2 fully rented)",
        input,
        warnings,
        elapsed,
        analysis,
    )
}

/// Analyze a batch under one context, best deal first.
///
/// Properties whose score is undefined sort after every scored property and
/// keep their input order among themselves.
pub fn score_properties(
    properties: &[PropertyFinancials],
    ctx: &EngineContext,
) -> EngineResult<ComputationOutput<Vec<PropertyAnalysis>>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let mut scored = properties
        .iter()
        .map(|p| analyze(p, ctx, &DEFAULT_HORIZONS, &mut warnings))
        .collect::<EngineResult<Vec<_>>>()?;

    scored.sort_by(|a, b| match (&a.deal_score, &b.deal_score) {
        (Some(x), Some(y)) => y.total.cmp(&x.total),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    let elapsed = start.elapsed().as_micros() as u64;
    with_metadata(
        "Batch deal scoring, ranked by deal score",
        ctx,
        warnings,
        elapsed,
        scored,
    )
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

fn analyze(
    property: &PropertyFinancials,
    ctx: &EngineContext,
    horizons: &[u32],
    warnings: &mut Vec<String>,
) -> EngineResult<PropertyAnalysis> {
    let metrics = compute_metrics(property, ctx)?;
    let score = deal_score(&metrics);
    let mobility = property.mobility.as_ref().map(mobility_score).transpose()?;

    debug!(
        address = %property.address,
        score = ?score.map(|s| s.total),
        cash_flow_y2 = metrics.monthly_cash_flow_y2,
        "analyzed property"
    );

    collect_warnings(&metrics, warnings);

    Ok(PropertyAnalysis {
        deal_score: score,
        mobility_score: mobility,
        payback_period: payback_period(&metrics),
        roe_y2: roe_y2(&metrics, ctx)?,
        leverage_benefit: leverage_benefit(&metrics),
        projections: project_horizons(property, &metrics, ctx, horizons)?,
        metrics,
    })
}

fn collect_warnings(m: &DerivedMetrics, warnings: &mut Vec<String>) {
    if !m.is_scorable() {
        warnings.push(format!(
            "{}: no rent estimate or no cash invested; ratios and deal score are undefined",
            m.address
        ));
        return;
    }
    if m.monthly_cash_flow_y2 < 0.0 {
        warnings.push(format!(
            "{}: negative fully-rented cash flow ({:.2}/mo)",
            m.address, m.monthly_cash_flow_y2
        ));
    }
    if let Some(dscr) = m.dscr {
        if dscr < 1.25 {
            warnings.push(format!("{}: DSCR {dscr:.2} below 1.25x", m.address));
        }
    }
}
