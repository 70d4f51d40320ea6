pub mod analysis;
pub mod metrics;
pub mod projection;
pub mod scoring;

pub use analysis::{analyze_property, score_properties, PropertyAnalysis, PropertyAnalysisInput};
pub use metrics::{compute_metrics, DerivedMetrics, MortgageCosts};
pub use projection::{expected_gain, HorizonProjection, PaybackPeriod};
pub use scoring::{deal_score, mobility_score, DealScore};
