use clap::Args;
use serde::Deserialize;
use serde_json::Value;

use propsim_core::property::{analyze_property, score_properties, PropertyAnalysisInput};
use propsim_core::{EngineContext, PropertyFinancials};

use crate::input;

/// Arguments for single-property analysis
#[derive(Args)]
pub struct AnalyzeArgs {
    /// Path to JSON/YAML input file ({ property, context, horizons? })
    #[arg(long)]
    pub input: Option<String>,

    /// Override the projection horizons, in years (e.g. "5,10,30")
    #[arg(long, value_delimiter = ',')]
    pub horizons: Option<Vec<u32>>,
}

/// Arguments for batch scoring
#[derive(Args)]
pub struct ScoreArgs {
    /// Path to JSON/YAML input file ({ properties, context })
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScoreInput {
    properties: Vec<PropertyFinancials>,
    context: EngineContext,
}

pub fn run_analyze(args: AnalyzeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut analysis_input: PropertyAnalysisInput =
        input::load(args.input.as_deref(), "property analysis")?;
    if let Some(horizons) = args.horizons {
        analysis_input.horizons = horizons;
    }
    let result = analyze_property(&analysis_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_score(args: ScoreArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let score_input: ScoreInput = input::load(args.input.as_deref(), "batch scoring")?;
    let result = score_properties(&score_input.properties, &score_input.context)?;
    Ok(serde_json::to_value(result)?)
}
