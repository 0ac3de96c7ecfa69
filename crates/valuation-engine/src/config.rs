use serde::{Deserialize, Serialize};

/// Tunables for the valuation engine, passed in at construction so batch
/// runs are deterministic and independent of the process environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationConfig {
    /// Hurdle rate for the residual-income model, in percent.
    pub required_roe: f64,
    /// EPS growth band (exclusive bounds, percent) inside which the
    /// growth-multiple model is trusted; outside it the multiple explodes
    /// or turns meaningless.
    pub pegr_min_growth: f64,
    pub pegr_max_growth: f64,
    /// Blend weights per sub-model; renormalized over whichever sub-models
    /// actually contribute.
    pub weight_rim: f64,
    pub weight_industry: f64,
    pub weight_pegr: f64,
    /// Conservative multiplier applied to the blended estimate.
    pub haircut: f64,
    /// Discrepancy thresholds, in percent. Strictly below the first is
    /// UNDERVALUED, strictly above the second is OVERVALUED.
    pub undervalued_threshold: f64,
    pub overvalued_threshold: f64,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            required_roe: 8.0,
            pegr_min_growth: 5.0,
            pegr_max_growth: 50.0,
            weight_rim: 0.6,
            weight_industry: 0.2,
            weight_pegr: 0.2,
            haircut: 0.8,
            undervalued_threshold: -10.0,
            overvalued_threshold: 10.0,
        }
    }
}

/// Multiplier for one performance-surprise token as emitted by the
/// fundamentals feed: beat variants boost the estimate, miss variants cut
/// it, everything else (including unknown tokens) is neutral.
pub fn performance_adjustment(token: &str) -> f64 {
    match token {
        "상회" | "컨센상회" => 1.1,
        "하회" | "컨센하회" => 0.9,
        _ => 1.0,
    }
}
