use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// One security in the listing registry. The registry owns every derived
/// row: deleting a company cascades to its prices, indicators and
/// valuations (handled by the persistence collaborator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub market: Option<String>,
}

/// Daily OHLCV bar for one security, ordered by date ascending and unique
/// per (security, date).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// OHLC sanity check for the ingestion boundary: the source feed does
    /// not enforce these, so they are validated before anything derived is
    /// computed from the bar.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.high < self.low {
            return Err(AnalysisError::InvalidData(format!(
                "{}: high {} below low {}",
                self.date, self.high, self.low
            )));
        }
        if self.high < self.open.max(self.close) {
            return Err(AnalysisError::InvalidData(format!(
                "{}: high {} below open/close",
                self.date, self.high
            )));
        }
        if self.low > self.open.min(self.close) {
            return Err(AnalysisError::InvalidData(format!(
                "{}: low {} above open/close",
                self.date, self.low
            )));
        }
        Ok(())
    }
}

/// Daily fundamentals snapshot for one security, upserted once per
/// (security, date). Every numeric field is optional: the upstream page
/// frequently omits forward-looking rows, and consumers degrade per field
/// rather than rejecting the snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FundamentalSnapshot {
    pub code: String,
    pub date: NaiveDate,
    pub market_cap: Option<i64>,
    pub shares_outstanding: Option<i64>,
    pub pbr: Option<f64>,
    pub per: Option<f64>,
    pub industry_per: Option<f64>,
    pub eps: Option<f64>,
    pub roe: Option<f64>,
    pub div_yield: Option<f64>,
    pub bps: Option<f64>,
    pub per_pred: Option<f64>,
    pub pbr_pred: Option<f64>,
    pub eps_pred: Option<f64>,
    pub roe_pred: Option<f64>,
    pub bps_pred: Option<f64>,
    /// Performance-surprise tokens as emitted by the fundamentals feed
    /// (year-over-year, vs. three months ago, vs. consensus).
    pub perf_yoy: Option<String>,
    pub perf_vs_3m_ago: Option<String>,
    pub perf_vs_consensus: Option<String>,
    /// Derived risk fields, backfilled after the risk pass.
    pub max_drawdown: Option<f64>,
    pub avg_drawdown: Option<f64>,
    pub max_daily_fall_rate: Option<f64>,
}

/// Golden/dead cross label for a fast/slow pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossSignal {
    #[serde(rename = "GOLDEN")]
    Golden,
    #[serde(rename = "DEAD")]
    Dead,
}

impl CrossSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrossSignal::Golden => "GOLDEN",
            CrossSignal::Dead => "DEAD",
        }
    }
}

/// RSI threshold-exit signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RsiSignal {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

impl RsiSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            RsiSignal::Buy => "BUY",
            RsiSignal::Sell => "SELL",
        }
    }
}

/// Derived indicator state for one security on one trading date. Fully
/// recomputable from the price series, so persisted rows are a rebuildable
/// cache keyed on (security, date).
///
/// Fields are null where the backing window has not accumulated enough
/// bars; a null is never replaced by an approximation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndicatorRow {
    pub code: String,
    pub date: NaiveDate,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_hist: Option<f64>,
    pub macd_cross: Option<CrossSignal>,
    pub rsi: Option<f64>,
    pub rsi_signal: Option<RsiSignal>,
    pub ma5: Option<f64>,
    pub ma20: Option<f64>,
    pub ma60: Option<f64>,
    pub ma120: Option<f64>,
    pub cross_5_20: Option<CrossSignal>,
    pub cross_20_60: Option<CrossSignal>,
    pub cross_60_120: Option<CrossSignal>,
}

/// Flattened per-security valuation input: the latest close joined with the
/// day's fundamentals snapshot. Assembled by the persistence collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValuationRecord {
    pub code: String,
    pub current_price: Option<f64>,
    pub eps: Option<f64>,
    pub eps_pred: Option<f64>,
    pub bps: Option<f64>,
    pub bps_pred: Option<f64>,
    pub roe: Option<f64>,
    pub roe_pred: Option<f64>,
    pub per: Option<f64>,
    pub industry_per: Option<f64>,
    pub perf_yoy: Option<String>,
    pub perf_vs_3m_ago: Option<String>,
    pub perf_vs_consensus: Option<String>,
}

impl ValuationRecord {
    pub fn from_snapshot(snapshot: &FundamentalSnapshot, current_price: Option<f64>) -> Self {
        Self {
            code: snapshot.code.clone(),
            current_price,
            eps: snapshot.eps,
            eps_pred: snapshot.eps_pred,
            bps: snapshot.bps,
            bps_pred: snapshot.bps_pred,
            roe: snapshot.roe,
            roe_pred: snapshot.roe_pred,
            per: snapshot.per,
            industry_per: snapshot.industry_per,
            perf_yoy: snapshot.perf_yoy.clone(),
            perf_vs_3m_ago: snapshot.perf_vs_3m_ago.clone(),
            perf_vs_consensus: snapshot.perf_vs_consensus.clone(),
        }
    }
}

#[cfg(test)]
mod price_bar_tests {
    use super::*;

    fn bar(open: f64, high: f64, low: f64, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            open,
            high,
            low,
            close,
            volume: 1_000.0,
        }
    }

    #[test]
    fn test_well_formed_bar_passes() {
        assert!(bar(100.0, 105.0, 98.0, 103.0).validate().is_ok());
        // Degenerate but legal: everything at one price.
        assert!(bar(100.0, 100.0, 100.0, 100.0).validate().is_ok());
    }

    #[test]
    fn test_high_below_low_rejected() {
        assert!(matches!(
            bar(100.0, 97.0, 98.0, 100.0).validate(),
            Err(AnalysisError::InvalidData(_))
        ));
    }

    #[test]
    fn test_high_below_body_rejected() {
        assert!(matches!(
            bar(100.0, 102.0, 98.0, 103.0).validate(),
            Err(AnalysisError::InvalidData(_))
        ));
    }

    #[test]
    fn test_low_above_body_rejected() {
        assert!(matches!(
            bar(100.0, 105.0, 101.0, 103.0).validate(),
            Err(AnalysisError::InvalidData(_))
        ));
    }
}

/// Over/under-valuation verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "UNDERVALUED")]
    Undervalued,
    #[serde(rename = "OVERVALUED")]
    Overvalued,
    #[serde(rename = "FAIR")]
    Fair,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Undervalued => "UNDERVALUED",
            Verdict::Overvalued => "OVERVALUED",
            Verdict::Fair => "FAIR",
        }
    }
}

/// Valuation outcome for one security on one evaluation date. Like
/// `IndicatorRow`, persisted rows are a rebuildable cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationRow {
    pub code: String,
    pub date: NaiveDate,
    pub fair_value: f64,
    pub current_price: f64,
    /// (current_price - fair_value) / fair_value * 100.
    pub discrepancy_ratio: f64,
    pub eps_growth_rate: f64,
    pub bps_growth_rate: f64,
    pub roe_growth_rate: f64,
    pub peg_ratio: Option<f64>,
    pub verdict: Verdict,
    /// Diagnostics: per-sub-model base values before blending, the blended
    /// value before the performance adjustment, and the adjustment factor.
    pub fair_value_rim: Option<f64>,
    pub fair_value_industry: Option<f64>,
    pub fair_value_pegr: Option<f64>,
    pub base_fair_value: f64,
    pub perf_adjustment: f64,
}
