use rayon::prelude::*;
use stock_core::{AnalysisError, IndicatorRow, PriceBar};

use crate::indicators::{detect_cross, detect_rsi_signals, detect_zero_cross, macd, rsi, sma};

/// Bars required before any indicator row is produced for a security;
/// driven by the longest moving-average window.
pub const MIN_HISTORY: usize = 120;

const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;
const RSI_PERIOD: usize = 14;
const MA_WINDOWS: [usize; 4] = [5, 20, 60, 120];

/// Computes the full per-date indicator state (MACD, RSI, moving averages
/// and their cross labels) from a daily close series.
pub struct IndicatorEngine;

impl IndicatorEngine {
    pub fn new() -> Self {
        Self
    }

    /// Compute one `IndicatorRow` per bar for a single security.
    ///
    /// Every bar must pass [`PriceBar::validate`], and the series must be
    /// date-ascending with no duplicate dates and cover at least
    /// [`MIN_HISTORY`] bars; shorter histories are rejected so the caller
    /// can skip the security without producing partial state.
    pub fn compute(&self, code: &str, bars: &[PriceBar]) -> Result<Vec<IndicatorRow>, AnalysisError> {
        if bars.len() < MIN_HISTORY {
            return Err(AnalysisError::InsufficientHistory {
                required: MIN_HISTORY,
                available: bars.len(),
            });
        }
        // The batch path prefixes the security code when it logs the skip.
        for bar in bars {
            bar.validate()?;
        }
        for pair in bars.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(AnalysisError::InvalidData(format!(
                    "{}: bars out of order at {}",
                    code, pair[1].date
                )));
            }
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        let macd_series = macd(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
        let macd_cross = detect_zero_cross(&macd_series.histogram);

        let rsi_values = rsi(&closes, RSI_PERIOD);
        let rsi_signals = detect_rsi_signals(&rsi_values);

        let [ma5, ma20, ma60, ma120] = MA_WINDOWS.map(|w| sma(&closes, w));
        let cross_5_20 = detect_cross(&ma5, &ma20);
        let cross_20_60 = detect_cross(&ma20, &ma60);
        let cross_60_120 = detect_cross(&ma60, &ma120);

        let rows = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| IndicatorRow {
                code: code.to_string(),
                date: bar.date,
                macd: finite(macd_series.macd[i]),
                macd_signal: finite(macd_series.signal[i]),
                macd_hist: finite(macd_series.histogram[i]),
                macd_cross: macd_cross[i],
                rsi: rsi_values[i].and_then(finite),
                rsi_signal: rsi_signals[i],
                ma5: ma5[i].and_then(finite),
                ma20: ma20[i].and_then(finite),
                ma60: ma60[i].and_then(finite),
                ma120: ma120[i].and_then(finite),
                cross_5_20: cross_5_20[i],
                cross_20_60: cross_20_60[i],
                cross_60_120: cross_60_120[i],
            })
            .collect();

        Ok(rows)
    }

    /// Compute indicator rows for many securities. Securities are
    /// independent and processed in parallel; one security's failure is
    /// logged and skipped without aborting the batch.
    pub fn compute_batch(&self, series: &[(String, Vec<PriceBar>)]) -> Vec<IndicatorRow> {
        series
            .par_iter()
            .flat_map_iter(|(code, bars)| match self.compute(code, bars) {
                Ok(rows) => rows,
                Err(e) => {
                    tracing::warn!("{}: skipping indicators: {}", code, e);
                    Vec::new()
                }
            })
            .collect()
    }
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-finite intermediates must land as null, never as NaN, before the
/// rows reach the persistence collaborator.
fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}
