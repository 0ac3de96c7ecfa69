//! Trailing-window risk metrics over a daily price series: peak-to-trough
//! drawdowns, the legacy single-day fall rate, and down-day statistics.
//!
//! All percentages are signed: a 12% peak-to-trough decline is reported as
//! -12.0.

use chrono::Duration;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use stock_core::{AnalysisError, PriceBar};

/// Minimum bars for any metric in this module; one day-over-day delta.
const MIN_POINTS: usize = 2;

/// Peak-to-trough statistics against the running intraday high.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DrawdownStats {
    /// Worst decline of the intraday low below the running high, in percent.
    pub max_drawdown: f64,
    /// Mean decline of the close below the running high, in percent.
    pub avg_drawdown: f64,
}

/// Day-over-day downside statistics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DownsideStats {
    /// Worst single-day close-to-close return, in percent (un-clamped).
    pub worst_daily_drop: f64,
    /// Mean return across down days only; `None` when there were none.
    pub avg_down_day_return: Option<f64>,
    /// Share of trading days that closed lower than the prior day, in percent.
    pub down_day_ratio: f64,
}

/// Combined per-security risk fields, backfilled onto the day's
/// fundamentals snapshot by the persistence collaborator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskSummary {
    pub max_drawdown: f64,
    pub avg_drawdown: f64,
    pub max_daily_fall_rate: f64,
}

impl RiskSummary {
    pub fn compute(bars: &[PriceBar]) -> Result<Self, AnalysisError> {
        let drawdowns = drawdown_stats(bars)?;
        Ok(Self {
            max_drawdown: drawdowns.max_drawdown,
            avg_drawdown: drawdowns.avg_drawdown,
            max_daily_fall_rate: max_daily_fall_rate(bars)?,
        })
    }
}

/// Restrict a date-ascending bar series to the trailing `days` calendar
/// days, measured back from the last bar.
pub fn trailing_window(bars: &[PriceBar], days: i64) -> &[PriceBar] {
    let Some(last) = bars.last() else {
        return bars;
    };
    let cutoff = last.date - Duration::days(days);
    let start = bars.partition_point(|b| b.date < cutoff);
    &bars[start..]
}

/// Maximum and average drawdown against the running high of the window.
///
/// The maximum uses the intraday low (worst touch), the average uses the
/// close (sustained level). Bars whose running high is not a positive
/// price are skipped rather than dividing by it.
pub fn drawdown_stats(bars: &[PriceBar]) -> Result<DrawdownStats, AnalysisError> {
    if bars.len() < MIN_POINTS {
        return Err(AnalysisError::InsufficientHistory {
            required: MIN_POINTS,
            available: bars.len(),
        });
    }

    let mut running_max = f64::MIN;
    let mut max_drawdown = f64::MAX;
    let mut close_drawdown_sum = 0.0;
    let mut counted = 0usize;

    for bar in bars {
        running_max = running_max.max(bar.high);
        if running_max <= 0.0 {
            continue;
        }
        let low_dd = (bar.low - running_max) / running_max * 100.0;
        max_drawdown = max_drawdown.min(low_dd);
        close_drawdown_sum += (bar.close - running_max) / running_max * 100.0;
        counted += 1;
    }

    if counted == 0 {
        return Err(AnalysisError::InvalidData(
            "no positive running high in window".to_string(),
        ));
    }

    Ok(DrawdownStats {
        max_drawdown,
        avg_drawdown: close_drawdown_sum / counted as f64,
    })
}

/// Legacy single-day variant: the minimum close-to-close return over the
/// window, reported as exactly 0 when no decline occurred.
pub fn max_daily_fall_rate(bars: &[PriceBar]) -> Result<f64, AnalysisError> {
    let worst = daily_returns(bars)?
        .fold(f64::MAX, f64::min);
    Ok(if worst >= 0.0 { 0.0 } else { worst })
}

/// Down-day statistics over the window.
pub fn downside_stats(bars: &[PriceBar]) -> Result<DownsideStats, AnalysisError> {
    let returns: Vec<f64> = daily_returns(bars)?.collect();
    if returns.is_empty() {
        return Err(AnalysisError::InvalidData(
            "no positive prior close in window".to_string(),
        ));
    }

    let worst_daily_drop = returns.iter().copied().fold(f64::MAX, f64::min);
    let down_days: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    let avg_down_day_return = if down_days.is_empty() {
        None
    } else {
        Some(down_days.iter().sum::<f64>() / down_days.len() as f64)
    };

    Ok(DownsideStats {
        worst_daily_drop,
        avg_down_day_return,
        down_day_ratio: down_days.len() as f64 / returns.len() as f64 * 100.0,
    })
}

/// Risk summaries for many securities; failures are logged and skipped.
pub fn compute_batch(series: &[(String, Vec<PriceBar>)]) -> Vec<(String, RiskSummary)> {
    series
        .par_iter()
        .filter_map(|(code, bars)| match RiskSummary::compute(bars) {
            Ok(summary) => Some((code.clone(), summary)),
            Err(e) => {
                tracing::warn!("{}: skipping risk metrics: {}", code, e);
                None
            }
        })
        .collect()
}

/// Close-to-close percentage returns; prior closes that are not positive
/// prices are skipped.
fn daily_returns(bars: &[PriceBar]) -> Result<impl Iterator<Item = f64> + '_, AnalysisError> {
    if bars.len() < MIN_POINTS {
        return Err(AnalysisError::InsufficientHistory {
            required: MIN_POINTS,
            available: bars.len(),
        });
    }
    Ok(bars.windows(2).filter_map(|pair| {
        let prev = pair[0].close;
        (prev > 0.0).then(|| (pair[1].close - prev) / prev * 100.0)
    }))
}
