use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use stock_core::{Company, CrossSignal, IndicatorRow, PriceBar, RsiSignal};

/// One security matched by a screening query. `date` is the date of the
/// qualifying signal, not the query date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalHit {
    pub code: String,
    pub name: String,
    pub date: NaiveDate,
}

/// Indicator column compared by the trend-continuation query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendField {
    Close,
    Ma5,
    Ma20,
    Ma60,
    Ma120,
    Rsi,
    MacdHist,
}

struct Security {
    name: String,
    /// Indicator rows, date ascending.
    rows: Vec<IndicatorRow>,
    /// (date, close), date ascending.
    closes: Vec<(NaiveDate, f64)>,
}

impl Security {
    fn rows_through(&self, as_of: NaiveDate) -> &[IndicatorRow] {
        let end = self.rows.partition_point(|r| r.date <= as_of);
        &self.rows[..end]
    }

    fn close_on(&self, date: NaiveDate) -> Option<f64> {
        match self.closes.binary_search_by_key(&date, |(d, _)| *d) {
            Ok(i) => Some(self.closes[i].1),
            Err(_) => None,
        }
    }
}

/// Screens a loaded snapshot of securities for compound signal conditions.
///
/// The listing registry owns membership: indicator rows for codes absent
/// from `companies` are dropped at construction.
pub struct SignalScreener {
    securities: HashMap<String, Security>,
}

impl SignalScreener {
    pub fn new(
        companies: &[Company],
        indicator_rows: Vec<IndicatorRow>,
        price_series: &[(String, Vec<PriceBar>)],
    ) -> Self {
        let mut securities: HashMap<String, Security> = companies
            .iter()
            .map(|c| {
                let sec = Security {
                    name: c.name.clone(),
                    rows: Vec::new(),
                    closes: Vec::new(),
                };
                (c.code.clone(), sec)
            })
            .collect();

        for row in indicator_rows {
            match securities.get_mut(&row.code) {
                Some(sec) => sec.rows.push(row),
                None => {
                    tracing::debug!("{}: dropping indicator row for unlisted security", row.code)
                }
            }
        }

        for (code, bars) in price_series {
            if let Some(sec) = securities.get_mut(code) {
                sec.closes = bars.iter().map(|b| (b.date, b.close)).collect();
                sec.closes.sort_by_key(|&(d, _)| d);
            }
        }

        for sec in securities.values_mut() {
            sec.rows.sort_by_key(|r| r.date);
        }

        Self { securities }
    }

    /// Securities where a MACD golden cross and an RSI buy signal landed on
    /// the same trading date within `window_days` of `as_of`. Reports the
    /// most recent such date per security.
    pub fn golden_cross_with_rsi_buy(&self, as_of: NaiveDate, window_days: i64) -> Vec<SignalHit> {
        let cutoff = as_of - Duration::days(window_days);
        let mut hits = Vec::new();
        for (code, sec) in &self.securities {
            let rows = sec.rows_through(as_of);
            let found = rows.iter().rev().find(|r| {
                r.date >= cutoff
                    && r.macd_cross == Some(CrossSignal::Golden)
                    && r.rsi_signal == Some(RsiSignal::Buy)
            });
            if let Some(row) = found {
                hits.push(SignalHit {
                    code: code.clone(),
                    name: sec.name.clone(),
                    date: row.date,
                });
            }
        }
        ordered(hits)
    }

    /// Securities whose most recent MACD golden cross within `window_days`
    /// still holds: the current close exceeds the cross-date close, the
    /// histogram has stayed non-negative since the cross, and the 5-day
    /// average remains above the 20-day. Reports the cross date.
    pub fn sustained_golden_cross(&self, as_of: NaiveDate, window_days: i64) -> Vec<SignalHit> {
        let cutoff = as_of - Duration::days(window_days);
        let mut hits = Vec::new();
        for (code, sec) in &self.securities {
            let rows = sec.rows_through(as_of);
            let latest = match rows.last() {
                Some(r) => r,
                None => continue,
            };
            let cross_idx = match rows
                .iter()
                .rposition(|r| r.date >= cutoff && r.macd_cross == Some(CrossSignal::Golden))
            {
                Some(i) => i,
                None => continue,
            };
            let cross_date = rows[cross_idx].date;
            let held = match (sec.close_on(cross_date), sec.close_on(latest.date)) {
                (Some(cross_close), Some(latest_close)) => latest_close > cross_close,
                _ => false,
            };
            if !held {
                continue;
            }
            let hist_intact = rows[cross_idx..]
                .iter()
                .all(|r| matches!(r.macd_hist, Some(h) if h >= 0.0));
            if !hist_intact {
                continue;
            }
            match (latest.ma5, latest.ma20) {
                (Some(ma5), Some(ma20)) if ma5 > ma20 => {}
                _ => continue,
            }
            hits.push(SignalHit {
                code: code.clone(),
                name: sec.name.clone(),
                date: cross_date,
            });
        }
        ordered(hits)
    }

    /// Securities whose `field` value as of `as_of` exceeds its value
    /// `lookback` trading days prior. Securities with too little history or
    /// a null value at either end are skipped. Reports the current date.
    pub fn trend_continuation(
        &self,
        field: TrendField,
        lookback: usize,
        as_of: NaiveDate,
    ) -> Vec<SignalHit> {
        let mut hits = Vec::new();
        for (code, sec) in &self.securities {
            let rows = sec.rows_through(as_of);
            if rows.len() <= lookback {
                continue;
            }
            let current = &rows[rows.len() - 1];
            let prior = &rows[rows.len() - 1 - lookback];
            let pair = (
                field_value(sec, current, field),
                field_value(sec, prior, field),
            );
            if let (Some(now), Some(then)) = pair {
                if now > then {
                    hits.push(SignalHit {
                        code: code.clone(),
                        name: sec.name.clone(),
                        date: current.date,
                    });
                }
            }
        }
        ordered(hits)
    }
}

fn field_value(sec: &Security, row: &IndicatorRow, field: TrendField) -> Option<f64> {
    match field {
        TrendField::Close => sec.close_on(row.date),
        TrendField::Ma5 => row.ma5,
        TrendField::Ma20 => row.ma20,
        TrendField::Ma60 => row.ma60,
        TrendField::Ma120 => row.ma120,
        TrendField::Rsi => row.rsi,
        TrendField::MacdHist => row.macd_hist,
    }
}

/// Recency descending, then name ascending; code breaks name ties so the
/// order is total.
fn ordered(mut hits: Vec<SignalHit>) -> Vec<SignalHit> {
    hits.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.code.cmp(&b.code))
    });
    hits
}
