use chrono::NaiveDate;
use rayon::prelude::*;
use stock_core::{AnalysisError, ValuationRecord, ValuationRow, Verdict};

use crate::config::{performance_adjustment, ValuationConfig};

/// Blends three independent fair-value estimates (residual income,
/// industry multiple, growth multiple) into one conservative per-security
/// estimate and classifies the gap to the market price.
pub struct ValuationEngine {
    config: ValuationConfig,
}

impl ValuationEngine {
    pub fn new(config: ValuationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValuationConfig {
        &self.config
    }

    /// Evaluate one security.
    ///
    /// A forward ROE, forward BPS and current price are required before
    /// anything is attempted; each sub-model then contributes only when
    /// its own preconditions hold. A record where no sub-model produces a
    /// positive estimate yields `NotEvaluable`, never a zero fair value.
    pub fn evaluate(
        &self,
        record: &ValuationRecord,
        date: NaiveDate,
    ) -> Result<ValuationRow, AnalysisError> {
        let current_price = require(record, record.current_price, "current_price")?;
        let roe_pred = require(record, record.roe_pred, "roe_pred")?;
        let bps_pred = require(record, record.bps_pred, "bps_pred")?;

        let eps_growth_rate = growth_rate(record.eps, record.eps_pred);
        let bps_growth_rate = growth_rate(record.bps, record.bps_pred);
        let roe_growth_rate = growth_rate(record.roe, record.roe_pred);

        let fair_value_rim = self.fair_value_rim(roe_pred, bps_pred);
        let fair_value_industry = self.fair_value_industry(record.eps_pred, record.industry_per);
        let fair_value_pegr = self.fair_value_pegr(record.eps_pred, eps_growth_rate);

        let blended = self
            .blend(&[
                (fair_value_rim, self.config.weight_rim),
                (fair_value_industry, self.config.weight_industry),
                (fair_value_pegr, self.config.weight_pegr),
            ])
            .ok_or_else(|| {
                AnalysisError::NotEvaluable(format!(
                    "{}: no sub-model produced a positive estimate",
                    record.code
                ))
            })?;
        let base_fair_value = blended * self.config.haircut;

        let perf_adjustment = [
            record.perf_yoy.as_deref(),
            record.perf_vs_3m_ago.as_deref(),
            record.perf_vs_consensus.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(performance_adjustment)
        .product::<f64>();
        let fair_value = base_fair_value * perf_adjustment;
        // A degenerate haircut or adjustment can zero out an otherwise
        // positive blend; the discrepancy division needs a positive price.
        if fair_value <= 0.0 {
            return Err(AnalysisError::NotEvaluable(format!(
                "{}: non-positive fair value {}",
                record.code, fair_value
            )));
        }

        let discrepancy_ratio = (current_price - fair_value) * 100.0 / fair_value;
        let verdict = if discrepancy_ratio < self.config.undervalued_threshold {
            Verdict::Undervalued
        } else if discrepancy_ratio > self.config.overvalued_threshold {
            Verdict::Overvalued
        } else {
            Verdict::Fair
        };

        let peg_ratio = match record.per {
            Some(per) if per > 0.0 && eps_growth_rate > self.config.pegr_min_growth => {
                Some(per / eps_growth_rate)
            }
            _ => None,
        };

        Ok(ValuationRow {
            code: record.code.clone(),
            date,
            fair_value,
            current_price,
            discrepancy_ratio,
            eps_growth_rate,
            bps_growth_rate,
            roe_growth_rate,
            peg_ratio,
            verdict,
            fair_value_rim,
            fair_value_industry,
            fair_value_pegr,
            base_fair_value,
            perf_adjustment,
        })
    }

    /// Evaluate many securities in one pass. Securities are independent
    /// and processed in parallel; a record that cannot be evaluated is
    /// logged and skipped without aborting the batch.
    pub fn evaluate_batch(&self, records: &[ValuationRecord], date: NaiveDate) -> Vec<ValuationRow> {
        records
            .par_iter()
            .filter_map(|record| match self.evaluate(record, date) {
                Ok(row) => Some(row),
                Err(e) => {
                    tracing::debug!("{}: skipping valuation: {}", record.code, e);
                    None
                }
            })
            .collect()
    }

    /// Residual-income estimate: forward book value plus the excess return
    /// over the hurdle rate, capitalized at the hurdle rate.
    fn fair_value_rim(&self, roe_pred: f64, bps_pred: f64) -> Option<f64> {
        let hurdle = self.config.required_roe / 100.0;
        if roe_pred < 0.0 || bps_pred <= 0.0 || hurdle <= 0.0 {
            return None;
        }
        let excess_profit_per_share = (roe_pred / 100.0 - hurdle) * bps_pred;
        positive(bps_pred + excess_profit_per_share / hurdle)
    }

    /// Industry-multiple estimate: forward EPS at the industry PER.
    fn fair_value_industry(&self, eps_pred: Option<f64>, industry_per: Option<f64>) -> Option<f64> {
        let (eps_pred, industry_per) = (eps_pred?, industry_per?);
        (eps_pred > 0.0 && industry_per > 0.0).then(|| eps_pred * industry_per)
    }

    /// Growth-multiple estimate: forward EPS at a multiple equal to the
    /// EPS growth percentage, trusted only inside the configured band.
    fn fair_value_pegr(&self, eps_pred: Option<f64>, eps_growth_rate: f64) -> Option<f64> {
        let eps_pred = eps_pred?;
        (eps_pred > 0.0
            && eps_growth_rate > self.config.pegr_min_growth
            && eps_growth_rate < self.config.pegr_max_growth)
            .then(|| eps_growth_rate * eps_pred)
    }

    /// Weighted average over the contributing sub-models only: an excluded
    /// model's weight leaves both numerator and denominator. The estimates
    /// deliberately stay on their native scales; rescaling them would
    /// change the observed contract.
    fn blend(&self, estimates: &[(Option<f64>, f64)]) -> Option<f64> {
        let mut numerator = 0.0;
        let mut weight_sum = 0.0;
        for &(estimate, weight) in estimates {
            if let Some(value) = estimate {
                if value > 0.0 && weight > 0.0 {
                    numerator += value * weight;
                    weight_sum += weight;
                }
            }
        }
        (weight_sum > 0.0).then(|| numerator / weight_sum)
    }
}

impl Default for ValuationEngine {
    fn default() -> Self {
        Self::new(ValuationConfig::default())
    }
}

/// Growth of a trailing/forward metric pair in percent; degenerate pairs
/// (absent values, non-positive trailing base) default to zero growth
/// rather than producing a meaningless percentage.
fn growth_rate(trailing: Option<f64>, forward: Option<f64>) -> f64 {
    match (trailing, forward) {
        (Some(trailing), Some(forward)) if trailing > 0.0 => {
            (forward - trailing) / trailing * 100.0
        }
        _ => 0.0,
    }
}

fn positive(value: f64) -> Option<f64> {
    (value > 0.0).then_some(value)
}

fn require(
    record: &ValuationRecord,
    field: Option<f64>,
    name: &str,
) -> Result<f64, AnalysisError> {
    field.ok_or_else(|| AnalysisError::MissingInput(format!("{}: {}", record.code, name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stock_core::Verdict;

    fn eval_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()
    }

    fn full_record() -> ValuationRecord {
        ValuationRecord {
            code: "005930".to_string(),
            current_price: Some(10_500.0),
            eps: Some(100.0),
            eps_pred: Some(120.0),
            bps: None,
            bps_pred: Some(10_000.0),
            roe: None,
            roe_pred: Some(10.0),
            per: Some(8.0),
            industry_per: Some(15.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_worked_example_all_three_models() {
        let engine = ValuationEngine::default();
        let row = engine.evaluate(&full_record(), eval_date()).unwrap();

        // RIM: 10000 + (0.10 - 0.08) * 10000 / 0.08 = 12500
        assert!((row.fair_value_rim.unwrap() - 12_500.0).abs() < 1e-9);
        // Industry: 120 * 15 = 1800
        assert!((row.fair_value_industry.unwrap() - 1_800.0).abs() < 1e-9);
        // PEGR: growth 20% in (5, 50) band: 20 * 120 = 2400
        assert!((row.eps_growth_rate - 20.0).abs() < 1e-9);
        assert!((row.fair_value_pegr.unwrap() - 2_400.0).abs() < 1e-9);

        // Blend at 0.6/0.2/0.2 = 8340; haircut 0.8 = 6672
        assert!((row.base_fair_value - 6_672.0).abs() < 1e-9);
        assert!((row.fair_value - 6_672.0).abs() < 1e-9);

        assert!((row.discrepancy_ratio - 57.374).abs() < 0.01);
        assert_eq!(row.verdict, Verdict::Overvalued);

        // PEG = PER / growth
        assert!((row.peg_ratio.unwrap() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_missing_required_fields_reject_without_panic() {
        let engine = ValuationEngine::default();

        let mut record = full_record();
        record.roe_pred = None;
        assert!(matches!(
            engine.evaluate(&record, eval_date()),
            Err(AnalysisError::MissingInput(_))
        ));

        let mut record = full_record();
        record.bps_pred = None;
        assert!(engine.evaluate(&record, eval_date()).is_err());

        let mut record = full_record();
        record.current_price = None;
        assert!(engine.evaluate(&record, eval_date()).is_err());
    }

    #[test]
    fn test_all_models_excluded_is_not_evaluable() {
        let engine = ValuationEngine::default();
        // ROE at exactly the zero bound collapses the RIM estimate to the
        // non-positive side; without a forward EPS the other two models
        // have nothing to price.
        let record = ValuationRecord {
            code: "000660".to_string(),
            current_price: Some(5_000.0),
            roe_pred: Some(0.0),
            bps_pred: Some(10_000.0),
            ..Default::default()
        };

        assert!(matches!(
            engine.evaluate(&record, eval_date()),
            Err(AnalysisError::NotEvaluable(_))
        ));
    }

    #[test]
    fn test_zero_haircut_is_not_evaluable() {
        let engine = ValuationEngine::new(ValuationConfig {
            haircut: 0.0,
            ..ValuationConfig::default()
        });

        assert!(matches!(
            engine.evaluate(&full_record(), eval_date()),
            Err(AnalysisError::NotEvaluable(_))
        ));
    }

    #[test]
    fn test_blend_renormalizes_over_contributors() {
        let engine = ValuationEngine::default();
        // Only the industry model contributes: its weight ratio is 1, so
        // the pre-haircut blend equals the industry estimate exactly.
        let record = ValuationRecord {
            code: "035720".to_string(),
            current_price: Some(820.0),
            roe_pred: Some(0.0),
            bps_pred: Some(10_000.0),
            eps_pred: Some(100.0),
            industry_per: Some(10.0),
            ..Default::default()
        };

        let row = engine.evaluate(&record, eval_date()).unwrap();
        assert!(row.fair_value_rim.is_none());
        assert!(row.fair_value_pegr.is_none());
        assert!((row.fair_value_industry.unwrap() - 1_000.0).abs() < 1e-12);
        // 1000 * 0.2 / 0.2, then haircut 0.8
        assert!((row.base_fair_value - 800.0).abs() < 1e-12);
    }

    #[test]
    fn test_classification_boundaries_are_strict() {
        let engine = ValuationEngine::default();
        // Industry-only record with fair value exactly 800.
        let base = ValuationRecord {
            code: "035420".to_string(),
            roe_pred: Some(0.0),
            bps_pred: Some(10_000.0),
            eps_pred: Some(100.0),
            industry_per: Some(10.0),
            ..Default::default()
        };

        let mut at_low = base.clone();
        at_low.current_price = Some(720.0); // exactly -10%
        let row = engine.evaluate(&at_low, eval_date()).unwrap();
        assert_eq!(row.discrepancy_ratio, -10.0);
        assert_eq!(row.verdict, Verdict::Fair);

        let mut at_high = base.clone();
        at_high.current_price = Some(880.0); // exactly +10%
        let row = engine.evaluate(&at_high, eval_date()).unwrap();
        assert_eq!(row.discrepancy_ratio, 10.0);
        assert_eq!(row.verdict, Verdict::Fair);

        let mut below = base.clone();
        below.current_price = Some(719.0);
        assert_eq!(
            engine.evaluate(&below, eval_date()).unwrap().verdict,
            Verdict::Undervalued
        );

        let mut above = base;
        above.current_price = Some(881.0);
        assert_eq!(
            engine.evaluate(&above, eval_date()).unwrap().verdict,
            Verdict::Overvalued
        );
    }

    #[test]
    fn test_pegr_band_is_exclusive() {
        let engine = ValuationEngine::default();

        // Growth exactly at the lower bound: excluded.
        let mut record = full_record();
        record.eps = Some(100.0);
        record.eps_pred = Some(105.0); // 5%
        let row = engine.evaluate(&record, eval_date()).unwrap();
        assert!(row.fair_value_pegr.is_none());
        assert!(row.peg_ratio.is_none());

        // Growth above the upper bound: excluded.
        let mut record = full_record();
        record.eps_pred = Some(160.0); // 60%
        let row = engine.evaluate(&record, eval_date()).unwrap();
        assert!(row.fair_value_pegr.is_none());
    }

    #[test]
    fn test_growth_rate_guards_degenerate_bases() {
        assert_eq!(growth_rate(None, Some(120.0)), 0.0);
        assert_eq!(growth_rate(Some(0.0), Some(120.0)), 0.0);
        assert_eq!(growth_rate(Some(-50.0), Some(120.0)), 0.0);
        assert_eq!(growth_rate(Some(100.0), None), 0.0);
        assert!((growth_rate(Some(100.0), Some(120.0)) - 20.0).abs() < 1e-12);
        // Forward values may fall below the trailing base.
        assert!((growth_rate(Some(100.0), Some(80.0)) + 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_performance_tokens_compose_multiplicatively() {
        let engine = ValuationEngine::default();
        let mut record = full_record();
        record.perf_yoy = Some("상회".to_string());
        record.perf_vs_consensus = Some("컨센하회".to_string());

        let row = engine.evaluate(&record, eval_date()).unwrap();
        assert!((row.perf_adjustment - 0.99).abs() < 1e-9);
        assert!((row.fair_value - row.base_fair_value * 0.99).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_performance_token_is_neutral() {
        let engine = ValuationEngine::default();
        let mut record = full_record();
        record.perf_yoy = Some("신규".to_string());
        record.perf_vs_3m_ago = Some("유지".to_string());

        let row = engine.evaluate(&record, eval_date()).unwrap();
        assert_eq!(row.perf_adjustment, 1.0);
        assert_eq!(row.fair_value, row.base_fair_value);
    }

    #[test]
    fn test_batch_continues_past_failures() {
        let engine = ValuationEngine::default();
        let mut broken = full_record();
        broken.code = "999999".to_string();
        broken.roe_pred = None;

        let records = vec![full_record(), broken, full_record()];
        let rows = engine.evaluate_batch(&records, eval_date());

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.code == "005930"));
    }
}
