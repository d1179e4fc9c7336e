//! Performance Management Chart (PMC)
//!
//! The athlete's load history is an append-only, contiguous sequence of daily
//! [`PmcPoint`]s. Every point depends on its predecessor, so a correction to a
//! past day recomputes the whole suffix from that day forward. All mutating
//! operations take the prior history by reference and return a new sequence;
//! on error the prior history is untouched.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AnalyticsError, CorrectionError, OrderingError, Result};

/// Load state for one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PmcPoint {
    pub date: NaiveDate,

    /// Training Stress Score for the day (0 on rest days)
    pub tss: Decimal,

    /// Chronic Training Load (fitness)
    pub ctl: Decimal,

    /// Acute Training Load (fatigue)
    pub atl: Decimal,

    /// Training Stress Balance (form), ctl - atl
    pub tsb: Decimal,
}

/// Load totals for one ISO week (Monday to Sunday)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyAggregate {
    /// Monday of the week
    pub week_start: NaiveDate,

    /// ISO week-numbering year
    pub iso_year: i32,

    /// ISO week number (1-53)
    pub week_number: u32,

    pub total_tss: Decimal,

    /// Days of this week present in the history
    pub days_completed: u32,

    /// Total extrapolated to a full week
    pub projected_tss: Decimal,
}

/// PMC configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PmcConfig {
    /// CTL time constant in days (default: 42)
    pub ctl_time_constant: u16,

    /// ATL time constant in days (default: 7)
    pub atl_time_constant: u16,

    /// TSB above this is fresh
    pub fresh_threshold: Decimal,

    /// TSB at or below this is overreaching
    pub overreaching_threshold: Decimal,

    /// ACWR acute window in days
    pub acute_window_days: u16,

    /// ACWR chronic window in days
    pub chronic_window_days: u16,

    /// Weeks averaged for the weekly load trend
    pub trend_weeks: u16,
}

impl Default for PmcConfig {
    fn default() -> Self {
        Self {
            ctl_time_constant: 42,
            atl_time_constant: 7,
            fresh_threshold: dec!(5),
            overreaching_threshold: dec!(-10),
            acute_window_days: 7,
            chronic_window_days: 28,
            trend_weeks: 8,
        }
    }
}

/// Form banding derived from TSB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormStatus {
    Fresh,
    Neutral,
    Overreaching,
}

impl FormStatus {
    pub fn color(&self) -> &'static str {
        match self {
            FormStatus::Fresh => "green",
            FormStatus::Neutral => "yellow",
            FormStatus::Overreaching => "red",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            FormStatus::Fresh => "Fresh - well recovered, ready to perform",
            FormStatus::Neutral => "Neutral - productive training balance",
            FormStatus::Overreaching => "Overreaching - accumulated fatigue, recovery needed",
        }
    }

    pub fn is_overreaching(&self) -> bool {
        matches!(self, FormStatus::Overreaching)
    }
}

impl std::fmt::Display for FormStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FormStatus::Fresh => "Fresh",
            FormStatus::Neutral => "Neutral",
            FormStatus::Overreaching => "Overreaching",
        };
        write!(f, "{}", name)
    }
}

/// Injury-risk banding of the acute:chronic workload ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcwrStatus {
    Undertrained,
    Optimal,
    Caution,
    HighRisk,
}

impl AcwrStatus {
    pub fn from_ratio(ratio: Decimal) -> Self {
        if ratio < dec!(0.8) {
            AcwrStatus::Undertrained
        } else if ratio <= dec!(1.3) {
            AcwrStatus::Optimal
        } else if ratio <= dec!(1.5) {
            AcwrStatus::Caution
        } else {
            AcwrStatus::HighRisk
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcwrReading {
    /// Mean daily TSS over the acute window
    pub acute_load: Decimal,
    /// Mean daily TSS over the chronic window
    pub chronic_load: Decimal,
    pub ratio: Decimal,
    pub status: AcwrStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Increasing,
    Stable,
    Decreasing,
}

/// Current week's projection against the trailing weekly average
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadTrend {
    pub current_projection: Decimal,
    pub trailing_average: Decimal,
    pub direction: TrendDirection,
    pub weeks_considered: usize,
}

/// Snapshot of the latest load state with derived views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PmcSummary {
    pub latest: PmcPoint,
    pub form: FormStatus,
    pub acwr: Option<AcwrReading>,
    /// Week-over-week change of total TSS in percent
    pub ramp_rate_pct: Option<Decimal>,
    pub trend: Option<LoadTrend>,
    pub days_tracked: usize,
}

/// Core PMC calculation engine
pub struct TrainingLoadEngine {
    config: PmcConfig,
}

impl TrainingLoadEngine {
    /// Create engine with default configuration
    pub fn new() -> Self {
        Self {
            config: PmcConfig::default(),
        }
    }

    /// Create engine with custom configuration
    pub fn with_config(config: PmcConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PmcConfig {
        &self.config
    }

    /// One day of the recursion; `None` is the cold start (ctl = atl = 0)
    pub fn step(&self, previous: Option<&PmcPoint>, date: NaiveDate, tss: Decimal) -> PmcPoint {
        let (prev_ctl, prev_atl) = previous.map_or((Decimal::ZERO, Decimal::ZERO), |p| (p.ctl, p.atl));

        // X_today = X_yesterday + (TSS_today - X_yesterday) / time_constant
        let ctl = prev_ctl + (tss - prev_ctl) / Decimal::from(self.config.ctl_time_constant.max(1));
        let atl = prev_atl + (tss - prev_atl) / Decimal::from(self.config.atl_time_constant.max(1));

        PmcPoint {
            date,
            tss,
            ctl,
            atl,
            tsb: ctl - atl,
        }
    }

    /// Record TSS for `date`, returning the extended history
    ///
    /// A date equal to the last point adds to that day. A later date fills
    /// the gap with rest days. An earlier date is rejected; use
    /// [`TrainingLoadEngine::correct_day`] to change the past.
    pub fn advance(&self, prior: &[PmcPoint], tss: Decimal, date: NaiveDate) -> Result<Vec<PmcPoint>> {
        validate_tss(tss)?;
        Self::validate_history(prior)?;

        let Some(last) = prior.last() else {
            debug!(%date, %tss, "Starting new PMC history");
            return Ok(vec![self.step(None, date, tss)]);
        };

        if date < last.date {
            return Err(OrderingError::DateInPast {
                date,
                last: last.date,
            }
            .into());
        }

        if date == last.date {
            let mut series = prior[..prior.len() - 1].to_vec();
            let point = self.step(series.last(), date, add_tss(last.tss, tss)?);
            series.push(point);
            return Ok(series);
        }

        let mut series = Vec::with_capacity(prior.len() + 1);
        series.extend_from_slice(prior);

        let mut day = next_day(last.date)?;
        let mut rest_days = 0usize;
        while day < date {
            let point = self.step(series.last(), day, Decimal::ZERO);
            series.push(point);
            rest_days += 1;
            day = next_day(day)?;
        }
        let point = self.step(series.last(), date, tss);
        series.push(point);

        if rest_days > 0 {
            debug!(rest_days, %date, "Filled rest days before new entry");
        }

        Ok(series)
    }

    /// Replace the TSS of a past day and recompute everything after it
    pub fn correct_day(&self, prior: &[PmcPoint], date: NaiveDate, tss: Decimal) -> Result<Vec<PmcPoint>> {
        self.apply_corrections(prior, &[(date, tss)])
    }

    /// Apply several corrections with a single suffix recompute
    ///
    /// Every correction is validated before anything is recomputed. When a
    /// date appears more than once the last value wins.
    pub fn apply_corrections(
        &self,
        prior: &[PmcPoint],
        corrections: &[(NaiveDate, Decimal)],
    ) -> Result<Vec<PmcPoint>> {
        let (Some(first), Some(last)) = (prior.first(), prior.last()) else {
            return Err(CorrectionError::EmptyHistory.into());
        };
        Self::validate_history(prior)?;

        let mut overrides = BTreeMap::new();
        for &(date, tss) in corrections {
            validate_tss(tss)?;
            if date < first.date || date > last.date {
                return Err(CorrectionError::DateOutOfRange {
                    date,
                    first: first.date,
                    last: last.date,
                }
                .into());
            }
            overrides.insert(date, tss);
        }

        let Some((&earliest, _)) = overrides.iter().next() else {
            return Ok(prior.to_vec());
        };

        // History is contiguous, so the offset in days is the index
        let start = (earliest - first.date).num_days() as usize;

        let mut series = Vec::with_capacity(prior.len());
        series.extend_from_slice(&prior[..start]);
        for point in &prior[start..] {
            let tss = overrides.get(&point.date).copied().unwrap_or(point.tss);
            let recomputed = self.step(series.last(), point.date, tss);
            series.push(recomputed);
        }

        info!(
            corrections = overrides.len(),
            from = %earliest,
            recomputed_days = prior.len() - start,
            "Recomputed PMC suffix"
        );

        Ok(series)
    }

    /// Check that history is one point per consecutive calendar day
    pub fn validate_history(series: &[PmcPoint]) -> Result<()> {
        for (index, pair) in series.windows(2).enumerate() {
            let expected = next_day(pair[0].date)?;
            if pair[1].date != expected {
                return Err(OrderingError::NonContiguousHistory {
                    index: index + 1,
                    expected,
                    found: pair[1].date,
                }
                .into());
            }
        }
        Ok(())
    }

    pub fn form_status(&self, point: &PmcPoint) -> FormStatus {
        if point.tsb > self.config.fresh_threshold {
            FormStatus::Fresh
        } else if point.tsb > self.config.overreaching_threshold {
            FormStatus::Neutral
        } else {
            FormStatus::Overreaching
        }
    }

    /// Acute:chronic workload ratio ending at the latest point
    ///
    /// Days before the start of history count as rest days. `None` when the
    /// chronic window holds no training day.
    pub fn acwr(&self, series: &[PmcPoint]) -> Option<AcwrReading> {
        let acute_days = usize::from(self.config.acute_window_days.max(1));
        let chronic_days = usize::from(self.config.chronic_window_days.max(1));

        let window_sum = |days: usize| -> Option<Decimal> {
            series
                .iter()
                .rev()
                .take(days)
                .try_fold(Decimal::ZERO, |acc, p| acc.checked_add(p.tss))
        };

        let trained_days = series
            .iter()
            .rev()
            .take(chronic_days)
            .filter(|p| p.tss > Decimal::ZERO)
            .count();
        if trained_days == 0 {
            return None;
        }

        let acute_load = window_sum(acute_days)? / Decimal::from(acute_days as u64);
        let chronic_load = window_sum(chronic_days)? / Decimal::from(chronic_days as u64);
        let ratio = acute_load.checked_div(chronic_load)?;

        Some(AcwrReading {
            acute_load,
            chronic_load,
            ratio,
            status: AcwrStatus::from_ratio(ratio),
        })
    }

    /// Percent change of the current ISO week's total over the previous week
    pub fn ramp_rate(&self, series: &[PmcPoint]) -> Option<Decimal> {
        let weeks = aggregate_weekly(series).ok()?;
        let [.., previous, current] = weeks.as_slice() else {
            return None;
        };

        if previous.total_tss <= Decimal::ZERO {
            return None;
        }

        current
            .total_tss
            .checked_sub(previous.total_tss)?
            .checked_div(previous.total_tss)?
            .checked_mul(dec!(100))
    }

    /// Compare the last week's projection against the trailing weeks
    pub fn weekly_trend(&self, weeks: &[WeeklyAggregate]) -> Option<LoadTrend> {
        let (current, earlier) = weeks.split_last()?;
        let trailing: Vec<&WeeklyAggregate> = earlier
            .iter()
            .rev()
            .take(usize::from(self.config.trend_weeks))
            .collect();

        if trailing.is_empty() {
            return None;
        }

        let trailing_total = trailing
            .iter()
            .try_fold(Decimal::ZERO, |acc, w| acc.checked_add(w.total_tss))?;
        let trailing_average = trailing_total / Decimal::from(trailing.len() as u64);

        Some(LoadTrend {
            current_projection: current.projected_tss,
            trailing_average,
            direction: Self::determine_trend(trailing_average, current.projected_tss),
            weeks_considered: trailing.len(),
        })
    }

    /// Determine trend direction between two values
    fn determine_trend(start: Decimal, end: Decimal) -> TrendDirection {
        let change_threshold = dec!(0.05); // 5% threshold
        let percent_change = (end - start) / start.abs().max(Decimal::ONE);

        if percent_change > change_threshold {
            TrendDirection::Increasing
        } else if percent_change < -change_threshold {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        }
    }

    pub fn summarize(&self, series: &[PmcPoint]) -> Option<PmcSummary> {
        let latest = series.last()?.clone();
        let trend = aggregate_weekly(series)
            .ok()
            .and_then(|weeks| self.weekly_trend(&weeks));

        Some(PmcSummary {
            form: self.form_status(&latest),
            acwr: self.acwr(series),
            ramp_rate_pct: self.ramp_rate(series),
            trend,
            days_tracked: series.len(),
            latest,
        })
    }
}

impl Default for TrainingLoadEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Advance a history by one day's TSS with the default time constants
pub fn advance_training_load(prior: &[PmcPoint], tss: Decimal, date: NaiveDate) -> Result<Vec<PmcPoint>> {
    TrainingLoadEngine::new().advance(prior, tss, date)
}

/// Group a PMC series into ISO weeks
///
/// Weeks are keyed by ISO year and week number, so the days around New Year
/// that belong to week 1 or week 53 of a neighbouring year stay together.
pub fn aggregate_weekly(series: &[PmcPoint]) -> Result<Vec<WeeklyAggregate>> {
    let mut weeks: Vec<WeeklyAggregate> = Vec::new();

    for point in series {
        let iso = point.date.iso_week();
        match weeks.last_mut() {
            Some(week) if week.iso_year == iso.year() && week.week_number == iso.week() => {
                week.total_tss = add_tss(week.total_tss, point.tss)?;
                week.days_completed += 1;
            }
            _ => {
                let offset = i64::from(point.date.weekday().num_days_from_monday());
                weeks.push(WeeklyAggregate {
                    week_start: point.date - chrono::Duration::days(offset),
                    iso_year: iso.year(),
                    week_number: iso.week(),
                    total_tss: point.tss,
                    days_completed: 1,
                    projected_tss: Decimal::ZERO,
                });
            }
        }
    }

    for week in &mut weeks {
        week.projected_tss = if week.days_completed > 0 {
            week.total_tss
                .checked_mul(Decimal::from(7))
                .ok_or_else(|| tss_overflow(week.total_tss, Decimal::from(7)))?
                / Decimal::from(week.days_completed)
        } else {
            Decimal::ZERO
        };
    }

    Ok(weeks)
}

/// Owned load history for one athlete
///
/// Mutations replace the stored sequence only when the whole update succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PmcHistory {
    athlete_id: String,
    points: Vec<PmcPoint>,
}

impl PmcHistory {
    pub fn new(athlete_id: impl Into<String>) -> Self {
        Self {
            athlete_id: athlete_id.into(),
            points: Vec::new(),
        }
    }

    pub fn from_points(athlete_id: impl Into<String>, points: Vec<PmcPoint>) -> Result<Self> {
        TrainingLoadEngine::validate_history(&points)?;
        Ok(Self {
            athlete_id: athlete_id.into(),
            points,
        })
    }

    pub fn athlete_id(&self) -> &str {
        &self.athlete_id
    }

    pub fn points(&self) -> &[PmcPoint] {
        &self.points
    }

    pub fn latest(&self) -> Option<&PmcPoint> {
        self.points.last()
    }

    pub fn advance(&mut self, engine: &TrainingLoadEngine, date: NaiveDate, tss: Decimal) -> Result<()> {
        self.points = engine.advance(&self.points, tss, date)?;
        Ok(())
    }

    pub fn correct_day(&mut self, engine: &TrainingLoadEngine, date: NaiveDate, tss: Decimal) -> Result<()> {
        self.points = engine.correct_day(&self.points, date, tss)?;
        Ok(())
    }

    pub fn apply_corrections(
        &mut self,
        engine: &TrainingLoadEngine,
        corrections: &[(NaiveDate, Decimal)],
    ) -> Result<()> {
        self.points = engine.apply_corrections(&self.points, corrections)?;
        Ok(())
    }

    pub fn weekly(&self) -> Result<Vec<WeeklyAggregate>> {
        aggregate_weekly(&self.points)
    }

    pub fn summary(&self, engine: &TrainingLoadEngine) -> Option<PmcSummary> {
        engine.summarize(&self.points)
    }
}

fn validate_tss(tss: Decimal) -> Result<()> {
    if tss < Decimal::ZERO {
        return Err(AnalyticsError::Validation(format!(
            "TSS must be non-negative, got {}",
            tss
        )));
    }
    Ok(())
}

fn add_tss(total: Decimal, tss: Decimal) -> Result<Decimal> {
    total.checked_add(tss).ok_or_else(|| tss_overflow(total, tss))
}

fn tss_overflow(total: Decimal, tss: Decimal) -> AnalyticsError {
    AnalyticsError::Validation(format!("TSS total overflows: {} + {}", total, tss))
}

fn next_day(date: NaiveDate) -> Result<NaiveDate> {
    date.succ_opt()
        .ok_or_else(|| CorrectionError::DateOverflow { date }.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use rust_decimal::prelude::ToPrimitive;

    fn day(d: u32) -> NaiveDate {
        // 2024-09-02 is a Monday
        NaiveDate::from_ymd_opt(2024, 9, 2).unwrap() + chrono::Duration::days(i64::from(d))
    }

    fn history(tss: &[Decimal]) -> Vec<PmcPoint> {
        let engine = TrainingLoadEngine::new();
        let mut series = Vec::new();
        for (i, value) in tss.iter().enumerate() {
            series = engine.advance(&series, *value, day(i as u32)).unwrap();
        }
        series
    }

    #[test]
    fn test_cold_start() {
        let series = advance_training_load(&[], dec!(100), day(0)).unwrap();
        assert_eq!(series.len(), 1);

        let point = &series[0];
        assert_eq!(point.ctl.round_dp(2), dec!(2.38));
        assert_eq!(point.atl.round_dp(2), dec!(14.29));
        assert_eq!(point.tsb.round_dp(1), dec!(-11.9));
        assert_eq!(point.tsb, point.ctl - point.atl);
    }

    #[test]
    fn test_form_status_bands() {
        let engine = TrainingLoadEngine::new();
        let point = |tsb: Decimal| PmcPoint {
            date: day(0),
            tss: Decimal::ZERO,
            ctl: Decimal::ZERO,
            atl: -tsb,
            tsb,
        };

        assert_eq!(engine.form_status(&point(dec!(5.1))), FormStatus::Fresh);
        assert_eq!(engine.form_status(&point(dec!(5))), FormStatus::Neutral);
        assert_eq!(engine.form_status(&point(dec!(-9.9))), FormStatus::Neutral);
        assert_eq!(engine.form_status(&point(dec!(-10))), FormStatus::Overreaching);
        assert!(engine.form_status(&point(dec!(-25))).is_overreaching());
        assert_eq!(FormStatus::Overreaching.color(), "red");
        assert_eq!(FormStatus::Fresh.color(), "green");
    }

    #[test]
    fn test_cold_start_is_overreaching() {
        let engine = TrainingLoadEngine::new();
        let series = engine.advance(&[], dec!(100), day(0)).unwrap();
        assert_eq!(engine.form_status(&series[0]), FormStatus::Overreaching);
    }

    #[test]
    fn test_same_day_adds_tss() {
        let engine = TrainingLoadEngine::new();
        let series = engine.advance(&[], dec!(60), day(0)).unwrap();
        let series = engine.advance(&series, dec!(40), day(0)).unwrap();

        assert_eq!(series.len(), 1);
        assert_eq!(series[0].tss, dec!(100));
        assert_eq!(series[0], engine.step(None, day(0), dec!(100)));
    }

    #[test]
    fn test_gap_filled_with_rest_days() {
        let engine = TrainingLoadEngine::new();
        let series = engine.advance(&[], dec!(80), day(0)).unwrap();
        let series = engine.advance(&series, dec!(50), day(4)).unwrap();

        assert_eq!(series.len(), 5);
        assert!(series[1..4].iter().all(|p| p.tss == Decimal::ZERO));
        assert!(series[3].ctl < series[0].ctl);
        assert_eq!(series[4].tss, dec!(50));
        TrainingLoadEngine::validate_history(&series).unwrap();
    }

    #[test]
    fn test_date_in_past_rejected() {
        let series = history(&[dec!(50), dec!(60)]);
        let err = advance_training_load(&series, dec!(10), day(0)).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::InputOrdering);
    }

    #[test]
    fn test_negative_tss_rejected() {
        let err = advance_training_load(&[], dec!(-5), day(0)).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::InvalidInput);
    }

    #[test]
    fn test_non_contiguous_history_rejected() {
        let mut series = history(&[dec!(50), dec!(60), dec!(70)]);
        series.remove(1);

        let err = advance_training_load(&series, dec!(10), day(5)).unwrap_err();
        match err {
            AnalyticsError::Ordering(OrderingError::NonContiguousHistory { index, expected, found }) => {
                assert_eq!(index, 1);
                assert_eq!(expected, day(1));
                assert_eq!(found, day(2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_correction_recomputes_suffix() {
        let engine = TrainingLoadEngine::new();
        let original = history(&[dec!(50), dec!(60), dec!(70), dec!(0), dec!(90)]);

        let corrected = engine.correct_day(&original, day(1), dec!(120)).unwrap();

        // Prefix untouched, corrected day and everything after recomputed
        assert_eq!(corrected[0], original[0]);
        assert_eq!(corrected[1].tss, dec!(120));
        assert!(corrected[1].ctl > original[1].ctl);
        assert!(corrected[4].ctl > original[4].ctl);
        assert_eq!(corrected[4].tss, original[4].tss);

        // Same as building from scratch with the corrected value
        let rebuilt = history(&[dec!(50), dec!(120), dec!(70), dec!(0), dec!(90)]);
        assert_eq!(corrected, rebuilt);
    }

    #[test]
    fn test_batch_corrections_match_sequential() {
        let engine = TrainingLoadEngine::new();
        let original = history(&[dec!(40), dec!(55), dec!(0), dec!(75), dec!(30), dec!(0)]);

        let batch = engine
            .apply_corrections(&original, &[(day(4), dec!(10)), (day(1), dec!(95))])
            .unwrap();
        let sequential = engine.correct_day(&original, day(1), dec!(95)).unwrap();
        let sequential = engine.correct_day(&sequential, day(4), dec!(10)).unwrap();

        assert_eq!(batch, sequential);
    }

    #[test]
    fn test_correction_out_of_range_is_atomic() {
        let mut pmc = PmcHistory::from_points("athlete-1", history(&[dec!(50), dec!(60)])).unwrap();
        let before = pmc.clone();
        let engine = TrainingLoadEngine::new();

        let err = pmc
            .apply_corrections(&engine, &[(day(0), dec!(100)), (day(9), dec!(20))])
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::CorrectionCascade);
        assert_eq!(pmc, before);

        let err = pmc.correct_day(&engine, day(1), dec!(-1)).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::InvalidInput);
        assert_eq!(pmc, before);
    }

    #[test]
    fn test_correction_on_empty_history() {
        let err = TrainingLoadEngine::new()
            .correct_day(&[], day(0), dec!(10))
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::Correction(CorrectionError::EmptyHistory)));
    }

    #[test]
    fn test_history_wrapper_advances() {
        let engine = TrainingLoadEngine::new();
        let mut pmc = PmcHistory::new("athlete-7");
        pmc.advance(&engine, day(0), dec!(100)).unwrap();
        pmc.advance(&engine, day(2), dec!(40)).unwrap();

        assert_eq!(pmc.athlete_id(), "athlete-7");
        assert_eq!(pmc.points().len(), 3);
        assert_eq!(pmc.latest().unwrap().date, day(2));
        assert!(pmc.advance(&engine, day(1), dec!(10)).is_err());
        assert_eq!(pmc.points().len(), 3);
    }

    #[test]
    fn test_acwr_undefined_without_training() {
        let engine = TrainingLoadEngine::new();
        assert_eq!(engine.acwr(&[]), None);
        assert_eq!(engine.acwr(&history(&[Decimal::ZERO; 10])), None);
    }

    #[test]
    fn test_acwr_steady_load_is_optimal() {
        let engine = TrainingLoadEngine::new();
        let reading = engine.acwr(&history(&[dec!(60); 28])).unwrap();

        assert_eq!(reading.acute_load, dec!(60));
        assert_eq!(reading.chronic_load, dec!(60));
        assert_eq!(reading.ratio, Decimal::ONE);
        assert_eq!(reading.status, AcwrStatus::Optimal);
    }

    #[test]
    fn test_acwr_short_history_counts_rest() {
        // Seven days of 100: acute 100, chronic 700 / 28 = 25
        let reading = TrainingLoadEngine::new().acwr(&history(&[dec!(100); 7])).unwrap();
        assert_eq!(reading.chronic_load, dec!(25));
        assert_eq!(reading.ratio, dec!(4));
        assert_eq!(reading.status, AcwrStatus::HighRisk);
    }

    #[test]
    fn test_acwr_status_bands() {
        assert_eq!(AcwrStatus::from_ratio(dec!(0.79)), AcwrStatus::Undertrained);
        assert_eq!(AcwrStatus::from_ratio(dec!(0.8)), AcwrStatus::Optimal);
        assert_eq!(AcwrStatus::from_ratio(dec!(1.3)), AcwrStatus::Optimal);
        assert_eq!(AcwrStatus::from_ratio(dec!(1.5)), AcwrStatus::Caution);
        assert_eq!(AcwrStatus::from_ratio(dec!(1.51)), AcwrStatus::HighRisk);
    }

    #[test]
    fn test_weekly_aggregation_and_projection() {
        // Full week of 50, then Monday-Wednesday of 60
        let mut tss = vec![dec!(50); 7];
        tss.extend(vec![dec!(60); 3]);
        let weeks = aggregate_weekly(&history(&tss)).unwrap();

        assert_eq!(weeks.len(), 2);
        assert_eq!(weeks[0].week_start, day(0));
        assert_eq!(weeks[0].week_number, 36);
        assert_eq!(weeks[0].total_tss, dec!(350));
        assert_eq!(weeks[0].days_completed, 7);
        assert_eq!(weeks[0].projected_tss, dec!(350));

        assert_eq!(weeks[1].week_start, day(7));
        assert_eq!(weeks[1].total_tss, dec!(180));
        assert_eq!(weeks[1].days_completed, 3);
        assert_eq!(weeks[1].projected_tss, dec!(420));
    }

    #[test]
    fn test_weekly_partial_first_week() {
        // Starts on a Thursday
        let engine = TrainingLoadEngine::new();
        let mut series = Vec::new();
        for offset in 3..10 {
            series = engine.advance(&series, dec!(70), day(offset)).unwrap();
        }
        let weeks = aggregate_weekly(&series).unwrap();

        assert_eq!(weeks[0].week_start, day(0));
        assert_eq!(weeks[0].days_completed, 4);
        assert_eq!(weeks[0].projected_tss, dec!(490));
        assert_eq!(weeks[1].days_completed, 3);
    }

    #[test]
    fn test_weekly_across_new_year() {
        let engine = TrainingLoadEngine::new();

        // 2024-12-30 is the Monday of ISO 2025-W01
        let monday = NaiveDate::from_ymd_opt(2024, 12, 30).unwrap();
        let mut series = Vec::new();
        for offset in 0..7 {
            series = engine
                .advance(&series, dec!(40), monday + chrono::Duration::days(offset))
                .unwrap();
        }
        let weeks = aggregate_weekly(&series).unwrap();
        assert_eq!(weeks.len(), 1);
        assert_eq!(weeks[0].week_start, monday);
        assert_eq!(weeks[0].iso_year, 2025);
        assert_eq!(weeks[0].week_number, 1);
        assert_eq!(weeks[0].days_completed, 7);

        // 2020 has 53 ISO weeks; 2021-01-04 opens 2021-W01
        let thursday = NaiveDate::from_ymd_opt(2020, 12, 31).unwrap();
        let mut series = Vec::new();
        for offset in 0..6 {
            series = engine
                .advance(&series, dec!(40), thursday + chrono::Duration::days(offset))
                .unwrap();
        }
        let weeks = aggregate_weekly(&series).unwrap();
        assert_eq!(weeks.len(), 2);
        assert_eq!((weeks[0].iso_year, weeks[0].week_number), (2020, 53));
        assert_eq!(weeks[0].week_start, NaiveDate::from_ymd_opt(2020, 12, 28).unwrap());
        assert_eq!(weeks[0].days_completed, 4);
        assert_eq!((weeks[1].iso_year, weeks[1].week_number), (2021, 1));
        assert_eq!(weeks[1].week_start, NaiveDate::from_ymd_opt(2021, 1, 4).unwrap());
        assert_eq!(weeks[1].days_completed, 2);
    }

    #[test]
    fn test_tss_overflow_is_rejected() {
        let engine = TrainingLoadEngine::new();
        let series = engine.advance(&[], Decimal::MAX, day(0)).unwrap();

        let err = engine.advance(&series, dec!(1), day(0)).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::InvalidInput);

        let err = aggregate_weekly(&series).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::InvalidInput);

        let series = engine.advance(&series, Decimal::MAX, day(1)).unwrap();
        let history = PmcHistory::from_points("athlete", series).unwrap();
        assert!(history.weekly().is_err());
        let summary = history.summary(&engine).unwrap();
        assert!(summary.trend.is_none());
        assert!(summary.acwr.is_none());
        assert!(summary.ramp_rate_pct.is_none());
    }

    #[test]
    fn test_ramp_rate() {
        let engine = TrainingLoadEngine::new();
        let mut tss = vec![dec!(40); 7];
        tss.extend(vec![dec!(50); 7]);
        assert_eq!(engine.ramp_rate(&history(&tss)), Some(dec!(25)));

        assert_eq!(engine.ramp_rate(&history(&[dec!(40); 7])), None);

        let mut tss = vec![Decimal::ZERO; 7];
        tss.push(dec!(50));
        assert_eq!(engine.ramp_rate(&history(&tss)), None);
    }

    #[test]
    fn test_weekly_trend() {
        let engine = TrainingLoadEngine::new();
        let mut tss = vec![dec!(40); 14];
        tss.extend(vec![dec!(80); 2]);
        let weeks = aggregate_weekly(&history(&tss)).unwrap();

        let trend = engine.weekly_trend(&weeks).unwrap();
        assert_eq!(trend.weeks_considered, 2);
        assert_eq!(trend.trailing_average, dec!(280));
        assert_eq!(trend.current_projection, dec!(560));
        assert_eq!(trend.direction, TrendDirection::Increasing);

        assert!(engine.weekly_trend(&weeks[..1]).is_none());
    }

    #[test]
    fn test_determine_trend_band() {
        assert_eq!(
            TrainingLoadEngine::determine_trend(dec!(100), dec!(104)),
            TrendDirection::Stable
        );
        assert_eq!(
            TrainingLoadEngine::determine_trend(dec!(100), dec!(90)),
            TrendDirection::Decreasing
        );
    }

    #[test]
    fn test_summary() {
        let engine = TrainingLoadEngine::new();
        assert!(engine.summarize(&[]).is_none());

        let series = history(&[dec!(60); 21]);
        let summary = engine.summarize(&series).unwrap();
        assert_eq!(summary.days_tracked, 21);
        assert_eq!(summary.latest, series[20]);
        assert_eq!(summary.ramp_rate_pct, Some(Decimal::ZERO));
        assert!(summary.acwr.is_some());
        assert_eq!(summary.trend.unwrap().direction, TrendDirection::Stable);
    }

    #[test]
    fn test_history_serde() {
        let pmc = PmcHistory::from_points("athlete-3", history(&[dec!(45), dec!(0)])).unwrap();
        let json = serde_json::to_string(&pmc).unwrap();
        let restored: PmcHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, pmc);
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_pmc_recursion(
            prev_ctl in 0i64..200_000,
            prev_atl in 0i64..200_000,
            tss in 0i64..50_000
        ) {
            let engine = TrainingLoadEngine::new();
            let previous = PmcPoint {
                date: day(0),
                tss: Decimal::ZERO,
                ctl: Decimal::new(prev_ctl, 2),
                atl: Decimal::new(prev_atl, 2),
                tsb: Decimal::new(prev_ctl - prev_atl, 2),
            };
            let tss = Decimal::new(tss, 1);
            let point = engine.step(Some(&previous), day(1), tss);

            let (ctl, atl, tss_f) = (
                previous.ctl.to_f64().unwrap(),
                previous.atl.to_f64().unwrap(),
                tss.to_f64().unwrap(),
            );
            prop_assert!((point.ctl.to_f64().unwrap() - (ctl + (tss_f - ctl) / 42.0)).abs() < 1e-9);
            prop_assert!((point.atl.to_f64().unwrap() - (atl + (tss_f - atl) / 7.0)).abs() < 1e-9);
            prop_assert_eq!(point.tsb, point.ctl - point.atl);
        }

        #[test]
        fn test_rest_days_decay(tss in 1i64..500, training_days in 1usize..30) {
            let engine = TrainingLoadEngine::new();
            let mut point = engine.step(None, day(0), Decimal::from(tss));
            for d in 1..training_days {
                point = engine.step(Some(&point), day(d as u32), Decimal::from(tss));
            }

            for d in 0..400u32 {
                let next = engine.step(Some(&point), day(training_days as u32 + d), Decimal::ZERO);
                prop_assert!(next.ctl <= point.ctl);
                prop_assert!(next.atl <= point.atl);
                prop_assert!(next.ctl >= Decimal::ZERO);
                point = next;
            }
            prop_assert!(point.ctl < dec!(0.1));
            prop_assert!(point.tsb.abs() < dec!(0.1));
        }
    }
}
