//! Trigger detection rules
//!
//! Each rule inspects the aggregation and raises zero or more triggers. Rules
//! never rank or suppress each other; that is the scorer's job. All
//! thresholds live here as named constants so the catalog reads as a single
//! policy table.

use tracing::debug;

use crate::aggregate::Aggregation;
use crate::insights::types::{
    MerchantAmount, TrendDirection, Trigger, TriggerContext, TriggerKind,
};
use crate::stats;

// Period-over-period thresholds (percent)
const WEEKLY_SPIKE_PCT: f64 = 40.0;
const WEEKLY_WIN_PCT: f64 = -25.0;
const WEEKLY_CATEGORY_SPIKE_PCT: f64 = 50.0;
const WEEKLY_CATEGORY_MIN_AMOUNT: f64 = 50.0;
const MONTHLY_SPIKE_PCT: f64 = 30.0;
const MONTHLY_WIN_PCT: f64 = -20.0;
const CATEGORY_ABOVE_AVG_PCT: f64 = 40.0;
const CATEGORY_ABOVE_AVG_MIN_AMOUNT: f64 = 100.0;
const QUARTERLY_TREND_PCT: f64 = 20.0;
const SUSTAINED_TREND_PCT: f64 = 15.0;
const CATEGORY_TREND_SLOPE_PCT: f64 = 10.0;
const CATEGORY_TREND_MIN_AVG: f64 = 50.0;
const CATEGORY_TREND_MONTHS: usize = 6;
const YOY_PCT: f64 = 25.0;
const CATEGORY_YOY_PCT: f64 = 50.0;
const CATEGORY_YOY_MIN_AMOUNT: f64 = 100.0;

// Records, milestones, long-horizon patterns
const RECORD_MIN_MONTHS: usize = 3;
const CATEGORY_RECORD_MIN_AMOUNT: f64 = 100.0;
const LIFETIME_MILESTONES: [f64; 7] = [
    10_000.0, 25_000.0, 50_000.0, 100_000.0, 250_000.0, 500_000.0, 1_000_000.0,
];
const MERCHANT_MILESTONES: [f64; 5] = [500.0, 1_000.0, 2_500.0, 5_000.0, 10_000.0];
const MERCHANT_MILESTONE_ACTIVE_DAYS: i64 = 90;
const CAGR_PCT: f64 = 10.0;
const LIFESTYLE_INFLATION_PCT: f64 = 30.0;
const LIFESTYLE_INFLATION_MIN_MONTHS: usize = 12;
const SEASONAL_DEVIATION_PCT: f64 = 20.0;
const HOLIDAY_PATTERN_PCT: f64 = 20.0;

// Behavioral profiles
const WEEKEND_RATIO: f64 = 1.5;
const LOYALTY_MIN_VISITS: usize = 10;
const LOYALTY_MIN_TOTAL: f64 = 500.0;
const NEW_MERCHANT_FIRST_SEEN_DAYS: i64 = 60;
const NEW_MERCHANT_ACTIVE_DAYS: i64 = 30;
const NEW_MERCHANT_MIN_TOTAL: f64 = 100.0;
const DOMINANCE_SHARE_PCT: f64 = 35.0;

// Streaks and improvements
const SAVINGS_STREAK_WINDOW: usize = 6;
const SAVINGS_STREAK_MIN: usize = 2;
const INCOME_STREAK_WINDOW: usize = 6;
const INCOME_STREAK_MIN: usize = 3;
const CATEGORY_IMPROVEMENT_PCT: f64 = 20.0;
const OVERALL_IMPROVEMENT_PCT: f64 = 15.0;

/// One detection rule over the aggregation.
pub trait TriggerRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn detect(&self, agg: &Aggregation) -> Vec<Trigger>;
}

/// Registry of every trigger rule, run in catalog order.
pub struct TriggerDetector {
    rules: Vec<Box<dyn TriggerRule>>,
}

impl TriggerDetector {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(WeeklySpendingRule),
                Box::new(WeeklyCategorySpikeRule),
                Box::new(MonthlyRollingRule),
                Box::new(CategoryAboveAverageRule),
                Box::new(QuarterlyTrendRule),
                Box::new(SustainedTrendRule { window_months: 3 }),
                Box::new(SustainedTrendRule { window_months: 6 }),
                Box::new(CategoryRollingTrendRule),
                Box::new(YearOverYearRule),
                Box::new(CategoryYearOverYearRule),
                Box::new(AllTimeHighRule),
                Box::new(AllTimeLowRule),
                Box::new(CategoryAllTimeHighRule),
                Box::new(LifetimeMilestoneRule),
                Box::new(MerchantMilestoneRule),
                Box::new(AnnualGrowthRule),
                Box::new(LifestyleInflationRule),
                Box::new(SeasonalHighMonthRule),
                Box::new(HolidaySeasonRule),
                Box::new(DayOfWeekProfileRule),
                Box::new(MerchantLoyaltyRule),
                Box::new(NewSignificantMerchantRule),
                Box::new(CategoryDominanceRule),
                Box::new(SavingsStreakRule),
                Box::new(IncomePositiveStreakRule),
                Box::new(CategoryImprovementRule),
                Box::new(OverallImprovementRule),
            ],
        }
    }

    /// Run every rule and collect the raw trigger set.
    pub fn detect(&self, agg: &Aggregation) -> Vec<Trigger> {
        let mut triggers = Vec::new();
        for rule in &self.rules {
            let found = rule.detect(agg);
            if !found.is_empty() {
                debug!(rule = rule.name(), count = found.len(), "Rule fired");
            }
            triggers.extend(found);
        }
        debug!(total = triggers.len(), "Trigger detection complete");
        triggers
    }
}

impl Default for TriggerDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn pct_change(current: f64, previous: f64) -> Option<f64> {
    if previous > 0.0 {
        Some((current - previous) / previous * 100.0)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Weekly comparisons

/// Overall spending this week vs last week: spike or win.
struct WeeklySpendingRule;

impl TriggerRule for WeeklySpendingRule {
    fn name(&self) -> &'static str {
        "weekly_spending"
    }

    fn detect(&self, agg: &Aggregation) -> Vec<Trigger> {
        let keys = agg.by_week.sorted_keys();
        let (Some(&previous), Some(&current)) =
            (keys.len().checked_sub(2).and_then(|i| keys.get(i)), keys.last())
        else {
            return vec![];
        };

        let current_total = agg.by_week.total(current);
        let previous_total = agg.by_week.total(previous);
        let Some(pct) = pct_change(current_total, previous_total) else {
            return vec![];
        };

        let kind = if pct > WEEKLY_SPIKE_PCT {
            TriggerKind::WeeklySpendingSpike
        } else if pct < WEEKLY_WIN_PCT {
            TriggerKind::WeeklySpendingWin
        } else {
            return vec![];
        };

        vec![Trigger::new(kind)
            .amounts(current_total, previous_total)
            .percent_change(pct)
            .dollar_change(current_total - previous_total)
            .context(TriggerContext::Week {
                week: current.to_string(),
            })]
    }
}

/// A single category spiking week-over-week.
struct WeeklyCategorySpikeRule;

impl TriggerRule for WeeklyCategorySpikeRule {
    fn name(&self) -> &'static str {
        "weekly_category_spike"
    }

    fn detect(&self, agg: &Aggregation) -> Vec<Trigger> {
        let keys = agg.by_week.sorted_keys();
        let (Some(&previous), Some(&current)) =
            (keys.len().checked_sub(2).and_then(|i| keys.get(i)), keys.last())
        else {
            return vec![];
        };

        let empty = std::collections::BTreeMap::new();
        let current_cats = agg.by_week.by_category.get(current).unwrap_or(&empty);

        let mut triggers = vec![];
        for (category, &amount) in current_cats {
            if amount < WEEKLY_CATEGORY_MIN_AMOUNT {
                continue;
            }
            let previous_amount = agg.by_week.category_amount(previous, category);
            let Some(pct) = pct_change(amount, previous_amount) else {
                continue;
            };
            if pct > WEEKLY_CATEGORY_SPIKE_PCT {
                triggers.push(
                    Trigger::new(TriggerKind::WeeklyCategorySpike)
                        .category(category.clone())
                        .amounts(amount, previous_amount)
                        .percent_change(pct)
                        .dollar_change(amount - previous_amount)
                        .context(TriggerContext::Week {
                            week: current.to_string(),
                        }),
                );
            }
        }
        triggers
    }
}

// ---------------------------------------------------------------------------
// Rolling 30-day comparisons

/// Overall spending in the current 30-day window vs the previous one.
///
/// A spike carries the category contributing most to the increase and the
/// top merchants inside the current window, so the insight names where the
/// money went.
struct MonthlyRollingRule;

impl TriggerRule for MonthlyRollingRule {
    fn name(&self) -> &'static str {
        "monthly_rolling"
    }

    fn detect(&self, agg: &Aggregation) -> Vec<Trigger> {
        let rolling = agg.rolling_30day();
        let Some(pct) = pct_change(rolling.current_total, rolling.previous_total) else {
            return vec![];
        };

        let window_context = |top_category: Option<String>| TriggerContext::RollingWindow {
            current_start: rolling.current_start.format("%Y-%m-%d").to_string(),
            current_end: rolling.current_end.format("%Y-%m-%d").to_string(),
            previous_start: rolling.previous_start.format("%Y-%m-%d").to_string(),
            previous_end: rolling.previous_end.format("%Y-%m-%d").to_string(),
            top_category,
        };

        if pct > MONTHLY_SPIKE_PCT {
            // Category with the largest window-over-window increase
            let top_category = rolling
                .current_by_category
                .iter()
                .map(|(cat, &amount)| {
                    let prev = rolling.previous_by_category.get(cat).copied().unwrap_or(0.0);
                    (cat.clone(), amount - prev)
                })
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .filter(|(_, diff)| *diff > 0.0)
                .map(|(cat, _)| cat);

            let mut merchants: Vec<MerchantAmount> = rolling
                .current_by_merchant
                .iter()
                .map(|(merchant, &amount)| MerchantAmount {
                    merchant: merchant.clone(),
                    amount,
                })
                .collect();
            merchants.sort_by(|a, b| b.amount.total_cmp(&a.amount));
            merchants.truncate(3);

            return vec![Trigger::new(TriggerKind::MonthlySpendingSpike)
                .amounts(rolling.current_total, rolling.previous_total)
                .percent_change(pct)
                .dollar_change(rolling.current_total - rolling.previous_total)
                .top_merchants(merchants)
                .context(window_context(top_category))];
        }

        if pct < MONTHLY_WIN_PCT {
            return vec![Trigger::new(TriggerKind::MonthlySpendingWin)
                .amounts(rolling.current_total, rolling.previous_total)
                .percent_change(pct)
                .dollar_change(rolling.current_total - rolling.previous_total)
                .context(window_context(None))];
        }

        vec![]
    }
}

/// A category's current 30-day spending far above its lifetime monthly
/// average.
struct CategoryAboveAverageRule;

impl TriggerRule for CategoryAboveAverageRule {
    fn name(&self) -> &'static str {
        "category_above_average"
    }

    fn detect(&self, agg: &Aggregation) -> Vec<Trigger> {
        let rolling = agg.rolling_30day();
        let mut triggers = vec![];
        for (category, &amount) in &rolling.current_by_category {
            if amount < CATEGORY_ABOVE_AVG_MIN_AMOUNT {
                continue;
            }
            let Some(&avg) = agg.derived.category_monthly_averages.get(category) else {
                continue;
            };
            let Some(pct) = pct_change(amount, avg) else {
                continue;
            };
            if pct > CATEGORY_ABOVE_AVG_PCT {
                triggers.push(
                    Trigger::new(TriggerKind::CategoryAboveAverage)
                        .category(category.clone())
                        .this_month(amount)
                        .average(avg)
                        .percent_change(pct)
                        .dollar_change(amount - avg),
                );
            }
        }
        triggers
    }
}

// ---------------------------------------------------------------------------
// Multi-month trends

/// Quarter-over-quarter change above the trend threshold.
struct QuarterlyTrendRule;

impl TriggerRule for QuarterlyTrendRule {
    fn name(&self) -> &'static str {
        "quarterly_trend"
    }

    fn detect(&self, agg: &Aggregation) -> Vec<Trigger> {
        let keys = agg.by_quarter.sorted_keys();
        let (Some(&previous), Some(&current)) =
            (keys.len().checked_sub(2).and_then(|i| keys.get(i)), keys.last())
        else {
            return vec![];
        };

        let current_total = agg.by_quarter.total(current);
        let previous_total = agg.by_quarter.total(previous);
        let Some(pct) = pct_change(current_total, previous_total) else {
            return vec![];
        };
        if pct.abs() <= QUARTERLY_TREND_PCT {
            return vec![];
        }

        let kind = if pct > 0.0 {
            TriggerKind::QuarterlyTrendIncrease
        } else {
            TriggerKind::QuarterlyTrendDecrease
        };
        vec![Trigger::new(kind)
            .amounts(current_total, previous_total)
            .percent_change(pct)
            .dollar_change(current_total - previous_total)
            .context(TriggerContext::Span {
                from: previous.to_string(),
                to: current.to_string(),
            })]
    }
}

/// Sustained drift across a trailing window of monthly totals, measured as
/// the second half vs the first half of the window.
struct SustainedTrendRule {
    window_months: usize,
}

impl TriggerRule for SustainedTrendRule {
    fn name(&self) -> &'static str {
        "sustained_trend"
    }

    fn detect(&self, agg: &Aggregation) -> Vec<Trigger> {
        let Some(trend) = agg.rolling_trend(self.window_months) else {
            return vec![];
        };
        if trend.pct_change.abs() <= SUSTAINED_TREND_PCT {
            return vec![];
        }

        let kind = match self.window_months {
            3 => TriggerKind::ThreeMonthSustainedTrend,
            _ => TriggerKind::SixMonthSustainedTrend,
        };
        let direction = if trend.pct_change > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Decreasing
        };

        vec![Trigger::new(kind)
            .amounts(trend.second_half_avg, trend.first_half_avg)
            .average(trend.avg_spending)
            .percent_change(trend.pct_change)
            .dollar_change(trend.second_half_avg - trend.first_half_avg)
            .context(TriggerContext::Trend {
                direction,
                slope: trend.slope,
                average: trend.avg_spending,
                months: trend.window_months,
            })]
    }
}

/// Per-category linear trend over the last six months: fires when the slope
/// exceeds a tenth of the category's average monthly spend.
struct CategoryRollingTrendRule;

impl TriggerRule for CategoryRollingTrendRule {
    fn name(&self) -> &'static str {
        "category_rolling_trend"
    }

    fn detect(&self, agg: &Aggregation) -> Vec<Trigger> {
        if agg.by_month.totals.len() < CATEGORY_TREND_MONTHS {
            return vec![];
        }

        let mut triggers = vec![];
        for category in agg.by_category.keys() {
            let series = agg.category_monthly_series(category, CATEGORY_TREND_MONTHS);
            let avg = stats::mean(&series);
            if avg < CATEGORY_TREND_MIN_AVG {
                continue;
            }
            let Some((slope, _)) = stats::linear_fit(&series) else {
                continue;
            };
            let slope_pct = slope / avg * 100.0;
            if slope_pct.abs() <= CATEGORY_TREND_SLOPE_PCT {
                continue;
            }
            let direction = if slope > 0.0 {
                TrendDirection::Increasing
            } else {
                TrendDirection::Decreasing
            };
            triggers.push(
                Trigger::new(TriggerKind::CategoryRollingTrend)
                    .category(category.clone())
                    .average(avg)
                    .percent_change(slope_pct)
                    .dollar_change(slope)
                    .context(TriggerContext::Trend {
                        direction,
                        slope,
                        average: avg,
                        months: CATEGORY_TREND_MONTHS,
                    }),
            );
        }
        triggers
    }
}

// ---------------------------------------------------------------------------
// Year over year

/// Current 30-day window vs the same window a year earlier.
struct YearOverYearRule;

impl TriggerRule for YearOverYearRule {
    fn name(&self) -> &'static str {
        "year_over_year"
    }

    fn detect(&self, agg: &Aggregation) -> Vec<Trigger> {
        let yoy = agg.yoy_rolling();
        let Some(pct) = pct_change(yoy.current_total, yoy.previous_total) else {
            return vec![];
        };
        if pct.abs() <= YOY_PCT {
            return vec![];
        }

        let direction = if pct > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Decreasing
        };
        vec![Trigger::new(TriggerKind::YearOverYearChange)
            .amounts(yoy.current_total, yoy.previous_total)
            .percent_change(pct)
            .dollar_change(yoy.current_total - yoy.previous_total)
            .context(TriggerContext::YearOverYear {
                current_start: yoy.current_start.format("%Y-%m-%d").to_string(),
                current_end: yoy.current_end.format("%Y-%m-%d").to_string(),
                previous_start: yoy.previous_start.format("%Y-%m-%d").to_string(),
                previous_end: yoy.previous_end.format("%Y-%m-%d").to_string(),
                direction,
            })]
    }
}

/// Per-category year-over-year change on the same rolling windows.
struct CategoryYearOverYearRule;

impl TriggerRule for CategoryYearOverYearRule {
    fn name(&self) -> &'static str {
        "category_year_over_year"
    }

    fn detect(&self, agg: &Aggregation) -> Vec<Trigger> {
        let yoy = agg.yoy_rolling();
        let mut triggers = vec![];
        for (category, &amount) in &yoy.current_by_category {
            if amount < CATEGORY_YOY_MIN_AMOUNT {
                continue;
            }
            let previous = yoy.previous_by_category.get(category).copied().unwrap_or(0.0);
            let Some(pct) = pct_change(amount, previous) else {
                continue;
            };
            if pct.abs() <= CATEGORY_YOY_PCT {
                continue;
            }
            let direction = if pct > 0.0 {
                TrendDirection::Increasing
            } else {
                TrendDirection::Decreasing
            };
            triggers.push(
                Trigger::new(TriggerKind::CategoryYearOverYear)
                    .category(category.clone())
                    .amounts(amount, previous)
                    .percent_change(pct)
                    .dollar_change(amount - previous)
                    .context(TriggerContext::YearOverYear {
                        current_start: yoy.current_start.format("%Y-%m-%d").to_string(),
                        current_end: yoy.current_end.format("%Y-%m-%d").to_string(),
                        previous_start: yoy.previous_start.format("%Y-%m-%d").to_string(),
                        previous_end: yoy.previous_end.format("%Y-%m-%d").to_string(),
                        direction,
                    }),
            );
        }
        triggers
    }
}

// ---------------------------------------------------------------------------
// Records and milestones

/// Latest month is the highest-spending month on record.
struct AllTimeHighRule;

impl TriggerRule for AllTimeHighRule {
    fn name(&self) -> &'static str {
        "all_time_high"
    }

    fn detect(&self, agg: &Aggregation) -> Vec<Trigger> {
        let keys = agg.by_month.sorted_keys();
        if keys.len() < RECORD_MIN_MONTHS {
            return vec![];
        }
        let current = keys[keys.len() - 1];
        let current_total = agg.by_month.total(current);
        let previous_record = keys[..keys.len() - 1]
            .iter()
            .map(|key| agg.by_month.total(key))
            .fold(f64::NEG_INFINITY, f64::max);
        if current_total <= previous_record {
            return vec![];
        }

        vec![Trigger::new(TriggerKind::AllTimeHighSpending)
            .this_month(current_total)
            .average(agg.derived.overall_monthly_avg)
            .dollar_change(current_total - previous_record)
            .context(TriggerContext::Record {
                month: current.to_string(),
                previous_record: Some(previous_record),
            })]
    }
}

/// Latest month is the lowest-spending month on record. The first month is
/// excluded since it is usually a partial month of history.
struct AllTimeLowRule;

impl TriggerRule for AllTimeLowRule {
    fn name(&self) -> &'static str {
        "all_time_low"
    }

    fn detect(&self, agg: &Aggregation) -> Vec<Trigger> {
        let keys = agg.by_month.sorted_keys();
        if keys.len() < RECORD_MIN_MONTHS {
            return vec![];
        }
        let current = keys[keys.len() - 1];
        let current_total = agg.by_month.total(current);
        if current_total <= 0.0 {
            return vec![];
        }
        let previous_low = keys[1..keys.len() - 1]
            .iter()
            .map(|key| agg.by_month.total(key))
            .fold(f64::INFINITY, f64::min);
        if current_total >= previous_low {
            return vec![];
        }

        vec![Trigger::new(TriggerKind::AllTimeLowSpending)
            .this_month(current_total)
            .average(agg.derived.overall_monthly_avg)
            .dollar_change(previous_low - current_total)
            .context(TriggerContext::Record {
                month: current.to_string(),
                previous_record: Some(previous_low),
            })]
    }
}

/// A category setting its own monthly record.
struct CategoryAllTimeHighRule;

impl TriggerRule for CategoryAllTimeHighRule {
    fn name(&self) -> &'static str {
        "category_all_time_high"
    }

    fn detect(&self, agg: &Aggregation) -> Vec<Trigger> {
        let keys = agg.by_month.sorted_keys();
        if keys.len() < RECORD_MIN_MONTHS {
            return vec![];
        }
        let current = keys[keys.len() - 1];

        let mut triggers = vec![];
        for category in agg.by_category.keys() {
            let current_amount = agg.by_month.category_amount(current, category);
            if current_amount < CATEGORY_RECORD_MIN_AMOUNT {
                continue;
            }
            let previous_record = keys[..keys.len() - 1]
                .iter()
                .map(|key| agg.by_month.category_amount(key, category))
                .fold(0.0_f64, f64::max);
            if current_amount <= previous_record {
                continue;
            }
            triggers.push(
                Trigger::new(TriggerKind::CategoryAllTimeHigh)
                    .category(category.clone())
                    .this_month(current_amount)
                    .dollar_change(current_amount - previous_record)
                    .context(TriggerContext::Record {
                        month: current.to_string(),
                        previous_record: Some(previous_record),
                    }),
            );
        }
        triggers
    }
}

/// Lifetime spending crossing a round-number threshold during the latest
/// month. At most one fires per run: the largest threshold crossed.
struct LifetimeMilestoneRule;

impl TriggerRule for LifetimeMilestoneRule {
    fn name(&self) -> &'static str {
        "lifetime_milestone"
    }

    fn detect(&self, agg: &Aggregation) -> Vec<Trigger> {
        let keys = agg.by_month.sorted_keys();
        let Some(&current) = keys.last() else {
            return vec![];
        };
        let current_total = agg.by_month.total(current);
        let lifetime_total: f64 = agg.by_category.values().map(|c| c.total_spending).sum();
        let previous_lifetime = lifetime_total - current_total;

        let crossed = LIFETIME_MILESTONES
            .iter()
            .rev()
            .find(|&&m| previous_lifetime < m && m <= lifetime_total);
        let Some(&milestone) = crossed else {
            return vec![];
        };

        vec![Trigger::new(TriggerKind::LifetimeSpendingMilestone)
            .this_month(lifetime_total)
            .context(TriggerContext::Milestone { amount: milestone })]
    }
}

/// Lifetime spending at one merchant crossing a threshold, for merchants
/// still active in the last 90 days. One trigger per merchant, at the
/// largest threshold reached.
struct MerchantMilestoneRule;

impl TriggerRule for MerchantMilestoneRule {
    fn name(&self) -> &'static str {
        "merchant_milestone"
    }

    fn detect(&self, agg: &Aggregation) -> Vec<Trigger> {
        let anchor = agg.derived.anchor;
        let mut triggers = vec![];
        for (merchant, stats) in &agg.by_merchant {
            let days_inactive = (anchor - stats.last_transaction).num_days();
            if days_inactive >= MERCHANT_MILESTONE_ACTIVE_DAYS {
                continue;
            }
            let reached = MERCHANT_MILESTONES
                .iter()
                .rev()
                .find(|&&m| stats.total_spending >= m);
            let Some(&milestone) = reached else {
                continue;
            };
            triggers.push(
                Trigger::new(TriggerKind::MerchantLifetimeMilestone)
                    .merchant(merchant.clone())
                    .this_month(stats.total_spending)
                    .visit_count(stats.transaction_count)
                    .context(TriggerContext::Milestone { amount: milestone }),
            );
        }
        triggers
    }
}

// ---------------------------------------------------------------------------
// Long-horizon patterns

/// Compound annual growth between the first and last calendar year totals.
struct AnnualGrowthRule;

impl TriggerRule for AnnualGrowthRule {
    fn name(&self) -> &'static str {
        "annual_growth"
    }

    fn detect(&self, agg: &Aggregation) -> Vec<Trigger> {
        let keys = agg.by_year.sorted_keys();
        let (Some(&first), Some(&last)) = (keys.first(), keys.last()) else {
            return vec![];
        };
        if first == last {
            return vec![];
        }
        let (Ok(first_year), Ok(last_year)) = (first.parse::<i32>(), last.parse::<i32>()) else {
            return vec![];
        };
        let span = (last_year - first_year) as f64;
        let first_total = agg.by_year.total(first);
        let last_total = agg.by_year.total(last);
        if first_total <= 0.0 || span <= 0.0 {
            return vec![];
        }

        let cagr = ((last_total / first_total).powf(1.0 / span) - 1.0) * 100.0;
        if cagr.abs() <= CAGR_PCT {
            return vec![];
        }

        vec![Trigger::new(TriggerKind::AnnualGrowthRate)
            .amounts(last_total, first_total)
            .percent_change(cagr)
            .context(TriggerContext::Growth {
                cagr,
                first_year: first.to_string(),
                first_year_total: first_total,
                last_year: last.to_string(),
                last_year_total: last_total,
            })]
    }
}

/// Average spend in the most recent six months well above the first six
/// months on record.
struct LifestyleInflationRule;

impl TriggerRule for LifestyleInflationRule {
    fn name(&self) -> &'static str {
        "lifestyle_inflation"
    }

    fn detect(&self, agg: &Aggregation) -> Vec<Trigger> {
        let keys = agg.by_month.sorted_keys();
        if keys.len() < LIFESTYLE_INFLATION_MIN_MONTHS {
            return vec![];
        }

        let totals: Vec<f64> = keys.iter().map(|key| agg.by_month.total(key)).collect();
        let early_avg = stats::mean(&totals[..6]);
        let recent_avg = stats::mean(&totals[totals.len() - 6..]);
        let Some(pct) = pct_change(recent_avg, early_avg) else {
            return vec![];
        };
        if pct <= LIFESTYLE_INFLATION_PCT {
            return vec![];
        }

        vec![Trigger::new(TriggerKind::LifestyleInflation)
            .amounts(recent_avg, early_avg)
            .percent_change(pct)
            .dollar_change(recent_avg - early_avg)
            .context(TriggerContext::Span {
                from: keys[0].to_string(),
                to: keys[keys.len() - 1].to_string(),
            })]
    }
}

/// Calendar months whose average spend runs well above the overall monthly
/// average. Reports the top two deviating months.
struct SeasonalHighMonthRule;

impl TriggerRule for SeasonalHighMonthRule {
    fn name(&self) -> &'static str {
        "seasonal_high_month"
    }

    fn detect(&self, agg: &Aggregation) -> Vec<Trigger> {
        let monthly_averages = month_number_averages(agg);
        let overall = agg.derived.overall_monthly_avg;
        if overall <= 0.0 || monthly_averages.len() < 3 {
            return vec![];
        }

        let mut deviations: Vec<(u32, f64, f64)> = monthly_averages
            .iter()
            .map(|(&month, &avg)| (month, avg, (avg - overall) / overall * 100.0))
            .filter(|(_, _, dev)| *dev > SEASONAL_DEVIATION_PCT)
            .collect();
        deviations.sort_by(|a, b| b.2.total_cmp(&a.2));
        deviations.truncate(2);

        deviations
            .into_iter()
            .map(|(month, avg, dev)| {
                Trigger::new(TriggerKind::SeasonalHighSpendMonth)
                    .this_month(avg)
                    .average(overall)
                    .percent_change(dev)
                    .context(TriggerContext::SeasonalMonth { month })
            })
            .collect()
    }
}

/// Fourth-quarter spending per observed month, compared against the rest of
/// the year's per-month spending. Needs November and December in the
/// history; October joins the holiday window when present.
struct HolidaySeasonRule;

impl TriggerRule for HolidaySeasonRule {
    fn name(&self) -> &'static str {
        "holiday_season"
    }

    fn detect(&self, agg: &Aggregation) -> Vec<Trigger> {
        if !agg.by_month_number.contains_key(&11) || !agg.by_month_number.contains_key(&12) {
            return vec![];
        }
        let holiday_months: &[u32] = if agg.by_month_number.contains_key(&10) {
            &[10, 11, 12]
        } else {
            &[11, 12]
        };

        // Observation-weighted per-month averages: totals divided by how
        // many month keys fall in each window, so a single November does
        // not count as much as three
        let counts = month_number_counts(agg);
        let (holiday_total, holiday_count, rest_total, rest_count) = agg
            .by_month_number
            .iter()
            .fold((0.0, 0usize, 0.0, 0usize), |acc, (month, &total)| {
                let count = counts.get(month).copied().unwrap_or(0);
                if holiday_months.contains(month) {
                    (acc.0 + total, acc.1 + count, acc.2, acc.3)
                } else {
                    (acc.0, acc.1, acc.2 + total, acc.3 + count)
                }
            });
        if holiday_count == 0 || rest_count == 0 {
            return vec![];
        }

        let holiday_avg = holiday_total / holiday_count as f64;
        let rest_avg = rest_total / rest_count as f64;
        let Some(pct) = pct_change(holiday_avg, rest_avg) else {
            return vec![];
        };
        if pct <= HOLIDAY_PATTERN_PCT {
            return vec![];
        }

        vec![Trigger::new(TriggerKind::HolidaySeasonPattern)
            .amounts(holiday_avg, rest_avg)
            .percent_change(pct)
            .context(TriggerContext::Season {
                label: "holiday".to_string(),
            })]
    }
}

/// How many month keys fall on each calendar month number.
fn month_number_counts(agg: &Aggregation) -> std::collections::BTreeMap<u32, usize> {
    let mut counts: std::collections::BTreeMap<u32, usize> = std::collections::BTreeMap::new();
    for key in agg.by_month.totals.keys() {
        if let Some(month) = key
            .rsplit('-')
            .next()
            .and_then(|m| m.parse::<u32>().ok())
        {
            *counts.entry(month).or_insert(0) += 1;
        }
    }
    counts
}

/// Average lifetime spend per calendar month number, dividing each month
/// number's total by how many month keys it appears in.
fn month_number_averages(agg: &Aggregation) -> std::collections::BTreeMap<u32, f64> {
    let counts = month_number_counts(agg);
    agg.by_month_number
        .iter()
        .filter_map(|(&month, &total)| {
            let count = *counts.get(&month)?;
            (count > 0).then(|| (month, total / count as f64))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Behavioral profiles

/// Weekend-vs-weekday spending profile: warrior when weekend daily spend
/// outruns weekday spend by the ratio threshold, spender for the inverse.
struct DayOfWeekProfileRule;

impl TriggerRule for DayOfWeekProfileRule {
    fn name(&self) -> &'static str {
        "day_of_week_profile"
    }

    fn detect(&self, agg: &Aggregation) -> Vec<Trigger> {
        let stats = &agg.by_day_of_week;
        if stats.weekend_daily_avg <= 0.0 || stats.weekday_daily_avg <= 0.0 {
            return vec![];
        }

        let weekend_ratio = stats.weekend_daily_avg / stats.weekday_daily_avg;
        if weekend_ratio > WEEKEND_RATIO {
            return vec![Trigger::new(TriggerKind::WeekendWarrior)
                .weekend_split(stats.weekend_daily_avg, stats.weekday_daily_avg)
                .percent_change((weekend_ratio - 1.0) * 100.0)
                .context(TriggerContext::Ratio {
                    ratio: weekend_ratio,
                })];
        }

        let weekday_ratio = stats.weekday_daily_avg / stats.weekend_daily_avg;
        if weekday_ratio > WEEKEND_RATIO {
            return vec![Trigger::new(TriggerKind::WeekdaySpender)
                .weekend_split(stats.weekend_daily_avg, stats.weekday_daily_avg)
                .context(TriggerContext::Ratio {
                    ratio: weekday_ratio,
                })];
        }

        vec![]
    }
}

/// Heavy lifetime relationships with the top five merchants.
struct MerchantLoyaltyRule;

impl TriggerRule for MerchantLoyaltyRule {
    fn name(&self) -> &'static str {
        "merchant_loyalty"
    }

    fn detect(&self, agg: &Aggregation) -> Vec<Trigger> {
        let mut merchants: Vec<_> = agg.by_merchant.iter().collect();
        merchants.sort_by(|a, b| b.1.total_spending.total_cmp(&a.1.total_spending));

        merchants
            .into_iter()
            .take(5)
            .filter(|(_, stats)| {
                stats.transaction_count > LOYALTY_MIN_VISITS
                    || stats.total_spending > LOYALTY_MIN_TOTAL
            })
            .map(|(merchant, stats)| {
                Trigger::new(TriggerKind::MerchantLoyalty)
                    .merchant(merchant.clone())
                    .this_month(stats.total_spending)
                    .visit_count(stats.transaction_count)
                    .context(TriggerContext::MerchantHistory {
                        first: stats.first_transaction.format("%Y-%m-%d").to_string(),
                        last: stats.last_transaction.format("%Y-%m-%d").to_string(),
                    })
            })
            .collect()
    }
}

/// A merchant first seen within the last 60 days, still active, with real
/// money behind it.
struct NewSignificantMerchantRule;

impl TriggerRule for NewSignificantMerchantRule {
    fn name(&self) -> &'static str {
        "new_significant_merchant"
    }

    fn detect(&self, agg: &Aggregation) -> Vec<Trigger> {
        let anchor = agg.derived.anchor;
        let mut triggers = vec![];
        for (merchant, stats) in &agg.by_merchant {
            let days_since_first = (anchor - stats.first_transaction).num_days();
            let days_since_last = (anchor - stats.last_transaction).num_days();
            if days_since_first <= NEW_MERCHANT_FIRST_SEEN_DAYS
                && days_since_last <= NEW_MERCHANT_ACTIVE_DAYS
                && stats.total_spending > NEW_MERCHANT_MIN_TOTAL
            {
                triggers.push(
                    Trigger::new(TriggerKind::NewSignificantMerchant)
                        .merchant(merchant.clone())
                        .this_month(stats.total_spending)
                        .visit_count(stats.transaction_count)
                        .context(TriggerContext::NewMerchant { days_since_first }),
                );
            }
        }
        triggers
    }
}

/// One category absorbing an outsized share of all spending.
struct CategoryDominanceRule;

impl TriggerRule for CategoryDominanceRule {
    fn name(&self) -> &'static str {
        "category_dominance"
    }

    fn detect(&self, agg: &Aggregation) -> Vec<Trigger> {
        let total: f64 = agg.by_category.values().map(|c| c.total_spending).sum();
        if total <= 0.0 {
            return vec![];
        }

        agg.by_category
            .iter()
            .filter_map(|(category, stats)| {
                let share = stats.total_spending / total * 100.0;
                (share > DOMINANCE_SHARE_PCT).then(|| {
                    Trigger::new(TriggerKind::CategoryDominance)
                        .category(category.clone())
                        .this_month(stats.total_spending)
                        .percent_change(share)
                        .context(TriggerContext::Dominance {
                            share_pct: share,
                            total: stats.total_spending,
                        })
                })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Streaks and improvements

/// Trailing run of months under the overall monthly average, within the last
/// six months. Reports the total saved relative to the average.
struct SavingsStreakRule;

impl TriggerRule for SavingsStreakRule {
    fn name(&self) -> &'static str {
        "savings_streak"
    }

    fn detect(&self, agg: &Aggregation) -> Vec<Trigger> {
        let avg = agg.derived.overall_monthly_avg;
        if avg <= 0.0 {
            return vec![];
        }
        let keys = agg.by_month.sorted_keys();
        let start = keys.len().saturating_sub(SAVINGS_STREAK_WINDOW);
        let window = &keys[start..];

        let mut streak_months = vec![];
        let mut saved = 0.0;
        for key in window.iter().rev() {
            let total = agg.by_month.total(key);
            if total < avg {
                streak_months.push(key.to_string());
                saved += avg - total;
            } else {
                break;
            }
        }
        if streak_months.len() < SAVINGS_STREAK_MIN {
            return vec![];
        }
        streak_months.reverse();

        vec![Trigger::new(TriggerKind::SavingsStreak)
            .average(avg)
            .dollar_change(saved)
            .context(TriggerContext::Streak {
                length: streak_months.len(),
                months: streak_months,
            })]
    }
}

/// Trailing run of months where income exceeded spending, within the last
/// six months. Reports the latest month's savings rate.
struct IncomePositiveStreakRule;

impl TriggerRule for IncomePositiveStreakRule {
    fn name(&self) -> &'static str {
        "income_positive_streak"
    }

    fn detect(&self, agg: &Aggregation) -> Vec<Trigger> {
        let keys = agg.by_month.sorted_keys();
        let start = keys.len().saturating_sub(INCOME_STREAK_WINDOW);
        let window = &keys[start..];

        let mut streak_months = vec![];
        let mut latest_rate = None;
        for key in window.iter().rev() {
            let income = agg.monthly_income.get(*key).copied().unwrap_or(0.0);
            let spending = agg.by_month.total(key);
            if income > spending && income > 0.0 {
                if latest_rate.is_none() {
                    latest_rate = Some((income - spending) / income);
                }
                streak_months.push(key.to_string());
            } else {
                break;
            }
        }
        if streak_months.len() < INCOME_STREAK_MIN {
            return vec![];
        }
        streak_months.reverse();

        let mut trigger = Trigger::new(TriggerKind::IncomePositiveStreak).context(
            TriggerContext::Streak {
                length: streak_months.len(),
                months: streak_months,
            },
        );
        if let Some(rate) = latest_rate {
            trigger = trigger.savings_rate(rate);
        }
        vec![trigger]
    }
}

/// Three strictly decreasing months of category spend, all nonzero, with a
/// meaningful overall decline.
struct CategoryImprovementRule;

impl TriggerRule for CategoryImprovementRule {
    fn name(&self) -> &'static str {
        "category_improvement"
    }

    fn detect(&self, agg: &Aggregation) -> Vec<Trigger> {
        let keys = agg.by_month.sorted_keys();
        if keys.len() < 3 {
            return vec![];
        }
        let last_three = &keys[keys.len() - 3..];

        let mut triggers = vec![];
        for category in agg.by_category.keys() {
            let series: Vec<f64> = last_three
                .iter()
                .map(|key| agg.by_month.category_amount(key, category))
                .collect();
            if let Some(decline) = improvement_pct(&series, CATEGORY_IMPROVEMENT_PCT) {
                triggers.push(
                    Trigger::new(TriggerKind::CategoryImprovementTrend)
                        .category(category.clone())
                        .amounts(series[2], series[0])
                        .percent_change(decline)
                        .dollar_change(series[0] - series[2])
                        .context(TriggerContext::Months {
                            months: last_three.iter().map(|k| k.to_string()).collect(),
                        }),
                );
            }
        }
        triggers
    }
}

/// Three strictly decreasing months of total spend.
struct OverallImprovementRule;

impl TriggerRule for OverallImprovementRule {
    fn name(&self) -> &'static str {
        "overall_improvement"
    }

    fn detect(&self, agg: &Aggregation) -> Vec<Trigger> {
        let keys = agg.by_month.sorted_keys();
        if keys.len() < 3 {
            return vec![];
        }
        let last_three = &keys[keys.len() - 3..];
        let series: Vec<f64> = last_three.iter().map(|key| agg.by_month.total(key)).collect();

        let Some(decline) = improvement_pct(&series, OVERALL_IMPROVEMENT_PCT) else {
            return vec![];
        };
        vec![Trigger::new(TriggerKind::OverallImprovementTrend)
            .amounts(series[2], series[0])
            .percent_change(decline)
            .dollar_change(series[0] - series[2])
            .context(TriggerContext::Months {
                months: last_three.iter().map(|k| k.to_string()).collect(),
            })]
    }
}

/// Decline percentage for a strictly decreasing, all-nonzero three-month
/// series, when it clears the threshold.
fn improvement_pct(series: &[f64], threshold: f64) -> Option<f64> {
    if series.len() != 3 || series.iter().any(|&v| v <= 0.0) {
        return None;
    }
    if !(series[0] > series[1] && series[1] > series[2]) {
        return None;
    }
    let decline = (series[0] - series[2]) / series[0] * 100.0;
    (decline > threshold).then_some(decline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Transaction;
    use chrono::NaiveDate;

    fn tx(date: &str, amount: f64, merchant: &str, category: &str) -> Transaction {
        Transaction {
            id: format!("{}-{}-{}", date, merchant, amount),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap()
                .and_utc(),
            amount,
            merchant_name: merchant.to_string(),
            category: vec![category.to_string()],
            payment_channel: "online".to_string(),
            pending: false,
        }
    }

    fn kinds(triggers: &[Trigger]) -> Vec<TriggerKind> {
        triggers.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_monthly_spike_fires_at_fifty_percent_jump() {
        // $100 in the previous window, $150 in the current one
        let txs = vec![
            tx("2025-05-10", -100.0, "Store A", "SHOPPING"),
            tx("2025-06-15", -90.0, "Store A", "SHOPPING"),
            tx("2025-06-20", -60.0, "Store B", "DINING"),
        ];
        let agg = Aggregation::from_transactions(&txs);
        let triggers = MonthlyRollingRule.detect(&agg);

        assert_eq!(triggers.len(), 1);
        let spike = &triggers[0];
        assert_eq!(spike.kind, TriggerKind::MonthlySpendingSpike);
        assert!((spike.percent_change.unwrap() - 50.0).abs() < 1e-6);
        assert!((spike.dollar_change.unwrap() - 50.0).abs() < 1e-6);
        // Merchant attribution comes along with the spike
        let merchants = spike.top_merchants.as_ref().unwrap();
        assert_eq!(merchants[0].merchant, "store a");
    }

    #[test]
    fn test_monthly_win_on_spending_drop() {
        let txs = vec![
            tx("2025-05-10", -200.0, "Store A", "SHOPPING"),
            tx("2025-06-20", -100.0, "Store A", "SHOPPING"),
        ];
        let agg = Aggregation::from_transactions(&txs);
        let triggers = MonthlyRollingRule.detect(&agg);
        assert_eq!(kinds(&triggers), vec![TriggerKind::MonthlySpendingWin]);
        assert!((triggers[0].percent_change.unwrap() + 50.0).abs() < 1e-6);
    }

    #[test]
    fn test_weekly_category_spike_needs_minimum_amount() {
        // Two consecutive ISO weeks; small category stays quiet, big one fires
        let txs = vec![
            tx("2025-06-02", -20.0, "Cafe", "COFFEE"),
            tx("2025-06-03", -100.0, "Resto", "DINING"),
            tx("2025-06-09", -40.0, "Cafe", "COFFEE"),
            tx("2025-06-10", -300.0, "Resto", "DINING"),
        ];
        let agg = Aggregation::from_transactions(&txs);
        let triggers = WeeklyCategorySpikeRule.detect(&agg);
        assert_eq!(kinds(&triggers), vec![TriggerKind::WeeklyCategorySpike]);
        assert_eq!(triggers[0].category.as_deref(), Some("DINING"));
        assert!((triggers[0].percent_change.unwrap() - 200.0).abs() < 1e-6);
    }

    #[test]
    fn test_all_time_high_needs_three_months() {
        let short = vec![
            tx("2025-05-01", -100.0, "A", "OTHER"),
            tx("2025-06-01", -200.0, "A", "OTHER"),
        ];
        let agg = Aggregation::from_transactions(&short);
        assert!(AllTimeHighRule.detect(&agg).is_empty());

        let long = vec![
            tx("2025-04-01", -100.0, "A", "OTHER"),
            tx("2025-05-01", -150.0, "A", "OTHER"),
            tx("2025-06-01", -300.0, "A", "OTHER"),
        ];
        let agg = Aggregation::from_transactions(&long);
        let triggers = AllTimeHighRule.detect(&agg);
        assert_eq!(kinds(&triggers), vec![TriggerKind::AllTimeHighSpending]);
        match &triggers[0].context {
            TriggerContext::Record {
                month,
                previous_record,
            } => {
                assert_eq!(month, "2025-06");
                assert_eq!(*previous_record, Some(150.0));
            }
            other => panic!("unexpected context: {:?}", other),
        }
    }

    #[test]
    fn test_lifetime_milestone_fires_only_when_crossed() {
        // $9,700 before this month, $600 this month: crosses $10k
        let txs = vec![
            tx("2025-01-15", -4850.0, "A", "OTHER"),
            tx("2025-02-15", -4850.0, "A", "OTHER"),
            tx("2025-03-15", -600.0, "A", "OTHER"),
        ];
        let agg = Aggregation::from_transactions(&txs);
        let triggers = LifetimeMilestoneRule.detect(&agg);
        assert_eq!(triggers.len(), 1);
        assert_eq!(
            triggers[0].context,
            TriggerContext::Milestone { amount: 10_000.0 }
        );

        // Next month without crossing anything stays quiet
        let mut more = txs.clone();
        more.push(tx("2025-04-15", -100.0, "A", "OTHER"));
        let agg = Aggregation::from_transactions(&more);
        assert!(LifetimeMilestoneRule.detect(&agg).is_empty());
    }

    #[test]
    fn test_savings_streak_counts_trailing_months() {
        // Avg = 1300/4 = 325. Months: 500, 500, 200, 100 -> trailing streak
        // of 2, saving (325-200) + (325-100) = 350.
        let txs = vec![
            tx("2025-03-10", -500.0, "A", "OTHER"),
            tx("2025-04-10", -500.0, "A", "OTHER"),
            tx("2025-05-10", -200.0, "A", "OTHER"),
            tx("2025-06-10", -100.0, "A", "OTHER"),
        ];
        let agg = Aggregation::from_transactions(&txs);
        let triggers = SavingsStreakRule.detect(&agg);
        assert_eq!(triggers.len(), 1);
        assert!((triggers[0].dollar_change.unwrap() - 350.0).abs() < 1e-6);
        match &triggers[0].context {
            TriggerContext::Streak { length, months } => {
                assert_eq!(*length, 2);
                assert_eq!(months, &["2025-05".to_string(), "2025-06".to_string()]);
            }
            other => panic!("unexpected context: {:?}", other),
        }
    }

    #[test]
    fn test_income_positive_streak_and_savings_rate() {
        let txs = vec![
            tx("2025-04-01", 3000.0, "Payroll", "INCOME"),
            tx("2025-04-10", -1000.0, "A", "OTHER"),
            tx("2025-05-01", 3000.0, "Payroll", "INCOME"),
            tx("2025-05-10", -1500.0, "A", "OTHER"),
            tx("2025-06-01", 3000.0, "Payroll", "INCOME"),
            tx("2025-06-10", -1500.0, "A", "OTHER"),
        ];
        let agg = Aggregation::from_transactions(&txs);
        let triggers = IncomePositiveStreakRule.detect(&agg);
        assert_eq!(triggers.len(), 1);
        assert!((triggers[0].savings_rate.unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_income_streak_caps_at_six_months() {
        // Eight income-positive months; only the trailing six count
        let mut txs = vec![];
        for (year, month) in [
            (2024, 11),
            (2024, 12),
            (2025, 1),
            (2025, 2),
            (2025, 3),
            (2025, 4),
            (2025, 5),
            (2025, 6),
        ] {
            txs.push(tx(&format!("{}-{:02}-01", year, month), 3000.0, "Payroll", "INCOME"));
            txs.push(tx(&format!("{}-{:02}-10", year, month), -1000.0, "A", "OTHER"));
        }
        let agg = Aggregation::from_transactions(&txs);
        let triggers = IncomePositiveStreakRule.detect(&agg);
        assert_eq!(triggers.len(), 1);
        match &triggers[0].context {
            TriggerContext::Streak { length, months } => {
                assert_eq!(*length, 6);
                assert_eq!(months.first().map(String::as_str), Some("2025-01"));
                assert_eq!(months.last().map(String::as_str), Some("2025-06"));
            }
            other => panic!("unexpected context: {:?}", other),
        }
    }

    #[test]
    fn test_seasonal_high_month_deviates_from_overall_average() {
        // Two Januaries at $400 each against three cheap months: overall
        // monthly average is 1100/5 = 220, January averages 400.
        let txs = vec![
            tx("2024-01-10", -400.0, "A", "OTHER"),
            tx("2025-01-10", -400.0, "A", "OTHER"),
            tx("2024-02-10", -100.0, "A", "OTHER"),
            tx("2024-03-10", -100.0, "A", "OTHER"),
            tx("2024-04-10", -100.0, "A", "OTHER"),
        ];
        let agg = Aggregation::from_transactions(&txs);
        let triggers = SeasonalHighMonthRule.detect(&agg);
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].context, TriggerContext::SeasonalMonth { month: 1 });
        assert!((triggers[0].average.unwrap() - 220.0).abs() < 1e-6);
        let expected_dev = (400.0 - 220.0) / 220.0 * 100.0;
        assert!((triggers[0].percent_change.unwrap() - expected_dev).abs() < 1e-6);

        // Fewer than three distinct calendar months stays quiet
        let short = vec![
            tx("2025-05-10", -100.0, "A", "OTHER"),
            tx("2025-06-10", -400.0, "A", "OTHER"),
        ];
        let agg = Aggregation::from_transactions(&short);
        assert!(SeasonalHighMonthRule.detect(&agg).is_empty());
    }

    #[test]
    fn test_holiday_pattern_weighs_repeated_months() {
        // January appears twice; the rest-of-year average must weigh it
        // twice: (100 + 100 + 400) / 3 = 200, not (100 + 400) / 2 = 250.
        let txs = vec![
            tx("2024-01-10", -100.0, "A", "OTHER"),
            tx("2025-01-10", -100.0, "A", "OTHER"),
            tx("2024-02-10", -400.0, "A", "OTHER"),
            tx("2024-11-10", -300.0, "A", "OTHER"),
            tx("2024-12-10", -300.0, "A", "OTHER"),
        ];
        let agg = Aggregation::from_transactions(&txs);
        let triggers = HolidaySeasonRule.detect(&agg);
        assert_eq!(kinds(&triggers), vec![TriggerKind::HolidaySeasonPattern]);
        assert!((triggers[0].this_month.unwrap() - 300.0).abs() < 1e-6);
        assert!((triggers[0].last_month.unwrap() - 200.0).abs() < 1e-6);
        assert!((triggers[0].percent_change.unwrap() - 50.0).abs() < 1e-6);
    }

    #[test]
    fn test_overall_improvement_requires_strict_decline() {
        let txs = vec![
            tx("2025-04-10", -500.0, "A", "OTHER"),
            tx("2025-05-10", -400.0, "A", "OTHER"),
            tx("2025-06-10", -300.0, "A", "OTHER"),
        ];
        let agg = Aggregation::from_transactions(&txs);
        let triggers = OverallImprovementRule.detect(&agg);
        assert_eq!(kinds(&triggers), vec![TriggerKind::OverallImprovementTrend]);
        // 500 -> 300 is a 40% decline
        assert!((triggers[0].percent_change.unwrap() - 40.0).abs() < 1e-6);

        // A flat middle month breaks the streak
        let flat = vec![
            tx("2025-04-10", -500.0, "A", "OTHER"),
            tx("2025-05-10", -500.0, "A", "OTHER"),
            tx("2025-06-10", -300.0, "A", "OTHER"),
        ];
        let agg = Aggregation::from_transactions(&flat);
        assert!(OverallImprovementRule.detect(&agg).is_empty());
    }

    #[test]
    fn test_category_improvement_on_steady_decline() {
        // DINING falls 100 -> 85 -> 75, a 25% cumulative decline
        let txs = vec![
            tx("2025-04-05", -100.0, "Resto", "DINING"),
            tx("2025-05-05", -85.0, "Resto", "DINING"),
            tx("2025-06-05", -75.0, "Resto", "DINING"),
            tx("2025-04-10", -50.0, "Store", "SHOPPING"),
            tx("2025-05-10", -50.0, "Store", "SHOPPING"),
            tx("2025-06-10", -50.0, "Store", "SHOPPING"),
        ];
        let agg = Aggregation::from_transactions(&txs);
        let triggers = CategoryImprovementRule.detect(&agg);
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].category.as_deref(), Some("DINING"));
        assert!((triggers[0].percent_change.unwrap() - 25.0).abs() < 1e-6);
        assert!(triggers[0].percent_change.unwrap() > 0.0);
    }

    #[test]
    fn test_category_dominance_share() {
        let txs = vec![
            tx("2025-06-01", -700.0, "Resto", "DINING"),
            tx("2025-06-02", -300.0, "Store", "SHOPPING"),
        ];
        let agg = Aggregation::from_transactions(&txs);
        let triggers = CategoryDominanceRule.detect(&agg);
        assert_eq!(kinds(&triggers), vec![TriggerKind::CategoryDominance]);
        assert_eq!(triggers[0].category.as_deref(), Some("DINING"));
        assert!((triggers[0].percent_change.unwrap() - 70.0).abs() < 1e-6);
    }

    #[test]
    fn test_new_significant_merchant_window() {
        let txs = vec![
            tx("2024-01-15", -50.0, "Old Store", "SHOPPING"),
            tx("2025-06-01", -80.0, "Fresh Gym", "FITNESS"),
            tx("2025-06-20", -80.0, "Fresh Gym", "FITNESS"),
            tx("2025-06-25", -10.0, "Old Store", "SHOPPING"),
        ];
        let agg = Aggregation::from_transactions(&txs);
        let triggers = NewSignificantMerchantRule.detect(&agg);
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].merchant.as_deref(), Some("fresh gym"));
    }

    #[test]
    fn test_detector_runs_full_catalog() {
        let mut txs = vec![];
        for month in 1..=6 {
            txs.push(tx(
                &format!("2025-{:02}-10", month),
                -(100.0 * month as f64),
                "Main Store",
                "SHOPPING",
            ));
            txs.push(tx(&format!("2025-{:02}-01", month), 4000.0, "Payroll", "INCOME"));
        }
        let agg = Aggregation::from_transactions(&txs);
        let triggers = TriggerDetector::new().detect(&agg);
        let found = kinds(&triggers);
        // Steady growth plus income should raise at least these
        assert!(found.contains(&TriggerKind::SixMonthSustainedTrend));
        assert!(found.contains(&TriggerKind::IncomePositiveStreak));
        assert!(found.contains(&TriggerKind::AllTimeHighSpending));
    }
}
