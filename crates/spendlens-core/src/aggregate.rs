//! Multi-dimensional transaction aggregation
//!
//! Stage 1 of the insights pipeline. Rolls the full transaction history up
//! along eight dimensions (week, month, quarter, year, day-of-week, month
//! number, merchant, category) and computes the derived metrics the trigger
//! rules consume.
//!
//! Every aggregate is anchored to the latest transaction date rather than the
//! wall clock, so results are reproducible against historical fixture data
//! and "current period" comparisons are never skewed by a partial calendar
//! month. Wall-clock time is used only when the input is empty.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use crate::merchant::normalize_merchant;
use crate::models::Transaction;
use crate::stats;

/// Spending total and transaction count for one period key
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PeriodTotals {
    pub total_spending: f64,
    pub transaction_count: usize,
}

/// Rollup table for one time dimension.
///
/// `BTreeMap` keys keep every period set sorted, and the same key set indexes
/// the totals, per-category, and per-merchant sub-tables.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PeriodTable {
    pub totals: BTreeMap<String, PeriodTotals>,
    pub by_category: BTreeMap<String, BTreeMap<String, f64>>,
    pub by_merchant: BTreeMap<String, BTreeMap<String, f64>>,
}

impl PeriodTable {
    pub fn sorted_keys(&self) -> Vec<&str> {
        self.totals.keys().map(String::as_str).collect()
    }

    /// Total spending for a period key, 0 when absent.
    pub fn total(&self, key: &str) -> f64 {
        self.totals.get(key).map(|t| t.total_spending).unwrap_or(0.0)
    }

    /// Spending for one category within a period, 0 when absent.
    pub fn category_amount(&self, key: &str, category: &str) -> f64 {
        self.by_category
            .get(key)
            .and_then(|cats| cats.get(category))
            .copied()
            .unwrap_or(0.0)
    }
}

/// Lifetime rollup for one merchant
#[derive(Debug, Clone, Serialize)]
pub struct MerchantStats {
    pub total_spending: f64,
    pub transaction_count: usize,
    pub first_transaction: DateTime<Utc>,
    pub last_transaction: DateTime<Utc>,
}

/// Lifetime rollup for one category
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CategoryStats {
    pub total_spending: f64,
    pub transaction_count: usize,
}

/// Weekend/weekday spending profile across the whole history
#[derive(Debug, Clone, Default, Serialize)]
pub struct DayOfWeekStats {
    pub by_day: BTreeMap<String, f64>,
    pub weekend_total: f64,
    pub weekday_total: f64,
    pub weekend_daily_avg: f64,
    pub weekday_daily_avg: f64,
}

/// Metrics derived from the rollup tables
#[derive(Debug, Clone, Serialize)]
pub struct DerivedMetrics {
    pub earliest_transaction: Option<DateTime<Utc>>,
    pub latest_transaction: Option<DateTime<Utc>>,
    /// The "now" reference every current-period calculation is anchored to:
    /// the latest transaction date, or the wall clock for empty input.
    pub anchor: DateTime<Utc>,
    pub account_age_days: i64,
    /// Number of calendar months with spending activity, at least 1
    pub account_age_months: usize,
    pub overall_monthly_avg: f64,
    pub category_monthly_averages: BTreeMap<String, f64>,
    pub current_year: String,
    pub current_quarter: String,
    pub current_month: String,
    pub current_week: String,
    pub previous_month: String,
}

/// Current vs previous rolling 30-day window breakdowns
#[derive(Debug, Clone, Serialize)]
pub struct RollingWindows {
    pub current_total: f64,
    pub previous_total: f64,
    pub current_by_category: BTreeMap<String, f64>,
    pub previous_by_category: BTreeMap<String, f64>,
    pub current_by_merchant: BTreeMap<String, f64>,
    pub current_income: f64,
    pub current_start: DateTime<Utc>,
    pub current_end: DateTime<Utc>,
    pub previous_start: DateTime<Utc>,
    pub previous_end: DateTime<Utc>,
}

/// Current rolling window vs the same window one year earlier
#[derive(Debug, Clone, Serialize)]
pub struct YoyWindows {
    pub current_total: f64,
    pub previous_total: f64,
    pub current_by_category: BTreeMap<String, f64>,
    pub previous_by_category: BTreeMap<String, f64>,
    pub current_start: DateTime<Utc>,
    pub current_end: DateTime<Utc>,
    pub previous_start: DateTime<Utc>,
    pub previous_end: DateTime<Utc>,
}

/// Linear trend over the trailing N monthly totals
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RollingTrend {
    pub slope: f64,
    pub intercept: f64,
    pub avg_spending: f64,
    pub slope_pct_of_avg: f64,
    pub first_half_avg: f64,
    pub second_half_avg: f64,
    pub pct_change: f64,
    pub window_months: usize,
}

/// One normalized transaction row retained for window queries
#[derive(Debug, Clone)]
struct TxRow {
    date: DateTime<Utc>,
    abs_amount: f64,
    is_income: bool,
    category: String,
    merchant: String,
    week_key: String,
}

/// Complete aggregation of one transaction history.
///
/// A pure function of the transaction set plus the anchor date; recomputed
/// from scratch on every call, never updated incrementally.
#[derive(Debug, Clone)]
pub struct Aggregation {
    rows: Vec<TxRow>,
    pub by_week: PeriodTable,
    pub by_month: PeriodTable,
    /// Income totals per month key (parallel to `by_month`, which covers
    /// spending only)
    pub monthly_income: BTreeMap<String, f64>,
    pub by_quarter: PeriodTable,
    pub by_year: PeriodTable,
    pub by_day_of_week: DayOfWeekStats,
    /// Month number (1-12) -> lifetime spending, for seasonal patterns
    pub by_month_number: BTreeMap<u32, f64>,
    pub by_merchant: BTreeMap<String, MerchantStats>,
    pub by_category: BTreeMap<String, CategoryStats>,
    pub derived: DerivedMetrics,
}

fn month_key(date: &DateTime<Utc>) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

fn quarter_key(date: &DateTime<Utc>) -> String {
    format!("{:04}-Q{}", date.year(), (date.month() - 1) / 3 + 1)
}

fn week_key(date: &DateTime<Utc>) -> String {
    let iso = date.iso_week();
    format!("{:04}-W{:02}", iso.year(), iso.week())
}

fn previous_month_key(date: &DateTime<Utc>) -> String {
    let (year, month) = if date.month() == 1 {
        (date.year() - 1, 12)
    } else {
        (date.year(), date.month() - 1)
    };
    format!("{:04}-{:02}", year, month)
}

impl Aggregation {
    /// Build the full aggregation from a transaction history.
    ///
    /// Zero transactions produce empty tables and zeroed derived metrics;
    /// downstream rules treat that as "insufficient data" rather than an
    /// error.
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let rows: Vec<TxRow> = transactions
            .iter()
            .map(|tx| TxRow {
                date: tx.date,
                abs_amount: tx.abs_amount(),
                is_income: tx.is_income(),
                category: tx.primary_category().to_string(),
                merchant: normalize_merchant(&tx.merchant_name),
                week_key: week_key(&tx.date),
            })
            .collect();

        let anchor = rows
            .iter()
            .map(|r| r.date)
            .max()
            .unwrap_or_else(Utc::now);
        let earliest = rows.iter().map(|r| r.date).min();

        let mut by_week = PeriodTable::default();
        let mut by_month = PeriodTable::default();
        let mut monthly_income: BTreeMap<String, f64> = BTreeMap::new();
        let mut by_quarter = PeriodTable::default();
        let mut by_year = PeriodTable::default();
        let mut by_month_number: BTreeMap<u32, f64> = BTreeMap::new();
        let mut by_merchant: BTreeMap<String, MerchantStats> = BTreeMap::new();
        let mut by_category: BTreeMap<String, CategoryStats> = BTreeMap::new();
        let mut day_stats = DayOfWeekStats::default();

        for (row, tx) in rows.iter().zip(transactions) {
            let mkey = month_key(&row.date);

            if row.is_income {
                *monthly_income.entry(mkey).or_insert(0.0) += row.abs_amount;
                continue;
            }

            let qkey = quarter_key(&row.date);
            let ykey = format!("{:04}", row.date.year());

            add_to_table(&mut by_week, &row.week_key, row, true);
            add_to_table(&mut by_month, &mkey, row, true);
            add_to_table(&mut by_quarter, &qkey, row, false);
            add_to_table(&mut by_year, &ykey, row, false);

            *by_month_number.entry(row.date.month()).or_insert(0.0) += row.abs_amount;

            by_merchant
                .entry(row.merchant.clone())
                .and_modify(|m| {
                    m.total_spending += row.abs_amount;
                    m.transaction_count += 1;
                    m.first_transaction = m.first_transaction.min(tx.date);
                    m.last_transaction = m.last_transaction.max(tx.date);
                })
                .or_insert(MerchantStats {
                    total_spending: row.abs_amount,
                    transaction_count: 1,
                    first_transaction: tx.date,
                    last_transaction: tx.date,
                });

            let cat = by_category.entry(row.category.clone()).or_default();
            cat.total_spending += row.abs_amount;
            cat.transaction_count += 1;

            let day_name = row.date.format("%A").to_string();
            *day_stats.by_day.entry(day_name).or_insert(0.0) += row.abs_amount;
            if is_weekend(&row.date) {
                day_stats.weekend_total += row.abs_amount;
            } else {
                day_stats.weekday_total += row.abs_amount;
            }
        }

        // Daily averages divide by the number of distinct weeks in the whole
        // history (income weeks included), two weekend days and five weekday
        // days per week.
        let num_weeks = rows
            .iter()
            .map(|r| r.week_key.as_str())
            .collect::<std::collections::BTreeSet<_>>()
            .len();
        if num_weeks > 0 {
            day_stats.weekend_daily_avg = day_stats.weekend_total / (num_weeks as f64 * 2.0);
            day_stats.weekday_daily_avg = day_stats.weekday_total / (num_weeks as f64 * 5.0);
        }

        let account_age_months = by_month.totals.len().max(1);
        let total_spending: f64 = by_category.values().map(|c| c.total_spending).sum();
        let overall_monthly_avg = total_spending / account_age_months as f64;

        let category_monthly_averages = by_category
            .iter()
            .map(|(cat, stats)| {
                (
                    cat.clone(),
                    stats.total_spending / account_age_months as f64,
                )
            })
            .collect();

        let derived = DerivedMetrics {
            earliest_transaction: earliest,
            latest_transaction: if rows.is_empty() { None } else { Some(anchor) },
            anchor,
            account_age_days: earliest
                .map(|e| (anchor - e).num_days())
                .unwrap_or(0),
            account_age_months,
            overall_monthly_avg,
            category_monthly_averages,
            current_year: format!("{:04}", anchor.year()),
            current_quarter: quarter_key(&anchor),
            current_month: month_key(&anchor),
            current_week: week_key(&anchor),
            previous_month: previous_month_key(&anchor),
        };

        debug!(
            months = derived.account_age_months,
            merchants = by_merchant.len(),
            categories = by_category.len(),
            monthly_avg = derived.overall_monthly_avg,
            "Aggregation complete"
        );

        Self {
            rows,
            by_week,
            by_month,
            monthly_income,
            by_quarter,
            by_year,
            by_day_of_week: day_stats,
            by_month_number,
            by_merchant,
            by_category,
            derived,
        }
    }

    /// Spending breakdown for the current `[anchor-30d, anchor]` window and
    /// the previous `[anchor-60d, anchor-30d]` window.
    ///
    /// Trailing rolling windows, not calendar months: "this month" is never
    /// a partial period, whatever day of the month the history ends on.
    pub fn rolling_30day(&self) -> RollingWindows {
        let anchor = self.derived.anchor;
        let current_start = anchor - Duration::days(30);
        let previous_start = anchor - Duration::days(60);

        let mut out = RollingWindows {
            current_total: 0.0,
            previous_total: 0.0,
            current_by_category: BTreeMap::new(),
            previous_by_category: BTreeMap::new(),
            current_by_merchant: BTreeMap::new(),
            current_income: 0.0,
            current_start,
            current_end: anchor,
            previous_start,
            previous_end: current_start,
        };

        for row in &self.rows {
            let in_current = row.date >= current_start && row.date <= anchor;
            let in_previous = row.date >= previous_start && row.date <= current_start;

            if row.is_income {
                if in_current {
                    out.current_income += row.abs_amount;
                }
                continue;
            }

            if in_current {
                out.current_total += row.abs_amount;
                *out
                    .current_by_category
                    .entry(row.category.clone())
                    .or_insert(0.0) += row.abs_amount;
                *out
                    .current_by_merchant
                    .entry(row.merchant.clone())
                    .or_insert(0.0) += row.abs_amount;
            }
            if in_previous {
                out.previous_total += row.abs_amount;
                *out
                    .previous_by_category
                    .entry(row.category.clone())
                    .or_insert(0.0) += row.abs_amount;
            }
        }

        out
    }

    /// Current 30-day window vs the same 30-day window one year earlier
    /// (`[anchor-395d, anchor-365d]`), for seasonally-stable year-over-year
    /// comparison.
    pub fn yoy_rolling(&self) -> YoyWindows {
        let anchor = self.derived.anchor;
        let current_start = anchor - Duration::days(30);
        let previous_end = anchor - Duration::days(365);
        let previous_start = previous_end - Duration::days(30);

        let mut out = YoyWindows {
            current_total: 0.0,
            previous_total: 0.0,
            current_by_category: BTreeMap::new(),
            previous_by_category: BTreeMap::new(),
            current_start,
            current_end: anchor,
            previous_start,
            previous_end,
        };

        for row in &self.rows {
            if row.is_income {
                continue;
            }
            if row.date >= current_start && row.date <= anchor {
                out.current_total += row.abs_amount;
                *out
                    .current_by_category
                    .entry(row.category.clone())
                    .or_insert(0.0) += row.abs_amount;
            }
            if row.date >= previous_start && row.date <= previous_end {
                out.previous_total += row.abs_amount;
                *out
                    .previous_by_category
                    .entry(row.category.clone())
                    .or_insert(0.0) += row.abs_amount;
            }
        }

        out
    }

    /// Linear trend over the trailing `window_months` monthly totals.
    ///
    /// Returns `None` when the history has fewer months than the window;
    /// callers treat that as "insufficient data".
    pub fn rolling_trend(&self, window_months: usize) -> Option<RollingTrend> {
        let keys = self.by_month.sorted_keys();
        if keys.len() < window_months || window_months < 2 {
            return None;
        }

        let recent: Vec<f64> = keys[keys.len() - window_months..]
            .iter()
            .map(|key| self.by_month.total(key))
            .collect();

        let (slope, intercept) = stats::linear_fit(&recent)?;

        let mid = recent.len() / 2;
        let first_half_avg = stats::mean(&recent[..mid]);
        let second_half_avg = stats::mean(&recent[mid..]);
        let pct_change = if first_half_avg > 0.0 {
            (second_half_avg - first_half_avg) / first_half_avg * 100.0
        } else {
            0.0
        };

        let avg_spending = stats::mean(&recent);
        Some(RollingTrend {
            slope,
            intercept,
            avg_spending,
            slope_pct_of_avg: if avg_spending > 0.0 {
                slope / avg_spending * 100.0
            } else {
                0.0
            },
            first_half_avg,
            second_half_avg,
            pct_change,
            window_months,
        })
    }

    /// Monthly spending for one category across the trailing `months` month
    /// keys, oldest first.
    pub fn category_monthly_series(&self, category: &str, months: usize) -> Vec<f64> {
        let keys = self.by_month.sorted_keys();
        let start = keys.len().saturating_sub(months);
        keys[start..]
            .iter()
            .map(|key| self.by_month.category_amount(key, category))
            .collect()
    }

    /// True when the history holds no spending at all
    pub fn is_empty(&self) -> bool {
        self.by_month.totals.is_empty()
    }
}

fn add_to_table(table: &mut PeriodTable, key: &str, row: &TxRow, track_merchants: bool) {
    let totals = table.totals.entry(key.to_string()).or_default();
    totals.total_spending += row.abs_amount;
    totals.transaction_count += 1;

    *table
        .by_category
        .entry(key.to_string())
        .or_default()
        .entry(row.category.clone())
        .or_insert(0.0) += row.abs_amount;

    if track_merchants {
        *table
            .by_merchant
            .entry(key.to_string())
            .or_default()
            .entry(row.merchant.clone())
            .or_insert(0.0) += row.abs_amount;
    }
}

fn is_weekend(date: &DateTime<Utc>) -> bool {
    matches!(
        date.weekday(),
        chrono::Weekday::Sat | chrono::Weekday::Sun
    )
}
