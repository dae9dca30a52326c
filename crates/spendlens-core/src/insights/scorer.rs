//! Priority scoring, deduplication, and final insight selection
//!
//! Takes the raw trigger set, drops triggers the user cannot act on, assigns
//! each a priority band and composite score, collapses redundant detections,
//! and selects a small diverse set for presentation.

use std::collections::BTreeMap;

use tracing::debug;

use crate::insights::types::{Priority, ScoredTrigger, Trigger, TriggerContext, TriggerKind};

/// Categories that represent fixed obligations: a spike in rent or insurance
/// is not something the user can cut back on, so triggers against these are
/// suppressed before scoring.
const NON_ACTIONABLE_CATEGORIES: [&str; 26] = [
    "rent",
    "housing",
    "mortgage",
    "mortgage payment",
    "utilities",
    "electric",
    "electricity",
    "water",
    "gas",
    "internet",
    "phone",
    "insurance",
    "health insurance",
    "car insurance",
    "life insurance",
    "home insurance",
    "loan",
    "loans",
    "student loan",
    "student loans",
    "car loan",
    "loan payment",
    "hoa",
    "hoa fees",
    "property tax",
    "taxes",
];

/// Escalation thresholds: changes this large jump to critical regardless of
/// the kind's base priority.
const CRITICAL_ESCALATION_PCT: f64 = 50.0;

const DEFAULT_TOP_N: usize = 7;
const MAX_PER_CATEGORY: usize = 2;

/// Scores, deduplicates, and ranks triggers into the final insight list.
pub struct PriorityScorer {
    top_n: usize,
}

impl PriorityScorer {
    pub fn new() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
        }
    }

    pub fn with_top_n(top_n: usize) -> Self {
        Self { top_n }
    }

    /// Full scoring pass: filter, score, dedup, select.
    pub fn score_and_rank(&self, triggers: Vec<Trigger>) -> Vec<ScoredTrigger> {
        let raw_count = triggers.len();

        let scored: Vec<ScoredTrigger> = triggers
            .into_iter()
            .filter(|t| is_actionable(t))
            .map(score_trigger)
            .collect();

        let deduped = dedup(scored);
        let selected = self.select(deduped);

        debug!(
            raw = raw_count,
            selected = selected.len(),
            "Scoring complete"
        );
        selected
    }

    /// Pick the top N by score, capping each category and guaranteeing at
    /// least one positive insight when any was detected.
    fn select(&self, mut pool: Vec<ScoredTrigger>) -> Vec<ScoredTrigger> {
        pool.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut selected: Vec<ScoredTrigger> = Vec::new();
        let mut remaining: Vec<ScoredTrigger> = Vec::new();
        let mut per_category: BTreeMap<String, usize> = BTreeMap::new();

        for item in pool {
            if selected.len() >= self.top_n {
                remaining.push(item);
                continue;
            }
            if let Some(category) = &item.trigger.category {
                let count = per_category.entry(category.clone()).or_insert(0);
                if *count >= MAX_PER_CATEGORY {
                    remaining.push(item);
                    continue;
                }
                *count += 1;
            }
            selected.push(item);
        }

        // Diversity: a run of bad news should still surface one win when the
        // detector found any.
        let has_positive = selected.iter().any(|s| s.trigger.kind.is_positive());
        if !has_positive {
            let best_positive = remaining
                .iter()
                .enumerate()
                .filter(|(_, s)| s.trigger.kind.is_positive())
                .max_by(|a, b| a.1.score.total_cmp(&b.1.score))
                .map(|(i, _)| i);
            if let Some(positive_idx) = best_positive {
                let positive = remaining.swap_remove(positive_idx);
                let worst_idx = selected
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| !s.trigger.kind.is_positive())
                    .min_by(|a, b| a.1.score.total_cmp(&b.1.score))
                    .map(|(i, _)| i);
                match worst_idx {
                    Some(idx) if selected.len() >= self.top_n => {
                        selected[idx] = positive;
                    }
                    _ => selected.push(positive),
                }
            }
        }

        selected.sort_by(|a, b| b.score.total_cmp(&a.score));
        selected.truncate(self.top_n);
        selected
    }
}

impl Default for PriorityScorer {
    fn default() -> Self {
        Self::new()
    }
}

fn is_actionable(trigger: &Trigger) -> bool {
    match &trigger.category {
        Some(category) => {
            let lowered = category.to_lowercase();
            !NON_ACTIONABLE_CATEGORIES.contains(&lowered.as_str())
        }
        None => true,
    }
}

/// Base priority band per trigger kind.
fn base_priority(kind: TriggerKind) -> Priority {
    use TriggerKind::*;
    match kind {
        AllTimeHighSpending | LifestyleInflation => Priority::Critical,

        MonthlySpendingSpike
        | CategoryAllTimeHigh
        | YearOverYearChange
        | CategoryYearOverYear
        | SixMonthSustainedTrend
        | NewSignificantMerchant
        | AllTimeLowSpending
        | IncomePositiveStreak
        | OverallImprovementTrend => Priority::High,

        WeeklySpendingSpike
        | WeeklyCategorySpike
        | CategoryAboveAverage
        | QuarterlyTrendIncrease
        | QuarterlyTrendDecrease
        | ThreeMonthSustainedTrend
        | CategoryRollingTrend
        | WeekendWarrior
        | WeekdaySpender
        | CategoryDominance
        | WeeklySpendingWin
        | MonthlySpendingWin
        | SavingsStreak
        | CategoryImprovementTrend => Priority::Medium,

        SeasonalHighSpendMonth
        | HolidaySeasonPattern
        | MerchantLoyalty
        | LifetimeSpendingMilestone
        | MerchantLifetimeMilestone
        | AnnualGrowthRate => Priority::Low,
    }
}

/// Priority after escalation: outsized jumps become critical.
fn priority_for(trigger: &Trigger) -> Priority {
    let base = base_priority(trigger.kind);
    let pct = trigger.percent_change.unwrap_or(0.0);

    match trigger.kind {
        TriggerKind::MonthlySpendingSpike if pct > CRITICAL_ESCALATION_PCT => Priority::Critical,
        // Year-over-year changes escalate on magnitude in either direction
        TriggerKind::YearOverYearChange if pct.abs() > CRITICAL_ESCALATION_PCT => {
            Priority::Critical
        }
        _ => base,
    }
}

/// Magnitude of the change behind a trigger, summed from whichever evidence
/// fields are present, each capped so no single component dominates.
fn magnitude(trigger: &Trigger) -> f64 {
    let mut value = 0.0;

    if let Some(pct) = trigger.percent_change {
        value += pct.abs().min(200.0);
    }
    if let Some(dollars) = trigger.dollar_change {
        value += (dollars.abs() / 10.0).min(200.0);
    }
    if let Some(amount) = trigger.this_month {
        value += (amount / 20.0).min(100.0);
    }
    if let Some(visits) = trigger.visit_count {
        value += (visits as f64 * 2.0).min(50.0);
    }
    match &trigger.context {
        TriggerContext::Milestone { amount } => {
            value += (amount / 100.0).min(300.0);
        }
        TriggerContext::Streak { length, .. } => {
            value += *length as f64 * 30.0;
        }
        _ => {}
    }

    value
}

fn score_trigger(trigger: Trigger) -> ScoredTrigger {
    let priority = priority_for(&trigger);
    let magnitude = magnitude(&trigger);
    let score = (5 - priority.rank()) as f64 * 1000.0 + magnitude;
    ScoredTrigger {
        trigger,
        priority,
        magnitude,
        score,
    }
}

/// Collapse redundant detections: per category, monthly comparisons
/// supersede weekly ones and at most two triggers survive; per merchant only
/// the strongest survives; uncategorized triggers pass through.
fn dedup(scored: Vec<ScoredTrigger>) -> Vec<ScoredTrigger> {
    let mut by_category: BTreeMap<String, Vec<ScoredTrigger>> = BTreeMap::new();
    let mut by_merchant: BTreeMap<String, Vec<ScoredTrigger>> = BTreeMap::new();
    let mut general: Vec<ScoredTrigger> = Vec::new();

    for item in scored {
        if let Some(category) = item.trigger.category.clone() {
            by_category.entry(category).or_default().push(item);
        } else if let Some(merchant) = item.trigger.merchant.clone() {
            by_merchant.entry(merchant).or_default().push(item);
        } else {
            general.push(item);
        }
    }

    let mut out = general;

    for (_, mut group) in by_category {
        let has_monthly = group.iter().any(|s| s.trigger.kind.is_monthly_spike());
        if has_monthly {
            group.retain(|s| !s.trigger.kind.is_weekly_spike());
        }
        group.sort_by(|a, b| {
            a.priority
                .rank()
                .cmp(&b.priority.rank())
                .then(b.score.total_cmp(&a.score))
        });
        out.extend(group.into_iter().take(MAX_PER_CATEGORY));
    }

    for (_, mut group) in by_merchant {
        group.sort_by(|a, b| {
            a.priority
                .rank()
                .cmp(&b.priority.rank())
                .then(b.score.total_cmp(&a.score))
        });
        if let Some(best) = group.into_iter().next() {
            out.push(best);
        }
    }

    out
}
