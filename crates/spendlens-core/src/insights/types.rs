//! Trigger and scoring types shared across the insights pipeline

use serde::{Deserialize, Serialize};

/// Every pattern the trigger detector can raise.
///
/// The string form (`as_str`) is the stable wire name used in serialized
/// output and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    // Weekly comparisons
    WeeklySpendingSpike,
    WeeklySpendingWin,
    WeeklyCategorySpike,

    // Rolling 30-day comparisons
    MonthlySpendingSpike,
    MonthlySpendingWin,
    CategoryAboveAverage,

    // Multi-month trends
    QuarterlyTrendIncrease,
    QuarterlyTrendDecrease,
    ThreeMonthSustainedTrend,
    SixMonthSustainedTrend,
    CategoryRollingTrend,

    // Year over year
    YearOverYearChange,
    CategoryYearOverYear,

    // Records and milestones
    AllTimeHighSpending,
    AllTimeLowSpending,
    CategoryAllTimeHigh,
    LifetimeSpendingMilestone,
    MerchantLifetimeMilestone,

    // Long-horizon patterns
    AnnualGrowthRate,
    LifestyleInflation,
    SeasonalHighSpendMonth,
    HolidaySeasonPattern,

    // Behavioral profiles
    WeekendWarrior,
    WeekdaySpender,
    MerchantLoyalty,
    NewSignificantMerchant,
    CategoryDominance,

    // Positive streaks and improvements
    SavingsStreak,
    IncomePositiveStreak,
    CategoryImprovementTrend,
    OverallImprovementTrend,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WeeklySpendingSpike => "weekly_spending_spike",
            Self::WeeklySpendingWin => "weekly_spending_win",
            Self::WeeklyCategorySpike => "weekly_category_spike",
            Self::MonthlySpendingSpike => "monthly_spending_spike",
            Self::MonthlySpendingWin => "monthly_spending_win",
            Self::CategoryAboveAverage => "category_above_average",
            Self::QuarterlyTrendIncrease => "quarterly_trend_increase",
            Self::QuarterlyTrendDecrease => "quarterly_trend_decrease",
            Self::ThreeMonthSustainedTrend => "three_month_sustained_trend",
            Self::SixMonthSustainedTrend => "six_month_sustained_trend",
            Self::CategoryRollingTrend => "category_rolling_trend",
            Self::YearOverYearChange => "year_over_year_change",
            Self::CategoryYearOverYear => "category_year_over_year",
            Self::AllTimeHighSpending => "all_time_high_spending",
            Self::AllTimeLowSpending => "all_time_low_spending",
            Self::CategoryAllTimeHigh => "category_all_time_high",
            Self::LifetimeSpendingMilestone => "lifetime_spending_milestone",
            Self::MerchantLifetimeMilestone => "merchant_lifetime_milestone",
            Self::AnnualGrowthRate => "annual_growth_rate",
            Self::LifestyleInflation => "lifestyle_inflation",
            Self::SeasonalHighSpendMonth => "seasonal_high_spend_month",
            Self::HolidaySeasonPattern => "holiday_season_pattern",
            Self::WeekendWarrior => "weekend_warrior",
            Self::WeekdaySpender => "weekday_spender",
            Self::MerchantLoyalty => "merchant_loyalty",
            Self::NewSignificantMerchant => "new_significant_merchant",
            Self::CategoryDominance => "category_dominance",
            Self::SavingsStreak => "savings_streak",
            Self::IncomePositiveStreak => "income_positive_streak",
            Self::CategoryImprovementTrend => "category_improvement_trend",
            Self::OverallImprovementTrend => "overall_improvement_trend",
        }
    }

    /// Good-news triggers: spending dropped, a streak held, income exceeded
    /// spending. The scorer guarantees at least one of these surfaces when
    /// any were detected.
    pub fn is_positive(&self) -> bool {
        matches!(
            self,
            Self::WeeklySpendingWin
                | Self::MonthlySpendingWin
                | Self::AllTimeLowSpending
                | Self::SavingsStreak
                | Self::IncomePositiveStreak
                | Self::CategoryImprovementTrend
                | Self::OverallImprovementTrend
        )
    }

    /// Weekly-granularity spike kinds, superseded by their monthly
    /// counterparts during deduplication.
    pub fn is_weekly_spike(&self) -> bool {
        matches!(self, Self::WeeklySpendingSpike | Self::WeeklyCategorySpike)
    }

    /// Monthly-granularity spike kinds that supersede weekly ones.
    pub fn is_monthly_spike(&self) -> bool {
        matches!(self, Self::MonthlySpendingSpike | Self::CategoryAboveAverage)
    }
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured evidence attached to a trigger, varying by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerContext {
    /// No additional evidence beyond the trigger fields
    None,
    /// The ISO week being compared, e.g. "2025-W23"
    Week { week: String },
    /// Rolling 30-day window bounds, with the category contributing the most
    /// to the change when one stands out
    RollingWindow {
        current_start: String,
        current_end: String,
        previous_start: String,
        previous_end: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        top_category: Option<String>,
    },
    /// Same-window-last-year comparison
    YearOverYear {
        current_start: String,
        current_end: String,
        previous_start: String,
        previous_end: String,
        direction: TrendDirection,
    },
    /// Linear trend over recent monthly totals
    Trend {
        direction: TrendDirection,
        slope: f64,
        average: f64,
        months: usize,
    },
    /// A record month and the previous extreme it displaced
    Record {
        month: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        previous_record: Option<f64>,
    },
    /// A lifetime spending threshold that was crossed
    Milestone { amount: f64 },
    /// Compound annual growth between first and last full calendar years
    Growth {
        cagr: f64,
        first_year: String,
        first_year_total: f64,
        last_year: String,
        last_year_total: f64,
    },
    /// A comparison between two labelled spans of months
    Span { from: String, to: String },
    /// Calendar month number (1-12) with a seasonal deviation
    SeasonalMonth { month: u32 },
    /// Labelled season, e.g. "holiday"
    Season { label: String },
    /// Ratio between two spending profiles
    Ratio { ratio: f64 },
    /// First and last visit for a lifetime merchant pattern
    MerchantHistory { first: String, last: String },
    /// A merchant first seen recently
    NewMerchant { days_since_first: i64 },
    /// One category's share of total spending
    Dominance { share_pct: f64, total: f64 },
    /// A run of consecutive qualifying months
    Streak { length: usize, months: Vec<String> },
    /// A plain list of month keys backing the trigger
    Months { months: Vec<String> },
}

/// Direction of a spending trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
}

/// A raw detection produced by one trigger rule, before scoring.
///
/// Optional fields are populated per kind; the scorer reads whichever are
/// present when computing magnitude.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub kind: TriggerKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant: Option<String>,
    /// Spending in the current comparison period
    #[serde(skip_serializing_if = "Option::is_none")]
    pub this_month: Option<f64>,
    /// Spending in the previous comparison period
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_month: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent_change: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dollar_change: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visit_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekend_spend: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekday_spend: Option<f64>,
    /// Income retained after spending, as a fraction of income
    #[serde(skip_serializing_if = "Option::is_none")]
    pub savings_rate: Option<f64>,
    /// Top merchants behind the change, largest first
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_merchants: Option<Vec<MerchantAmount>>,
    pub context: TriggerContext,
}

/// A merchant and the amount attributed to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantAmount {
    pub merchant: String,
    pub amount: f64,
}

impl Trigger {
    pub fn new(kind: TriggerKind) -> Self {
        Self {
            kind,
            category: None,
            merchant: None,
            this_month: None,
            last_month: None,
            average: None,
            percent_change: None,
            dollar_change: None,
            visit_count: None,
            weekend_spend: None,
            weekday_spend: None,
            savings_rate: None,
            top_merchants: None,
            context: TriggerContext::None,
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn merchant(mut self, merchant: impl Into<String>) -> Self {
        self.merchant = Some(merchant.into());
        self
    }

    pub fn amounts(mut self, this_month: f64, last_month: f64) -> Self {
        self.this_month = Some(this_month);
        self.last_month = Some(last_month);
        self
    }

    pub fn this_month(mut self, amount: f64) -> Self {
        self.this_month = Some(amount);
        self
    }

    pub fn average(mut self, average: f64) -> Self {
        self.average = Some(average);
        self
    }

    pub fn percent_change(mut self, pct: f64) -> Self {
        self.percent_change = Some(pct);
        self
    }

    pub fn dollar_change(mut self, dollars: f64) -> Self {
        self.dollar_change = Some(dollars);
        self
    }

    pub fn visit_count(mut self, count: usize) -> Self {
        self.visit_count = Some(count);
        self
    }

    pub fn weekend_split(mut self, weekend: f64, weekday: f64) -> Self {
        self.weekend_spend = Some(weekend);
        self.weekday_spend = Some(weekday);
        self
    }

    pub fn savings_rate(mut self, rate: f64) -> Self {
        self.savings_rate = Some(rate);
        self
    }

    pub fn top_merchants(mut self, merchants: Vec<MerchantAmount>) -> Self {
        self.top_merchants = Some(merchants);
        self
    }

    pub fn context(mut self, context: TriggerContext) -> Self {
        self.context = context;
        self
    }
}

/// Priority band assigned by the scorer. Lower rank = more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    /// Numeric rank used in score computation: critical=1 .. low=4.
    pub fn rank(&self) -> u32 {
        match self {
            Self::Critical => 1,
            Self::High => 2,
            Self::Medium => 3,
            Self::Low => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A trigger with its priority band and composite score attached
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredTrigger {
    pub trigger: Trigger,
    pub priority: Priority,
    /// Magnitude of the underlying change, capped per component
    pub magnitude: f64,
    /// Composite rank: (5 - priority_rank) * 1000 + magnitude
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(
            TriggerKind::MonthlySpendingSpike.as_str(),
            "monthly_spending_spike"
        );
        assert_eq!(
            serde_json::to_string(&TriggerKind::WeekendWarrior).unwrap(),
            "\"weekend_warrior\""
        );
    }

    #[test]
    fn test_positive_kind_classification() {
        assert!(TriggerKind::SavingsStreak.is_positive());
        assert!(TriggerKind::MonthlySpendingWin.is_positive());
        assert!(!TriggerKind::MonthlySpendingSpike.is_positive());
        assert!(!TriggerKind::MerchantLoyalty.is_positive());
    }

    #[test]
    fn test_spike_granularity_sets() {
        assert!(TriggerKind::WeeklySpendingSpike.is_weekly_spike());
        assert!(TriggerKind::CategoryAboveAverage.is_monthly_spike());
        assert!(!TriggerKind::MonthlySpendingWin.is_monthly_spike());
    }

    #[test]
    fn test_trigger_builder() {
        let trigger = Trigger::new(TriggerKind::CategoryAboveAverage)
            .category("DINING")
            .amounts(450.0, 300.0)
            .percent_change(50.0)
            .dollar_change(150.0);
        assert_eq!(trigger.category.as_deref(), Some("DINING"));
        assert_eq!(trigger.percent_change, Some(50.0));
        assert_eq!(trigger.context, TriggerContext::None);
    }

    #[test]
    fn test_priority_ranks() {
        assert_eq!(Priority::Critical.rank(), 1);
        assert_eq!(Priority::Low.rank(), 4);
        assert!(Priority::Critical < Priority::Low);
    }

    #[test]
    fn test_optional_fields_omitted_from_json() {
        let trigger = Trigger::new(TriggerKind::WeekendWarrior).weekend_split(80.0, 40.0);
        let json = serde_json::to_value(&trigger).unwrap();
        assert!(json.get("category").is_none());
        assert_eq!(json["weekend_spend"], 80.0);
    }
}
