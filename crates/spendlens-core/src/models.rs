//! Domain models for Spendlens

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// A single financial transaction as supplied by the caller.
///
/// Immutable after ingestion: every analytical component borrows transactions
/// read-only and derives its own state from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub date: DateTime<Utc>,
    /// Signed amount: negative = expense, positive = income.
    pub amount: f64,
    pub merchant_name: String,
    /// Category tags; the first element is the primary category.
    #[serde(deserialize_with = "category_list_or_string")]
    pub category: Vec<String>,
    pub payment_channel: String,
    pub pending: bool,
}

impl Transaction {
    /// Primary category, falling back to "OTHER" when untagged.
    pub fn primary_category(&self) -> &str {
        self.category
            .first()
            .map(String::as_str)
            .filter(|c| !c.is_empty())
            .unwrap_or("OTHER")
    }

    pub fn is_income(&self) -> bool {
        self.amount > 0.0
    }

    pub fn is_expense(&self) -> bool {
        self.amount < 0.0
    }

    /// Magnitude of the amount regardless of direction.
    pub fn abs_amount(&self) -> f64 {
        self.amount.abs()
    }

    /// Parse a JSON array of transactions.
    pub fn from_json_slice(data: &[u8]) -> Result<Vec<Transaction>> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Accept either a proper list of categories or a bare string.
///
/// Upstream exports sometimes flatten a single-category list into a plain
/// string; that is recovered here by coercing to a one-element list rather
/// than rejecting the record.
fn category_list_or_string<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum CategoryField {
        List(Vec<String>),
        Single(String),
    }

    Ok(match CategoryField::deserialize(deserializer)? {
        CategoryField::List(list) => list,
        CategoryField::Single(s) => vec![s],
    })
}

/// Billing frequency classes recognized by the subscription detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Frequency {
    Weekly,
    BiWeekly,
    Monthly,
    Quarterly,
    Annual,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::BiWeekly => "bi-weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Annual => "annual",
        }
    }

    /// Center of the billing interval bucket, in days.
    pub fn interval_days(&self) -> i64 {
        match self {
            Self::Weekly => 7,
            Self::BiWeekly => 14,
            Self::Monthly => 30,
            Self::Quarterly => 91,
            Self::Annual => 365,
        }
    }

    /// Match a mean charge interval to a frequency bucket.
    ///
    /// Tolerance windows are inclusive: weekly 6-8d, bi-weekly 13-16d,
    /// monthly 28-32d, quarterly 88-95d, annual 360-370d. Intervals outside
    /// every window are not a recognizable billing cadence.
    pub fn from_interval(avg_interval_days: f64) -> Option<Self> {
        const BUCKETS: [(Frequency, f64, f64); 5] = [
            (Frequency::Weekly, 6.0, 8.0),
            (Frequency::BiWeekly, 13.0, 16.0),
            (Frequency::Monthly, 28.0, 32.0),
            (Frequency::Quarterly, 88.0, 95.0),
            (Frequency::Annual, 360.0, 370.0),
        ];

        BUCKETS
            .iter()
            .find(|(_, lo, hi)| (*lo..=*hi).contains(&avg_interval_days))
            .map(|(freq, _, _)| *freq)
    }

    /// Multiplier converting one charge at this frequency to a monthly cost.
    pub fn monthly_multiplier(&self) -> f64 {
        match self {
            Self::Weekly => 4.33,
            Self::BiWeekly => 2.165,
            Self::Monthly => 1.0,
            Self::Quarterly => 1.0 / 3.0,
            Self::Annual => 1.0 / 12.0,
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weekly" => Ok(Self::Weekly),
            "bi-weekly" | "biweekly" => Ok(Self::BiWeekly),
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "annual" | "yearly" => Ok(Self::Annual),
            _ => Err(Error::InvalidData(format!("Unknown frequency: {}", s))),
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A detected price increase on a subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceIncrease {
    pub old_price: f64,
    pub new_price: f64,
    pub percent_change: f64,
    pub detected_date: NaiveDate,
}

/// Individual charge within a subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionCharge {
    pub date: NaiveDate,
    pub amount: f64,
}

/// A recurring billing relationship inferred from transaction history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    /// Normalized merchant name (grouping key)
    pub merchant_name: String,
    /// Raw merchant name as it appeared on the first grouped transaction
    pub original_merchant_name: String,
    pub frequency: Frequency,
    /// Mean interval between charges, in days
    pub frequency_days: i64,

    /// Most recent charge amount
    pub current_amount: f64,
    pub average_amount: f64,
    pub min_amount: f64,
    pub max_amount: f64,

    pub first_charge_date: NaiveDate,
    pub last_charge_date: NaiveDate,
    pub next_predicted_date: NaiveDate,
    pub transaction_count: usize,
    pub charges: Vec<SubscriptionCharge>,

    /// Most recent charge normalized to a monthly-equivalent cost
    pub monthly_cost: f64,
    pub annual_cost: f64,

    /// Detection confidence, 0-100
    pub confidence_score: f64,
    /// Coefficient of variation of charge intervals (lower = more regular)
    pub interval_regularity: f64,
    /// Coefficient of variation of charge amounts (lower = more consistent)
    pub amount_consistency: f64,

    pub is_gray_charge: bool,
    pub has_price_increase: bool,
    pub is_trial_conversion: bool,
    pub needs_attention: bool,

    pub price_increase: Option<PriceIncrease>,
}

/// Summary of one subscription detection run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionSummary {
    pub total_subscriptions: usize,
    pub total_monthly_cost: f64,
    pub total_annual_cost: f64,
    pub gray_charges_count: usize,
    pub price_increases_count: usize,
    pub trial_conversions_count: usize,
    pub subscriptions: Vec<Subscription>,
}
