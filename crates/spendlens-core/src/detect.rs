//! Subscription detection
//!
//! Finds recurring billing relationships in a transaction history: group
//! expenses by normalized merchant, confirm a regular charge cadence and a
//! consistent amount, then flag the patterns worth a second look (gray
//! charges, price increases, trial conversions).

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::merchant::normalize_merchant;
use crate::models::{
    Frequency, PriceIncrease, Subscription, SubscriptionCharge, SubscriptionSummary, Transaction,
};
use crate::stats;

/// Charge intervals with a coefficient of variation at or above this are too
/// irregular to be a billing cadence.
const INTERVAL_CV_THRESHOLD: f64 = 20.0;
/// Charge amounts with a CV at or above this vary too much to be one
/// subscription price.
const AMOUNT_CV_THRESHOLD: f64 = 15.0;
/// Charges averaging under a dollar are ignored.
const MIN_AVERAGE_AMOUNT: f64 = 1.0;

/// A price change under this percentage is billing noise, not an increase.
const PRICE_INCREASE_PCT: f64 = 3.0;

// Gray charge window: few charges, forgettable amount, unrecognized service
const GRAY_MAX_CHARGES: usize = 3;
const GRAY_MIN_AMOUNT: f64 = 3.0;
const GRAY_MAX_AMOUNT: f64 = 25.0;

const TRIAL_MAX_CHARGES: usize = 2;
const TRIAL_RECENT_DAYS: i64 = 60;
/// First charge under half the second charge reads as a trial discount.
const TRIAL_DISCOUNT_RATIO: f64 = 0.5;

/// Services well known enough that a small recurring charge is assumed
/// intentional, exempting them from gray-charge flagging. Matched by
/// substring against the normalized merchant name.
const KNOWN_SUBSCRIPTION_SERVICES: [&str; 27] = [
    "netflix",
    "spotify",
    "apple",
    "amazon prime",
    "hulu",
    "disney",
    "youtube",
    "google one",
    "icloud",
    "microsoft",
    "adobe",
    "dropbox",
    "gym",
    "fitness",
    "planet fitness",
    "24 hour fitness",
    "equinox",
    "hbo",
    "peacock",
    "paramount",
    "audible",
    "kindle",
    "crunchyroll",
    "linkedin",
    "github",
    "slack",
    "zoom",
];

/// Detects recurring subscriptions in a transaction history.
pub struct SubscriptionDetector;

impl SubscriptionDetector {
    pub fn new() -> Self {
        Self
    }

    /// Run detection over the full history and summarize the results.
    ///
    /// Subscriptions come back sorted by monthly cost, most expensive first.
    pub fn detect(&self, transactions: &[Transaction]) -> SubscriptionSummary {
        let anchor = transactions
            .iter()
            .map(|tx| tx.date)
            .max()
            .unwrap_or_else(Utc::now);

        let mut subscriptions: Vec<Subscription> = self
            .group_by_merchant(transactions)
            .into_iter()
            .filter_map(|(merchant, group)| self.evaluate_group(&merchant, group, anchor))
            .collect();

        subscriptions.sort_by(|a, b| b.monthly_cost.total_cmp(&a.monthly_cost));

        let total_monthly: f64 = subscriptions.iter().map(|s| s.monthly_cost).sum();
        let total_annual: f64 = subscriptions.iter().map(|s| s.annual_cost).sum();
        let summary = SubscriptionSummary {
            total_subscriptions: subscriptions.len(),
            total_monthly_cost: total_monthly,
            total_annual_cost: total_annual,
            gray_charges_count: subscriptions.iter().filter(|s| s.is_gray_charge).count(),
            price_increases_count: subscriptions
                .iter()
                .filter(|s| s.has_price_increase)
                .count(),
            trial_conversions_count: subscriptions
                .iter()
                .filter(|s| s.is_trial_conversion)
                .count(),
            subscriptions,
        };

        debug!(
            subscriptions = summary.total_subscriptions,
            monthly_cost = summary.total_monthly_cost,
            gray = summary.gray_charges_count,
            "Subscription detection complete"
        );
        summary
    }

    /// Group expense transactions by normalized merchant, keeping only
    /// merchants charged at least twice.
    fn group_by_merchant<'a>(
        &self,
        transactions: &'a [Transaction],
    ) -> BTreeMap<String, Vec<&'a Transaction>> {
        let mut groups: BTreeMap<String, Vec<&Transaction>> = BTreeMap::new();
        for tx in transactions {
            if tx.is_expense() {
                groups
                    .entry(normalize_merchant(&tx.merchant_name))
                    .or_default()
                    .push(tx);
            }
        }
        groups.retain(|_, txns| txns.len() >= 2);
        groups
    }

    /// Test one merchant group against the cadence and consistency gates and
    /// build the subscription record when it qualifies.
    fn evaluate_group(
        &self,
        merchant: &str,
        mut group: Vec<&Transaction>,
        anchor: DateTime<Utc>,
    ) -> Option<Subscription> {
        group.sort_by_key(|tx| tx.date);

        let intervals: Vec<f64> = group
            .windows(2)
            .map(|pair| (pair[1].date - pair[0].date).num_days() as f64)
            .collect();
        let avg_interval = stats::mean(&intervals);
        let interval_cv = stats::coefficient_of_variation(&intervals);
        if interval_cv >= INTERVAL_CV_THRESHOLD {
            return None;
        }

        let frequency = Frequency::from_interval(avg_interval)?;

        let amounts: Vec<f64> = group.iter().map(|tx| tx.abs_amount()).collect();
        let amount_cv = stats::coefficient_of_variation(&amounts);
        if amount_cv >= AMOUNT_CV_THRESHOLD {
            return None;
        }
        let average_amount = stats::mean(&amounts);
        if average_amount < MIN_AVERAGE_AMOUNT {
            return None;
        }

        let confidence = confidence_score(interval_cv, amount_cv, group.len());
        let price_increase = detect_price_increase(&group);
        let is_gray = is_gray_charge(merchant, average_amount, group.len());
        let is_trial = is_trial_conversion(&group, anchor);

        let charges: Vec<SubscriptionCharge> = group
            .iter()
            .map(|tx| SubscriptionCharge {
                date: tx.date.date_naive(),
                amount: tx.abs_amount(),
            })
            .collect();

        let first = group[0];
        let last = group[group.len() - 1];
        let current_amount = last.abs_amount();
        let monthly_cost = current_amount * frequency.monthly_multiplier();
        let next_predicted_date =
            (last.date + Duration::days(avg_interval as i64)).date_naive();

        let has_price_increase = price_increase.is_some();
        Some(Subscription {
            merchant_name: merchant.to_string(),
            original_merchant_name: first.merchant_name.clone(),
            frequency,
            frequency_days: frequency.interval_days(),
            current_amount,
            average_amount,
            min_amount: amounts.iter().copied().fold(f64::INFINITY, f64::min),
            max_amount: amounts.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            first_charge_date: first.date.date_naive(),
            last_charge_date: last.date.date_naive(),
            next_predicted_date,
            transaction_count: group.len(),
            charges,
            monthly_cost,
            annual_cost: monthly_cost * 12.0,
            confidence_score: confidence,
            interval_regularity: interval_cv,
            amount_consistency: amount_cv,
            is_gray_charge: is_gray,
            has_price_increase,
            is_trial_conversion: is_trial,
            needs_attention: has_price_increase || is_gray || is_trial,
            price_increase,
        })
    }
}

impl Default for SubscriptionDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Confidence in a detected subscription, 0-100: interval regularity and
/// amount consistency carry up to 40 points each, charge history up to 20.
fn confidence_score(interval_cv: f64, amount_cv: f64, charge_count: usize) -> f64 {
    let interval_points = if interval_cv < 10.0 {
        40.0
    } else if interval_cv < 20.0 {
        30.0
    } else if interval_cv < 30.0 {
        20.0
    } else {
        10.0
    };

    let amount_points = if amount_cv < 5.0 {
        40.0
    } else if amount_cv < 15.0 {
        30.0
    } else if amount_cv < 25.0 {
        20.0
    } else {
        10.0
    };

    let history_points = if charge_count >= 10 {
        20.0
    } else if charge_count >= 6 {
        15.0
    } else if charge_count >= 3 {
        10.0
    } else {
        5.0
    };

    interval_points + amount_points + history_points
}

/// Latest charge more than 3% above the mean of all prior charges.
fn detect_price_increase(sorted_group: &[&Transaction]) -> Option<PriceIncrease> {
    if sorted_group.len() < 2 {
        return None;
    }
    let latest = sorted_group[sorted_group.len() - 1];
    let latest_amount = latest.abs_amount();
    let prior: Vec<f64> = sorted_group[..sorted_group.len() - 1]
        .iter()
        .map(|tx| tx.abs_amount())
        .collect();
    let historical_avg = stats::mean(&prior);
    if historical_avg <= 0.0 {
        return None;
    }

    let percent_change = (latest_amount - historical_avg) / historical_avg * 100.0;
    if percent_change <= PRICE_INCREASE_PCT {
        return None;
    }

    Some(PriceIncrease {
        old_price: historical_avg,
        new_price: latest_amount,
        percent_change,
        detected_date: latest.date.date_naive(),
    })
}

/// Small, infrequent charge at an unrecognized service: the kind of
/// subscription people forget they have.
fn is_gray_charge(merchant: &str, average_amount: f64, charge_count: usize) -> bool {
    let merchant_lower = merchant.to_lowercase();
    let is_known = KNOWN_SUBSCRIPTION_SERVICES
        .iter()
        .any(|known| merchant_lower.contains(known));

    charge_count <= GRAY_MAX_CHARGES
        && (GRAY_MIN_AMOUNT..=GRAY_MAX_AMOUNT).contains(&average_amount)
        && !is_known
}

/// A subscription that looks like a free trial that just converted: very few
/// charges, started recently, and (with two charges) the first was a deep
/// discount on the second.
fn is_trial_conversion(sorted_group: &[&Transaction], anchor: DateTime<Utc>) -> bool {
    if sorted_group.len() > TRIAL_MAX_CHARGES {
        return false;
    }

    let first = sorted_group[0];
    let days_since_first = (anchor - first.date).num_days();
    if days_since_first > TRIAL_RECENT_DAYS {
        return false;
    }

    if sorted_group.len() == 2 {
        let first_amount = sorted_group[0].abs_amount();
        let second_amount = sorted_group[1].abs_amount();
        first_amount < second_amount * TRIAL_DISCOUNT_RATIO
    } else {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn charge(date: &str, amount: f64, merchant: &str) -> Transaction {
        Transaction {
            id: format!("{}-{}", merchant, date),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap()
                .and_utc(),
            amount: -amount,
            merchant_name: merchant.to_string(),
            category: vec!["SUBSCRIPTION".to_string()],
            payment_channel: "online".to_string(),
            pending: false,
        }
    }

    #[test]
    fn test_detects_regular_monthly_subscription() {
        let txs: Vec<Transaction> = [
            "2025-01-05", "2025-02-04", "2025-03-06", "2025-04-05", "2025-05-05", "2025-06-04",
        ]
        .iter()
        .map(|date| charge(date, 9.99, "NETFLIX.COM"))
        .collect();

        let summary = SubscriptionDetector::new().detect(&txs);
        assert_eq!(summary.total_subscriptions, 1);

        let sub = &summary.subscriptions[0];
        assert_eq!(sub.frequency, Frequency::Monthly);
        assert_eq!(sub.merchant_name, "netflix");
        assert_eq!(sub.transaction_count, 6);
        assert!((sub.monthly_cost - 9.99).abs() < 1e-6);
        assert!((sub.annual_cost - 119.88).abs() < 1e-6);
        assert!(sub.confidence_score >= 80.0);
        assert!(!sub.needs_attention);
        // Next charge predicted one mean interval after the last
        assert!(sub.next_predicted_date > sub.last_charge_date);
    }

    #[test]
    fn test_single_charge_is_not_a_subscription() {
        let txs = vec![charge("2025-06-01", 5.0, "Some App")];
        let summary = SubscriptionDetector::new().detect(&txs);
        assert_eq!(summary.total_subscriptions, 0);
    }

    #[test]
    fn test_irregular_intervals_rejected() {
        let txs = vec![
            charge("2025-01-05", 20.0, "Random Store"),
            charge("2025-01-20", 20.0, "Random Store"),
            charge("2025-03-28", 20.0, "Random Store"),
        ];
        let summary = SubscriptionDetector::new().detect(&txs);
        assert_eq!(summary.total_subscriptions, 0);
    }

    #[test]
    fn test_variable_amounts_rejected() {
        // Perfect 30-day cadence but wildly different amounts: a habit, not
        // a subscription
        let txs = vec![
            charge("2025-03-01", 12.0, "Corner Deli"),
            charge("2025-03-31", 55.0, "Corner Deli"),
            charge("2025-04-30", 24.0, "Corner Deli"),
        ];
        let summary = SubscriptionDetector::new().detect(&txs);
        assert_eq!(summary.total_subscriptions, 0);
    }

    #[test]
    fn test_price_increase_flagged() {
        let mut txs: Vec<Transaction> = [
            "2025-01-10", "2025-02-09", "2025-03-11", "2025-04-10",
        ]
        .iter()
        .map(|date| charge(date, 9.99, "StreamCo"))
        .collect();
        txs.push(charge("2025-05-10", 11.49, "StreamCo"));

        let summary = SubscriptionDetector::new().detect(&txs);
        assert_eq!(summary.total_subscriptions, 1);
        let sub = &summary.subscriptions[0];
        assert!(sub.has_price_increase);
        assert!(sub.needs_attention);
        let increase = sub.price_increase.as_ref().unwrap();
        assert!((increase.old_price - 9.99).abs() < 1e-6);
        assert!((increase.new_price - 11.49).abs() < 1e-6);
        assert!(increase.percent_change > PRICE_INCREASE_PCT);
        assert_eq!(summary.price_increases_count, 1);
    }

    #[test]
    fn test_gray_charge_spares_known_services() {
        let unknown: Vec<Transaction> = ["2025-04-10", "2025-05-10", "2025-06-09"]
            .iter()
            .map(|date| charge(date, 4.99, "Obscure Widget Club"))
            .collect();
        let known: Vec<Transaction> = ["2025-04-12", "2025-05-12", "2025-06-11"]
            .iter()
            .map(|date| charge(date, 4.99, "Spotify USA"))
            .collect();

        let txs: Vec<Transaction> = unknown.into_iter().chain(known).collect();
        let summary = SubscriptionDetector::new().detect(&txs);
        assert_eq!(summary.total_subscriptions, 2);
        assert_eq!(summary.gray_charges_count, 1);
        let gray = summary
            .subscriptions
            .iter()
            .find(|s| s.is_gray_charge)
            .unwrap();
        assert_eq!(gray.merchant_name, "obscure widget club");
    }

    #[test]
    fn test_subscriptions_sorted_by_monthly_cost() {
        let cheap: Vec<Transaction> = ["2025-04-01", "2025-05-01", "2025-05-31"]
            .iter()
            .map(|date| charge(date, 9.99, "Netflix"))
            .collect();
        let pricey: Vec<Transaction> = ["2025-04-03", "2025-05-03", "2025-06-02"]
            .iter()
            .map(|date| charge(date, 54.99, "Equinox Gym"))
            .collect();

        let txs: Vec<Transaction> = cheap.into_iter().chain(pricey).collect();
        let summary = SubscriptionDetector::new().detect(&txs);
        assert_eq!(summary.total_subscriptions, 2);
        assert!(summary.subscriptions[0].monthly_cost > summary.subscriptions[1].monthly_cost);
        assert!((summary.total_monthly_cost - (9.99 + 54.99)).abs() < 1e-6);
    }

    #[test]
    fn test_annual_cost_round_trip() {
        let txs: Vec<Transaction> = ["2025-02-15", "2025-03-17", "2025-04-16", "2025-05-16"]
            .iter()
            .map(|date| charge(date, 15.0, "CloudDrive"))
            .collect();
        let summary = SubscriptionDetector::new().detect(&txs);
        let sub = &summary.subscriptions[0];
        assert!((sub.annual_cost - sub.monthly_cost * 12.0).abs() < 1e-9);
    }
}
