//! End-to-end tests over the full analysis pipeline

use chrono::NaiveDate;
use spendlens_core::{
    Aggregation, Frequency, InsightsPipeline, SubscriptionDetector, Transaction, TriggerKind,
};

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

/// A year of plausible household history: salary, rent, groceries, a
/// streaming subscription, and steadily growing dining spend.
fn household_history() -> Vec<Transaction> {
    let mut txs = Vec::new();
    for month in 1..=12 {
        let m = format!("2025-{:02}", month);
        txs.push(tx(&format!("{}-01", m), 5200.0, "Acme Payroll", "INCOME"));
        txs.push(tx(&format!("{}-02", m), -1800.0, "Parkside Apartments", "Rent"));
        txs.push(tx(&format!("{}-05", m), -9.99, "NETFLIX.COM", "ENTERTAINMENT"));
        txs.push(tx(&format!("{}-08", m), -240.0, "Whole Foods Market", "GROCERIES"));
        txs.push(tx(&format!("{}-20", m), -180.0, "Whole Foods Market", "GROCERIES"));
        // Dining creeps up through the year
        txs.push(tx(
            &format!("{}-14", m),
            -(80.0 + month as f64 * 25.0),
            "Corner Bistro",
            "DINING",
        ));
    }
    txs
}

#[test]
fn test_aggregation_rollups_are_consistent() {
    let txs = household_history();
    let agg = Aggregation::from_transactions(&txs);

    let lifetime: f64 = agg
        .by_category
        .values()
        .map(|c| c.total_spending)
        .sum();
    let monthly_sum: f64 = agg.by_month.totals.values().map(|t| t.total_spending).sum();
    let weekly_sum: f64 = agg.by_week.totals.values().map(|t| t.total_spending).sum();
    let yearly_sum: f64 = agg.by_year.totals.values().map(|t| t.total_spending).sum();

    assert!((lifetime - monthly_sum).abs() < 1e-6);
    assert!((lifetime - weekly_sum).abs() < 1e-6);
    assert!((lifetime - yearly_sum).abs() < 1e-6);

    assert_eq!(agg.derived.account_age_months, 12);
    assert_eq!(agg.by_quarter.totals.len(), 4);
    // Income never lands in the spending tables
    assert!(!agg.by_category.contains_key("INCOME"));
    assert_eq!(agg.monthly_income.len(), 12);
}

#[test]
fn test_pipeline_produces_ranked_actionable_insights() {
    let txs = household_history();
    let insights = InsightsPipeline::new().run(&txs);

    assert!(!insights.is_empty());
    assert!(insights.len() <= 7);

    // Ranked by score, best first
    for pair in insights.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }

    // Rent is a fixed obligation and never surfaces as an insight
    for insight in &insights {
        assert_ne!(insight.trigger.category.as_deref(), Some("Rent"));
    }

    // The dining creep is the story of this history; something should say so
    let mentions_dining = insights
        .iter()
        .any(|i| i.trigger.category.as_deref() == Some("DINING"));
    let mentions_growth = insights.iter().any(|i| {
        matches!(
            i.trigger.kind,
            TriggerKind::SixMonthSustainedTrend | TriggerKind::AllTimeHighSpending
        )
    });
    assert!(mentions_dining || mentions_growth);
}

#[test]
fn test_pipeline_respects_top_n() {
    let txs = household_history();
    let insights = InsightsPipeline::with_top_n(3).run(&txs);
    assert!(insights.len() <= 3);
}

#[test]
fn test_category_never_exceeds_two_insights() {
    let txs = household_history();
    let insights = InsightsPipeline::new().run(&txs);

    let mut counts = std::collections::BTreeMap::new();
    for insight in &insights {
        if let Some(category) = &insight.trigger.category {
            *counts.entry(category.clone()).or_insert(0) += 1;
        }
    }
    for (category, count) in counts {
        assert!(count <= 2, "category {} appears {} times", category, count);
    }
}

#[test]
fn test_empty_history_is_quiet() {
    let insights = InsightsPipeline::new().run(&[]);
    assert!(insights.is_empty());

    let summary = SubscriptionDetector::new().detect(&[]);
    assert_eq!(summary.total_subscriptions, 0);
    assert_eq!(summary.total_monthly_cost, 0.0);
}

#[test]
fn test_subscription_detected_in_household_history() {
    let txs = household_history();
    let summary = SubscriptionDetector::new().detect(&txs);

    let netflix = summary
        .subscriptions
        .iter()
        .find(|s| s.merchant_name == "netflix")
        .expect("the streaming subscription should be detected");
    assert_eq!(netflix.frequency, Frequency::Monthly);
    assert_eq!(netflix.transaction_count, 12);
    assert!(netflix.confidence_score >= 80.0);
    assert!((netflix.annual_cost - netflix.monthly_cost * 12.0).abs() < 1e-9);

    // Groceries twice a month is a habit, not a 30-day cadence
    assert!(summary
        .subscriptions
        .iter()
        .all(|s| s.merchant_name != "whole foods market"));
}

#[test]
fn test_positive_history_surfaces_good_news() {
    // Income comfortably above spending every month, spending declining
    let mut txs = Vec::new();
    for month in 1..=6 {
        let m = format!("2025-{:02}", month);
        txs.push(tx(&format!("{}-01", m), 4000.0, "Payroll", "INCOME"));
        txs.push(tx(
            &format!("{}-10", m),
            -(900.0 - month as f64 * 50.0),
            "General Store",
            "SHOPPING",
        ));
    }
    let insights = InsightsPipeline::new().run(&txs);
    assert!(
        insights.iter().any(|i| i.trigger.kind.is_positive()),
        "an improving history must include at least one positive insight"
    );
}
