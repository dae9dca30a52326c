//! Command implementations

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use tracing::info;

use spendlens_core::{
    InsightsPipeline, ScoredTrigger, SubscriptionDetector, SubscriptionSummary, Transaction,
};

/// One row of the transaction CSV. The category column holds one or more
/// tags separated by `|`.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    transaction_id: String,
    date: NaiveDate,
    amount: f64,
    merchant_name: String,
    category: String,
    payment_channel: String,
    pending: bool,
}

impl From<CsvRecord> for Transaction {
    fn from(record: CsvRecord) -> Self {
        let category = record
            .category
            .split('|')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        Transaction {
            id: record.transaction_id,
            date: record.date.and_time(NaiveTime::MIN).and_utc(),
            amount: record.amount,
            merchant_name: record.merchant_name,
            category,
            payment_channel: record.payment_channel,
            pending: record.pending,
        }
    }
}

fn read_transactions<R: Read>(reader: R) -> Result<Vec<Transaction>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut transactions = Vec::new();
    for (line, result) in csv_reader.deserialize::<CsvRecord>().enumerate() {
        let record = result.with_context(|| format!("Invalid CSV record at line {}", line + 2))?;
        transactions.push(record.into());
    }
    Ok(transactions)
}

fn load_transactions(path: &Path) -> Result<Vec<Transaction>> {
    let file =
        File::open(path).with_context(|| format!("Cannot open file: {}", path.display()))?;
    let transactions = read_transactions(file)?;
    info!(
        count = transactions.len(),
        file = %path.display(),
        "Loaded transactions"
    );
    Ok(transactions)
}

pub fn cmd_insights(file: &Path, top: usize, json: bool) -> Result<()> {
    let transactions = load_transactions(file)?;
    let insights = InsightsPipeline::with_top_n(top).run(&transactions);

    if json {
        println!("{}", serde_json::to_string_pretty(&insights)?);
        return Ok(());
    }

    if insights.is_empty() {
        println!("No notable spending patterns found.");
        return Ok(());
    }

    println!();
    println!("🔎 Spending Insights");
    println!("   ─────────────────────────────────────────────────────────────");
    for (rank, insight) in insights.iter().enumerate() {
        print_insight(rank + 1, insight);
    }
    Ok(())
}

fn print_insight(rank: usize, insight: &ScoredTrigger) {
    let trigger = &insight.trigger;
    let subject = trigger
        .category
        .as_deref()
        .or(trigger.merchant.as_deref())
        .unwrap_or("overall");

    let mut details = Vec::new();
    if let Some(pct) = trigger.percent_change {
        details.push(format!("{:+.1}%", pct));
    }
    if let Some(dollars) = trigger.dollar_change {
        details.push(format!("${:.2}", dollars.abs()));
    }
    if let Some(amount) = trigger.this_month {
        details.push(format!("now ${:.2}", amount));
    }
    if let Some(visits) = trigger.visit_count {
        details.push(format!("{} visits", visits));
    }

    println!(
        "   {}. [{:8}] {:28} │ {:20} │ {}",
        rank,
        insight.priority.as_str(),
        trigger.kind.as_str(),
        truncate(subject, 20),
        details.join("  ")
    );
}

pub fn cmd_subscriptions(file: &Path, json: bool) -> Result<()> {
    let transactions = load_transactions(file)?;
    let summary = SubscriptionDetector::new().detect(&transactions);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if summary.total_subscriptions == 0 {
        println!("No recurring subscriptions detected.");
        return Ok(());
    }

    print_subscription_report(&summary);
    Ok(())
}

fn print_subscription_report(summary: &SubscriptionSummary) {
    println!();
    println!("📋 Detected Subscriptions");
    println!("   ─────────────────────────────────────────────────────────────");
    for sub in &summary.subscriptions {
        let icon = if sub.needs_attention { "⚠️" } else { "✅" };
        let mut flags = Vec::new();
        if sub.is_gray_charge {
            flags.push("gray charge");
        }
        if sub.has_price_increase {
            flags.push("price increase");
        }
        if sub.is_trial_conversion {
            flags.push("trial conversion");
        }

        println!(
            "   {} {:20} │ ${:>7.2}/{:<9} │ next {} {}",
            icon,
            truncate(&sub.merchant_name, 20),
            sub.current_amount,
            sub.frequency.as_str(),
            sub.next_predicted_date,
            if flags.is_empty() {
                String::new()
            } else {
                format!("({})", flags.join(", "))
            }
        );
    }
    println!("   ─────────────────────────────────────────────────────────────");
    println!(
        "   {} subscriptions │ ${:.2}/month │ ${:.2}/year",
        summary.total_subscriptions, summary.total_monthly_cost, summary.total_annual_cost
    );
}

/// Truncate a string for column display, appending an ellipsis
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
