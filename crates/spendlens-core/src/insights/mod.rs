//! Spending insights pipeline
//!
//! Three stages, each pure over its input: aggregate the transaction
//! history, run the trigger rule catalog against it, then score and select
//! the final insight list.

pub mod detector;
pub mod scorer;
pub mod types;

use tracing::info;

use crate::aggregate::Aggregation;
use crate::models::Transaction;

pub use detector::{TriggerDetector, TriggerRule};
pub use scorer::PriorityScorer;
pub use types::{
    MerchantAmount, Priority, ScoredTrigger, TrendDirection, Trigger, TriggerContext, TriggerKind,
};

/// End-to-end insights run: aggregate, detect, score.
pub struct InsightsPipeline {
    detector: TriggerDetector,
    scorer: PriorityScorer,
}

impl InsightsPipeline {
    pub fn new() -> Self {
        Self {
            detector: TriggerDetector::new(),
            scorer: PriorityScorer::new(),
        }
    }

    /// Limit the final insight list to `top_n` entries.
    pub fn with_top_n(top_n: usize) -> Self {
        Self {
            detector: TriggerDetector::new(),
            scorer: PriorityScorer::with_top_n(top_n),
        }
    }

    /// Run the full pipeline over a transaction history.
    pub fn run(&self, transactions: &[Transaction]) -> Vec<ScoredTrigger> {
        let aggregation = Aggregation::from_transactions(transactions);
        let triggers = self.detector.detect(&aggregation);
        let insights = self.scorer.score_and_rank(triggers);
        info!(
            transactions = transactions.len(),
            months = aggregation.derived.account_age_months,
            insights = insights.len(),
            "Insights pipeline complete"
        );
        insights
    }
}

impl Default for InsightsPipeline {
    fn default() -> Self {
        Self::new()
    }
}
