//! Spendlens Core Library
//!
//! Shared functionality for the Spendlens spending-insights engine:
//! - Multi-dimensional transaction aggregation (week/month/quarter/year,
//!   merchant, category, day-of-week, seasonal)
//! - Trigger detection rule catalog over the aggregated history
//! - Priority scoring, deduplication, and insight selection
//! - Recurring subscription detection with gray-charge, price-increase,
//!   and trial-conversion flags
//! - Merchant name normalization and fuzzy merchant/category lookup

pub mod aggregate;
pub mod detect;
pub mod error;
pub mod fuzzy;
pub mod insights;
pub mod merchant;
pub mod models;
pub mod stats;

pub use aggregate::{Aggregation, PeriodTable, RollingTrend, RollingWindows, YoyWindows};
pub use detect::SubscriptionDetector;
pub use error::{Error, Result};
pub use fuzzy::{FuzzyMatch, FuzzyMatcher};
pub use insights::{
    InsightsPipeline, Priority, PriorityScorer, ScoredTrigger, Trigger, TriggerContext,
    TriggerDetector, TriggerKind, TriggerRule,
};
pub use merchant::normalize_merchant;
pub use models::{
    Frequency, PriceIncrease, Subscription, SubscriptionCharge, SubscriptionSummary, Transaction,
};
