//! Fuzzy matching of user-supplied merchant and category names
//!
//! Lets free-text queries ("netflx", "grocceries") resolve against the
//! merchants and categories actually present in a transaction history, using
//! Jaro-Winkler similarity so short edit-distance typos still match.

use std::collections::BTreeSet;

use strsim::jaro_winkler;
use tracing::debug;

use crate::merchant::normalize_merchant;
use crate::models::Transaction;

const DEFAULT_THRESHOLD: f64 = 0.8;

/// A candidate that cleared the similarity threshold
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    pub value: String,
    /// Jaro-Winkler similarity, 0.0-1.0
    pub score: f64,
}

/// Index of known merchants and categories for fuzzy lookup.
pub struct FuzzyMatcher {
    merchants: Vec<String>,
    categories: Vec<String>,
    threshold: f64,
}

impl FuzzyMatcher {
    /// Build the lookup index from a transaction history. Merchants are
    /// indexed in normalized form; categories as tagged.
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let merchants: BTreeSet<String> = transactions
            .iter()
            .map(|tx| normalize_merchant(&tx.merchant_name))
            .collect();
        let categories: BTreeSet<String> = transactions
            .iter()
            .map(|tx| tx.primary_category().to_string())
            .collect();

        Self {
            merchants: merchants.into_iter().collect(),
            categories: categories.into_iter().collect(),
            threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Best merchant match for a query, if any clears the threshold. The
    /// query is normalized the same way indexed merchants were.
    pub fn match_merchant(&self, query: &str) -> Option<FuzzyMatch> {
        let normalized = normalize_merchant(query);
        self.best_match(&normalized, &self.merchants)
    }

    /// Best category match for a query, compared case-insensitively.
    pub fn match_category(&self, query: &str) -> Option<FuzzyMatch> {
        self.best_match(query, &self.categories)
    }

    fn best_match(&self, query: &str, candidates: &[String]) -> Option<FuzzyMatch> {
        let query_lower = query.to_lowercase();
        let best = candidates
            .iter()
            .map(|candidate| {
                let score = jaro_winkler(&query_lower, &candidate.to_lowercase());
                (candidate, score)
            })
            .max_by(|a, b| a.1.total_cmp(&b.1))?;

        if best.1 >= self.threshold {
            debug!(query, matched = %best.0, score = best.1, "Fuzzy match");
            Some(FuzzyMatch {
                value: best.0.clone(),
                score: best.1,
            })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn tx(merchant: &str, category: &str) -> Transaction {
        Transaction {
            id: merchant.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 6, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap()
                .and_utc(),
            amount: -10.0,
            merchant_name: merchant.to_string(),
            category: vec![category.to_string()],
            payment_channel: "online".to_string(),
            pending: false,
        }
    }

    fn matcher() -> FuzzyMatcher {
        FuzzyMatcher::from_transactions(&[
            tx("NETFLIX.COM", "ENTERTAINMENT"),
            tx("Whole Foods Market", "GROCERIES"),
            tx("Shell Oil", "TRANSPORTATION"),
        ])
    }

    #[test]
    fn test_exact_match_scores_one() {
        let m = matcher().match_merchant("netflix").unwrap();
        assert_eq!(m.value, "netflix");
        assert!((m.score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_typo_still_matches() {
        let m = matcher().match_merchant("netflx").unwrap();
        assert_eq!(m.value, "netflix");
        assert!(m.score < 1.0);

        let c = matcher().match_category("grocceries").unwrap();
        assert_eq!(c.value, "GROCERIES");
    }

    #[test]
    fn test_unrelated_query_returns_none() {
        assert!(matcher().match_merchant("zzqqxx").is_none());
        assert!(matcher().match_category("astronomy").is_none());
    }

    #[test]
    fn test_threshold_is_adjustable() {
        let strict = matcher().with_threshold(0.99);
        assert!(strict.match_merchant("netflx").is_none());
        assert!(strict.match_merchant("netflix").is_some());
    }
}
