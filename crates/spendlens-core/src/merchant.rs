//! Merchant name normalization
//!
//! Raw merchant strings from bank feeds vary wildly for the same business:
//! "NETFLIX.COM/ACCT", "Netflix Inc", "NETFLIX #4821". Both the aggregator
//! and the subscription detector group by the normalized form produced here,
//! so the normalization must be stable and idempotent:
//! `normalize(normalize(x)) == normalize(x)`.

use std::sync::LazyLock;

use regex::Regex;

/// Trailing numeric location/account codes, e.g. " - 1234" or "#4821".
static LOCATION_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\s*-\s*\d+|#\d+)$").expect("valid regex"));

/// Everything that is not a letter, digit, or space becomes a space.
static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9\s]").expect("valid regex"));

/// Corporate suffixes stripped from the end of a name, repeatedly, so that
/// "acme co inc" reduces all the way to "acme".
const CORPORATE_SUFFIXES: [&str; 10] = [
    "inc",
    "llc",
    "ltd",
    "corp",
    "co",
    "lp",
    "sa",
    "limited",
    "corporation",
    "company",
];

/// Well-known abbreviation/alias -> canonical display name. Checked by
/// substring containment against the cleaned lowercase name, longest
/// patterns first. Canonical names must themselves map back to the same
/// canonical name, otherwise normalization would not be idempotent.
const CANONICAL_MERCHANTS: [(&str, &str); 11] = [
    ("mcdonalds", "McDonalds"),
    ("starbucks", "Starbucks"),
    ("walmart", "Walmart"),
    ("amazon", "Amazon"),
    ("target", "Target"),
    ("amzn", "Amazon"),
    ("amz", "Amazon"),
    ("sbx", "Starbucks"),
    ("mcd", "McDonalds"),
    ("tgt", "Target"),
    ("wmt", "Walmart"),
];

/// Normalize a raw merchant name into a stable grouping key.
///
/// Steps: lowercase, drop ".com"/path tails and trailing location codes,
/// strip punctuation, collapse whitespace, peel corporate suffixes, then map
/// known abbreviations to their canonical name. Empty input normalizes to
/// "unknown".
pub fn normalize_merchant(merchant: &str) -> String {
    let trimmed = merchant.trim();
    if trimmed.is_empty() {
        return "unknown".to_string();
    }

    let mut name = trimmed.to_lowercase();

    // Drop domain and path tails: "netflix.com/acct" -> "netflix"
    if let Some(idx) = name.find(".com") {
        name.truncate(idx);
    }
    if let Some(idx) = name.find('/') {
        name.truncate(idx);
    }

    // Trailing location/account codes
    name = LOCATION_CODE.replace(&name, "").into_owned();

    // Punctuation becomes spaces, then whitespace collapses on rejoin
    name = NON_WORD.replace_all(&name, " ").into_owned();

    let mut tokens: Vec<&str> = name.split_whitespace().collect();
    while let Some(last) = tokens.last() {
        if CORPORATE_SUFFIXES.contains(last) {
            tokens.pop();
        } else {
            break;
        }
    }

    let cleaned = tokens.join(" ");
    if cleaned.is_empty() {
        return "unknown".to_string();
    }

    for (pattern, canonical) in CANONICAL_MERCHANTS {
        if cleaned.contains(pattern) {
            return canonical.to_string();
        }
    }

    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_domains_and_location_codes() {
        assert_eq!(normalize_merchant("NETFLIX.COM/ACCT"), "netflix");
        assert_eq!(normalize_merchant("SPOTIFY USA #1234"), "spotify usa");
        assert_eq!(normalize_merchant("BLUE BOTTLE - 042"), "blue bottle");
    }

    #[test]
    fn test_strips_corporate_suffixes() {
        assert_eq!(normalize_merchant("Acme Co Inc."), "acme");
        assert_eq!(normalize_merchant("Widgets LLC"), "widgets");
        assert_eq!(normalize_merchant("Example Corporation"), "example");
    }

    #[test]
    fn test_canonical_abbreviations() {
        assert_eq!(normalize_merchant("AMZN Mktp US"), "Amazon");
        assert_eq!(normalize_merchant("AMAZON.COM*123456"), "Amazon");
        assert_eq!(normalize_merchant("SBX 00412 SEATTLE"), "Starbucks");
        assert_eq!(normalize_merchant("WMT SUPERCENTER"), "Walmart");
    }

    #[test]
    fn test_empty_and_degenerate_names() {
        assert_eq!(normalize_merchant(""), "unknown");
        assert_eq!(normalize_merchant("   "), "unknown");
        assert_eq!(normalize_merchant("Inc."), "unknown");
    }

    #[test]
    fn test_idempotent() {
        let fixtures = [
            "NETFLIX.COM/ACCT",
            "AMZN Mktp US",
            "Acme Co Inc.",
            "SPOTIFY USA #1234",
            "Blue Bottle Coffee - 042",
            "WMT SUPERCENTER",
            "",
            "Inc.",
            "Trader Joe's #552",
        ];
        for raw in fixtures {
            let once = normalize_merchant(raw);
            let twice = normalize_merchant(&once);
            assert_eq!(once, twice, "normalization of {:?} is not idempotent", raw);
        }
    }
}
