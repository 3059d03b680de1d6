//! Query keyword extraction and contract-vocabulary expansion.
//!
//! A query such as "when does the agreement terminate" only literally mentions
//! a few words a contract might use. Every keyword that names one of the
//! concepts below, or is one of a concept's related terms, pulls the whole
//! term list into the expanded keyword set.

use std::collections::BTreeSet;

/// Keywords must be longer than this many characters
const MIN_KEYWORD_CHARS: usize = 3;

/// Canonical contract concepts and the terms that signal them
pub const SEMANTIC_EXPANSIONS: &[(&str, &[&str])] = &[
    (
        "date",
        &[
            "date",
            "effective",
            "execution",
            "commence",
            "start",
            "end",
            "termination",
            "expiration",
            "expire",
            "term",
            "period",
            "duration",
            "until",
            "from",
            "renewal",
        ],
    ),
    (
        "payment",
        &[
            "payment",
            "fee",
            "cost",
            "price",
            "invoice",
            "compensation",
            "amount",
            "value",
            "quarterly",
            "monthly",
            "annual",
        ],
    ),
    (
        "termination",
        &[
            "termination",
            "terminate",
            "cancel",
            "cancellation",
            "end",
            "expiration",
            "expire",
            "notice",
            "breach",
        ],
    ),
    (
        "party",
        &[
            "party", "parties", "vendor", "client", "company", "provider", "supplier", "customer",
        ],
    ),
    (
        "liability",
        &[
            "liability",
            "liable",
            "damages",
            "limitation",
            "indemnify",
            "indemnification",
            "responsible",
        ],
    ),
    (
        "confidential",
        &[
            "confidential",
            "confidentiality",
            "non-disclosure",
            "proprietary",
            "secret",
        ],
    ),
    (
        "renewal",
        &[
            "renewal",
            "renew",
            "extend",
            "extension",
            "auto-renew",
            "automatic",
        ],
    ),
    (
        "obligation",
        &[
            "obligation",
            "duty",
            "responsibility",
            "requirement",
            "must",
            "shall",
        ],
    ),
    (
        "penalty",
        &[
            "penalty",
            "penalties",
            "damages",
            "liquidated",
            "fine",
            "breach",
        ],
    ),
    (
        "risk",
        &["risk", "risks", "liability", "exposure", "assessment"],
    ),
];

/// Lower-case the query and keep whitespace-separated tokens longer than three characters.
///
/// Duplicates are kept, so a keyword repeated in the query weighs more.
pub fn extract_keywords(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .filter(|word| word.chars().count() > MIN_KEYWORD_CHARS)
        .map(str::to_string)
        .collect()
}

/// Union the original keywords with the term list of every concept they touch
pub fn expand_keywords(keywords: &[String]) -> BTreeSet<String> {
    let mut expanded: BTreeSet<String> = keywords.iter().cloned().collect();

    for keyword in keywords {
        for (concept, terms) in SEMANTIC_EXPANSIONS {
            if keyword == concept || terms.contains(&keyword.as_str()) {
                expanded.extend(terms.iter().map(|term| term.to_string()));
            }
        }
    }

    expanded
}
