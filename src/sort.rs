//! Page ordering strategies.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::locator::PageLocator;

/// How the collected pages are ordered before viewing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortStrategy {
    /// Numeric-aware: `p2` sorts before `p10`.
    #[default]
    Natural,
    /// Plain byte-wise comparison of keys.
    #[serde(alias = "lexical")]
    #[value(alias = "lexical")]
    Lexicographic,
    /// Keep collection order (directory walk / archive order).
    Original,
}

impl SortStrategy {
    pub fn name(self) -> &'static str {
        match self {
            SortStrategy::Natural => "natural",
            SortStrategy::Lexicographic => "lexicographic",
            SortStrategy::Original => "original",
        }
    }
}

impl fmt::Display for SortStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SortStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "natural" => Ok(SortStrategy::Natural),
            "lexicographic" | "lexical" => Ok(SortStrategy::Lexicographic),
            "original" => Ok(SortStrategy::Original),
            other => anyhow::bail!("unknown sort strategy '{other}'"),
        }
    }
}

/// Return a reordered copy of `locators`. The input is left untouched.
///
/// The sorts are stable, so equal keys keep their collection order.
pub fn sort_locators(locators: &[PageLocator], strategy: SortStrategy) -> Vec<PageLocator> {
    let mut sorted = locators.to_vec();
    match strategy {
        SortStrategy::Natural => sorted.sort_by(|a, b| natural_cmp(a.key(), b.key())),
        SortStrategy::Lexicographic => sorted.sort_by(|a, b| a.key().cmp(b.key())),
        SortStrategy::Original => {}
    }
    sorted
}

fn natural_cmp(a: &str, b: &str) -> Ordering {
    natord::compare(a, b)
}
