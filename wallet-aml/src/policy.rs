//! Decision policy for screened transaction counterparties.
//!
//! Decision mapping, evaluated in order:
//! - level extreme, or score > 90 → Block
//! - level high, or score > 60 → Flag
//! - otherwise → Allow
//!
//! The score clauses apply regardless of level, so a medium-level result
//! scoring 61..=69 is flagged.

use serde::{Deserialize, Serialize};

use crate::risk::{RiskLevel, ScreeningResult};

const BLOCK_SCORE_THRESHOLD: u8 = 90;
const FLAG_SCORE_THRESHOLD: u8 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Allow,
    Flag,
    Block,
}

impl Action {
    /// Status recorded on a transaction gated by this action.
    pub fn status(&self) -> AmlStatus {
        match self {
            Action::Allow => AmlStatus::Approved,
            Action::Flag => AmlStatus::Flagged,
            Action::Block => AmlStatus::Blocked,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Allow => "allow",
            Action::Flag => "flag",
            Action::Block => "block",
        }
    }
}

/// AML status attached to a transaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmlStatus {
    Approved,
    Flagged,
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    pub reason: String,
}

impl Decision {
    pub fn is_blocked(&self) -> bool {
        self.action == Action::Block
    }
}

pub fn should_block(result: &ScreeningResult) -> bool {
    result.risk_level() == RiskLevel::Extreme || result.risk_score() > BLOCK_SCORE_THRESHOLD
}

pub fn should_flag(result: &ScreeningResult) -> bool {
    result.risk_level() == RiskLevel::High || result.risk_score() > FLAG_SCORE_THRESHOLD
}

/// Recommended action for a transaction to or from the screened address.
pub fn decide(result: &ScreeningResult) -> Decision {
    if should_block(result) {
        return Decision {
            action: Action::Block,
            reason: "Transaction should be blocked due to extremely high risk factors.".to_string(),
        };
    }

    if should_flag(result) {
        return Decision {
            action: Action::Flag,
            reason: "Transaction should be flagged for manual review due to elevated risk."
                .to_string(),
        };
    }

    Decision {
        action: Action::Allow,
        reason: "Transaction can proceed with standard monitoring.".to_string(),
    }
}

/// Flag buckets, in matching priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagCategory {
    Sanctions,
    Criminal,
    Exchange,
    Mixer,
    Other,
}

impl FlagCategory {
    const KEYWORDS: [(FlagCategory, &'static [&'static str]); 4] = [
        (FlagCategory::Sanctions, &["sanction", "ofac"]),
        (FlagCategory::Criminal, &["criminal", "illicit", "fraud"]),
        (FlagCategory::Exchange, &["exchange", "cex"]),
        (FlagCategory::Mixer, &["mixer", "tumbler"]),
    ];

    /// First bucket whose keywords appear in `flag`, case-insensitively.
    pub fn of(flag: &str) -> Self {
        let lower = flag.to_lowercase();
        Self::KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(category, _)| *category)
            .unwrap_or(FlagCategory::Other)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagCategories {
    pub sanctions: Vec<String>,
    pub criminal: Vec<String>,
    pub exchange: Vec<String>,
    pub mixer: Vec<String>,
    pub other: Vec<String>,
}

impl FlagCategories {
    pub fn bucket(&self, category: FlagCategory) -> &[String] {
        match category {
            FlagCategory::Sanctions => &self.sanctions,
            FlagCategory::Criminal => &self.criminal,
            FlagCategory::Exchange => &self.exchange,
            FlagCategory::Mixer => &self.mixer,
            FlagCategory::Other => &self.other,
        }
    }

    fn bucket_mut(&mut self, category: FlagCategory) -> &mut Vec<String> {
        match category {
            FlagCategory::Sanctions => &mut self.sanctions,
            FlagCategory::Criminal => &mut self.criminal,
            FlagCategory::Exchange => &mut self.exchange,
            FlagCategory::Mixer => &mut self.mixer,
            FlagCategory::Other => &mut self.other,
        }
    }
}

/// Partition flags into keyword buckets, preserving order within each bucket.
pub fn categorize_flags<S: AsRef<str>>(flags: &[S]) -> FlagCategories {
    let mut categories = FlagCategories::default();
    for flag in flags {
        let flag = flag.as_ref();
        categories
            .bucket_mut(FlagCategory::of(flag))
            .push(flag.to_string());
    }
    categories
}
