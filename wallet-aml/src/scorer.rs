//! Synthetic risk scoring for the mock AML provider.
//!
//! Addresses fall into a static risk tier; the tier fixes the score range, the
//! risk level and the deterministic flags, while the exact score and the
//! confidence are drawn from an injectable [`RandomSource`].

use std::collections::VecDeque;
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::clock::{Clock, SystemClock};
use crate::errors::{AmlError, AmlResult};
use crate::risk::{RiskLevel, RiskRating, ScreeningResult, WalletType};

/// Provider label stamped on synthetic results.
pub const MOCK_PROVIDER_NAME: &str = "Mock AML Provider";

/// Addresses scored in the high-risk tier.
pub const HIGH_RISK_ADDRESSES: &[&str] = &[
    "0x6B175474E89094C44Da98b954EedeAC495271d0F",
    "0x514910771AF9Ca656af840dff83E8264EcF986CA",
];

/// Addresses scored in the medium-risk tier.
pub const MEDIUM_RISK_ADDRESSES: &[&str] = &["0x8C8D7C46219D9205f056f28fee5950aD564d7465"];

pub const FLAG_SANCTIONED: &str = "Sanctioned entity";
pub const FLAG_SUSPICIOUS: &str = "Suspicious activity";
pub const FLAG_OFAC: &str = "OFAC restricted";
pub const FLAG_EXCHANGE_WALLET: &str = "Exchange wallet";
pub const FLAG_UNVERIFIED_EXCHANGE: &str = "Unverified exchange";
pub const FLAG_HOT_WALLET: &str = "Hot wallet detected";
pub const FLAG_NEW_ADDRESS: &str = "New address";
pub const FLAG_COLD_STORAGE: &str = "Cold storage wallet";

const CONFIDENCE_RANGE: RangeInclusive<u32> = 80..=99;

/// Uniform integer source used for scores, confidence and simulated latency.
pub trait RandomSource: Send + Sync + fmt::Debug {
    /// Uniform value in `range`, both ends inclusive.
    fn uniform(&self, range: RangeInclusive<u32>) -> u32;
}

/// Thread-local entropy; the production default.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn uniform(&self, range: RangeInclusive<u32>) -> u32 {
        rand::thread_rng().gen_range(range)
    }
}

/// Reproducible stream from a fixed seed.
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn uniform(&self, range: RangeInclusive<u32>) -> u32 {
        self.rng.lock().gen_range(range)
    }
}

/// Replays queued values, clamped into the requested range.
///
/// Once the queue runs dry every draw returns the low end of the range.
#[derive(Debug, Default)]
pub struct ScriptedRandom {
    values: Mutex<VecDeque<u32>>,
}

impl ScriptedRandom {
    pub fn new(values: impl IntoIterator<Item = u32>) -> Self {
        Self {
            values: Mutex::new(values.into_iter().collect()),
        }
    }

    pub fn push(&self, value: u32) {
        self.values.lock().push_back(value);
    }
}

impl RandomSource for ScriptedRandom {
    fn uniform(&self, range: RangeInclusive<u32>) -> u32 {
        let (low, high) = (*range.start(), *range.end());
        match self.values.lock().pop_front() {
            Some(value) => value.clamp(low, high),
            None => low,
        }
    }
}

/// Static risk bucket an address belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskTier {
    High,
    Medium,
    Default,
}

impl RiskTier {
    pub fn score_range(&self) -> RangeInclusive<u32> {
        match self {
            RiskTier::High => 70..=99,
            RiskTier::Medium => 40..=69,
            RiskTier::Default => 0..=39,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RiskScorer {
    high_risk: &'static [&'static str],
    medium_risk: &'static [&'static str],
    random: Arc<dyn RandomSource>,
    clock: Arc<dyn Clock>,
}

impl RiskScorer {
    pub fn new(random: Arc<dyn RandomSource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            high_risk: HIGH_RISK_ADDRESSES,
            medium_risk: MEDIUM_RISK_ADDRESSES,
            random,
            clock,
        }
    }

    /// Replace the static tier lists.
    pub fn with_tiers(
        mut self,
        high_risk: &'static [&'static str],
        medium_risk: &'static [&'static str],
    ) -> Self {
        self.high_risk = high_risk;
        self.medium_risk = medium_risk;
        self
    }

    pub fn tier_for(&self, address: &str) -> RiskTier {
        if self.high_risk.contains(&address) {
            RiskTier::High
        } else if self.medium_risk.contains(&address) {
            RiskTier::Medium
        } else {
            RiskTier::Default
        }
    }

    /// Score an address that has already been classified.
    ///
    /// Fails only if a tier's score range strays outside its level's range.
    pub fn score(&self, address: &str, wallet_type: WalletType) -> AmlResult<ScreeningResult> {
        let tier = self.tier_for(address);
        let score = self.random.uniform(tier.score_range()) as u8;
        let mut flags = Vec::new();

        let level = match tier {
            RiskTier::High => {
                let level = if score > 90 {
                    RiskLevel::Extreme
                } else {
                    RiskLevel::High
                };
                flags.push(FLAG_SANCTIONED.to_string());
                flags.push(FLAG_SUSPICIOUS.to_string());
                if score > 90 {
                    flags.push(FLAG_OFAC.to_string());
                }
                if wallet_type == WalletType::Hot {
                    flags.push(FLAG_EXCHANGE_WALLET.to_string());
                }
                level
            }
            RiskTier::Medium => {
                flags.push(FLAG_UNVERIFIED_EXCHANGE.to_string());
                if wallet_type == WalletType::Hot {
                    flags.push(FLAG_HOT_WALLET.to_string());
                }
                RiskLevel::Medium
            }
            RiskTier::Default => {
                if score > 20 {
                    flags.push(FLAG_NEW_ADDRESS.to_string());
                }
                if wallet_type == WalletType::Cold {
                    flags.push(FLAG_COLD_STORAGE.to_string());
                }
                RiskLevel::Low
            }
        };

        let rating = RiskRating::new(score, level).map_err(|e| {
            AmlError::fatal(format!("{:?} tier produced an invalid rating: {}", tier, e))
        })?;
        let confidence = self.random.uniform(CONFIDENCE_RANGE) as u8;

        Ok(ScreeningResult::new(
            address,
            rating,
            flags,
            self.clock.now_millis(),
            wallet_type,
            MOCK_PROVIDER_NAME,
            confidence,
        ))
    }
}

impl Default for RiskScorer {
    fn default() -> Self {
        Self::new(Arc::new(ThreadRandom), Arc::new(SystemClock))
    }
}
