/// Core screening types for wallet address risk assessment
///
/// A screening result pairs a numeric risk score with its risk level. The two
/// are kept together in [`RiskRating`] so neither can be built without the other.
use crate::errors::{AmlError, AmlResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Highest score a rating can carry.
pub const MAX_RISK_SCORE: u8 = 100;

/// Wallet custody classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletType {
    /// Internet-connected wallet (exchanges, web and mobile wallets)
    Hot,
    /// Offline storage (hardware, paper, air-gapped)
    Cold,
}

impl WalletType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletType::Hot => "hot",
            WalletType::Cold => "cold",
        }
    }
}

impl fmt::Display for WalletType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WalletType {
    type Err = AmlError;

    fn from_str(s: &str) -> AmlResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hot" => Ok(WalletType::Hot),
            "cold" => Ok(WalletType::Cold),
            other => Err(AmlError::ValidationError(format!(
                "Unknown wallet type '{}'",
                other
            ))),
        }
    }
}

/// Ordered risk level, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Extreme,
}

impl RiskLevel {
    /// Level implied by a raw score alone.
    ///
    /// `>90` extreme, `61..=90` high, `40..=60` medium, `<40` low.
    pub fn from_score(score: u8) -> Self {
        match score {
            91..=u8::MAX => RiskLevel::Extreme,
            61..=90 => RiskLevel::High,
            40..=60 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }

    /// Scores a rating at this level may carry.
    ///
    /// Medium reaches up to 69 because tier membership, not the raw score,
    /// decides the level of a medium-tier address.
    pub fn score_range(&self) -> RangeInclusive<u8> {
        match self {
            RiskLevel::Low => 0..=39,
            RiskLevel::Medium => 40..=69,
            RiskLevel::High => 61..=90,
            RiskLevel::Extreme => 91..=MAX_RISK_SCORE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Extreme => "extreme",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = AmlError;

    fn from_str(s: &str) -> AmlResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "extreme" => Ok(RiskLevel::Extreme),
            other => Err(AmlError::ValidationError(format!(
                "Unknown risk level '{}'",
                other
            ))),
        }
    }
}

/// A risk score together with its level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskRating {
    risk_score: u8,
    risk_level: RiskLevel,
}

impl RiskRating {
    /// Pair a score with a level, rejecting combinations that disagree.
    pub fn new(score: u8, level: RiskLevel) -> AmlResult<Self> {
        if score > MAX_RISK_SCORE {
            return Err(AmlError::ValidationError(format!(
                "Risk score {} exceeds {}",
                score, MAX_RISK_SCORE
            )));
        }

        if !level.score_range().contains(&score) {
            return Err(AmlError::ValidationError(format!(
                "Risk score {} is inconsistent with level '{}'",
                score, level
            )));
        }

        Ok(Self {
            risk_score: score,
            risk_level: level,
        })
    }

    /// Rating whose level is derived from the score thresholds.
    pub fn from_score(score: u8) -> AmlResult<Self> {
        Self::new(score, RiskLevel::from_score(score))
    }

    pub fn score(&self) -> u8 {
        self.risk_score
    }

    pub fn level(&self) -> RiskLevel {
        self.risk_level
    }
}

/// Outcome of screening a single address.
///
/// Immutable once built. `timestamp` is epoch milliseconds at scoring time and
/// is never refreshed by a cache read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ScreeningRecord")]
pub struct ScreeningResult {
    address: String,
    #[serde(flatten)]
    rating: RiskRating,
    flags: Vec<String>,
    timestamp: i64,
    wallet_type: WalletType,
    provider: String,
    confidence: u8,
}

impl ScreeningResult {
    pub fn new(
        address: impl Into<String>,
        rating: RiskRating,
        flags: Vec<String>,
        timestamp: i64,
        wallet_type: WalletType,
        provider: impl Into<String>,
        confidence: u8,
    ) -> Self {
        Self {
            address: address.into(),
            rating,
            flags,
            timestamp,
            wallet_type,
            provider: provider.into(),
            confidence: confidence.min(100),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn rating(&self) -> RiskRating {
        self.rating
    }

    pub fn risk_score(&self) -> u8 {
        self.rating.score()
    }

    pub fn risk_level(&self) -> RiskLevel {
        self.rating.level()
    }

    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn wallet_type(&self) -> WalletType {
        self.wallet_type
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn confidence(&self) -> u8 {
        self.confidence
    }
}

/// Flat wire form of a [`ScreeningResult`], validated on the way in.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScreeningRecord {
    address: String,
    risk_score: u8,
    risk_level: RiskLevel,
    #[serde(default)]
    flags: Vec<String>,
    timestamp: i64,
    wallet_type: WalletType,
    provider: String,
    confidence: u8,
}

impl TryFrom<ScreeningRecord> for ScreeningResult {
    type Error = AmlError;

    fn try_from(record: ScreeningRecord) -> AmlResult<Self> {
        let rating = RiskRating::new(record.risk_score, record.risk_level)?;
        if record.confidence > 100 {
            return Err(AmlError::ValidationError(format!(
                "Confidence {} exceeds 100",
                record.confidence
            )));
        }

        Ok(ScreeningResult {
            address: record.address,
            rating,
            flags: record.flags,
            timestamp: record.timestamp,
            wallet_type: record.wallet_type,
            provider: record.provider,
            confidence: record.confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ScreeningResult {
        ScreeningResult::new(
            "0x6B175474E89094C44Da98b954EedeAC495271d0F",
            RiskRating::new(95, RiskLevel::Extreme).unwrap(),
            vec!["Sanctioned entity".into(), "OFAC restricted".into()],
            1_700_000_000_000,
            WalletType::Hot,
            "Mock AML Provider",
            88,
        )
    }

    #[test]
    fn level_thresholds() {
        assert_eq!(RiskLevel::from_score(0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(39), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(40), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(60), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(61), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(90), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(91), RiskLevel::Extreme);
        assert!(RiskLevel::Extreme > RiskLevel::High);
        assert!(RiskLevel::Medium > RiskLevel::Low);
    }

    #[test]
    fn rating_rejects_mismatched_pairs() {
        assert!(RiskRating::new(95, RiskLevel::High).is_err());
        assert!(RiskRating::new(20, RiskLevel::Medium).is_err());
        assert!(RiskRating::new(101, RiskLevel::Extreme).is_err());
        // medium tier may legitimately score above 60
        assert!(RiskRating::new(65, RiskLevel::Medium).is_ok());
        assert!(RiskRating::new(70, RiskLevel::High).is_ok());
    }

    #[test]
    fn serializes_as_flat_record() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["riskScore"], 95);
        assert_eq!(value["riskLevel"], "extreme");
        assert_eq!(value["walletType"], "hot");
        assert_eq!(value["flags"][1], "OFAC restricted");
        assert_eq!(value["timestamp"], 1_700_000_000_000i64);

        let decoded: ScreeningResult = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn deserialization_enforces_rating_consistency() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["riskLevel"] = serde_json::json!("low");
        assert!(serde_json::from_value::<ScreeningResult>(value).is_err());
    }

    #[test]
    fn parses_levels_and_wallet_types() {
        assert_eq!("Extreme".parse::<RiskLevel>().unwrap(), RiskLevel::Extreme);
        assert_eq!("cold".parse::<WalletType>().unwrap(), WalletType::Cold);
        assert!("lukewarm".parse::<WalletType>().is_err());
    }
}
