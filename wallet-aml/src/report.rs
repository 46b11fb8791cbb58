//! Human-readable formatting of screening results and the plain-text AML report.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::policy::{categorize_flags, decide};
use crate::risk::{RiskLevel, ScreeningResult, WalletType};

const REPORT_FOOTER: &str = "Generated by AML Checker v1.0";

/// Capitalize the first letter: `extreme` → `Extreme`.
pub fn format_risk_level(level: &str) -> String {
    let mut chars = level.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn risk_description(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Low => "This address appears to be safe with minimal risk indicators.",
        RiskLevel::Medium => "This address has some risk factors that require attention.",
        RiskLevel::High => {
            "This address has significant risk factors. Proceed with caution."
        }
        RiskLevel::Extreme => {
            "This address is extremely high risk. Transaction should be blocked."
        }
    }
}

pub fn wallet_type_description(wallet_type: WalletType) -> &'static str {
    match wallet_type {
        WalletType::Hot => {
            "Hot wallets are connected to the internet and typically used for frequent \
             transactions. They may include exchange wallets, web wallets, or mobile wallets."
        }
        WalletType::Cold => {
            "Cold wallets are offline storage solutions that provide enhanced security. \
             They include hardware wallets, paper wallets, or air-gapped systems."
        }
    }
}

pub fn confidence_label(confidence: u8) -> &'static str {
    match confidence {
        90..=u8::MAX => "Very High",
        75..=89 => "High",
        60..=74 => "Medium",
        40..=59 => "Low",
        _ => "Very Low",
    }
}

/// Shorten an address to `start…end` characters, e.g. `0x6B17...1d0F`.
pub fn truncate_address(address: &str, start_chars: usize, end_chars: usize) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= start_chars + end_chars {
        return address.to_string();
    }

    let head: String = chars[..start_chars].iter().collect();
    let tail: String = chars[chars.len() - end_chars..].iter().collect();
    format!("{}...{}", head, tail)
}

pub fn risk_percentage(score: i64) -> u8 {
    score.clamp(0, 100) as u8
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(timestamp_ms) {
        Some(at) => at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => format!("{} ms", timestamp_ms),
    }
}

/// Plain-text report for sharing or export.
pub fn generate_report(result: &ScreeningResult) -> String {
    let recommendation = decide(result);
    let categories = categorize_flags(result.flags());
    let mut report = String::new();

    // writeln! into a String cannot fail
    let _ = writeln!(report, "AML Screening Report");
    let _ = writeln!(report, "===================");
    let _ = writeln!(report);
    let _ = writeln!(report, "Address: {}", result.address());
    let _ = writeln!(report, "Screening Date: {}", format_timestamp(result.timestamp()));
    let _ = writeln!(report, "Risk Score: {}/100", result.risk_score());
    let _ = writeln!(
        report,
        "Risk Level: {}",
        format_risk_level(result.risk_level().as_str())
    );
    let _ = writeln!(
        report,
        "Wallet Type: {} Wallet",
        format_risk_level(result.wallet_type().as_str())
    );
    let _ = writeln!(
        report,
        "Confidence: {}% ({})",
        result.confidence(),
        confidence_label(result.confidence())
    );
    let _ = writeln!(report, "Provider: {}", result.provider());

    let _ = writeln!(report);
    let _ = writeln!(
        report,
        "Recommended Action: {}",
        recommendation.action.as_str().to_uppercase()
    );
    let _ = writeln!(report, "Reason: {}", recommendation.reason);

    if !result.flags().is_empty() {
        let _ = writeln!(report);
        let _ = writeln!(report, "Risk Factors ({}):", result.flags().len());

        let sections = [
            ("Sanctions", &categories.sanctions),
            ("Criminal Activity", &categories.criminal),
            ("Exchange Related", &categories.exchange),
            ("Mixer/Tumbler", &categories.mixer),
            ("Other Factors", &categories.other),
        ];
        for (title, flags) in sections {
            if flags.is_empty() {
                continue;
            }
            let _ = writeln!(report);
            let _ = writeln!(report, "{}:", title);
            for flag in flags {
                let _ = writeln!(report, "- {}", flag);
            }
        }
    }

    let _ = writeln!(report);
    let _ = writeln!(report, "---");
    let _ = writeln!(report, "{}", REPORT_FOOTER);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RiskRating;

    fn extreme() -> ScreeningResult {
        ScreeningResult::new(
            "0x6B175474E89094C44Da98b954EedeAC495271d0F",
            RiskRating::new(96, RiskLevel::Extreme).unwrap(),
            vec![
                "Sanctioned entity".into(),
                "Suspicious activity".into(),
                "OFAC restricted".into(),
                "Exchange wallet".into(),
            ],
            0,
            WalletType::Hot,
            "Mock AML Provider",
            92,
        )
    }

    #[test]
    fn formatting_helpers() {
        assert_eq!(format_risk_level("extreme"), "Extreme");
        assert_eq!(format_risk_level(""), "");
        assert_eq!(confidence_label(95), "Very High");
        assert_eq!(confidence_label(75), "High");
        assert_eq!(confidence_label(60), "Medium");
        assert_eq!(confidence_label(40), "Low");
        assert_eq!(confidence_label(12), "Very Low");
        assert_eq!(risk_percentage(-5), 0);
        assert_eq!(risk_percentage(150), 100);
        assert_eq!(risk_percentage(42), 42);
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
    }

    #[test]
    fn truncation() {
        assert_eq!(
            truncate_address("0x6B175474E89094C44Da98b954EedeAC495271d0F", 6, 4),
            "0x6B17...1d0F"
        );
        assert_eq!(truncate_address("0x1234", 6, 4), "0x1234");
    }

    #[test]
    fn report_lists_sections_in_order() {
        let report = generate_report(&extreme());
        assert!(report.starts_with("AML Screening Report\n"));
        assert!(report.contains("Risk Score: 96/100"));
        assert!(report.contains("Risk Level: Extreme"));
        assert!(report.contains("Wallet Type: Hot Wallet"));
        assert!(report.contains("Confidence: 92% (Very High)"));
        assert!(report.contains("Recommended Action: BLOCK"));
        assert!(report.contains("Risk Factors (4):"));

        let sanctions = report.find("Sanctions:").unwrap();
        let exchange = report.find("Exchange Related:").unwrap();
        let other = report.find("Other Factors:").unwrap();
        assert!(sanctions < exchange && exchange < other);
        assert!(!report.contains("Mixer/Tumbler:"));
        assert!(report.trim_end().ends_with(REPORT_FOOTER));
    }

    #[test]
    fn report_without_flags_skips_risk_factors() {
        let clean = ScreeningResult::new(
            "0x1111111111111111111111111111111111110001",
            RiskRating::new(3, RiskLevel::Low).unwrap(),
            Vec::new(),
            0,
            WalletType::Hot,
            "Mock AML Provider",
            85,
        );
        let report = generate_report(&clean);
        assert!(report.contains("Recommended Action: ALLOW"));
        assert!(!report.contains("Risk Factors"));
    }
}
