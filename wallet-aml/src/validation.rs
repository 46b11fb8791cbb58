use crate::aml_error;
use crate::errors::{AmlError, AmlResult};
use once_cell::sync::Lazy;
use regex::Regex;

/// EVM-style address: `0x` followed by 40 hex characters.
static ADDRESS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[a-fA-F0-9]{40}$").expect("address pattern is valid"));

/// Longest input accepted before pattern matching.
const MAX_INPUT_LENGTH: usize = 100;

/// Input validation for addresses entering the screening pipeline
#[derive(Debug, Clone, Copy, Default)]
pub struct AddressValidator;

impl AddressValidator {
    pub fn new() -> Self {
        AddressValidator
    }

    /// Validate a blockchain address
    pub fn validate_address(&self, address: &str) -> AmlResult<()> {
        if address.is_empty() {
            return Err(aml_error!(InvalidAddress, "Address is required"));
        }

        if address.len() > MAX_INPUT_LENGTH {
            return Err(aml_error!(InvalidAddress, "Address too long"));
        }

        if address.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(AmlError::InvalidAddress(
                "Address contains whitespace or control characters".to_string(),
            ));
        }

        if !ADDRESS_PATTERN.is_match(address) {
            return Err(AmlError::InvalidAddress(format!(
                "Address format is invalid: {}",
                address
            )));
        }

        Ok(())
    }

    pub fn is_valid_address(&self, address: &str) -> bool {
        self.validate_address(address).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_checksummed_and_lowercase() {
        let validator = AddressValidator::new();
        assert!(validator.is_valid_address("0x6B175474E89094C44Da98b954EedeAC495271d0F"));
        assert!(validator.is_valid_address("0x742d35cc6634c0532925a3b844bc454e4438f44e"));
    }

    #[test]
    fn rejects_malformed_input() {
        let validator = AddressValidator::new();
        for bad in [
            "",
            "0x",
            "6B175474E89094C44Da98b954EedeAC495271d0F",
            "0x6B175474E89094C44Da98b954EedeAC495271d0",
            "0x6B175474E89094C44Da98b954EedeAC495271d0FF",
            "0xZZ175474E89094C44Da98b954EedeAC495271d0F",
            " 0x6B175474E89094C44Da98b954EedeAC495271d0F",
        ] {
            let err = validator.validate_address(bad).unwrap_err();
            assert!(matches!(err, AmlError::InvalidAddress(_)), "{bad:?}");
        }
    }

    #[test]
    fn rejects_overlong_input_before_matching() {
        let long = format!("0x{}", "a".repeat(200));
        let err = AddressValidator::new().validate_address(&long).unwrap_err();
        assert_eq!(err, AmlError::InvalidAddress("Address too long".to_string()));
    }
}
