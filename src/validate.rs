// Entry-form validation

use thiserror::Error;

/// Required length of a mobile number
pub const MOBILE_LEN: usize = 10;

/// Reasons a submitted form is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a valid mobile number ({MOBILE_LEN} digits, got {0})")]
    MobileLength(usize),

    #[error("Only numbers are allowed in the mobile number: {0}")]
    MobileNotNumeric(String),
}

/// Validate a mobile number: exactly ten ASCII digits.
///
/// Length is checked before content, so `"12345abcde"` fails as non-numeric.
pub fn validate_mobile(mobile: &str) -> Result<(), ValidationError> {
    let len = mobile.chars().count();
    if len != MOBILE_LEN {
        return Err(ValidationError::MobileLength(len));
    }
    if !mobile.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::MobileNotNumeric(mobile.to_string()));
    }
    Ok(())
}
