use bigdecimal::BigDecimal;
use std::fmt;

pub const AMOUNT_SCALE: i64 = 2;
pub const AMOUNT_MAX_INTEGER_DIGITS: u32 = 13;
pub const VPA_MAX_LEN: usize = 255;
pub const DESCRIPTION_MAX_LEN: usize = 255;
pub const USER_ID_MAX_LEN: usize = 128;
/// Upper bound for any stored payload field, whatever the transaction type.
pub const PAYLOAD_FIELD_MAX_LEN: usize = 255;
pub const IFSC_LEN: usize = 11;
pub const BANK_ACCOUNT_MIN_LEN: usize = 9;
pub const BANK_ACCOUNT_MAX_LEN: usize = 18;
pub const ALLOWED_CURRENCIES: &[&str] = &["INR"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_enum(field: &'static str, value: &str, allowed: &[&str]) -> ValidationResult {
    if allowed.iter().all(|candidate| value != *candidate) {
        return Err(ValidationError::new(
            field,
            format!("must be one of: {}", allowed.join(", ")),
        ));
    }

    Ok(())
}

/// Field must be present and non-blank for the given transaction type.
pub fn require_present<'a>(field: &'static str, value: Option<&'a str>) -> Result<&'a str, ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ValidationError::new(field, "is required for this transaction type")),
    }
}

pub fn validate_positive_amount(amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    Ok(())
}

/// Amounts are stored as NUMERIC(15,2): minor-unit precision, 13 integer digits.
pub fn validate_amount_precision(amount: &BigDecimal) -> ValidationResult {
    if amount.with_scale(AMOUNT_SCALE) != *amount {
        return Err(ValidationError::new(
            "amount",
            format!("must have at most {} decimal places", AMOUNT_SCALE),
        ));
    }

    let ceiling = BigDecimal::from(10u64.pow(AMOUNT_MAX_INTEGER_DIGITS));
    if amount >= &ceiling {
        return Err(ValidationError::new(
            "amount",
            format!("must be less than {}", ceiling),
        ));
    }

    Ok(())
}

/// UPI virtual payment address: `handle@provider`.
pub fn validate_vpa(vpa: &str) -> ValidationResult {
    let vpa = sanitize_string(vpa);
    validate_required("vpa", &vpa)?;
    validate_max_len("vpa", &vpa, VPA_MAX_LEN)?;

    let mut parts = vpa.splitn(2, '@');
    let handle = parts.next().unwrap_or_default();
    let provider = parts.next().unwrap_or_default();

    if handle.is_empty() || provider.is_empty() || provider.contains('@') {
        return Err(ValidationError::new("vpa", "must look like name@provider"));
    }

    let allowed = |ch: char| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_');
    if !handle.chars().all(allowed) || !provider.chars().all(allowed) {
        return Err(ValidationError::new(
            "vpa",
            "must contain only letters, digits, '.', '-' or '_'",
        ));
    }

    Ok(())
}

/// Indian Financial System Code: 4 letters, a literal 0, 6 alphanumerics.
pub fn validate_ifsc(ifsc: &str) -> ValidationResult {
    let ifsc = sanitize_string(ifsc);
    validate_required("ifsc", &ifsc)?;

    let bytes = ifsc.as_bytes();
    let valid = bytes.len() == IFSC_LEN
        && bytes[..4].iter().all(u8::is_ascii_uppercase)
        && bytes[4] == b'0'
        && bytes[5..]
            .iter()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());

    if !valid {
        return Err(ValidationError::new(
            "ifsc",
            "must be 11 characters: 4 letters, '0', then 6 letters or digits",
        ));
    }

    Ok(())
}

pub fn validate_bank_account(account: &str) -> ValidationResult {
    let account = sanitize_string(account);
    validate_required("bankAccount", &account)?;

    if account.len() < BANK_ACCOUNT_MIN_LEN
        || account.len() > BANK_ACCOUNT_MAX_LEN
        || !account.chars().all(|ch| ch.is_ascii_digit())
    {
        return Err(ValidationError::new(
            "bankAccount",
            format!(
                "must be {}-{} digits",
                BANK_ACCOUNT_MIN_LEN, BANK_ACCOUNT_MAX_LEN
            ),
        ));
    }

    Ok(())
}

pub fn validate_user_id(field: &'static str, user_id: &str) -> ValidationResult {
    validate_required(field, user_id)?;
    validate_max_len(field, user_id, USER_ID_MAX_LEN)
}

pub fn validate_currency(currency: &str) -> ValidationResult {
    validate_enum("currency", currency, ALLOWED_CURRENCIES)
}

/// Metadata is a key/value bag; arrays and scalars are rejected.
pub fn validate_metadata(metadata: &serde_json::Value) -> ValidationResult {
    if !metadata.is_object() {
        return Err(ValidationError::new("metadata", "must be a JSON object"));
    }

    Ok(())
}
