//! Input validation for account payloads

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

use crate::models::user::{Gender, NewUser, RegisterRequest};

/// Validate username
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.chars().count() > 150 {
        return Err("Username must be at most 150 characters long".to_string());
    }

    static USERNAME_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = USERNAME_REGEX
        .get_or_init(|| Regex::new(r"^[\w.@+-]+$").expect("Failed to compile username regex"));

    if !regex.is_match(username) {
        return Err(
            "Username can only contain letters, digits and @/./+/-/_ characters".to_string(),
        );
    }

    Ok(())
}

/// Validate email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Parse a calendar date written exactly as `YYYY-MM-DD`
///
/// chrono alone accepts signs, leading whitespace and single-digit fields.
pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    static DATE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = DATE_REGEX.get_or_init(|| {
        Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("Failed to compile date regex")
    });

    if !regex.is_match(raw) {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Validate an optional `YYYY-MM-DD` birth date
pub fn validate_birth_date(raw: Option<&str>) -> Result<Option<NaiveDate>, String> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => parse_iso_date(raw)
            .map(Some)
            .ok_or_else(|| "Invalid birth date format, expected YYYY-MM-DD".to_string()),
    }
}

/// Validate an optional gender code
pub fn validate_gender(raw: Option<&str>) -> Result<Option<Gender>, String> {
    match raw.filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => Gender::parse(raw)
            .map(Some)
            .ok_or_else(|| "Gender must be one of M, F or O".to_string()),
    }
}

/// Validate a registration request
///
/// Returns the user to insert (with the given password hash) and the
/// plaintext password to hash.
pub fn validate_registration(request: RegisterRequest) -> Result<(NewUser, String), String> {
    let (Some(username), Some(email), Some(password)) =
        (request.username, request.email, request.password)
    else {
        return Err("Username, email and password are required".to_string());
    };
    if username.is_empty() || email.is_empty() || password.is_empty() {
        return Err("Username, email and password are required".to_string());
    }

    validate_username(&username)?;
    validate_email(&email)?;
    let birth_date = validate_birth_date(request.birth_date.as_deref())?;
    let gender = validate_gender(request.gender.as_deref())?;

    let new_user = NewUser {
        username,
        email,
        password_hash: String::new(),
        first_name: request.first_name,
        last_name: request.last_name,
        birth_date,
        gender,
    };

    Ok((new_user, password))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: Some(username.to_string()),
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn usernames_allow_the_account_charset() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("a.l+i-c_e@home").is_ok());
        assert!(validate_username("alice smith").is_err());
        assert!(validate_username("alice!").is_err());
        assert!(validate_username(&"a".repeat(150)).is_ok());
        assert!(validate_username(&"a".repeat(151)).is_err());
    }

    #[test]
    fn emails_need_a_domain() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("alice@example").is_err());
        assert!(validate_email("alice").is_err());
    }

    #[test]
    fn iso_dates_need_zero_padded_fields() {
        assert_eq!(
            parse_iso_date("2024-03-01"),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
        for raw in [" 2024-03-1", "+2024-3-01", "2024-3-1", "２０２４-03-01", "2024-02-30"] {
            assert_eq!(parse_iso_date(raw), None, "{raw:?}");
        }
    }

    #[test]
    fn optional_profile_fields() {
        assert_eq!(validate_birth_date(None), Ok(None));
        assert_eq!(validate_birth_date(Some("")), Ok(None));
        assert_eq!(
            validate_birth_date(Some("1990-05-17")),
            Ok(NaiveDate::from_ymd_opt(1990, 5, 17))
        );
        assert!(validate_birth_date(Some("17/05/1990")).is_err());
        assert!(validate_birth_date(Some("+1990-5-17")).is_err());
        assert!(validate_birth_date(Some("1990-05-7")).is_err());

        assert_eq!(validate_gender(Some("F")), Ok(Some(Gender::F)));
        assert_eq!(validate_gender(None), Ok(None));
        assert!(validate_gender(Some("X")).is_err());
    }

    #[test]
    fn registration_requires_credentials() {
        let err = validate_registration(RegisterRequest::default()).unwrap_err();
        assert_eq!(err, "Username, email and password are required");

        let err = validate_registration(register("alice", "alice@example.com", "")).unwrap_err();
        assert_eq!(err, "Username, email and password are required");

        let (new_user, password) =
            validate_registration(register("alice", "alice@example.com", "secret")).unwrap();
        assert_eq!(new_user.username, "alice");
        assert_eq!(password, "secret");
    }
}
