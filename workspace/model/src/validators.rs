//! Field-level validation rules shared by the entities and the request
//! payloads. Every rule returns a `validator::ValidationError` so it can be
//! plugged into `#[validate(custom(function = ...))]` as well as called from
//! the record-level `full_clean` functions.

use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeMap;
use validator::{ValidationError, ValidationErrors};

pub const USERNAME_MIN_LENGTH: usize = 2;
pub const USERNAME_MAX_LENGTH: usize = 50;
pub const NAME_MIN_LENGTH: usize = 2;
pub const NAME_MAX_LENGTH: usize = 50;
pub const EMAIL_MIN_LENGTH: usize = 6;
pub const EMAIL_MAX_LENGTH: usize = 70;
pub const COLOR_MAX_LENGTH: usize = 16;
pub const SLUG_MAX_LENGTH: usize = 50;
pub const PASSWORD_MIN_LENGTH: usize = 8;

/// Username that would collide with the `/users/me/` route.
pub const RESERVED_USERNAME: &str = "me";

const COMMON_PASSWORDS: &[&str] = &[
    "password", "password1", "12345678", "123456789", "1234567890", "qwertyui",
    "qwerty123", "iloveyou", "11111111", "00000000", "abc12345", "letmein1",
    "admin123", "welcome1", "sunshine", "princess", "football", "baseball",
];

fn error(code: &'static str, message: impl Into<Cow<'static, str>>) -> ValidationError {
    ValidationError::new(code).with_message(message.into())
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username == RESERVED_USERNAME {
        return Err(error(
            "reserved_username",
            "The username \"me\" is reserved.",
        ));
    }

    // `+-_` is a character range, so everything between '+' and '_' passes.
    let allowed = |c: char| c.is_ascii_alphanumeric() || c == '@' || c == '.' || ('+'..='_').contains(&c);
    if username.is_empty() || !username.chars().all(allowed) {
        return Err(error(
            "invalid_username",
            "Username contains characters that are not allowed.",
        ));
    }
    Ok(())
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || ('А'..='я').contains(&c)
        || c == 'ё'
        || c == 'Ё'
        || c == ' '
        || c == '-'
}

/// Names of people, breeds and kittens: Latin or Cyrillic letters, digits,
/// spaces and hyphens.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() || !name.chars().all(is_name_char) {
        return Err(error(
            "invalid_name",
            "Only letters, digits, spaces and hyphens are allowed.",
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let invalid = || error("invalid_email", "Enter a valid email address.");

    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.rsplit_once('@').ok_or_else(invalid)?;
    if local.is_empty() || local.contains('@') {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return Err(invalid());
    }
    Ok(())
}

pub fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
    if slug.chars().count() > SLUG_MAX_LENGTH || !slug.chars().all(allowed) {
        return Err(error(
            "invalid_slug",
            "Enter a valid slug of letters, numbers, underscores or hyphens.",
        ));
    }
    Ok(())
}

/// Password strength rules applied at registration.
pub fn validate_password(password: &str, username: &str, email: &str) -> Vec<ValidationError> {
    let mut problems = Vec::new();

    if password.chars().count() < PASSWORD_MIN_LENGTH {
        problems.push(error(
            "password_too_short",
            format!("This password is too short. It must contain at least {PASSWORD_MIN_LENGTH} characters."),
        ));
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        problems.push(error(
            "password_entirely_numeric",
            "This password is entirely numeric.",
        ));
    }

    let lowered = password.to_lowercase();
    let email_local = email.split('@').next().unwrap_or_default().to_lowercase();
    if lowered == username.to_lowercase() || (!email_local.is_empty() && lowered == email_local) {
        problems.push(error(
            "password_too_similar",
            "The password is too similar to the username or email.",
        ));
    }
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        problems.push(error("password_too_common", "This password is too common."));
    }

    problems
}

fn capitalize_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Capitalize every word of a name, treating a hyphen as a word boundary:
/// `"anne-marie  smith"` becomes `"Anne-Marie Smith"`.
pub fn capitalize_name(name: &str) -> String {
    name.replace('-', "- ")
        .split_whitespace()
        .map(capitalize_word)
        .collect::<Vec<_>>()
        .join(" ")
        .replace("- ", "-")
}

/// Check a string length in characters, not bytes.
pub fn check_length(value: &str, min: usize, max: usize) -> Result<(), ValidationError> {
    let length = value.chars().count();
    if length < min {
        return Err(error(
            "min_length",
            format!("Ensure this field has at least {min} characters."),
        ));
    }
    if length > max {
        return Err(error(
            "max_length",
            format!("Ensure this field has no more than {max} characters."),
        ));
    }
    Ok(())
}

/// Validation failures keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn add_error(&mut self, field: &str, error: &ValidationError) {
        self.add(field, describe(error));
    }

    /// Record the outcome of a rule against `field`.
    pub fn check(&mut self, field: &str, outcome: Result<(), ValidationError>) {
        if let Err(error) = outcome {
            self.add_error(field, &error);
        }
    }

    pub fn require<'a>(&mut self, field: &str, value: Option<&'a str>) -> Option<&'a str> {
        if value.is_none() {
            self.add(field, "This field is required.");
        }
        value
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<String>> {
        self.0
    }
}

fn describe(error: &ValidationError) -> String {
    match &error.message {
        Some(message) => message.to_string(),
        None => format!("Invalid value ({}).", error.code),
    }
}

impl From<ValidationErrors> for FieldErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        for (field, problems) in errors.field_errors() {
            for problem in problems.iter() {
                fields.add_error(&field.to_string(), problem);
            }
        }
        fields
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{field}: {}", messages.join(" ")))
            .collect();
        write!(f, "{}", rendered.join("; "))
    }
}

impl std::error::Error for FieldErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_me_is_reserved() {
        let err = validate_username("me").unwrap_err();
        assert_eq!(err.code, "reserved_username");
        assert!(validate_username("meow").is_ok());
        assert!(validate_username("Me").is_ok());
    }

    #[test]
    fn test_username_characters() {
        assert!(validate_username("john.doe+cats@example").is_ok());
        assert!(validate_username("user_name-1").is_ok());
        assert!(validate_username("with space").is_err());
        assert!(validate_username("кошка").is_err());
        assert!(validate_username("semi;colon").is_ok(), "';' lies inside the '+'..'_' range");
        assert!(validate_username("tilde~").is_err());
        assert!(validate_username("").is_err());
    }

    #[test]
    fn test_name_accepts_latin_cyrillic_digits() {
        assert!(validate_name("Anne-Marie").is_ok());
        assert!(validate_name("Пётр Ёлкин").is_ok());
        assert!(validate_name("123").is_ok());
        assert!(validate_name("Мурзик 2").is_ok());
    }

    #[test]
    fn test_name_rejects_symbols() {
        assert!(validate_name("john@doe").is_err());
        assert!(validate_name("O'Brien").is_err());
        assert!(validate_name("under_score").is_err());
        assert!(validate_name("").is_err());
    }

    #[test]
    fn test_capitalize_name() {
        assert_eq!(capitalize_name("anne-marie"), "Anne-Marie");
        assert_eq!(capitalize_name("  ivan   petrov "), "Ivan Petrov");
        assert_eq!(capitalize_name("МАРИЯ-ЕЛЕНА"), "Мария-Елена");
        assert_eq!(capitalize_name("jean - luc"), "Jean-Luc");
    }

    #[test]
    fn test_email() {
        assert!(validate_email("cat@example.com").is_ok());
        assert!(validate_email("cat@example").is_err());
        assert!(validate_email("cat example@x.com").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("cat@.com").is_err());
    }

    #[test]
    fn test_slug() {
        assert!(validate_slug("barsik-2_x").is_ok());
        assert!(validate_slug("барсик").is_err());
        assert!(validate_slug(&"a".repeat(SLUG_MAX_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_password_rules() {
        assert!(validate_password("tabby-cat-42", "alice", "alice@example.com").is_empty());
        let codes: Vec<_> = validate_password("1234567", "alice", "a@b.cc")
            .into_iter()
            .map(|e| e.code.to_string())
            .collect();
        assert!(codes.contains(&"password_too_short".to_string()));
        assert!(codes.contains(&"password_entirely_numeric".to_string()));
        assert!(!validate_password("alicealice", "AliceAlice", "x@y.zz").is_empty());
        assert!(!validate_password("password", "bob", "bob@example.com").is_empty());
    }

    #[test]
    fn test_check_length_counts_chars() {
        assert!(check_length("Ёж", 2, 50).is_ok());
        assert!(check_length("Ё", 2, 50).is_err());
        assert!(check_length(&"я".repeat(51), 2, 50).is_err());
    }

    #[test]
    fn test_field_errors_collect() {
        let mut errors = FieldErrors::new();
        errors.check("username", validate_username("me"));
        errors.check("first_name", validate_name("Ok"));
        errors.require("email", None);
        assert!(errors.contains("username"));
        assert!(!errors.contains("first_name"));
        assert_eq!(errors.get("email").unwrap(), ["This field is required."]);
        assert!(errors.into_result().is_err());
    }
}
