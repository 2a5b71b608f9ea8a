//! Field validation for team member writes.
//!
//! Every check is a pure function. The pipeline in [`validate_member`] runs all
//! of them and collects every failure, so a client sees each violated field in
//! one response. Email uniqueness is checked against an owner id looked up by
//! the caller; the store's `UNIQUE` constraint remains the final authority.

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::models::{MemberChanges, MemberPayload, Role};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MIN_PHONE_LEN: usize = 10;
pub const MAX_PHONE_LEN: usize = 15;

pub mod fields {
    pub const FIRST_NAME: &str = "first_name";
    pub const LAST_NAME: &str = "last_name";
    pub const EMAIL: &str = "email";
    pub const PHONE_NUMBER: &str = "phone_number";
    pub const ROLE: &str = "role";
}

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
    .expect("email pattern is valid")
});

/// A single field-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldError {
    /// Field missing from a create or full-replace payload.
    Required,
    /// Value is neither a string nor a number.
    NotAString,
    /// Name empty after trimming whitespace.
    EmptyField,
    TooLong { max: usize },
    InvalidEmail,
    DuplicateEmail,
    InvalidRole,
    /// Phone contains something other than ASCII digits.
    PhoneNotDigits,
    /// Phone length outside `MIN_PHONE_LEN..=MAX_PHONE_LEN`.
    PhoneLength,
}

impl FieldError {
    /// Human-readable message for `field`.
    pub fn message(&self, field: &str) -> String {
        match self {
            FieldError::Required => "This field is required.".to_string(),
            FieldError::NotAString => "Not a valid string.".to_string(),
            FieldError::EmptyField => format!("{} cannot be empty.", field_label(field)),
            FieldError::TooLong { max } => {
                format!("Ensure this field has no more than {} characters.", max)
            }
            FieldError::InvalidEmail => "Enter a valid email address.".to_string(),
            FieldError::DuplicateEmail => "This email is already in use.".to_string(),
            FieldError::InvalidRole => {
                let roles: Vec<&str> = Role::ALL.iter().map(Role::as_str).collect();
                format!("Invalid role. Must be one of: {}", roles.join(", "))
            }
            FieldError::PhoneNotDigits => "Phone number must contain only digits.".to_string(),
            FieldError::PhoneLength => format!(
                "Phone number must be between {} and {} digits.",
                MIN_PHONE_LEN, MAX_PHONE_LEN
            ),
        }
    }
}

fn field_label(field: &str) -> &str {
    match field {
        fields::FIRST_NAME => "First name",
        fields::LAST_NAME => "Last name",
        fields::EMAIL => "Email",
        fields::PHONE_NUMBER => "Phone number",
        fields::ROLE => "Role",
        other => other,
    }
}

/// All field failures collected for one request.
///
/// Serializes as `{ "<field>": ["<message>", ...] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    entries: Vec<(&'static str, FieldError)>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &'static str, error: FieldError) -> Self {
        let mut errors = Self::new();
        errors.add(field, error);
        errors
    }

    pub fn add(&mut self, field: &'static str, error: FieldError) {
        self.entries.push((field, error));
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        self.entries.extend(other.entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_map(&self) -> BTreeMap<&'static str, Vec<String>> {
        let mut map: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
        for (field, error) in &self.entries {
            map.entry(*field).or_default().push(error.message(field));
        }
        map
    }

    fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

#[cfg(test)]
impl ValidationErrors {
    pub fn has(&self, field: &str, error: FieldError) -> bool {
        self.entries.iter().any(|(f, e)| *f == field && *e == error)
    }

    pub fn errors_for(&self, field: &str) -> Vec<FieldError> {
        self.entries
            .iter()
            .filter(|(f, _)| *f == field)
            .map(|(_, e)| *e)
            .collect()
    }

    /// Field names with at least one failure, sorted.
    pub fn fields(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.entries.iter().map(|(f, _)| *f).collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

impl Serialize for ValidationErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|(field, error)| format!("{}: {}", field, error.message(field)))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

/// How much of the record a write supplies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// POST: every required field must be present.
    Create,
    /// PUT: full replace; absent fields are cleared.
    Replace,
    /// PATCH: only supplied fields are validated and changed.
    Partial,
}

impl WriteMode {
    fn requires_all(&self) -> bool {
        !matches!(self, WriteMode::Partial)
    }
}

/// Check email syntax and uniqueness.
///
/// `existing_id` is the id of the record being updated (None on create);
/// `email_owner` is the id of the record currently holding this email, if any.
pub fn validate_email(
    value: &str,
    existing_id: Option<i64>,
    email_owner: Option<i64>,
) -> Result<(), FieldError> {
    if value.chars().count() > MAX_EMAIL_LEN {
        return Err(FieldError::TooLong { max: MAX_EMAIL_LEN });
    }
    if !EMAIL_RE.is_match(value) {
        return Err(FieldError::InvalidEmail);
    }
    match email_owner {
        Some(owner) if Some(owner) != existing_id => Err(FieldError::DuplicateEmail),
        _ => Ok(()),
    }
}

pub fn validate_role(value: &str) -> Result<Role, FieldError> {
    Role::from_str(value).ok_or(FieldError::InvalidRole)
}

pub fn validate_phone(value: &str) -> Result<(), FieldError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FieldError::PhoneNotDigits);
    }
    if !(MIN_PHONE_LEN..=MAX_PHONE_LEN).contains(&value.len()) {
        return Err(FieldError::PhoneLength);
    }
    Ok(())
}

/// Check whichever of the two names is present.
pub fn validate_names(first: Option<&str>, last: Option<&str>) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    for (field, value) in [(fields::FIRST_NAME, first), (fields::LAST_NAME, last)] {
        let Some(value) = value else { continue };
        if value.trim().is_empty() {
            errors.add(field, FieldError::EmptyField);
        } else if value.chars().count() > MAX_NAME_LEN {
            errors.add(field, FieldError::TooLong { max: MAX_NAME_LEN });
        }
    }
    errors.into_result(())
}

/// Read a text field from raw JSON. Numbers are accepted in their decimal
/// form; any other non-string value is a type error.
pub fn coerce_text(value: &Value) -> Result<String, FieldError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(FieldError::NotAString),
    }
}

fn text_field(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: &Option<Value>,
) -> Option<String> {
    match value.as_ref().map(coerce_text).transpose() {
        Ok(text) => text,
        Err(e) => {
            errors.add(field, e);
            None
        }
    }
}

/// Run every check against `payload` and return the values to write.
///
/// Names, email and phone are trimmed; role must match exactly. In
/// [`WriteMode::Replace`] an absent role resets to the default; in
/// [`WriteMode::Create`] it takes the default as well.
pub fn validate_member(
    payload: &MemberPayload,
    mode: WriteMode,
    existing_id: Option<i64>,
    email_owner: Option<i64>,
) -> Result<MemberChanges, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    if mode.requires_all() {
        for (field, value) in [
            (fields::FIRST_NAME, &payload.first_name),
            (fields::LAST_NAME, &payload.last_name),
            (fields::EMAIL, &payload.email),
            (fields::PHONE_NUMBER, &payload.phone_number),
        ] {
            if value.is_none() {
                errors.add(field, FieldError::Required);
            }
        }
    }

    let trimmed = |s: String| s.trim().to_string();
    let first_name =
        text_field(&mut errors, fields::FIRST_NAME, &payload.first_name).map(trimmed);
    let last_name =
        text_field(&mut errors, fields::LAST_NAME, &payload.last_name).map(trimmed);
    let email = text_field(&mut errors, fields::EMAIL, &payload.email).map(trimmed);
    let phone_number =
        text_field(&mut errors, fields::PHONE_NUMBER, &payload.phone_number).map(trimmed);
    let role = text_field(&mut errors, fields::ROLE, &payload.role);

    let first_name = first_name.as_deref();
    let last_name = last_name.as_deref();
    let email = email.as_deref();
    let phone_number = phone_number.as_deref();

    if let Err(e) = validate_names(first_name, last_name) {
        errors.merge(e);
    }
    if let Some(email) = email {
        if let Err(e) = validate_email(email, existing_id, email_owner) {
            errors.add(fields::EMAIL, e);
        }
    }
    if let Some(phone) = phone_number {
        if let Err(e) = validate_phone(phone) {
            errors.add(fields::PHONE_NUMBER, e);
        }
    }
    let role = match role.as_deref().map(validate_role).transpose() {
        Ok(role) => role,
        Err(e) => {
            errors.add(fields::ROLE, e);
            None
        }
    };

    let role = match (role, mode) {
        (None, WriteMode::Create | WriteMode::Replace) => Some(Role::default()),
        (role, _) => role,
    };

    errors.into_result(MemberChanges {
        first_name: first_name.map(str::to_string),
        last_name: last_name.map(str::to_string),
        email: email.map(str::to_string),
        phone_number: phone_number.map(str::to_string),
        role,
    })
}
