//! Validation schemas for bank forms, registration and password changes
//!
//! Each schema checks every field and reports all violations at once.
//! Lengths are counted in characters after trimming surrounding whitespace.

use std::sync::LazyLock;

use regex::Regex;

use super::bank::{provided, BankFormValues};
use super::result::{Result, ValidationErrors};

pub const BANK_NAME_MAX: usize = 100;
pub const LOGIN_NAME_MAX: usize = 100;
pub const SECRET_MAX: usize = 128;
pub const ACCOUNT_NUMBER_MIN: usize = 5;
pub const ACCOUNT_NUMBER_MAX: usize = 20;
pub const CUSTOM_FIELDS_MAX: usize = 20;
pub const CUSTOM_LABEL_MAX: usize = 50;
pub const CUSTOM_VALUE_MAX: usize = 500;
pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 50;
pub const PASSWORD_MIN: usize = 8;
pub const PASSWORD_MAX: usize = 128;

/// E.164-like: optional leading +, no leading zero, 8 to 15 digits in total
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9][0-9]{7,14}$").unwrap());
static ACCOUNT_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9-]+$").unwrap());
static ATM_PIN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{4}$").unwrap());
static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").unwrap());

fn char_len(value: &str) -> usize {
    value.trim().chars().count()
}

fn required(errors: &mut ValidationErrors, field: &str, value: &str, max: usize) {
    let len = char_len(value);
    if len == 0 {
        errors.add(field, "is required");
    } else if len > max {
        errors.add(field, format!("must be at most {} characters", max));
    }
}

fn optional(errors: &mut ValidationErrors, field: &str, value: &str, max: usize) {
    if provided(value).is_some() && char_len(value) > max {
        errors.add(field, format!("must be at most {} characters", max));
    }
}

/// Validate a bank add/update form
pub fn validate_bank_form(form: &BankFormValues) -> Result<()> {
    let mut errors = ValidationErrors::new();

    required(&mut errors, "bank_name", &form.bank_name, BANK_NAME_MAX);

    let phone = form.phone_for_otp.trim();
    if phone.is_empty() {
        errors.add("phone_for_otp", "is required");
    } else if !PHONE_RE.is_match(phone) {
        errors.add("phone_for_otp", "must be a phone number in international format");
    }

    let account = form.account_number.trim();
    let account_len = account.chars().count();
    if account.is_empty() {
        errors.add("account_number", "is required");
    } else if !(ACCOUNT_NUMBER_MIN..=ACCOUNT_NUMBER_MAX).contains(&account_len) {
        errors.add(
            "account_number",
            format!("must be {}-{} characters", ACCOUNT_NUMBER_MIN, ACCOUNT_NUMBER_MAX),
        );
    } else if !ACCOUNT_NUMBER_RE.is_match(account) {
        errors.add("account_number", "may only contain letters, digits and dashes");
    }

    required(&mut errors, "net_banking_username", &form.net_banking_username, LOGIN_NAME_MAX);
    optional(&mut errors, "net_banking_password", &form.net_banking_password, SECRET_MAX);
    required(&mut errors, "mobile_banking_username", &form.mobile_banking_username, LOGIN_NAME_MAX);
    optional(&mut errors, "mobile_banking_password", &form.mobile_banking_password, SECRET_MAX);

    if let Some(pin) = provided(&form.atm_pin) {
        if !ATM_PIN_RE.is_match(pin) {
            errors.add("atm_pin", "must be exactly 4 digits");
        }
    }

    if let Some(fields) = &form.custom_fields {
        if fields.len() > CUSTOM_FIELDS_MAX {
            errors.add(
                "custom_fields",
                format!("at most {} custom fields are allowed", CUSTOM_FIELDS_MAX),
            );
        }
        for (i, field) in fields.iter().enumerate() {
            let label = format!("custom_fields[{}].label", i);
            let value = format!("custom_fields[{}].value", i);
            required(&mut errors, &label, &field.label, CUSTOM_LABEL_MAX);
            required(&mut errors, &value, &field.value, CUSTOM_VALUE_MAX);
        }
    }

    errors.into_result()
}

/// Validate a registration request
pub fn validate_registration(username: &str, password: &str) -> Result<()> {
    let mut errors = ValidationErrors::new();

    let name = username.trim();
    let name_len = name.chars().count();
    if name.is_empty() {
        errors.add("username", "is required");
    } else if !(USERNAME_MIN..=USERNAME_MAX).contains(&name_len) {
        errors.add(
            "username",
            format!("must be {}-{} characters", USERNAME_MIN, USERNAME_MAX),
        );
    } else if !USERNAME_RE.is_match(name) {
        errors.add("username", "may only contain letters, digits, '_', '.' and '-'");
    }

    check_password_policy(&mut errors, "password", password);

    errors.into_result()
}

/// Validate a master password change request
pub fn validate_password_change(current: &str, new: &str, confirm: &str) -> Result<()> {
    let mut errors = ValidationErrors::new();

    if current.is_empty() {
        errors.add("current_password", "is required");
    }
    check_password_policy(&mut errors, "new_password", new);
    if new != confirm {
        errors.add("confirm_password", "does not match the new password");
    }

    errors.into_result()
}

/// Passwords are compared byte-for-byte, so they are not trimmed
fn check_password_policy(errors: &mut ValidationErrors, field: &str, password: &str) {
    let len = password.chars().count();
    if len == 0 {
        errors.add(field, "is required");
    } else if len < PASSWORD_MIN {
        errors.add(field, format!("must be at least {} characters", PASSWORD_MIN));
    } else if len > PASSWORD_MAX {
        errors.add(field, format!("must be at most {} characters", PASSWORD_MAX));
    }
}
