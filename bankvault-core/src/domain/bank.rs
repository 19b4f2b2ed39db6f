//! Bank record domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::encryption::CipherBlob;

/// Rendered in place of an optional secret that was never stored
pub const NOT_AVAILABLE: &str = "N/A";

/// Encrypted label/value pair attached to a bank record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    pub label: CipherBlob,
    pub value: CipherBlob,
}

/// A bank record as stored. Every field except ids and timestamps is ciphertext.
#[derive(Debug, Clone)]
pub struct BankRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bank_name: CipherBlob,
    pub phone_for_otp: CipherBlob,
    pub account_number: CipherBlob,
    pub net_banking_username: CipherBlob,
    pub net_banking_password: Option<CipherBlob>,
    pub mobile_banking_username: CipherBlob,
    pub mobile_banking_password: Option<CipherBlob>,
    pub atm_pin: Option<CipherBlob>,
    pub custom_fields: Vec<CustomField>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BankRecord {
    /// Every ciphertext held by this record, paired with a field name.
    /// Used by health checks that verify the at-rest invariant.
    pub fn ciphertexts(&self) -> Vec<(String, &CipherBlob)> {
        let mut out: Vec<(String, &CipherBlob)> = vec![
            ("bank_name".to_string(), &self.bank_name),
            ("phone_for_otp".to_string(), &self.phone_for_otp),
            ("account_number".to_string(), &self.account_number),
            ("net_banking_username".to_string(), &self.net_banking_username),
            ("mobile_banking_username".to_string(), &self.mobile_banking_username),
        ];
        if let Some(blob) = &self.net_banking_password {
            out.push(("net_banking_password".to_string(), blob));
        }
        if let Some(blob) = &self.mobile_banking_password {
            out.push(("mobile_banking_password".to_string(), blob));
        }
        if let Some(blob) = &self.atm_pin {
            out.push(("atm_pin".to_string(), blob));
        }
        for (i, field) in self.custom_fields.iter().enumerate() {
            out.push((format!("custom_fields[{}].label", i), &field.label));
            out.push((format!("custom_fields[{}].value", i), &field.value));
        }
        out
    }
}

/// Plaintext custom field as submitted by a form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFieldInput {
    pub label: String,
    pub value: String,
}

impl CustomFieldInput {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Plaintext form values for adding or updating a bank record.
///
/// Optional secrets are plain strings: an empty (or whitespace-only) value
/// means "not provided". On update that keeps the stored secret.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankFormValues {
    pub bank_name: String,
    pub phone_for_otp: String,
    pub account_number: String,
    pub net_banking_username: String,
    #[serde(default)]
    pub net_banking_password: String,
    pub mobile_banking_username: String,
    #[serde(default)]
    pub mobile_banking_password: String,
    #[serde(default)]
    pub atm_pin: String,
    /// `None` leaves stored custom fields untouched on update
    #[serde(default)]
    pub custom_fields: Option<Vec<CustomFieldInput>>,
}

/// Trimmed value of an optional form field, or `None` when blank
pub fn provided(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Fresh ciphertexts for an update. `None` on an optional secret keeps the
/// stored one; `None` on custom fields keeps the stored list.
#[derive(Debug, Clone)]
pub struct BankUpdate {
    pub bank_name: CipherBlob,
    pub phone_for_otp: CipherBlob,
    pub account_number: CipherBlob,
    pub net_banking_username: CipherBlob,
    pub net_banking_password: Option<CipherBlob>,
    pub mobile_banking_username: CipherBlob,
    pub mobile_banking_password: Option<CipherBlob>,
    pub atm_pin: Option<CipherBlob>,
    pub custom_fields: Option<Vec<CustomField>>,
}

/// List entry: the two fields needed to tell records apart, decrypted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankSummary {
    pub id: Uuid,
    pub bank_name: String,
    pub account_number: String,
}

/// Every field of a record, decrypted for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptedBank {
    pub id: Uuid,
    pub bank_name: String,
    pub phone_for_otp: String,
    pub account_number: String,
    pub net_banking_username: String,
    pub net_banking_password: String,
    pub mobile_banking_username: String,
    pub mobile_banking_password: String,
    pub atm_pin: String,
    pub custom_fields: Vec<CustomFieldInput>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(s: &str) -> CipherBlob {
        CipherBlob::from_stored(s)
    }

    #[test]
    fn test_provided() {
        assert_eq!(provided("1234"), Some("1234"));
        assert_eq!(provided(" 1234 "), Some("1234"));
        assert_eq!(provided(""), None);
        assert_eq!(provided("   "), None);
    }

    #[test]
    fn test_ciphertexts_skip_absent_optionals() {
        let now = Utc::now();
        let record = BankRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            bank_name: blob("a"),
            phone_for_otp: blob("b"),
            account_number: blob("c"),
            net_banking_username: blob("d"),
            net_banking_password: None,
            mobile_banking_username: blob("e"),
            mobile_banking_password: None,
            atm_pin: Some(blob("f")),
            custom_fields: vec![CustomField { label: blob("g"), value: blob("h") }],
            created_at: now,
            updated_at: now,
        };

        let fields: Vec<String> = record.ciphertexts().into_iter().map(|(n, _)| n).collect();
        assert_eq!(fields.len(), 8);
        assert!(fields.contains(&"atm_pin".to_string()));
        assert!(!fields.contains(&"net_banking_password".to_string()));
        assert!(fields.contains(&"custom_fields[0].value".to_string()));
    }

    #[test]
    fn test_form_deserializes_camel_case() {
        let form: BankFormValues = serde_json::from_str(
            r#"{"bankName":"Acme","phoneForOtp":"+14155550100","accountNumber":"12345678",
                "netBankingUsername":"nb","mobileBankingUsername":"mb"}"#,
        )
        .unwrap();
        assert_eq!(form.bank_name, "Acme");
        assert_eq!(form.atm_pin, "");
        assert!(form.custom_fields.is_none());
    }
}
