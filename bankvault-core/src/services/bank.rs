//! Bank service - encrypted bank record management
//!
//! Every operation validates, encrypts and writes exactly one record. On
//! update, blank optional secrets keep what is stored rather than clearing it.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::validation::validate_bank_form;
use crate::domain::{
    BankFormValues, BankRecord, BankSummary, BankUpdate, CipherBlob, CustomField,
    CustomFieldInput, DecryptedBank, NOT_AVAILABLE,
};
use crate::ports::VaultRepository;
use crate::services::encryption::FieldCipher;

/// Bank record CRUD for a single user
pub struct BankService {
    repository: Arc<dyn VaultRepository>,
    cipher: Arc<FieldCipher>,
}

impl BankService {
    pub fn new(repository: Arc<dyn VaultRepository>, cipher: Arc<FieldCipher>) -> Self {
        Self { repository, cipher }
    }

    fn ensure_user(&self, user_id: Uuid) -> Result<()> {
        self.repository
            .get_user(user_id)?
            .map(|_| ())
            .ok_or_else(|| Error::not_found("User not found"))
    }

    fn encrypt(&self, value: &str) -> Result<CipherBlob> {
        self.cipher.encrypt(value.trim())
    }

    fn encrypt_custom_fields(&self, fields: &[CustomFieldInput]) -> Result<Vec<CustomField>> {
        fields
            .iter()
            .map(|f| {
                Ok(CustomField {
                    label: self.encrypt(&f.label)?,
                    value: self.encrypt(&f.value)?,
                })
            })
            .collect()
    }

    /// Decrypt a stored field, reporting failure without the cipher detail
    fn decrypt(&self, blob: &CipherBlob) -> Result<String> {
        self.cipher.decrypt(blob).map_err(|e| match e {
            Error::Decryption(cause) => Error::Unreadable(cause),
            other => other,
        })
    }

    fn summarize(&self, bank: &BankRecord) -> Result<BankSummary> {
        Ok(BankSummary {
            id: bank.id,
            bank_name: self.decrypt(&bank.bank_name)?,
            account_number: self.decrypt(&bank.account_number)?,
        })
    }

    fn decrypt_optional(&self, blob: &Option<CipherBlob>) -> Result<String> {
        match blob {
            Some(b) => self.decrypt(b),
            None => Ok(NOT_AVAILABLE.to_string()),
        }
    }

    /// List a user's banks with name and account number decrypted
    pub fn list(&self, user_id: Uuid) -> Result<Vec<BankSummary>> {
        self.ensure_user(user_id)?;

        self.repository
            .list_banks(user_id)?
            .iter()
            .map(|bank| self.summarize(bank))
            .collect()
    }

    /// Encrypt and append a new bank record
    pub fn add(&self, user_id: Uuid, form: &BankFormValues) -> Result<BankSummary> {
        validate_bank_form(form)?;
        self.ensure_user(user_id)?;

        let now = Utc::now();
        let record = BankRecord {
            id: Uuid::new_v4(),
            user_id,
            bank_name: self.encrypt(&form.bank_name)?,
            phone_for_otp: self.encrypt(&form.phone_for_otp)?,
            account_number: self.encrypt(&form.account_number)?,
            net_banking_username: self.encrypt(&form.net_banking_username)?,
            net_banking_password: self.cipher.encrypt_provided(&form.net_banking_password)?,
            mobile_banking_username: self.encrypt(&form.mobile_banking_username)?,
            mobile_banking_password: self
                .cipher
                .encrypt_provided(&form.mobile_banking_password)?,
            atm_pin: self.cipher.encrypt_provided(&form.atm_pin)?,
            custom_fields: self
                .encrypt_custom_fields(form.custom_fields.as_deref().unwrap_or(&[]))?,
            created_at: now,
            updated_at: now,
        };

        self.repository.insert_bank(&record)?;
        self.summarize(&record)
    }

    /// Re-encrypt and overwrite one bank record.
    ///
    /// Required fields are always replaced. Net/mobile banking passwords and
    /// the ATM PIN are replaced only when the submitted value is non-blank.
    /// Custom fields, when submitted, replace the whole list.
    pub fn update(
        &self,
        user_id: Uuid,
        bank_id: Uuid,
        form: &BankFormValues,
    ) -> Result<BankSummary> {
        validate_bank_form(form)?;
        self.ensure_user(user_id)?;

        let update = BankUpdate {
            bank_name: self.encrypt(&form.bank_name)?,
            phone_for_otp: self.encrypt(&form.phone_for_otp)?,
            account_number: self.encrypt(&form.account_number)?,
            net_banking_username: self.encrypt(&form.net_banking_username)?,
            net_banking_password: self.cipher.encrypt_provided(&form.net_banking_password)?,
            mobile_banking_username: self.encrypt(&form.mobile_banking_username)?,
            mobile_banking_password: self.cipher.encrypt_provided(&form.mobile_banking_password)?,
            atm_pin: self.cipher.encrypt_provided(&form.atm_pin)?,
            custom_fields: form
                .custom_fields
                .as_deref()
                .map(|fields| self.encrypt_custom_fields(fields))
                .transpose()?,
        };

        if !self.repository.update_bank(user_id, bank_id, &update)? {
            return Err(Error::not_found("Bank not found"));
        }

        Ok(BankSummary {
            id: bank_id,
            bank_name: form.bank_name.trim().to_string(),
            account_number: form.account_number.trim().to_string(),
        })
    }

    /// Remove one bank record
    pub fn delete(&self, user_id: Uuid, bank_id: Uuid) -> Result<()> {
        self.ensure_user(user_id)?;

        if !self.repository.delete_bank(user_id, bank_id)? {
            return Err(Error::not_found("Bank not found"));
        }
        Ok(())
    }

    /// Decrypt every field of one bank record
    pub fn reveal(&self, user_id: Uuid, bank_id: Uuid) -> Result<DecryptedBank> {
        self.ensure_user(user_id)?;

        let bank = self
            .repository
            .get_bank(user_id, bank_id)?
            .ok_or_else(|| Error::not_found("Bank not found"))?;

        let custom_fields = bank
            .custom_fields
            .iter()
            .map(|f| {
                Ok(CustomFieldInput {
                    label: self.decrypt(&f.label)?,
                    value: self.decrypt(&f.value)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(DecryptedBank {
            id: bank.id,
            bank_name: self.decrypt(&bank.bank_name)?,
            phone_for_otp: self.decrypt(&bank.phone_for_otp)?,
            account_number: self.decrypt(&bank.account_number)?,
            net_banking_username: self.decrypt(&bank.net_banking_username)?,
            net_banking_password: self.decrypt_optional(&bank.net_banking_password)?,
            mobile_banking_username: self.decrypt(&bank.mobile_banking_username)?,
            mobile_banking_password: self.decrypt_optional(&bank.mobile_banking_password)?,
            atm_pin: self.decrypt_optional(&bank.atm_pin)?,
            custom_fields,
            created_at: bank.created_at,
            updated_at: bank.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::duckdb::DuckDbRepository;
    use crate::domain::{CipherBlob, User};

    struct Fixture {
        service: BankService,
        repo: Arc<DuckDbRepository>,
        cipher: Arc<FieldCipher>,
        user_id: Uuid,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(DuckDbRepository::in_memory().unwrap());
        repo.ensure_schema().unwrap();
        let cipher = Arc::new(FieldCipher::new([5u8; 32]));
        let user = User::new("alice", cipher.encrypt("password123").unwrap());
        repo.insert_user(&user).unwrap();

        Fixture {
            service: BankService::new(repo.clone(), cipher.clone()),
            repo,
            cipher,
            user_id: user.id,
        }
    }

    fn form(pin: &str) -> BankFormValues {
        BankFormValues {
            bank_name: "Acme Bank".to_string(),
            phone_for_otp: "+14155550100".to_string(),
            account_number: "ACME-000123".to_string(),
            net_banking_username: "alice.nb".to_string(),
            net_banking_password: "nb-secret".to_string(),
            mobile_banking_username: "alice.mb".to_string(),
            mobile_banking_password: String::new(),
            atm_pin: pin.to_string(),
            custom_fields: Some(vec![CustomFieldInput::new("IFSC", "ACME0001")]),
        }
    }

    #[test]
    fn test_add_stores_only_ciphertext() {
        let f = fixture();
        let summary = f.service.add(f.user_id, &form("1234")).unwrap();

        let stored = f.repo.get_bank(f.user_id, summary.id).unwrap().unwrap();
        for (field, blob) in stored.ciphertexts() {
            assert!(blob.parts().is_ok(), "{} is not a ciphertext blob", field);
            assert!(f.cipher.decrypt(blob).is_ok());
        }
        assert!(stored.mobile_banking_password.is_none());
        assert_eq!(f.cipher.decrypt(stored.atm_pin.as_ref().unwrap()).unwrap(), "1234");
    }

    #[test]
    fn test_list_decrypts_name_and_account() {
        let f = fixture();
        f.service.add(f.user_id, &form("1234")).unwrap();

        let banks = f.service.list(f.user_id).unwrap();
        assert_eq!(banks.len(), 1);
        assert_eq!(banks[0].bank_name, "Acme Bank");
        assert_eq!(banks[0].account_number, "ACME-000123");
    }

    #[test]
    fn test_list_unknown_user_is_not_found() {
        let f = fixture();
        assert!(matches!(f.service.list(Uuid::new_v4()), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_add_rejects_invalid_form() {
        let f = fixture();
        let mut bad = form("12");
        bad.account_number = "1".to_string();

        match f.service.add(f.user_id, &bad) {
            Err(Error::Validation(errors)) => {
                assert!(errors.has("atm_pin"));
                assert!(errors.has("account_number"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(f.service.list(f.user_id).unwrap().is_empty());
    }

    #[test]
    fn test_add_for_unknown_user() {
        let f = fixture();
        assert!(matches!(
            f.service.add(Uuid::new_v4(), &form("1234")),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_update_blank_secrets_are_kept() {
        let f = fixture();
        let bank = f.service.add(f.user_id, &form("1234")).unwrap();

        let mut edit = form("");
        edit.net_banking_password = "   ".to_string();
        edit.bank_name = "Acme Savings".to_string();
        f.service.update(f.user_id, bank.id, &edit).unwrap();

        let revealed = f.service.reveal(f.user_id, bank.id).unwrap();
        assert_eq!(revealed.bank_name, "Acme Savings");
        assert_eq!(revealed.atm_pin, "1234");
        assert_eq!(revealed.net_banking_password, "nb-secret");
        assert_eq!(revealed.mobile_banking_password, NOT_AVAILABLE);
    }

    #[test]
    fn test_update_custom_fields_replace_or_keep() {
        let f = fixture();
        let bank = f.service.add(f.user_id, &form("1234")).unwrap();

        let mut keep = form("");
        keep.custom_fields = None;
        f.service.update(f.user_id, bank.id, &keep).unwrap();
        let revealed = f.service.reveal(f.user_id, bank.id).unwrap();
        assert_eq!(revealed.custom_fields, vec![CustomFieldInput::new("IFSC", "ACME0001")]);

        let mut replace = form("");
        replace.custom_fields = Some(vec![
            CustomFieldInput::new("Branch", "Main St"),
            CustomFieldInput::new("IFSC", "ACME0002"),
        ]);
        f.service.update(f.user_id, bank.id, &replace).unwrap();
        let revealed = f.service.reveal(f.user_id, bank.id).unwrap();
        assert_eq!(revealed.custom_fields.len(), 2);
        assert_eq!(revealed.custom_fields[1].value, "ACME0002");

        let mut clear = form("");
        clear.custom_fields = Some(Vec::new());
        f.service.update(f.user_id, bank.id, &clear).unwrap();
        assert!(f.service.reveal(f.user_id, bank.id).unwrap().custom_fields.is_empty());
    }

    #[test]
    fn test_update_unknown_bank() {
        let f = fixture();
        assert!(matches!(
            f.service.update(f.user_id, Uuid::new_v4(), &form("1234")),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_delete() {
        let f = fixture();
        let keep = f.service.add(f.user_id, &form("1234")).unwrap();
        let gone = f.service.add(f.user_id, &form("5678")).unwrap();

        f.service.delete(f.user_id, gone.id).unwrap();
        let banks = f.service.list(f.user_id).unwrap();
        assert_eq!(banks.len(), 1);
        assert_eq!(banks[0].id, keep.id);

        assert!(matches!(
            f.service.delete(f.user_id, gone.id),
            Err(Error::NotFound(_))
        ));
        assert_eq!(f.service.list(f.user_id).unwrap().len(), 1);
    }

    #[test]
    fn test_reveal_reports_corrupt_ciphertext_as_unreadable() {
        let f = fixture();
        let now = Utc::now();
        let record = BankRecord {
            id: Uuid::new_v4(),
            user_id: f.user_id,
            bank_name: CipherBlob::from_stored("plain name"),
            phone_for_otp: f.cipher.encrypt("+14155550100").unwrap(),
            account_number: f.cipher.encrypt("12345").unwrap(),
            net_banking_username: f.cipher.encrypt("nb").unwrap(),
            net_banking_password: None,
            mobile_banking_username: f.cipher.encrypt("mb").unwrap(),
            mobile_banking_password: None,
            atm_pin: None,
            custom_fields: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        f.repo.insert_bank(&record).unwrap();

        assert!(matches!(
            f.service.reveal(f.user_id, record.id),
            Err(Error::Unreadable(_))
        ));
        assert!(matches!(f.service.list(f.user_id), Err(Error::Unreadable(_))));
    }
}
