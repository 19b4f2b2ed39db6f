//! User service - registration, login and master password changes

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::validation::{validate_password_change, validate_registration};
use crate::domain::{User, UserPublic};
use crate::ports::VaultRepository;
use crate::services::encryption::FieldCipher;

/// User lifecycle operations
pub struct UserService {
    repository: Arc<dyn VaultRepository>,
    cipher: Arc<FieldCipher>,
}

impl UserService {
    pub fn new(repository: Arc<dyn VaultRepository>, cipher: Arc<FieldCipher>) -> Self {
        Self { repository, cipher }
    }

    /// Register a new user with an empty bank list
    pub fn create_user(&self, username: &str, password: &str) -> Result<UserPublic> {
        validate_registration(username, password)?;

        let username = username.trim();
        if self.repository.find_user_by_username(username)?.is_some() {
            return Err(Error::conflict("Username is already taken"));
        }

        let user = User::new(username, self.cipher.encrypt(password)?);
        // The unique index still guards a registration racing this one
        self.repository.insert_user(&user)?;

        Ok(user.to_public())
    }

    /// Check a username/password pair.
    ///
    /// Unknown usernames and wrong passwords both yield
    /// `Error::InvalidCredentials`.
    pub fn verify_master_password(&self, username: &str, password: &str) -> Result<UserPublic> {
        let user = self
            .repository
            .find_user_by_username(username)?
            .ok_or(Error::InvalidCredentials)?;

        if self.cipher.comparison_for(&user.master_password).matches(password) {
            Ok(user.to_public())
        } else {
            Err(Error::InvalidCredentials)
        }
    }

    /// Replace the master password after checking the current one
    pub fn change_master_password(
        &self,
        user_id: Uuid,
        current: &str,
        new: &str,
        confirm: &str,
    ) -> Result<()> {
        validate_password_change(current, new, confirm)?;

        let user = self
            .repository
            .get_user(user_id)?
            .ok_or_else(|| Error::not_found("User not found"))?;

        if !self.cipher.comparison_for(&user.master_password).matches(current) {
            return Err(Error::IncorrectPassword);
        }

        let fresh = self.cipher.encrypt(new)?;
        if !self
            .repository
            .update_master_password(user.id, &user.master_password, &fresh)?
        {
            return Err(Error::conflict(
                "Master password was changed concurrently, please retry",
            ));
        }

        Ok(())
    }

    /// Whether the stored master password predates encryption
    pub fn has_legacy_password(&self, user: &User) -> bool {
        !self.cipher.is_ciphertext(&user.master_password)
    }
}
