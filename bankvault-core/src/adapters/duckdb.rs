//! DuckDB repository implementation

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use duckdb::types::Type;
use duckdb::{params, Connection, OptionalExt};
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{BankRecord, BankUpdate, CipherBlob, CustomField, User};
use crate::ports::{OrphanedBank, VaultRepository};
use crate::services::MigrationService;

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

const USER_COLUMNS: &str =
    "user_id, username, master_password, version, created_at, updated_at";

const BANK_COLUMNS: &str = "bank_id, user_id, bank_name_ct, phone_for_otp_ct, account_number_ct,
     net_banking_username_ct, net_banking_password_ct, mobile_banking_username_ct,
     mobile_banking_password_ct, atm_pin_ct, custom_fields, created_at, updated_at";

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

/// Unique index violations surface as constraint errors
fn is_unique_violation(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    lower.contains("duplicate key") || lower.contains("unique constraint")
}

/// DuckDB repository implementation
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl DuckDbRepository {
    /// Open (or create) the vault database at `db_path`
    ///
    /// Retries with exponential backoff on file locking errors, which occur
    /// when another process (usually a second CLI invocation) holds
    /// the file.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: db_path.to_path_buf(),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        eprintln!(
                            "[bankvault] Database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }

        Err(last_error.map(Error::from).unwrap_or_else(|| {
            Error::database(format!("Failed to open database after {} retries", MAX_RETRIES))
        }))
    }

    /// Open an in-memory vault (tests, dry runs)
    pub fn in_memory() -> Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory_with_flags(config)?),
            db_path: PathBuf::from(":memory:"),
        })
    }

    fn try_open_connection(db_path: &Path) -> duckdb::Result<Connection> {
        // Extension autoloading is disabled: cached extensions on some hosts
        // fail code signing checks.
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Connection::open_with_flags(db_path, config)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }

    /// Path of the underlying database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Flush the write-ahead log into the database file
    pub fn checkpoint(&self) -> Result<()> {
        self.conn()?.execute_batch("CHECKPOINT")?;
        Ok(())
    }

    fn row_to_user(row: &duckdb::Row) -> duckdb::Result<User> {
        let id: String = row.get(0)?;
        let created: String = row.get(4)?;
        let updated: String = row.get(5)?;
        let version: i64 = row.get(3)?;

        Ok(User {
            id: parse_uuid(&id, 0)?,
            username: row.get(1)?,
            master_password: CipherBlob::from_stored(row.get::<_, String>(2)?),
            version: version.max(0) as u64,
            created_at: parse_timestamp(&created),
            updated_at: parse_timestamp(&updated),
        })
    }

    fn row_to_bank(row: &duckdb::Row) -> duckdb::Result<BankRecord> {
        // Column indices follow BANK_COLUMNS:
        // 0: bank_id, 1: user_id, 2: bank_name_ct, 3: phone_for_otp_ct,
        // 4: account_number_ct, 5: net_banking_username_ct, 6: net_banking_password_ct,
        // 7: mobile_banking_username_ct, 8: mobile_banking_password_ct, 9: atm_pin_ct,
        // 10: custom_fields, 11: created_at, 12: updated_at
        let id: String = row.get(0)?;
        let user_id: String = row.get(1)?;
        let custom_json: String = row.get(10)?;
        let created: String = row.get(11)?;
        let updated: String = row.get(12)?;

        let custom_fields: Vec<CustomField> = serde_json::from_str(&custom_json)
            .map_err(|e| duckdb::Error::FromSqlConversionFailure(10, Type::Text, Box::new(e)))?;

        Ok(BankRecord {
            id: parse_uuid(&id, 0)?,
            user_id: parse_uuid(&user_id, 1)?,
            bank_name: CipherBlob::from_stored(row.get::<_, String>(2)?),
            phone_for_otp: CipherBlob::from_stored(row.get::<_, String>(3)?),
            account_number: CipherBlob::from_stored(row.get::<_, String>(4)?),
            net_banking_username: CipherBlob::from_stored(row.get::<_, String>(5)?),
            net_banking_password: row.get::<_, Option<String>>(6)?.map(CipherBlob::from_stored),
            mobile_banking_username: CipherBlob::from_stored(row.get::<_, String>(7)?),
            mobile_banking_password: row.get::<_, Option<String>>(8)?.map(CipherBlob::from_stored),
            atm_pin: row.get::<_, Option<String>>(9)?.map(CipherBlob::from_stored),
            custom_fields,
            created_at: parse_timestamp(&created),
            updated_at: parse_timestamp(&updated),
        })
    }

    fn query_banks(&self, sql: &str, params: &[&dyn duckdb::ToSql]) -> Result<Vec<BankRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::row_to_bank)?;

        let mut banks = Vec::new();
        for bank in rows {
            banks.push(bank?);
        }
        Ok(banks)
    }
}

/// Bump the owner's version inside the current write
fn touch_user(conn: &Connection, user_id: &str, now: &str) -> duckdb::Result<usize> {
    conn.execute(
        "UPDATE sys_users SET version = version + 1, updated_at = ? WHERE user_id = ?",
        params![now, user_id],
    )
}

fn custom_fields_json(fields: &[CustomField]) -> Result<String> {
    Ok(serde_json::to_string(fields)?)
}

fn parse_uuid(s: &str, idx: usize) -> duckdb::Result<Uuid> {
    Uuid::parse_str(s)
        .map_err(|e| duckdb::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn blob_str(blob: &Option<CipherBlob>) -> Option<&str> {
    blob.as_ref().map(|b| b.as_str())
}

impl VaultRepository for DuckDbRepository {
    fn ensure_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        MigrationService::new(&conn).run_pending()?;
        Ok(())
    }

    // === Users ===

    fn insert_user(&self, user: &User) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sys_users (user_id, username, username_key, master_password, version,
                                    created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                user.id.to_string(),
                user.username,
                User::username_key(&user.username),
                user.master_password.as_str(),
                user.version as i64,
                user.created_at.to_rfc3339(),
                user.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e.to_string()) {
                Error::conflict("Username is already taken")
            } else {
                Error::from(e)
            }
        })?;
        Ok(())
    }

    fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM sys_users WHERE user_id = ?", USER_COLUMNS),
                [id.to_string()],
                Self::row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM sys_users WHERE username_key = ?", USER_COLUMNS),
                [User::username_key(username)],
                Self::row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    fn update_master_password(
        &self,
        id: Uuid,
        expected: &CipherBlob,
        master_password: &CipherBlob,
    ) -> Result<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE sys_users
             SET master_password = ?, version = version + 1, updated_at = ?
             WHERE user_id = ? AND master_password = ?",
            params![
                master_password.as_str(),
                Utc::now().to_rfc3339(),
                id.to_string(),
                expected.as_str(),
            ],
        )?;
        Ok(updated == 1)
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_users ORDER BY created_at",
            USER_COLUMNS
        ))?;
        let rows = stmt.query_map([], Self::row_to_user)?;

        let mut users = Vec::new();
        for user in rows {
            users.push(user?);
        }
        Ok(users)
    }

    // === Banks ===

    fn list_banks(&self, user_id: Uuid) -> Result<Vec<BankRecord>> {
        self.query_banks(
            &format!(
                "SELECT {} FROM sys_banks WHERE user_id = ? ORDER BY position",
                BANK_COLUMNS
            ),
            &[&user_id.to_string()],
        )
    }

    fn get_bank(&self, user_id: Uuid, bank_id: Uuid) -> Result<Option<BankRecord>> {
        let mut banks = self.query_banks(
            &format!(
                "SELECT {} FROM sys_banks WHERE user_id = ? AND bank_id = ?",
                BANK_COLUMNS
            ),
            &[&user_id.to_string(), &bank_id.to_string()],
        )?;
        Ok(banks.pop())
    }

    fn insert_bank(&self, record: &BankRecord) -> Result<()> {
        let custom = custom_fields_json(&record.custom_fields)?;
        let user_id = record.user_id.to_string();
        let now = record.updated_at.to_rfc3339();

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let position: i64 = tx.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM sys_banks WHERE user_id = ?",
            [&user_id],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO sys_banks (bank_id, user_id, position, bank_name_ct, phone_for_otp_ct,
                                    account_number_ct, net_banking_username_ct,
                                    net_banking_password_ct, mobile_banking_username_ct,
                                    mobile_banking_password_ct, atm_pin_ct, custom_fields,
                                    created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                record.id.to_string(),
                user_id,
                position,
                record.bank_name.as_str(),
                record.phone_for_otp.as_str(),
                record.account_number.as_str(),
                record.net_banking_username.as_str(),
                blob_str(&record.net_banking_password),
                record.mobile_banking_username.as_str(),
                blob_str(&record.mobile_banking_password),
                blob_str(&record.atm_pin),
                custom,
                record.created_at.to_rfc3339(),
                now,
            ],
        )?;
        touch_user(&tx, &user_id, &now)?;
        tx.commit()?;
        Ok(())
    }

    fn update_bank(&self, user_id: Uuid, bank_id: Uuid, update: &BankUpdate) -> Result<bool> {
        let custom = update
            .custom_fields
            .as_deref()
            .map(custom_fields_json)
            .transpose()?;
        let user_id = user_id.to_string();
        let now = Utc::now().to_rfc3339();

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        // A NULL optional secret keeps the stored ciphertext
        let updated = tx.execute(
            "UPDATE sys_banks SET
                bank_name_ct = ?,
                phone_for_otp_ct = ?,
                account_number_ct = ?,
                net_banking_username_ct = ?,
                net_banking_password_ct = COALESCE(?, net_banking_password_ct),
                mobile_banking_username_ct = ?,
                mobile_banking_password_ct = COALESCE(?, mobile_banking_password_ct),
                atm_pin_ct = COALESCE(?, atm_pin_ct),
                custom_fields = COALESCE(?, custom_fields),
                updated_at = ?
             WHERE user_id = ? AND bank_id = ?",
            params![
                update.bank_name.as_str(),
                update.phone_for_otp.as_str(),
                update.account_number.as_str(),
                update.net_banking_username.as_str(),
                blob_str(&update.net_banking_password),
                update.mobile_banking_username.as_str(),
                blob_str(&update.mobile_banking_password),
                blob_str(&update.atm_pin),
                custom,
                now,
                user_id,
                bank_id.to_string(),
            ],
        )?;
        if updated == 0 {
            tx.rollback()?;
            return Ok(false);
        }
        touch_user(&tx, &user_id, &now)?;
        tx.commit()?;
        Ok(true)
    }

    fn delete_bank(&self, user_id: Uuid, bank_id: Uuid) -> Result<bool> {
        let user_id = user_id.to_string();
        let now = Utc::now().to_rfc3339();

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let deleted = tx.execute(
            "DELETE FROM sys_banks WHERE user_id = ? AND bank_id = ?",
            params![user_id, bank_id.to_string()],
        )?;
        if deleted == 0 {
            tx.rollback()?;
            return Ok(false);
        }
        touch_user(&tx, &user_id, &now)?;
        tx.commit()?;
        Ok(true)
    }

    // === Maintenance ===

    fn list_all_banks(&self) -> Result<Vec<BankRecord>> {
        self.query_banks(
            &format!("SELECT {} FROM sys_banks ORDER BY user_id, position", BANK_COLUMNS),
            &[],
        )
    }

    fn find_orphaned_banks(&self) -> Result<Vec<OrphanedBank>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT b.bank_id, b.user_id
             FROM sys_banks b
             LEFT JOIN sys_users u ON b.user_id = u.user_id
             WHERE u.user_id IS NULL",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(OrphanedBank {
                bank_id: row.get(0)?,
                user_id: row.get(1)?,
            })
        })?;

        let mut orphans = Vec::new();
        for orphan in rows {
            orphans.push(orphan?);
        }
        Ok(orphans)
    }
}
