use super::*;

use chrono::Duration;

/// Rows removed by one purge pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeCounts {
    pub codes: usize,
    pub phone_numbers: usize,
}

impl CatalogDb {
    // =========================================================================
    // Phone numbers and verification codes
    // =========================================================================

    fn map_phone_row(row: &rusqlite::Row) -> rusqlite::Result<DbPhoneNumber> {
        Ok(DbPhoneNumber {
            id: row.get(0)?,
            country_dialing_code_id: row.get(1)?,
            phone_number: row.get(2)?,
            user_id: row.get(3)?,
            is_verified: row.get(4)?,
            creation_timestamp: row.get(5)?,
        })
    }

    pub fn get_phone_number(&self, id: i64) -> Result<Option<DbPhoneNumber>, DbError> {
        self.query_opt(
            "SELECT id, country_dialing_code_id, phone_number, user_id, is_verified, creation_timestamp
             FROM user_phone_number WHERE id = ?1",
            params![id],
            Self::map_phone_row,
        )
    }

    /// Resolve a (dialing code, national number) pair, creating it unverified.
    pub fn get_or_create_phone_number(
        &self,
        dialing_code_id: i64,
        phone_number: &str,
    ) -> Result<DbPhoneNumber, DbError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO user_phone_number
                (country_dialing_code_id, phone_number, creation_timestamp)
             VALUES (?1, ?2, ?3)",
            params![dialing_code_id, phone_number, Self::now()],
        )?;
        self.query_opt(
            "SELECT id, country_dialing_code_id, phone_number, user_id, is_verified, creation_timestamp
             FROM user_phone_number
             WHERE country_dialing_code_id = ?1 AND phone_number = ?2",
            params![dialing_code_id, phone_number],
            Self::map_phone_row,
        )?
        .ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn mark_phone_verified(&self, phone_number_id: i64) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE user_phone_number SET is_verified = 1 WHERE id = ?1",
            params![phone_number_id],
        )?;
        Ok(())
    }

    pub fn set_phone_user(&self, phone_number_id: i64, user_id: i64) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE user_phone_number SET user_id = ?1 WHERE id = ?2",
            params![user_id, phone_number_id],
        )?;
        Ok(())
    }

    /// Store a fresh code hash for a phone number, dropping any previous code
    /// and its attempt count.
    pub fn replace_verification_code(&self, phone_number_id: i64, code_hash: &str) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO user_phone_number_verification_code
                (phone_number_id, code_hash, attempts, creation_timestamp)
             VALUES (?1, ?2, 0, ?3)",
            params![phone_number_id, code_hash, Self::now()],
        )?;
        Ok(())
    }

    pub fn get_verification_code(&self, phone_number_id: i64) -> Result<Option<DbVerificationCode>, DbError> {
        self.query_opt(
            "SELECT phone_number_id, code_hash, attempts, creation_timestamp
             FROM user_phone_number_verification_code WHERE phone_number_id = ?1",
            params![phone_number_id],
            |row| {
                Ok(DbVerificationCode {
                    phone_number_id: row.get(0)?,
                    code_hash: row.get(1)?,
                    attempts: row.get(2)?,
                    creation_timestamp: row.get(3)?,
                })
            },
        )
    }

    /// Count one failed attempt. Returns the new attempt count.
    pub fn increment_verification_attempts(&self, phone_number_id: i64) -> Result<i64, DbError> {
        self.conn.execute(
            "UPDATE user_phone_number_verification_code SET attempts = attempts + 1
             WHERE phone_number_id = ?1",
            params![phone_number_id],
        )?;
        Ok(self.conn.query_row(
            "SELECT attempts FROM user_phone_number_verification_code WHERE phone_number_id = ?1",
            params![phone_number_id],
            |r| r.get(0),
        )?)
    }

    pub fn delete_verification_code(&self, phone_number_id: i64) -> Result<bool, DbError> {
        let rows = self.conn.execute(
            "DELETE FROM user_phone_number_verification_code WHERE phone_number_id = ?1",
            params![phone_number_id],
        )?;
        Ok(rows > 0)
    }

    /// Delete codes older than `ttl_secs`, then phone numbers older than
    /// `ttl_secs` that no account claimed, verified or not. A number with a
    /// live code is kept until that code expires.
    pub fn purge_expired_verification(&self, ttl_secs: i64) -> Result<PurgeCounts, DbError> {
        let cutoff = (Utc::now() - Duration::seconds(ttl_secs)).to_rfc3339();
        self.with_transaction(|tx| -> Result<PurgeCounts, DbError> {
            let codes = tx.conn.execute(
                "DELETE FROM user_phone_number_verification_code WHERE creation_timestamp < ?1",
                params![cutoff],
            )?;
            let phone_numbers = tx.conn.execute(
                "DELETE FROM user_phone_number
                 WHERE user_id IS NULL
                   AND creation_timestamp < ?1
                   AND id NOT IN (SELECT phone_number_id FROM user_phone_number_verification_code)",
                params![cutoff],
            )?;
            Ok(PurgeCounts {
                codes,
                phone_numbers,
            })
        })
    }
}
