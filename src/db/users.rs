use super::*;

use crate::config::limits::PAGE_SIZE;
use crate::db::brands::like_pattern;
use crate::entity::EntityType;

const ACCOUNT_SELECT: &str = "SELECT a.id, a.user_id, a.alias, a.display_name, a.bio, a.avatar_path, \
     (adm.user_account_id IS NOT NULL), a.is_suspended, a.creation_timestamp \
     FROM user_account a \
     LEFT JOIN admin_user_account adm ON adm.user_account_id = a.id";

impl CatalogDb {
    // =========================================================================
    // Users and user accounts
    // =========================================================================

    fn map_account_row(row: &rusqlite::Row) -> rusqlite::Result<DbUserAccount> {
        Ok(DbUserAccount {
            id: row.get(0)?,
            user_id: row.get(1)?,
            alias: row.get(2)?,
            display_name: row.get(3)?,
            bio: row.get(4)?,
            avatar_path: row.get(5)?,
            is_admin: row.get(6)?,
            is_suspended: row.get(7)?,
            creation_timestamp: row.get(8)?,
        })
    }

    /// Create a physical user. Returns its id.
    pub fn create_user(&self) -> Result<i64, DbError> {
        self.conn.execute(
            "INSERT INTO user (creation_timestamp) VALUES (?1)",
            params![Self::now()],
        )?;
        Ok(self.last_id())
    }

    /// Create a profile under `user_id`. The caller registers the alias.
    pub fn create_user_account(&self, user_id: i64, alias: &str) -> Result<DbUserAccount, DbError> {
        self.conn.execute(
            "INSERT INTO user_account (user_id, alias, creation_timestamp) VALUES (?1, ?2, ?3)",
            params![user_id, alias, Self::now()],
        )?;
        let id = self.last_id();
        self.get_user_account(id)?
            .ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn get_user_account(&self, id: i64) -> Result<Option<DbUserAccount>, DbError> {
        let sql = format!("{} WHERE a.id = ?1", ACCOUNT_SELECT);
        self.query_opt(&sql, params![id], Self::map_account_row)
    }

    pub fn get_user_account_by_alias(&self, alias: &str) -> Result<Option<DbUserAccount>, DbError> {
        let sql = format!("{} WHERE a.alias = ?1", ACCOUNT_SELECT);
        self.query_opt(&sql, params![alias], Self::map_account_row)
    }

    /// Every profile owned by one physical user, oldest first.
    pub fn user_accounts_for_user(&self, user_id: i64) -> Result<Vec<DbUserAccount>, DbError> {
        let sql = format!("{} WHERE a.user_id = ?1 ORDER BY a.id", ACCOUNT_SELECT);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id], Self::map_account_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn count_user_accounts(&self, user_id: i64) -> Result<i64, DbError> {
        self.count_where("user_account", "user_id", user_id)
    }

    /// Accounts whose alias or display name contains `query`.
    pub fn search_user_accounts(&self, query: &str) -> Result<Vec<DbUserAccount>, DbError> {
        let sql = format!(
            "{} WHERE a.alias LIKE ?1 ESCAPE '\\' OR a.display_name LIKE ?1 ESCAPE '\\'
             ORDER BY a.alias LIMIT ?2",
            ACCOUNT_SELECT
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![like_pattern(query), PAGE_SIZE], Self::map_account_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Delete an account and release its alias. Sessions, manager grants and
    /// reports about the account cascade.
    pub fn delete_user_account(&self, id: i64) -> Result<bool, DbError> {
        self.release_alias(id, EntityType::UserAccount)?;
        let rows = self
            .conn
            .execute("DELETE FROM user_account WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    pub fn grant_admin(&self, account_id: i64) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO admin_user_account (user_account_id, creation_timestamp)
             VALUES (?1, ?2)",
            params![account_id, Self::now()],
        )?;
        Ok(())
    }

    pub fn is_admin(&self, account_id: i64) -> Result<bool, DbError> {
        Ok(self.count_where("admin_user_account", "user_account_id", account_id)? > 0)
    }
}
