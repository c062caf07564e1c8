use super::*;

use crate::entity::ContentKind;
use crate::types::ContentVisibility;

impl CatalogDb {
    // =========================================================================
    // Shared content-entity plumbing (brand / product / store)
    // =========================================================================

    /// Load the columns the authorization predicates need. Returns the row
    /// regardless of visibility; callers decide what hidden means.
    pub fn content_state(&self, kind: ContentKind, id: i64) -> Result<Option<ContentState>, DbError> {
        let sql = format!(
            "SELECT id, creator_id, visibility, edit_access_level FROM {} WHERE id = ?1",
            kind.tables().entity
        );
        self.query_opt(&sql, params![id], |row| {
            Ok(ContentState {
                id: row.get(0)?,
                creator_id: row.get(1)?,
                visibility: row.get(2)?,
                edit_access_level: row.get(3)?,
            })
        })
    }

    /// Grant manager rights. Idempotent.
    pub fn add_manager(&self, kind: ContentKind, entity_id: i64, account_id: i64) -> Result<(), DbError> {
        let t = kind.tables();
        let sql = format!(
            "INSERT OR IGNORE INTO {} ({}, user_account_id, creation_timestamp) VALUES (?1, ?2, ?3)",
            t.manager, t.id_column
        );
        self.conn
            .execute(&sql, params![entity_id, account_id, Self::now()])?;
        Ok(())
    }

    pub fn is_manager(&self, kind: ContentKind, entity_id: i64, account_id: i64) -> Result<bool, DbError> {
        let t = kind.tables();
        let sql = format!(
            "SELECT 1 FROM {} WHERE {} = ?1 AND user_account_id = ?2",
            t.manager, t.id_column
        );
        Ok(self
            .query_opt(&sql, params![entity_id, account_id], |_| Ok(()))?
            .is_some())
    }

    pub fn manager_ids(&self, kind: ContentKind, entity_id: i64) -> Result<Vec<i64>, DbError> {
        let t = kind.tables();
        let sql = format!(
            "SELECT user_account_id FROM {} WHERE {} = ?1 ORDER BY user_account_id",
            t.manager, t.id_column
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![entity_id], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn set_visibility(
        &self,
        kind: ContentKind,
        id: i64,
        visibility: ContentVisibility,
    ) -> Result<(), DbError> {
        let sql = format!(
            "UPDATE {} SET visibility = ?1 WHERE id = ?2",
            kind.tables().entity
        );
        self.conn.execute(&sql, params![visibility, id])?;
        Ok(())
    }

    pub fn set_avatar_path(&self, kind: ContentKind, id: i64, path: Option<&str>) -> Result<(), DbError> {
        let sql = format!(
            "UPDATE {} SET avatar_light_path = ?1 WHERE id = ?2",
            kind.tables().entity
        );
        self.conn.execute(&sql, params![path, id])?;
        Ok(())
    }

    pub fn avatar_path(&self, kind: ContentKind, id: i64) -> Result<Option<String>, DbError> {
        let sql = format!(
            "SELECT avatar_light_path FROM {} WHERE id = ?1",
            kind.tables().entity
        );
        Ok(self
            .query_opt(&sql, params![id], |row| row.get::<_, Option<String>>(0))?
            .flatten())
    }

    /// Physically delete an entity row and release its alias. Managers, tags,
    /// history and reports cascade. Call inside a transaction.
    pub fn hard_delete_content(&self, kind: ContentKind, id: i64) -> Result<bool, DbError> {
        self.release_alias(id, kind.entity_type())?;
        let sql = format!("DELETE FROM {} WHERE id = ?1", kind.tables().entity);
        let rows = self.conn.execute(&sql, params![id])?;
        Ok(rows > 0)
    }
}
