use super::*;

use crate::entity::ContentKind;

const TAG_COLUMNS: &str = "t.id, t.name, t.creator_id, t.creation_timestamp";

impl CatalogDb {
    // =========================================================================
    // Tags
    // =========================================================================

    fn map_tag_row(row: &rusqlite::Row) -> rusqlite::Result<DbTag> {
        Ok(DbTag {
            id: row.get(0)?,
            name: row.get(1)?,
            creator_id: row.get(2)?,
            creation_timestamp: row.get(3)?,
        })
    }

    pub fn get_tag_by_name(&self, name: &str) -> Result<Option<DbTag>, DbError> {
        let sql = format!("SELECT {} FROM tag t WHERE t.name = ?1", TAG_COLUMNS);
        self.query_opt(&sql, params![name], Self::map_tag_row)
    }

    /// Resolve a normalized tag name, creating it attributed to `creator_id`
    /// when it does not exist yet.
    pub fn get_or_create_tag(&self, name: &str, creator_id: i64) -> Result<DbTag, DbError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO tag (name, creator_id, creation_timestamp) VALUES (?1, ?2, ?3)",
            params![name, creator_id, Self::now()],
        )?;
        self.get_tag_by_name(name)?
            .ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Tags attached to an entity, ordered by name.
    pub fn tags_for(&self, kind: ContentKind, entity_id: i64) -> Result<Vec<DbTag>, DbError> {
        let t = kind.tables();
        let sql = format!(
            "SELECT {} FROM tag t
             JOIN {} et ON et.tag_id = t.id
             WHERE et.{} = ?1
             ORDER BY t.name",
            TAG_COLUMNS, t.tag, t.id_column
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![entity_id], Self::map_tag_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn attach_tag(&self, kind: ContentKind, entity_id: i64, tag_id: i64) -> Result<(), DbError> {
        let t = kind.tables();
        let sql = format!(
            "INSERT OR IGNORE INTO {} ({}, tag_id) VALUES (?1, ?2)",
            t.tag, t.id_column
        );
        self.conn.execute(&sql, params![entity_id, tag_id])?;
        Ok(())
    }

    pub fn detach_tag(&self, kind: ContentKind, entity_id: i64, tag_id: i64) -> Result<(), DbError> {
        let t = kind.tables();
        let sql = format!("DELETE FROM {} WHERE {} = ?1 AND tag_id = ?2", t.tag, t.id_column);
        self.conn.execute(&sql, params![entity_id, tag_id])?;
        Ok(())
    }
}
