use super::*;

use crate::audit::HistoryEntry;
use crate::entity::ContentKind;

impl CatalogDb {
    // =========================================================================
    // Edit history (append-only)
    // =========================================================================

    /// Flush collected history rows for a content entity.
    pub fn append_history(
        &self,
        kind: ContentKind,
        entity_id: i64,
        editor_id: i64,
        entries: &[HistoryEntry],
    ) -> Result<usize, DbError> {
        let t = kind.tables();
        let sql = format!(
            "INSERT INTO {} ({}, editor_id, field_id, action_id, field_value, creation_timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            t.history, t.id_column
        );
        self.insert_history_rows(&sql, entity_id, editor_id, entries)
    }

    /// Flush collected history rows for a store product.
    pub fn append_store_product_history(
        &self,
        store_product_id: i64,
        editor_id: i64,
        entries: &[HistoryEntry],
    ) -> Result<usize, DbError> {
        self.insert_history_rows(
            "INSERT INTO store_product_history
                (store_product_id, editor_id, field_id, action_id, field_value, creation_timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            store_product_id,
            editor_id,
            entries,
        )
    }

    fn insert_history_rows(
        &self,
        sql: &str,
        entity_id: i64,
        editor_id: i64,
        entries: &[HistoryEntry],
    ) -> Result<usize, DbError> {
        let now = Self::now();
        let mut stmt = self.conn.prepare(sql)?;
        for entry in entries {
            stmt.execute(params![
                entity_id,
                editor_id,
                entry.field,
                entry.action,
                entry.value,
                now
            ])?;
        }
        Ok(entries.len())
    }

    /// History rows for a content entity, oldest first.
    pub fn history_for(&self, kind: ContentKind, entity_id: i64) -> Result<Vec<DbEditHistory>, DbError> {
        let t = kind.tables();
        let sql = format!(
            "SELECT id, {}, editor_id, field_id, action_id, field_value, creation_timestamp
             FROM {} WHERE {} = ?1 ORDER BY id",
            t.id_column, t.history, t.id_column
        );
        self.select_history(&sql, entity_id)
    }

    pub fn store_product_history(&self, store_product_id: i64) -> Result<Vec<DbEditHistory>, DbError> {
        self.select_history(
            "SELECT id, store_product_id, editor_id, field_id, action_id, field_value, creation_timestamp
             FROM store_product_history WHERE store_product_id = ?1 ORDER BY id",
            store_product_id,
        )
    }

    fn select_history(&self, sql: &str, entity_id: i64) -> Result<Vec<DbEditHistory>, DbError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![entity_id], |row| {
            Ok(DbEditHistory {
                id: row.get(0)?,
                entity_id: row.get(1)?,
                editor_id: row.get(2)?,
                field: row.get(3)?,
                action: row.get(4)?,
                field_value: row.get(5)?,
                creation_timestamp: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use crate::audit::EditLog;
    use crate::db::test_utils::{seed_account, test_db};
    use crate::entity::ContentKind;
    use crate::types::{Field, UserAction};

    #[test]
    fn test_append_and_read_back() {
        let db = test_db();
        let owner = seed_account(&db, "owner");
        let brand = db.insert_brand("acme", "Acme", owner).unwrap();

        let mut log = EditLog::new();
        log.diff(Field::Name, "Acme", "Acme Co");
        log.added(Field::Tags, Some("4".into()));
        let written = db
            .append_history(ContentKind::Brand, brand, owner, log.entries())
            .unwrap();
        assert_eq!(written, 2);

        let rows = db.history_for(ContentKind::Brand, brand).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].field, Field::Name);
        assert_eq!(rows[0].action, UserAction::Updated);
        assert_eq!(rows[0].field_value.as_deref(), Some("Acme Co"));
        assert_eq!(rows[1].action, UserAction::Added);
        assert_eq!(rows[1].editor_id, owner);
    }

    #[test]
    fn test_empty_log_writes_nothing() {
        let db = test_db();
        let owner = seed_account(&db, "owner");
        let brand = db.insert_brand("acme", "Acme", owner).unwrap();
        let log = EditLog::new();
        db.append_history(ContentKind::Brand, brand, owner, log.entries())
            .unwrap();
        assert!(db.history_for(ContentKind::Brand, brand).unwrap().is_empty());
    }
}
