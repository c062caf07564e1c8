use super::*;

use crate::entity::EntityType;

impl CatalogDb {
    // =========================================================================
    // Alias registry
    // =========================================================================

    /// True if any entity of any type already holds `alias` (lowercase).
    pub fn alias_exists(&self, alias: &str) -> Result<bool, DbError> {
        let found = self.query_opt(
            "SELECT 1 FROM alias WHERE alias = ?1",
            params![alias],
            |_| Ok(()),
        )?;
        Ok(found.is_some())
    }

    /// Claim `alias` for an entity. A taken alias fails with a unique violation.
    pub fn register_alias(
        &self,
        alias: &str,
        entity_id: i64,
        entity_type: EntityType,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO alias (alias, entity_id, entity_type) VALUES (?1, ?2, ?3)",
            params![alias, entity_id, entity_type],
        )?;
        Ok(())
    }

    /// Resolve an alias to the entity holding it.
    pub fn resolve_alias(&self, alias: &str) -> Result<Option<(i64, EntityType)>, DbError> {
        self.query_opt(
            "SELECT entity_id, entity_type FROM alias WHERE alias = ?1",
            params![alias],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
    }

    /// Release the alias held by an entity, if any.
    pub fn release_alias(&self, entity_id: i64, entity_type: EntityType) -> Result<(), DbError> {
        self.conn.execute(
            "DELETE FROM alias WHERE entity_id = ?1 AND entity_type = ?2",
            params![entity_id, entity_type],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::test_utils::test_db;
    use crate::entity::EntityType;

    #[test]
    fn test_register_and_resolve() {
        let db = test_db();
        db.register_alias("acme", 3, EntityType::Brand).unwrap();
        assert!(db.alias_exists("acme").unwrap());
        assert_eq!(
            db.resolve_alias("acme").unwrap(),
            Some((3, EntityType::Brand))
        );
        assert_eq!(db.resolve_alias("nope").unwrap(), None);
    }

    #[test]
    fn test_alias_shared_across_types() {
        let db = test_db();
        db.register_alias("shared", 1, EntityType::Store).unwrap();
        let err = db
            .register_alias("shared", 2, EntityType::UserAccount)
            .unwrap_err();
        assert!(err.is_unique_violation());
        assert!(err.is_alias_violation());
    }

    #[test]
    fn test_release_alias() {
        let db = test_db();
        db.register_alias("gone", 9, EntityType::Product).unwrap();
        db.release_alias(9, EntityType::Product).unwrap();
        assert!(!db.alias_exists("gone").unwrap());
    }
}
