use super::*;

use crate::config::limits::PAGE_SIZE;
use crate::entity::ContentKind;
use crate::types::ContentVisibility;

const BRAND_COLUMNS: &str = "id, alias, name, description, website, avatar_light_path, \
     creator_id, visibility, edit_access_level, rep, creation_timestamp";

impl CatalogDb {
    // =========================================================================
    // Brands
    // =========================================================================

    fn map_brand_row(row: &rusqlite::Row) -> rusqlite::Result<DbBrand> {
        Ok(DbBrand {
            id: row.get(0)?,
            alias: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            website: row.get(4)?,
            avatar_light_path: row.get(5)?,
            creator_id: row.get(6)?,
            visibility: row.get(7)?,
            edit_access_level: row.get(8)?,
            rep: row.get(9)?,
            creation_timestamp: row.get(10)?,
            tags: Vec::new(),
            product_count: 0,
        })
    }

    /// Fill in tags and the visible product count.
    fn hydrate_brand(&self, mut brand: DbBrand) -> Result<DbBrand, DbError> {
        brand.tags = self.tags_for(ContentKind::Brand, brand.id)?;
        brand.product_count = self.conn.query_row(
            "SELECT COUNT(*) FROM product WHERE brand_id = ?1 AND visibility = ?2",
            params![brand.id, ContentVisibility::PubliclyVisible],
            |r| r.get(0),
        )?;
        Ok(brand)
    }

    /// Insert a brand row with default visibility and access level.
    pub fn insert_brand(&self, alias: &str, name: &str, creator_id: i64) -> Result<i64, DbError> {
        self.conn.execute(
            "INSERT INTO brand (alias, name, creator_id, creation_timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![alias, name, creator_id, Self::now()],
        )?;
        Ok(self.last_id())
    }

    /// Persist every mutable brand column in one UPDATE.
    pub fn save_brand(&self, brand: &DbBrand) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE brand SET name = ?1, description = ?2, website = ?3 WHERE id = ?4",
            params![brand.name, brand.description, brand.website, brand.id],
        )?;
        Ok(())
    }

    /// Load a brand by id in any visibility state.
    pub fn get_brand(&self, id: i64) -> Result<Option<DbBrand>, DbError> {
        let sql = format!("SELECT {} FROM brand WHERE id = ?1", BRAND_COLUMNS);
        match self.query_opt(&sql, params![id], Self::map_brand_row)? {
            Some(brand) => Ok(Some(self.hydrate_brand(brand)?)),
            None => Ok(None),
        }
    }

    /// Load a brand by its (lowercase) alias in any visibility state.
    pub fn get_brand_by_alias(&self, alias: &str) -> Result<Option<DbBrand>, DbError> {
        let sql = format!("SELECT {} FROM brand WHERE alias = ?1", BRAND_COLUMNS);
        match self.query_opt(&sql, params![alias], Self::map_brand_row)? {
            Some(brand) => Ok(Some(self.hydrate_brand(brand)?)),
            None => Ok(None),
        }
    }

    /// Publicly visible brands whose name or alias contains `query`.
    pub fn search_brands(&self, query: &str, page: i64) -> Result<Vec<DbBrand>, DbError> {
        let sql = format!(
            "SELECT {} FROM brand
             WHERE visibility = ?1 AND (name LIKE ?2 ESCAPE '\\' OR alias LIKE ?2 ESCAPE '\\')
             ORDER BY name COLLATE NOCASE, id
             LIMIT ?3 OFFSET ?4",
            BRAND_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                ContentVisibility::PubliclyVisible,
                like_pattern(query),
                PAGE_SIZE,
                Self::page_offset(page)
            ],
            Self::map_brand_row,
        )?;
        let brands = rows.collect::<Result<Vec<_>, _>>()?;
        brands.into_iter().map(|b| self.hydrate_brand(b)).collect()
    }

    /// Ids of every product under a brand, regardless of visibility.
    pub fn product_ids_for_brand(&self, brand_id: i64) -> Result<Vec<i64>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM product WHERE brand_id = ?1")?;
        let rows = stmt.query_map(params![brand_id], |r| r.get(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

/// `%query%` with LIKE wildcards in the input escaped.
pub(crate) fn like_pattern(query: &str) -> String {
    let escaped = query
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::like_pattern;
    use crate::db::test_utils::{seed_account, test_db};
    use crate::entity::ContentKind;
    use crate::types::ContentVisibility;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" ac "), "%ac%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_insert_and_load() {
        let db = test_db();
        let owner = seed_account(&db, "owner");
        let id = db.insert_brand("acme", "Acme", owner).unwrap();

        let brand = db.get_brand(id).unwrap().unwrap();
        assert_eq!(brand.alias, "acme");
        assert_eq!(brand.creator_id, owner);
        assert_eq!(brand.product_count, 0);

        let by_alias = db.get_brand_by_alias("acme").unwrap().unwrap();
        assert_eq!(by_alias.id, id);
        assert!(db.get_brand_by_alias("nope").unwrap().is_none());
    }

    #[test]
    fn test_search_excludes_hidden_and_pages() {
        let db = test_db();
        let owner = seed_account(&db, "owner");
        for i in 0..23 {
            db.insert_brand(&format!("shop{}", i), &format!("Shop {}", i), owner)
                .unwrap();
        }
        let hidden = db.insert_brand("shophidden", "Shop Hidden", owner).unwrap();
        db.set_visibility(ContentKind::Brand, hidden, ContentVisibility::Deleted)
            .unwrap();
        let ghost = db.insert_brand("shopghost", "Shop Ghost", owner).unwrap();
        db.set_visibility(ContentKind::Brand, ghost, ContentVisibility::Ghosted)
            .unwrap();

        let first = db.search_brands("SHOP", 0).unwrap();
        let second = db.search_brands("shop", 1).unwrap();
        assert_eq!(first.len(), 20);
        assert_eq!(second.len(), 3);
        assert!(first
            .iter()
            .chain(second.iter())
            .all(|b| b.visibility == ContentVisibility::PubliclyVisible));
    }

    #[test]
    fn test_save_brand_updates_columns() {
        let db = test_db();
        let owner = seed_account(&db, "owner");
        let id = db.insert_brand("acme", "Acme", owner).unwrap();
        let mut brand = db.get_brand(id).unwrap().unwrap();
        brand.name = "Acme Co".into();
        brand.website = Some("http://acme.test".into());
        db.save_brand(&brand).unwrap();

        let reloaded = db.get_brand(id).unwrap().unwrap();
        assert_eq!(reloaded.name, "Acme Co");
        assert_eq!(reloaded.website.as_deref(), Some("http://acme.test"));
    }
}
