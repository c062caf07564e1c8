use super::*;

use crate::config::limits::PAGE_SIZE;
use crate::db::brands::like_pattern;
use crate::entity::ContentKind;
use crate::types::ContentVisibility;

const PRODUCT_COLUMNS: &str = "id, alias, name, brand_id, parent_product_id, description, \
     display_name_override, main_color_code, material_id, preorder_timestamp, \
     release_timestamp, status, upc, url, avatar_light_path, creator_id, visibility, \
     edit_access_level, rep, creation_timestamp";

impl CatalogDb {
    // =========================================================================
    // Products
    // =========================================================================

    fn map_product_row(row: &rusqlite::Row) -> rusqlite::Result<DbProduct> {
        Ok(DbProduct {
            id: row.get(0)?,
            alias: row.get(1)?,
            name: row.get(2)?,
            brand_id: row.get(3)?,
            parent_product_id: row.get(4)?,
            description: row.get(5)?,
            display_name_override: row.get(6)?,
            main_color_code: row.get(7)?,
            material_id: row.get(8)?,
            preorder_timestamp: row.get(9)?,
            release_timestamp: row.get(10)?,
            status: row.get(11)?,
            upc: row.get(12)?,
            url: row.get(13)?,
            avatar_light_path: row.get(14)?,
            creator_id: row.get(15)?,
            visibility: row.get(16)?,
            edit_access_level: row.get(17)?,
            rep: row.get(18)?,
            creation_timestamp: row.get(19)?,
            tags: Vec::new(),
            media: Vec::new(),
            variant_count: 0,
        })
    }

    fn hydrate_product(&self, mut product: DbProduct) -> Result<DbProduct, DbError> {
        product.tags = self.tags_for(ContentKind::Product, product.id)?;
        product.media = self.media_for_product(product.id)?;
        product.variant_count = self.conn.query_row(
            "SELECT COUNT(*) FROM product WHERE parent_product_id = ?1 AND visibility = ?2",
            params![product.id, ContentVisibility::PubliclyVisible],
            |r| r.get(0),
        )?;
        Ok(product)
    }

    fn load_products(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<DbProduct>, DbError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::map_product_row)?;
        let products = rows.collect::<Result<Vec<_>, _>>()?;
        products.into_iter().map(|p| self.hydrate_product(p)).collect()
    }

    /// Insert a product row; the remaining columns are written by `save_product`.
    pub fn insert_product(
        &self,
        alias: &str,
        name: &str,
        brand_id: i64,
        parent_product_id: Option<i64>,
        creator_id: i64,
    ) -> Result<i64, DbError> {
        self.conn.execute(
            "INSERT INTO product (alias, name, brand_id, parent_product_id, creator_id, creation_timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![alias, name, brand_id, parent_product_id, creator_id, Self::now()],
        )?;
        Ok(self.last_id())
    }

    /// Persist every mutable product column in one UPDATE.
    pub fn save_product(&self, p: &DbProduct) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE product SET
                name = ?1, brand_id = ?2, parent_product_id = ?3, description = ?4,
                display_name_override = ?5, main_color_code = ?6, material_id = ?7,
                preorder_timestamp = ?8, release_timestamp = ?9, status = ?10,
                upc = ?11, url = ?12
             WHERE id = ?13",
            params![
                p.name,
                p.brand_id,
                p.parent_product_id,
                p.description,
                p.display_name_override,
                p.main_color_code,
                p.material_id,
                p.preorder_timestamp,
                p.release_timestamp,
                p.status,
                p.upc,
                p.url,
                p.id,
            ],
        )?;
        Ok(())
    }

    pub fn get_product(&self, id: i64) -> Result<Option<DbProduct>, DbError> {
        let sql = format!("SELECT {} FROM product WHERE id = ?1", PRODUCT_COLUMNS);
        match self.query_opt(&sql, params![id], Self::map_product_row)? {
            Some(p) => Ok(Some(self.hydrate_product(p)?)),
            None => Ok(None),
        }
    }

    pub fn get_product_by_alias(&self, alias: &str) -> Result<Option<DbProduct>, DbError> {
        let sql = format!("SELECT {} FROM product WHERE alias = ?1", PRODUCT_COLUMNS);
        match self.query_opt(&sql, params![alias], Self::map_product_row)? {
            Some(p) => Ok(Some(self.hydrate_product(p)?)),
            None => Ok(None),
        }
    }

    /// Publicly visible products whose name or alias contains `query`.
    /// Optionally limited to one brand.
    pub fn search_products(
        &self,
        query: &str,
        brand_id: Option<i64>,
        page: i64,
    ) -> Result<Vec<DbProduct>, DbError> {
        let sql = format!(
            "SELECT {} FROM product
             WHERE visibility = ?1
               AND (name LIKE ?2 ESCAPE '\\' OR alias LIKE ?2 ESCAPE '\\')
               AND (?3 IS NULL OR brand_id = ?3)
             ORDER BY name COLLATE NOCASE, id
             LIMIT ?4 OFFSET ?5",
            PRODUCT_COLUMNS
        );
        self.load_products(
            &sql,
            params![
                ContentVisibility::PubliclyVisible,
                like_pattern(query),
                brand_id,
                PAGE_SIZE,
                Self::page_offset(page)
            ],
        )
    }

    /// Publicly visible direct children of a product.
    pub fn product_variants(&self, parent_id: i64, page: i64) -> Result<Vec<DbProduct>, DbError> {
        let sql = format!(
            "SELECT {} FROM product
             WHERE parent_product_id = ?1 AND visibility = ?2
             ORDER BY name COLLATE NOCASE, id
             LIMIT ?3 OFFSET ?4",
            PRODUCT_COLUMNS
        );
        self.load_products(
            &sql,
            params![
                parent_id,
                ContentVisibility::PubliclyVisible,
                PAGE_SIZE,
                Self::page_offset(page)
            ],
        )
    }

    /// Re-point every variant of `parent_id` at `brand_id`.
    pub fn set_variant_brand(&self, parent_id: i64, brand_id: i64) -> Result<usize, DbError> {
        Ok(self.conn.execute(
            "UPDATE product SET brand_id = ?1 WHERE parent_product_id = ?2",
            params![brand_id, parent_id],
        )?)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::test_utils::{seed_account, test_db};
    use crate::entity::ContentKind;
    use crate::types::{ContentVisibility, ProductStatus};

    #[test]
    fn test_insert_and_save_product() {
        let db = test_db();
        let owner = seed_account(&db, "owner");
        let brand = db.insert_brand("acme", "Acme", owner).unwrap();
        let id = db.insert_product("shoe", "Shoe", brand, None, owner).unwrap();

        let mut product = db.get_product(id).unwrap().unwrap();
        assert_eq!(product.status, ProductStatus::Available);
        product.main_color_code = Some("RED".into());
        product.status = ProductStatus::Preorder;
        product.display_name_override = true;
        db.save_product(&product).unwrap();

        let reloaded = db.get_product_by_alias("shoe").unwrap().unwrap();
        assert_eq!(reloaded.main_color_code.as_deref(), Some("RED"));
        assert_eq!(reloaded.status, ProductStatus::Preorder);
        assert!(reloaded.display_name_override);

        let brand = db.get_brand(brand).unwrap().unwrap();
        assert_eq!(brand.product_count, 1);
    }

    #[test]
    fn test_variants_count_only_visible_children() {
        let db = test_db();
        let owner = seed_account(&db, "owner");
        let brand = db.insert_brand("acme", "Acme", owner).unwrap();
        let parent = db.insert_product("shoe", "Shoe", brand, None, owner).unwrap();
        db.insert_product("shoe-red", "Shoe Red", brand, Some(parent), owner)
            .unwrap();
        let gone = db
            .insert_product("shoe-blue", "Shoe Blue", brand, Some(parent), owner)
            .unwrap();
        db.set_visibility(ContentKind::Product, gone, ContentVisibility::Removed)
            .unwrap();

        let parent_row = db.get_product(parent).unwrap().unwrap();
        assert_eq!(parent_row.variant_count, 1);
        let variants = db.product_variants(parent, 0).unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].alias, "shoe-red");
    }

    #[test]
    fn test_search_filters_by_brand() {
        let db = test_db();
        let owner = seed_account(&db, "owner");
        let a = db.insert_brand("a", "A", owner).unwrap();
        let b = db.insert_brand("b", "B", owner).unwrap();
        db.insert_product("runner-a", "Runner", a, None, owner).unwrap();
        db.insert_product("runner-b", "Runner", b, None, owner).unwrap();

        assert_eq!(db.search_products("runner", None, 0).unwrap().len(), 2);
        let only_b = db.search_products("runner", Some(b), 0).unwrap();
        assert_eq!(only_b.len(), 1);
        assert_eq!(only_b[0].brand_id, b);
    }
}
