use super::*;

use crate::config::limits::PAGE_SIZE;
use crate::types::ContentVisibility;

const STORE_PRODUCT_COLUMNS: &str = "id, store_id, product_id, price, condition, description, \
     status, url, creator_id, creation_timestamp";

impl CatalogDb {
    // =========================================================================
    // Store products (a product listed at a store with a price)
    // =========================================================================

    fn map_store_product_row(row: &rusqlite::Row) -> rusqlite::Result<DbStoreProduct> {
        Ok(DbStoreProduct {
            id: row.get(0)?,
            store_id: row.get(1)?,
            product_id: row.get(2)?,
            price: row.get(3)?,
            condition: row.get(4)?,
            description: row.get(5)?,
            status: row.get(6)?,
            url: row.get(7)?,
            creator_id: row.get(8)?,
            creation_timestamp: row.get(9)?,
        })
    }

    pub fn insert_store_product(
        &self,
        store_id: i64,
        product_id: i64,
        price: &str,
        creator_id: i64,
    ) -> Result<i64, DbError> {
        self.conn.execute(
            "INSERT INTO store_product (store_id, product_id, price, creator_id, creation_timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![store_id, product_id, price, creator_id, Self::now()],
        )?;
        Ok(self.last_id())
    }

    /// Persist every mutable store-product column in one UPDATE.
    pub fn save_store_product(&self, sp: &DbStoreProduct) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE store_product SET
                product_id = ?1, price = ?2, condition = ?3, description = ?4,
                status = ?5, url = ?6
             WHERE id = ?7",
            params![
                sp.product_id,
                sp.price,
                sp.condition,
                sp.description,
                sp.status,
                sp.url,
                sp.id
            ],
        )?;
        Ok(())
    }

    pub fn get_store_product(&self, id: i64) -> Result<Option<DbStoreProduct>, DbError> {
        let sql = format!(
            "SELECT {} FROM store_product WHERE id = ?1",
            STORE_PRODUCT_COLUMNS
        );
        self.query_opt(&sql, params![id], Self::map_store_product_row)
    }

    /// Listings at a store, newest first. Listings of deleted or removed
    /// products are left out.
    pub fn store_products_for_store(
        &self,
        store_id: i64,
        page: i64,
    ) -> Result<Vec<DbStoreProduct>, DbError> {
        let sql = format!(
            "SELECT {} FROM store_product WHERE store_id = ?1
               AND product_id IN (SELECT id FROM product WHERE visibility NOT IN (?4, ?5))
             ORDER BY id DESC LIMIT ?2 OFFSET ?3",
            STORE_PRODUCT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                store_id,
                PAGE_SIZE,
                Self::page_offset(page),
                ContentVisibility::Deleted,
                ContentVisibility::Removed
            ],
            Self::map_store_product_row,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn delete_store_product(&self, id: i64) -> Result<bool, DbError> {
        let rows = self
            .conn
            .execute("DELETE FROM store_product WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }
}
