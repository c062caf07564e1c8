use super::*;

use crate::types::{MediaMode, MediaType};

impl CatalogDb {
    // =========================================================================
    // Product media
    // =========================================================================

    pub fn media_for_product(&self, product_id: i64) -> Result<Vec<DbProductMedium>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, product_id, creator_id, file_path, attribution, media_index,
                    media_mode, media_type, creation_timestamp
             FROM product_medium WHERE product_id = ?1
             ORDER BY media_index, id",
        )?;
        let rows = stmt.query_map(params![product_id], |row| {
            Ok(DbProductMedium {
                id: row.get(0)?,
                product_id: row.get(1)?,
                creator_id: row.get(2)?,
                file_path: row.get(3)?,
                attribution: row.get(4)?,
                index: row.get(5)?,
                media_mode: row.get(6)?,
                media_type: row.get(7)?,
                creation_timestamp: row.get(8)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn insert_product_medium(
        &self,
        product_id: i64,
        creator_id: i64,
        file_path: &str,
        attribution: Option<&str>,
        index: i64,
        media_mode: MediaMode,
        media_type: MediaType,
    ) -> Result<i64, DbError> {
        self.conn.execute(
            "INSERT INTO product_medium
                (product_id, creator_id, file_path, attribution, media_index,
                 media_mode, media_type, creation_timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                product_id,
                creator_id,
                file_path,
                attribution,
                index,
                media_mode,
                media_type,
                Self::now()
            ],
        )?;
        Ok(self.last_id())
    }

    pub fn update_product_medium(
        &self,
        medium_id: i64,
        attribution: Option<&str>,
        index: i64,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE product_medium SET attribution = ?1, media_index = ?2 WHERE id = ?3",
            params![attribution, index, medium_id],
        )?;
        Ok(())
    }

    pub fn delete_product_medium(&self, medium_id: i64) -> Result<(), DbError> {
        self.conn
            .execute("DELETE FROM product_medium WHERE id = ?1", params![medium_id])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::test_utils::{seed_account, test_db};
    use crate::types::{MediaMode, MediaType};

    #[test]
    fn test_media_ordered_by_index() {
        let db = test_db();
        let owner = seed_account(&db, "owner");
        let brand = db.insert_brand("acme", "Acme", owner).unwrap();
        let product = db.insert_product("shoe", "Shoe", brand, None, owner).unwrap();

        let second = db
            .insert_product_medium(product, owner, "p/b.jpg", None, 1, MediaMode::Light, MediaType::Image)
            .unwrap();
        let first = db
            .insert_product_medium(product, owner, "p/a.jpg", Some("Studio"), 0, MediaMode::Light, MediaType::Image)
            .unwrap();

        let media = db.media_for_product(product).unwrap();
        assert_eq!(media.iter().map(|m| m.id).collect::<Vec<_>>(), vec![first, second]);

        db.update_product_medium(second, Some("Photo"), 0).unwrap();
        db.update_product_medium(first, Some("Studio"), 1).unwrap();
        let media = db.media_for_product(product).unwrap();
        assert_eq!(media[0].id, second);
        assert_eq!(media[0].attribution.as_deref(), Some("Photo"));

        db.delete_product_medium(first).unwrap();
        assert_eq!(db.media_for_product(product).unwrap().len(), 1);
    }
}
