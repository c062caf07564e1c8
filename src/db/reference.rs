use super::*;

use crate::config::limits::PAGE_SIZE;
use crate::db::brands::like_pattern;

impl CatalogDb {
    // =========================================================================
    // Reference data: countries, dialing codes, localities, colours, materials
    // =========================================================================

    /// Countries ordered by name, optionally filtered on `is_enabled`.
    pub fn countries(&self, is_enabled: Option<bool>) -> Result<Vec<DbCountry>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, alpha_2_code, alpha_3_code, numeric_3_code, name,
                    continent_code, currency_code, is_enabled
             FROM country
             WHERE (?1 IS NULL OR is_enabled = ?1)
             ORDER BY name",
        )?;
        let rows = stmt.query_map(params![is_enabled], |row| {
            Ok(DbCountry {
                id: row.get(0)?,
                alpha_2_code: row.get(1)?,
                alpha_3_code: row.get(2)?,
                numeric_3_code: row.get(3)?,
                name: row.get(4)?,
                continent_code: row.get(5)?,
                currency_code: row.get(6)?,
                is_enabled: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Country id for an ISO alpha-2 code (case-insensitive).
    pub fn country_id_by_alpha_2(&self, alpha_2_code: &str) -> Result<Option<i64>, DbError> {
        self.query_opt(
            "SELECT id FROM country WHERE alpha_2_code = upper(?1)",
            params![alpha_2_code.trim()],
            |r| r.get(0),
        )
    }

    pub fn dialing_codes(&self, is_enabled: Option<bool>) -> Result<Vec<DbDialingCode>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT d.id, d.country_id, c.alpha_2_code, d.dialing_code
             FROM country_dialing_code d
             JOIN country c ON c.id = d.country_id
             WHERE (?1 IS NULL OR c.is_enabled = ?1)
             ORDER BY c.name, d.dialing_code",
        )?;
        let rows = stmt.query_map(params![is_enabled], Self::map_dialing_code_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn map_dialing_code_row(row: &rusqlite::Row) -> rusqlite::Result<DbDialingCode> {
        Ok(DbDialingCode {
            id: row.get(0)?,
            country_id: row.get(1)?,
            alpha_2_code: row.get(2)?,
            dialing_code: row.get(3)?,
        })
    }

    /// Resolve a dialing code within a country, e.g. ("AE", "971").
    pub fn find_dialing_code(
        &self,
        alpha_2_code: &str,
        dialing_code: &str,
    ) -> Result<Option<DbDialingCode>, DbError> {
        self.query_opt(
            "SELECT d.id, d.country_id, c.alpha_2_code, d.dialing_code
             FROM country_dialing_code d
             JOIN country c ON c.id = d.country_id
             WHERE c.alpha_2_code = upper(?1) AND d.dialing_code = ?2",
            params![alpha_2_code.trim(), dialing_code.trim().trim_start_matches('+')],
            Self::map_dialing_code_row,
        )
    }

    fn map_locality_row(row: &rusqlite::Row) -> rusqlite::Result<DbLocality> {
        Ok(DbLocality {
            id: row.get(0)?,
            country_id: row.get(1)?,
            alpha_2_code: row.get(2)?,
            name: row.get(3)?,
        })
    }

    pub fn get_locality(&self, id: i64) -> Result<Option<DbLocality>, DbError> {
        self.query_opt(
            "SELECT l.id, l.country_id, c.alpha_2_code, l.name
             FROM locality l JOIN country c ON c.id = l.country_id
             WHERE l.id = ?1",
            params![id],
            Self::map_locality_row,
        )
    }

    /// Find a locality by (cleaned) name within a country, creating it if
    /// absent. Names compare case-insensitively.
    pub fn get_or_create_locality(&self, country_id: i64, name: &str) -> Result<DbLocality, DbError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO locality (country_id, name, creation_timestamp)
             VALUES (?1, ?2, ?3)",
            params![country_id, name, Self::now()],
        )?;
        self.query_opt(
            "SELECT l.id, l.country_id, c.alpha_2_code, l.name
             FROM locality l JOIN country c ON c.id = l.country_id
             WHERE l.country_id = ?1 AND l.name = ?2 COLLATE NOCASE",
            params![country_id, name],
            Self::map_locality_row,
        )?
        .ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Localities whose name contains `query`, at most one page.
    pub fn search_localities(&self, query: &str) -> Result<Vec<DbLocality>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT l.id, l.country_id, c.alpha_2_code, l.name
             FROM locality l JOIN country c ON c.id = l.country_id
             WHERE l.name LIKE ?1 ESCAPE '\\'
             ORDER BY l.name COLLATE NOCASE
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![like_pattern(query), PAGE_SIZE], Self::map_locality_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn product_colors(&self) -> Result<Vec<DbProductColor>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT code, name, hex_code FROM product_color ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(DbProductColor {
                code: row.get(0)?,
                name: row.get(1)?,
                hex_code: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn product_color_exists(&self, code: &str) -> Result<bool, DbError> {
        Ok(self
            .query_opt(
                "SELECT 1 FROM product_color WHERE code = upper(?1)",
                params![code],
                |_| Ok(()),
            )?
            .is_some())
    }

    pub fn product_materials(&self) -> Result<Vec<DbProductMaterial>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM product_material ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(DbProductMaterial {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn product_material_exists(&self, id: i64) -> Result<bool, DbError> {
        Ok(self.count_where("product_material", "id", id)? > 0)
    }
}
