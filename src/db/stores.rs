use super::*;

use crate::config::limits::{NEARBY_RADIUS_METERS, PAGE_SIZE};
use crate::db::brands::like_pattern;
use crate::entity::ContentKind;
use crate::types::ContentVisibility;

const STORE_SELECT: &str = "SELECT s.id, s.alias, s.name, s.brand_id, s.description, s.website, \
     s.status, s.avatar_light_path, s.building, s.floor, s.unit, s.street, s.post_code, \
     s.latitude, s.longitude, s.creator_id, s.visibility, s.edit_access_level, s.rep, \
     s.creation_timestamp, l.id, l.country_id, c.alpha_2_code, l.name \
     FROM store s \
     JOIN locality l ON l.id = s.locality_id \
     JOIN country c ON c.id = l.country_id";

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;
const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

/// Great-circle distance between two WGS84 points, in meters.
pub fn haversine_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * a.sqrt().asin()
}

/// Longitude intervals covering `longitude ± delta`. A box that crosses the
/// antimeridian splits in two; otherwise both intervals are the same.
fn longitude_ranges(longitude: f64, delta: f64) -> [(f64, f64); 2] {
    let (west, east) = (longitude - delta, longitude + delta);
    if delta >= 180.0 {
        [(-180.0, 180.0); 2]
    } else if west < -180.0 {
        [(west + 360.0, 180.0), (-180.0, east)]
    } else if east > 180.0 {
        [(west, 180.0), (-180.0, east - 360.0)]
    } else {
        [(west, east); 2]
    }
}

impl CatalogDb {
    // =========================================================================
    // Stores
    // =========================================================================

    fn map_store_row(row: &rusqlite::Row) -> rusqlite::Result<DbStore> {
        Ok(DbStore {
            id: row.get(0)?,
            alias: row.get(1)?,
            name: row.get(2)?,
            brand_id: row.get(3)?,
            description: row.get(4)?,
            website: row.get(5)?,
            status: row.get(6)?,
            avatar_light_path: row.get(7)?,
            address: PhysicalAddress {
                building: row.get(8)?,
                floor: row.get(9)?,
                unit: row.get(10)?,
                street: row.get(11)?,
                post_code: row.get(12)?,
                latitude: row.get(13)?,
                longitude: row.get(14)?,
                locality: DbLocality {
                    id: row.get(20)?,
                    country_id: row.get(21)?,
                    alpha_2_code: row.get(22)?,
                    name: row.get(23)?,
                },
            },
            creator_id: row.get(15)?,
            visibility: row.get(16)?,
            edit_access_level: row.get(17)?,
            rep: row.get(18)?,
            creation_timestamp: row.get(19)?,
            tags: Vec::new(),
        })
    }

    fn hydrate_store(&self, mut store: DbStore) -> Result<DbStore, DbError> {
        store.tags = self.tags_for(ContentKind::Store, store.id)?;
        Ok(store)
    }

    fn load_stores(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<DbStore>, DbError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::map_store_row)?;
        let stores = rows.collect::<Result<Vec<_>, _>>()?;
        stores.into_iter().map(|s| self.hydrate_store(s)).collect()
    }

    /// Insert a store row; optional columns are written by `save_store`.
    pub fn insert_store(
        &self,
        alias: &str,
        name: &str,
        latitude: f64,
        longitude: f64,
        locality_id: i64,
        creator_id: i64,
    ) -> Result<i64, DbError> {
        self.conn.execute(
            "INSERT INTO store (alias, name, latitude, longitude, locality_id, creator_id, creation_timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![alias, name, latitude, longitude, locality_id, creator_id, Self::now()],
        )?;
        Ok(self.last_id())
    }

    /// Persist every mutable store column in one UPDATE.
    pub fn save_store(&self, s: &DbStore) -> Result<(), DbError> {
        let a = &s.address;
        self.conn.execute(
            "UPDATE store SET
                name = ?1, brand_id = ?2, description = ?3, website = ?4, status = ?5,
                building = ?6, floor = ?7, unit = ?8, street = ?9, post_code = ?10,
                latitude = ?11, longitude = ?12, locality_id = ?13
             WHERE id = ?14",
            params![
                s.name,
                s.brand_id,
                s.description,
                s.website,
                s.status,
                a.building,
                a.floor,
                a.unit,
                a.street,
                a.post_code,
                a.latitude,
                a.longitude,
                a.locality.id,
                s.id,
            ],
        )?;
        Ok(())
    }

    pub fn get_store(&self, id: i64) -> Result<Option<DbStore>, DbError> {
        let sql = format!("{} WHERE s.id = ?1", STORE_SELECT);
        match self.query_opt(&sql, params![id], Self::map_store_row)? {
            Some(s) => Ok(Some(self.hydrate_store(s)?)),
            None => Ok(None),
        }
    }

    pub fn get_store_by_alias(&self, alias: &str) -> Result<Option<DbStore>, DbError> {
        let sql = format!("{} WHERE s.alias = ?1", STORE_SELECT);
        match self.query_opt(&sql, params![alias], Self::map_store_row)? {
            Some(s) => Ok(Some(self.hydrate_store(s)?)),
            None => Ok(None),
        }
    }

    /// Publicly visible stores whose name or alias contains `query`.
    pub fn search_stores(&self, query: &str, page: i64) -> Result<Vec<DbStore>, DbError> {
        let sql = format!(
            "{} WHERE s.visibility = ?1 AND (s.name LIKE ?2 ESCAPE '\\' OR s.alias LIKE ?2 ESCAPE '\\')
             ORDER BY s.name COLLATE NOCASE, s.id
             LIMIT ?3 OFFSET ?4",
            STORE_SELECT
        );
        self.load_stores(
            &sql,
            params![
                ContentVisibility::PubliclyVisible,
                like_pattern(query),
                PAGE_SIZE,
                Self::page_offset(page)
            ],
        )
    }

    /// Publicly visible stores within the nearby radius of a point, nearest
    /// first, at most one page.
    ///
    /// A bounding box narrows the candidates in SQL; the exact great-circle
    /// distance is applied afterwards.
    pub fn nearby_stores(&self, latitude: f64, longitude: f64) -> Result<Vec<DbStore>, DbError> {
        let lat_delta = NEARBY_RADIUS_METERS / METERS_PER_DEGREE_LAT;
        let lon_scale = latitude.to_radians().cos().abs().max(1e-6);
        let lon_delta = (NEARBY_RADIUS_METERS / (METERS_PER_DEGREE_LAT * lon_scale)).min(180.0);
        let [(w1, e1), (w2, e2)] = longitude_ranges(longitude, lon_delta);

        let sql = format!(
            "{} WHERE s.visibility = ?1
               AND s.latitude BETWEEN ?2 AND ?3
               AND (s.longitude BETWEEN ?4 AND ?5 OR s.longitude BETWEEN ?6 AND ?7)",
            STORE_SELECT
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                ContentVisibility::PubliclyVisible,
                latitude - lat_delta,
                latitude + lat_delta,
                w1,
                e1,
                w2,
                e2
            ],
            Self::map_store_row,
        )?;

        let mut candidates: Vec<(f64, DbStore)> = Vec::new();
        for row in rows {
            let store = row?;
            let distance = haversine_meters(
                latitude,
                longitude,
                store.address.latitude,
                store.address.longitude,
            );
            if distance <= NEARBY_RADIUS_METERS {
                candidates.push((distance, store));
            }
        }
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));
        candidates.truncate(PAGE_SIZE as usize);

        candidates
            .into_iter()
            .map(|(_, s)| self.hydrate_store(s))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{haversine_meters, longitude_ranges};
    use crate::db::test_utils::{seed_account, test_db};
    use crate::db::CatalogDb;
    use crate::entity::ContentKind;
    use crate::types::{ContentVisibility, StoreStatus};

    fn dubai(db: &CatalogDb) -> i64 {
        let ae = db.country_id_by_alpha_2("AE").unwrap().unwrap();
        db.get_or_create_locality(ae, "Dubai").unwrap().id
    }

    #[test]
    fn test_haversine_known_distance() {
        // One degree of latitude is roughly 111.2 km.
        let d = haversine_meters(25.0, 55.0, 26.0, 55.0);
        assert!((d - 111_195.0).abs() < 100.0, "got {}", d);
        assert_eq!(haversine_meters(25.0, 55.0, 25.0, 55.0), 0.0);
    }

    #[test]
    fn test_store_round_trip_with_address() {
        let db = test_db();
        let owner = seed_account(&db, "owner");
        let locality = dubai(&db);
        let id = db
            .insert_store("corner", "Corner Shop", 25.2, 55.27, locality, owner)
            .unwrap();

        let mut store = db.get_store(id).unwrap().unwrap();
        assert_eq!(store.address.locality.name, "Dubai");
        assert_eq!(store.address.locality.alpha_2_code, "AE");
        store.address.floor = Some("2".into());
        store.status = StoreStatus::TemporarilyClosed;
        db.save_store(&store).unwrap();

        let reloaded = db.get_store_by_alias("corner").unwrap().unwrap();
        assert_eq!(reloaded.address.floor.as_deref(), Some("2"));
        assert_eq!(reloaded.status, StoreStatus::TemporarilyClosed);
    }

    #[test]
    fn test_nearby_orders_by_distance_and_filters_radius() {
        let db = test_db();
        let owner = seed_account(&db, "owner");
        let locality = dubai(&db);
        let (lat, lon) = (25.2000, 55.2700);
        // ~550 m north, ~110 m north, ~5.5 km north.
        db.insert_store("mid", "Mid", lat + 0.005, lon, locality, owner).unwrap();
        db.insert_store("near", "Near", lat + 0.001, lon, locality, owner).unwrap();
        db.insert_store("far", "Far", lat + 0.05, lon, locality, owner).unwrap();
        // Inside the bounding box corner but outside the circle (~1.3 km).
        db.insert_store("corner", "Corner", lat + 0.0085, lon + 0.0095, locality, owner)
            .unwrap();
        let hidden = db
            .insert_store("hidden", "Hidden", lat, lon, locality, owner)
            .unwrap();
        db.set_visibility(ContentKind::Store, hidden, ContentVisibility::Removed)
            .unwrap();

        let aliases: Vec<String> = db
            .nearby_stores(lat, lon)
            .unwrap()
            .into_iter()
            .map(|s| s.alias)
            .collect();
        assert_eq!(aliases, vec!["near", "mid"]);
    }

    #[test]
    fn test_longitude_ranges_split_at_antimeridian() {
        assert_eq!(longitude_ranges(10.0, 1.0), [(9.0, 11.0); 2]);
        assert_eq!(longitude_ranges(179.5, 1.0), [(178.5, 180.0), (-180.0, -179.5)]);
        assert_eq!(longitude_ranges(-179.5, 1.0), [(179.5, 180.0), (-180.0, -178.5)]);
        assert_eq!(longitude_ranges(0.0, 180.0), [(-180.0, 180.0); 2]);
    }

    #[test]
    fn test_nearby_finds_stores_across_antimeridian() {
        let db = test_db();
        let owner = seed_account(&db, "owner");
        let locality = dubai(&db);
        db.insert_store("east", "East", -16.5, 179.999, locality, owner).unwrap();
        db.insert_store("west", "West", -16.5, -179.999, locality, owner).unwrap();

        let mut aliases: Vec<String> = db
            .nearby_stores(-16.5, 179.9995)
            .unwrap()
            .into_iter()
            .map(|s| s.alias)
            .collect();
        aliases.sort();
        assert_eq!(aliases, vec!["east", "west"]);
    }
}
