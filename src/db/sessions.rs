use super::*;

const SESSION_SELECT: &str = "SELECT s.id, s.user_account_id, s.client_id, s.client_version, \
     s.device_name, s.device_type, s.ip_address, s.last_activity, s.location, s.mac_address, \
     s.mobile_carrier, o.name, s.os_version, s.screen_resolution, s.time_zone, \
     s.creation_timestamp \
     FROM user_account_session s \
     LEFT JOIN user_os o ON o.id = s.os_id";

impl CatalogDb {
    // =========================================================================
    // Sessions, clients and operating systems
    // =========================================================================

    fn map_session_row(row: &rusqlite::Row) -> rusqlite::Result<DbSession> {
        Ok(DbSession {
            id: row.get(0)?,
            user_account_id: row.get(1)?,
            client_id: row.get(2)?,
            client_version: row.get(3)?,
            device_name: row.get(4)?,
            device_type: row.get(5)?,
            ip_address: row.get(6)?,
            last_activity: row.get(7)?,
            location: row.get(8)?,
            mac_address: row.get(9)?,
            mobile_carrier: row.get(10)?,
            os_name: row.get(11)?,
            os_version: row.get(12)?,
            screen_resolution: row.get(13)?,
            time_zone: row.get(14)?,
            creation_timestamp: row.get(15)?,
        })
    }

    /// True if `client_id` names a supported client.
    pub fn client_exists(&self, client_id: &str) -> Result<bool, DbError> {
        Ok(self
            .query_opt(
                "SELECT 1 FROM user_client WHERE id = ?1",
                params![client_id],
                |_| Ok(()),
            )?
            .is_some())
    }

    pub fn get_or_create_os(&self, name: &str) -> Result<i64, DbError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO user_os (name) VALUES (?1)",
            params![name],
        )?;
        Ok(self
            .conn
            .query_row("SELECT id FROM user_os WHERE name = ?1", params![name], |r| {
                r.get(0)
            })?)
    }

    pub fn create_session(
        &self,
        session_id: &str,
        user_account_id: i64,
        client_id: &str,
    ) -> Result<DbSession, DbError> {
        let now = Self::now();
        self.conn.execute(
            "INSERT INTO user_account_session
                (id, user_account_id, client_id, last_activity, creation_timestamp)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![session_id, user_account_id, client_id, now],
        )?;
        self.get_session(session_id)?
            .ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<DbSession>, DbError> {
        let sql = format!("{} WHERE s.id = ?1", SESSION_SELECT);
        self.query_opt(&sql, params![session_id], Self::map_session_row)
    }

    /// Merge metadata into a session and bump `last_activity`.
    pub fn update_session(&self, session_id: &str, meta: &SessionMetadata) -> Result<bool, DbError> {
        let os_id = match meta.os_name.as_deref() {
            Some(name) => Some(self.get_or_create_os(name)?),
            None => None,
        };
        let rows = self.conn.execute(
            "UPDATE user_account_session SET
                client_version = COALESCE(?1, client_version),
                device_name = COALESCE(?2, device_name),
                device_type = COALESCE(?3, device_type),
                ip_address = COALESCE(?4, ip_address),
                location = COALESCE(?5, location),
                mac_address = COALESCE(?6, mac_address),
                mobile_carrier = COALESCE(?7, mobile_carrier),
                os_id = COALESCE(?8, os_id),
                os_version = COALESCE(?9, os_version),
                screen_resolution = COALESCE(?10, screen_resolution),
                time_zone = COALESCE(?11, time_zone),
                last_activity = ?12
             WHERE id = ?13",
            params![
                meta.client_version,
                meta.device_name,
                meta.device_type,
                meta.ip_address,
                meta.location,
                meta.mac_address,
                meta.mobile_carrier,
                os_id,
                meta.os_version,
                meta.screen_resolution,
                meta.time_zone,
                Self::now(),
                session_id,
            ],
        )?;
        Ok(rows > 0)
    }

    pub fn delete_session(&self, session_id: &str) -> Result<bool, DbError> {
        let rows = self.conn.execute(
            "DELETE FROM user_account_session WHERE id = ?1",
            params![session_id],
        )?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::test_utils::{seed_account, test_db};
    use crate::db::SessionMetadata;
    use crate::types::ClientDeviceType;

    #[test]
    fn test_session_lifecycle() {
        let db = test_db();
        let account = seed_account(&db, "owner");
        assert!(db.client_exists("town-web").unwrap());
        assert!(!db.client_exists("town-fax").unwrap());

        let session = db.create_session("abc123", account, "town-web").unwrap();
        assert_eq!(session.user_account_id, account);
        assert!(session.os_name.is_none());

        let meta = SessionMetadata {
            device_type: Some(ClientDeviceType::Phone),
            os_name: Some("iOS".into()),
            os_version: Some("17.4".into()),
            ip_address: Some("10.0.0.5".into()),
            ..Default::default()
        };
        assert!(db.update_session("abc123", &meta).unwrap());

        // A later partial update keeps earlier values.
        let partial = SessionMetadata {
            time_zone: Some("Asia/Dubai".into()),
            ..Default::default()
        };
        db.update_session("abc123", &partial).unwrap();

        let session = db.get_session("abc123").unwrap().unwrap();
        assert_eq!(session.os_name.as_deref(), Some("iOS"));
        assert_eq!(session.device_type, Some(ClientDeviceType::Phone));
        assert_eq!(session.time_zone.as_deref(), Some("Asia/Dubai"));

        assert!(db.delete_session("abc123").unwrap());
        assert!(db.get_session("abc123").unwrap().is_none());
        assert!(!db.update_session("abc123", &meta).unwrap());
    }

    #[test]
    fn test_sessions_cascade_with_account() {
        let db = test_db();
        let account = seed_account(&db, "owner");
        db.create_session("s1", account, "town-ios").unwrap();
        db.delete_user_account(account).unwrap();
        assert!(db.get_session("s1").unwrap().is_none());
    }
}
