//! Process-wide state shared by every request.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use crate::config::Config;
use crate::db::CatalogDb;
use crate::media::{FsObjectStore, ObjectStore};
use crate::session_meta::{HttpIpLocator, IpLocator, NoopLocator};
use crate::sms::{sender_from_config, SmsSender};

pub struct AppState {
    pub config: Config,
    /// One connection shared by request handling. The purge task opens its own.
    db: Mutex<CatalogDb>,
    pub objects: Arc<dyn ObjectStore>,
    pub sms: Arc<dyn SmsSender>,
    pub locator: Arc<dyn IpLocator>,
}

impl AppState {
    /// Open the database and build the collaborators the config asks for.
    pub fn open(config: Config) -> Result<Self, String> {
        let db_path = config.db_path();
        let db = CatalogDb::open_at(db_path.clone())
            .map_err(|e| format!("Failed to open catalog database {}: {}", db_path.display(), e))?;
        log::info!("Catalog database ready at {}", db_path.display());

        let objects = Arc::new(FsObjectStore::new(config.media_dir()));
        let sms: Arc<dyn SmsSender> = Arc::from(
            sender_from_config(&config).map_err(|e| format!("Failed to build SMS sender: {}", e))?,
        );
        let locator: Arc<dyn IpLocator> = match &config.geoip_url {
            Some(template) => Arc::new(
                HttpIpLocator::new(
                    template.clone(),
                    Duration::from_secs(config.upstream_timeout_secs),
                )
                .map_err(|e| format!("Failed to build geo-IP client: {}", e))?,
            ),
            None => Arc::new(NoopLocator),
        };

        Ok(Self::with_parts(config, db, objects, sms, locator))
    }

    pub fn with_parts(
        config: Config,
        db: CatalogDb,
        objects: Arc<dyn ObjectStore>,
        sms: Arc<dyn SmsSender>,
        locator: Arc<dyn IpLocator>,
    ) -> Self {
        Self {
            config,
            db: Mutex::new(db),
            objects,
            sms,
            locator,
        }
    }

    /// Lock the shared connection for the duration of one operation.
    pub fn db(&self) -> MutexGuard<'_, CatalogDb> {
        self.db.lock()
    }

    #[cfg(test)]
    pub(crate) fn db_is_locked(&self) -> bool {
        self.db.is_locked()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_database_under_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let state = AppState::open(config).unwrap();
        assert!(dir.path().join("catalog.db").exists());
        assert!(state.db().countries(None).unwrap().len() > 1);
    }
}
