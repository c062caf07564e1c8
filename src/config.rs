//! Process configuration.
//!
//! `Config` is built once at startup by `load_config` and then only ever
//! borrowed. Services receive `&Config`; nothing below the binary reads the
//! environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Fixed protocol limits. These are part of the wire contract, not tunables.
pub mod limits {
    pub const ALIAS_MIN_LEN: usize = 1;
    pub const ALIAS_MAX_LEN: usize = 64;
    pub const NAME_MAX_LEN: usize = 128;
    pub const DESCRIPTION_MAX_LEN: usize = 512;
    pub const URL_MAX_LEN: usize = 512;
    pub const ATTRIBUTION_MAX_LEN: usize = 512;
    pub const TAG_MAX_COUNT: usize = 64;
    pub const TAG_MAX_LEN: usize = 64;
    pub const PRODUCT_MEDIA_MAX_COUNT: usize = 6;
    pub const ALLOWED_MEDIA_EXTENSIONS: &[&str] = &["gif", "jpeg", "jpg", "png"];
    /// Results per page on every search endpoint.
    pub const PAGE_SIZE: i64 = 20;
    /// Highest page number a search accepts.
    pub const PAGE_MAX: i64 = 10_000;
    /// Radius of the "stores near me" search, in meters.
    pub const NEARBY_RADIUS_METERS: f64 = 1000.0;
    pub const SERVICE_NAME: &str = "971town";
}

/// Environment variables consulted by `load_config`, and only there.
const ENV_PREFIX: &str = "TOWN_";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Root for the database and locally stored media.
    pub data_dir: PathBuf,
    /// Overrides `{data_dir}/catalog.db` when set.
    pub db_path: Option<PathBuf>,
    /// Overrides `{data_dir}/media` when set.
    pub media_dir: Option<PathBuf>,
    pub debug: bool,
    /// Fixed OTP used in development and for the review phone number.
    pub testing_otp: Option<String>,
    pub testing_phone_number: Option<String>,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_from_number: Option<String>,
    /// Geo-IP endpoint; `{ip}` is replaced with the caller's address.
    pub geoip_url: Option<String>,
    pub verification_code_ttl_secs: i64,
    pub verification_code_purge_interval_secs: u64,
    pub verification_code_attempt_limit: i64,
    pub verification_code_len: usize,
    pub user_account_max_count: i64,
    pub secure_cookies: bool,
    /// Per-call deadline for outbound HTTP (SMS, geo-IP).
    pub upstream_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            db_path: None,
            media_dir: None,
            debug: false,
            testing_otp: None,
            testing_phone_number: None,
            twilio_account_sid: None,
            twilio_auth_token: None,
            twilio_from_number: None,
            geoip_url: None,
            verification_code_ttl_secs: 1800,
            verification_code_purge_interval_secs: 60,
            verification_code_attempt_limit: 3,
            verification_code_len: 6,
            user_account_max_count: 10,
            secure_cookies: true,
            upstream_timeout_secs: 10,
        }
    }
}

impl Config {
    pub fn db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("catalog.db"))
    }

    pub fn media_dir(&self) -> PathBuf {
        self.media_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("media"))
    }

    /// True when SMS delivery has everything it needs.
    pub fn has_twilio(&self) -> bool {
        self.twilio_account_sid.is_some()
            && self.twilio_auth_token.is_some()
            && self.twilio_from_number.is_some()
    }

    /// Apply `TOWN_*` overrides from an iterator of (key, value) pairs.
    ///
    /// Takes the pairs as an argument so tests never have to mutate the real
    /// process environment.
    pub fn apply_env<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "DATA_DIR" => self.data_dir = PathBuf::from(value),
                "DB_PATH" => self.db_path = Some(PathBuf::from(value)),
                "MEDIA_DIR" => self.media_dir = Some(PathBuf::from(value)),
                "DEBUG" => self.debug = value == "1" || value.eq_ignore_ascii_case("true"),
                "TESTING_OTP" => self.testing_otp = Some(value),
                "TESTING_PHONE_NUMBER" => self.testing_phone_number = Some(value),
                "TWILIO_ACCOUNT_SID" => self.twilio_account_sid = Some(value),
                "TWILIO_AUTH_TOKEN" => self.twilio_auth_token = Some(value),
                "TWILIO_FROM_NUMBER" => self.twilio_from_number = Some(value),
                "GEOIP_URL" => self.geoip_url = Some(value),
                _ => log::debug!("Ignoring unknown config variable {}", key),
            }
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".town-catalog"))
        .unwrap_or_else(|| PathBuf::from(".town-catalog"))
}

/// Default config file location: `~/.town-catalog/config.json`.
pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.json")
}

/// Load configuration from a JSON file (if present), then environment overrides.
pub fn load_config(path: &Path) -> Result<Config, String> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {}: {}", path.display(), e))?;
        serde_json::from_str::<Config>(&content)
            .map_err(|e| format!("Failed to parse config {}: {}", path.display(), e))?
    } else {
        log::info!(
            "No config file at {}, using defaults",
            path.display()
        );
        Config::default()
    };

    config.apply_env(std::env::vars());

    if config.debug {
        // Local development runs without TLS in front.
        config.secure_cookies = false;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_protocol() {
        let config = Config::default();
        assert_eq!(config.verification_code_ttl_secs, 1800);
        assert_eq!(config.verification_code_purge_interval_secs, 60);
        assert_eq!(config.verification_code_attempt_limit, 3);
        assert_eq!(config.verification_code_len, 6);
        assert_eq!(config.user_account_max_count, 10);
        assert!(config.db_path().ends_with("catalog.db"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(vec![
            ("TOWN_DEBUG".to_string(), "1".to_string()),
            ("TOWN_TESTING_OTP".to_string(), "123456".to_string()),
            ("TOWN_DB_PATH".to_string(), "/tmp/x.db".to_string()),
            ("HOME".to_string(), "/ignored".to_string()),
        ]);
        assert!(config.debug);
        assert_eq!(config.testing_otp.as_deref(), Some("123456"));
        assert_eq!(config.db_path(), PathBuf::from("/tmp/x.db"));
    }

    #[test]
    fn test_load_from_file_with_partial_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"dataDir": "/srv/town", "userAccountMaxCount": 3, "debug": true}"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/town"));
        assert_eq!(config.user_account_max_count, 3);
        assert_eq!(config.verification_code_len, 6);
        assert!(!config.secure_cookies);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.verification_code_attempt_limit, 3);
    }
}
