//! Shared type definitions for the database layer.

use serde::Serialize;
use thiserror::Error;

use crate::types::{
    ClientDeviceType, ContentVisibility, EditAccessLevel, Field, MediaMode, MediaType,
    ProductStatus, StoreProductStatus, StoreStatus, UserAction,
};

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),
}

impl DbError {
    /// A UNIQUE or PRIMARY KEY constraint rejected the write.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DbError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => {
                err.code == rusqlite::ErrorCode::ConstraintViolation
                    && matches!(
                        err.extended_code,
                        rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                            | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    )
            }
            _ => false,
        }
    }

    /// A unique violation on an `alias` column: the registry itself or the
    /// copy each entity table keeps.
    pub fn is_alias_violation(&self) -> bool {
        if !self.is_unique_violation() {
            return false;
        }
        match self {
            DbError::Sqlite(rusqlite::Error::SqliteFailure(_, Some(message))) => message
                .rsplit("failed: ")
                .next()
                .map(|columns| columns.split(", ").any(|c| c.ends_with(".alias")))
                .unwrap_or(false),
            _ => false,
        }
    }

    /// The database was locked by another writer past the busy timeout.
    pub fn is_busy(&self) -> bool {
        match self {
            DbError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

/// A row from `tag`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DbTag {
    pub id: i64,
    pub name: String,
    pub creator_id: i64,
    pub creation_timestamp: String,
}

/// A row from any `*_edit_history` table (or `store_product_history`).
#[derive(Debug, Clone, Serialize)]
pub struct DbEditHistory {
    pub id: i64,
    pub entity_id: i64,
    pub editor_id: i64,
    pub field: Field,
    pub action: UserAction,
    pub field_value: Option<String>,
    pub creation_timestamp: String,
}

/// The authorization-relevant columns shared by brand, product and store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentState {
    pub id: i64,
    pub creator_id: i64,
    pub visibility: ContentVisibility,
    pub edit_access_level: EditAccessLevel,
}

/// A row from `brand`, with its tags and visible product count.
#[derive(Debug, Clone, Serialize)]
pub struct DbBrand {
    pub id: i64,
    pub alias: String,
    pub name: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub avatar_light_path: Option<String>,
    pub creator_id: i64,
    pub visibility: ContentVisibility,
    pub edit_access_level: EditAccessLevel,
    pub rep: i64,
    pub creation_timestamp: String,
    pub tags: Vec<DbTag>,
    pub product_count: i64,
}

/// A row from `product`, with tags, media and the number of visible variants.
#[derive(Debug, Clone, Serialize)]
pub struct DbProduct {
    pub id: i64,
    pub alias: String,
    pub name: String,
    pub brand_id: i64,
    pub parent_product_id: Option<i64>,
    pub description: Option<String>,
    pub display_name_override: bool,
    pub main_color_code: Option<String>,
    pub material_id: Option<i64>,
    pub preorder_timestamp: Option<String>,
    pub release_timestamp: Option<String>,
    pub status: ProductStatus,
    pub upc: Option<String>,
    pub url: Option<String>,
    pub avatar_light_path: Option<String>,
    pub creator_id: i64,
    pub visibility: ContentVisibility,
    pub edit_access_level: EditAccessLevel,
    pub rep: i64,
    pub creation_timestamp: String,
    pub tags: Vec<DbTag>,
    pub media: Vec<DbProductMedium>,
    pub variant_count: i64,
}

/// A row from `product_medium`.
#[derive(Debug, Clone, Serialize)]
pub struct DbProductMedium {
    pub id: i64,
    pub product_id: i64,
    pub creator_id: i64,
    pub file_path: String,
    pub attribution: Option<String>,
    pub index: i64,
    pub media_mode: MediaMode,
    pub media_type: MediaType,
    pub creation_timestamp: String,
}

/// Street-level location of a store.
#[derive(Debug, Clone, Serialize)]
pub struct PhysicalAddress {
    pub building: Option<String>,
    pub floor: Option<String>,
    pub unit: Option<String>,
    pub street: Option<String>,
    pub post_code: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub locality: DbLocality,
}

/// A row from `store`, with its address and tags.
#[derive(Debug, Clone, Serialize)]
pub struct DbStore {
    pub id: i64,
    pub alias: String,
    pub name: String,
    pub brand_id: Option<i64>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub status: StoreStatus,
    pub avatar_light_path: Option<String>,
    pub address: PhysicalAddress,
    pub creator_id: i64,
    pub visibility: ContentVisibility,
    pub edit_access_level: EditAccessLevel,
    pub rep: i64,
    pub creation_timestamp: String,
    pub tags: Vec<DbTag>,
}

/// A row from `store_product`.
#[derive(Debug, Clone, Serialize)]
pub struct DbStoreProduct {
    pub id: i64,
    pub store_id: i64,
    pub product_id: i64,
    pub price: String,
    pub condition: Option<String>,
    pub description: Option<String>,
    pub status: StoreProductStatus,
    pub url: Option<String>,
    pub creator_id: i64,
    pub creation_timestamp: String,
}

/// A row from any of the four report tables. `target_id` is the reported
/// brand/product/store/account id.
#[derive(Debug, Clone, Serialize)]
pub struct DbReport {
    pub id: i64,
    pub target_id: i64,
    pub reporter_id: i64,
    pub report_type: i64,
    pub comment: Option<String>,
    pub creation_timestamp: String,
}

/// A row from `user_account`, with admin status resolved.
#[derive(Debug, Clone, Serialize)]
pub struct DbUserAccount {
    pub id: i64,
    #[serde(skip)]
    pub user_id: i64,
    pub alias: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_path: Option<String>,
    pub is_admin: bool,
    pub is_suspended: bool,
    pub creation_timestamp: String,
}

/// A row from `user_account_session`.
#[derive(Debug, Clone, Serialize)]
pub struct DbSession {
    pub id: String,
    pub user_account_id: i64,
    pub client_id: String,
    pub client_version: Option<String>,
    pub device_name: Option<String>,
    pub device_type: Option<ClientDeviceType>,
    pub ip_address: Option<String>,
    pub last_activity: String,
    pub location: Option<String>,
    pub mac_address: Option<String>,
    pub mobile_carrier: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub screen_resolution: Option<String>,
    pub time_zone: Option<String>,
    pub creation_timestamp: String,
}

/// Client-reported and server-derived session metadata. `None` fields leave
/// the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionMetadata {
    pub client_version: Option<String>,
    pub device_name: Option<String>,
    pub device_type: Option<ClientDeviceType>,
    pub ip_address: Option<String>,
    pub location: Option<String>,
    pub mac_address: Option<String>,
    pub mobile_carrier: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub screen_resolution: Option<String>,
    pub time_zone: Option<String>,
}

/// A row from `user_phone_number`.
#[derive(Debug, Clone, Serialize)]
pub struct DbPhoneNumber {
    pub id: i64,
    pub country_dialing_code_id: i64,
    pub phone_number: String,
    pub user_id: Option<i64>,
    pub is_verified: bool,
    pub creation_timestamp: String,
}

/// A row from `user_phone_number_verification_code`.
#[derive(Debug, Clone)]
pub struct DbVerificationCode {
    pub phone_number_id: i64,
    pub code_hash: String,
    pub attempts: i64,
    pub creation_timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DbCountry {
    pub id: i64,
    pub alpha_2_code: String,
    pub alpha_3_code: String,
    pub numeric_3_code: String,
    pub name: String,
    pub continent_code: Option<String>,
    pub currency_code: Option<String>,
    pub is_enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DbDialingCode {
    pub id: i64,
    pub country_id: i64,
    pub alpha_2_code: String,
    pub dialing_code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DbLocality {
    pub id: i64,
    pub country_id: i64,
    pub alpha_2_code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DbProductColor {
    pub code: String,
    pub name: String,
    pub hex_code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DbProductMaterial {
    pub id: i64,
    pub name: String,
}
