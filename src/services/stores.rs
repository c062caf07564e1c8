// Store service
// Physical stores, their addresses and the nearby search.

use crate::access::{self, Actor};
use crate::audit::EditLog;
use crate::db::{CatalogDb, DbLocality, DbStore};
use crate::entity::ContentKind;
use crate::error::CatalogError;
use crate::services::brands::required_tags;
use crate::services::content;
use crate::services::{check_page, EntityRef};
use crate::state::AppState;
use crate::status::ResponseStatus;
use crate::types::{ContentVisibility, Field, StoreStatus};
use crate::validation::{
    clean_locality_name, normalize_url, validate_alias, validate_description, validate_name,
};

/// Address as submitted: the locality is named by country and locality name.
#[derive(Debug, Clone, Default)]
pub struct AddressInput {
    pub building: Option<String>,
    pub floor: Option<String>,
    pub unit: Option<String>,
    pub street: Option<String>,
    pub post_code: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub alpha_2_code: String,
    pub locality: String,
}

#[derive(Debug, Clone, Default)]
pub struct CreateStore {
    pub alias: String,
    pub name: String,
    pub brand_id: Option<i64>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub status: Option<StoreStatus>,
    pub address: AddressInput,
    pub tags: Vec<String>,
}

/// Full replacement of a store's editable fields.
#[derive(Debug, Clone, Default)]
pub struct UpdateStore {
    pub store_id: i64,
    pub name: String,
    pub brand_id: Option<i64>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub status: Option<StoreStatus>,
    pub address: AddressInput,
    pub tags: Vec<String>,
}

/// How `get_stores` narrows its results.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreQuery {
    Text { query: String, page: i64 },
    Nearby { latitude: f64, longitude: f64 },
}

impl StoreQuery {
    /// Coordinates win over text; a lone coordinate is a BAD_REQUEST.
    pub fn from_parts(
        query: Option<String>,
        latitude: Option<f64>,
        longitude: Option<f64>,
        page: i64,
    ) -> Result<Self, CatalogError> {
        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => {
                check_coordinates(latitude, longitude)?;
                Ok(StoreQuery::Nearby { latitude, longitude })
            }
            (None, None) => Ok(StoreQuery::Text {
                query: query.unwrap_or_default(),
                page: check_page(page)?,
            }),
            (Some(_), None) => Err(CatalogError::bad_param(
                "longitude",
                "is required when 'latitude' is given.",
            )),
            (None, Some(_)) => Err(CatalogError::bad_param(
                "latitude",
                "is required when 'longitude' is given.",
            )),
        }
    }
}

fn check_coordinates(latitude: f64, longitude: f64) -> Result<(), CatalogError> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(CatalogError::bad_param("latitude", "must be between -90 and 90."));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(CatalogError::bad_param("longitude", "must be between -180 and 180."));
    }
    Ok(())
}

fn optional_text(raw: &Option<String>) -> Option<String> {
    raw.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Address fields after the storage-free checks.
struct CleanAddress {
    building: Option<String>,
    floor: Option<String>,
    unit: Option<String>,
    street: Option<String>,
    post_code: Option<String>,
    latitude: f64,
    longitude: f64,
    alpha_2_code: String,
    locality: String,
}

fn clean_address(a: &AddressInput) -> Result<CleanAddress, CatalogError> {
    check_coordinates(a.latitude, a.longitude)?;
    let alpha_2_code = a.alpha_2_code.trim().to_ascii_uppercase();
    if alpha_2_code.len() != 2 || !alpha_2_code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(CatalogError::invalid(
            ResponseStatus::Alpha2CodeInvalid,
            "Invalid country code.",
        ));
    }
    let locality = clean_locality_name(&a.locality);
    if locality.is_empty() {
        return Err(CatalogError::bad_param("locality", "must be a non-empty string."));
    }
    Ok(CleanAddress {
        building: optional_text(&a.building),
        floor: optional_text(&a.floor),
        unit: optional_text(&a.unit),
        street: optional_text(&a.street),
        post_code: optional_text(&a.post_code),
        latitude: a.latitude,
        longitude: a.longitude,
        alpha_2_code,
        locality,
    })
}

/// Resolve the country, then resolve or create the locality in it.
fn resolve_locality(db: &CatalogDb, address: &CleanAddress) -> Result<DbLocality, CatalogError> {
    let country_id = db.country_id_by_alpha_2(&address.alpha_2_code)?.ok_or_else(|| {
        CatalogError::invalid(ResponseStatus::Alpha2CodeInvalid, "Invalid country code.")
    })?;
    Ok(db.get_or_create_locality(country_id, &address.locality)?)
}

fn check_brand(db: &CatalogDb, brand_id: Option<i64>) -> Result<(), CatalogError> {
    if let Some(id) = brand_id {
        match db.content_state(ContentKind::Brand, id)? {
            Some(brand) if !brand.visibility.is_hidden() => {}
            _ => {
                return Err(CatalogError::invalid(
                    ResponseStatus::BrandNotFound,
                    "Invalid brand ID.",
                ))
            }
        }
    }
    Ok(())
}

fn coordinates_value(latitude: f64, longitude: f64) -> String {
    format!("{},{}", latitude, longitude)
}

pub fn create_store(state: &AppState, actor: &Actor, req: CreateStore) -> Result<DbStore, CatalogError> {
    let alias = validate_alias(&req.alias)?;
    let name = validate_name(&req.name)?;
    let description = validate_description(req.description.as_deref())?;
    let website = normalize_url(req.website.as_deref())?;
    let address = clean_address(&req.address)?;
    let tags = required_tags(&req.tags)?;

    let db = state.db();
    content::ensure_alias_free(&db, &alias)?;
    check_brand(&db, req.brand_id)?;

    let store = db.with_transaction(|tx| -> Result<DbStore, CatalogError> {
        let locality = resolve_locality(tx, &address)?;
        let id = tx.insert_store(
            &alias,
            &name,
            address.latitude,
            address.longitude,
            locality.id,
            actor.id,
        )?;
        content::register_new_content(tx, ContentKind::Store, id, &alias, actor.id, &tags)?;

        let mut store = tx
            .get_store(id)?
            .ok_or_else(|| access::not_found(ContentKind::Store))?;
        store.brand_id = req.brand_id;
        store.description = description;
        store.website = website;
        if let Some(status) = req.status {
            store.status = status;
        }
        store.address.building = address.building;
        store.address.floor = address.floor;
        store.address.unit = address.unit;
        store.address.street = address.street;
        store.address.post_code = address.post_code;
        tx.save_store(&store)?;
        Ok(store)
    })?;

    log::info!(
        "Account {} created store {} ({}) in {}",
        actor.id,
        store.id,
        store.alias,
        store.address.locality.name
    );
    db.get_store(store.id)?
        .ok_or_else(|| access::not_found(ContentKind::Store))
}

pub fn get_store(state: &AppState, target: &EntityRef) -> Result<DbStore, CatalogError> {
    let db = state.db();
    let store = match target {
        EntityRef::Id(id) => db.get_store(*id)?,
        EntityRef::Alias(alias) => db.get_store_by_alias(&validate_alias(alias)?)?,
    };
    match store {
        Some(s) if !s.visibility.is_hidden() => Ok(s),
        _ => Err(access::not_found(ContentKind::Store)),
    }
}

pub fn get_stores(state: &AppState, query: &StoreQuery) -> Result<Vec<DbStore>, CatalogError> {
    let db = state.db();
    let stores = match query {
        StoreQuery::Text { query, page } => db.search_stores(query.trim(), *page)?,
        StoreQuery::Nearby { latitude, longitude } => db.nearby_stores(*latitude, *longitude)?,
    };
    Ok(stores)
}

pub fn update_store(state: &AppState, actor: &Actor, req: UpdateStore) -> Result<DbStore, CatalogError> {
    let name = validate_name(&req.name)?;
    let description = validate_description(req.description.as_deref())?;
    let website = normalize_url(req.website.as_deref())?;
    let address = clean_address(&req.address)?;
    let tags = required_tags(&req.tags)?;

    let db = state.db();
    access::require_edit(&db, ContentKind::Store, req.store_id, actor)?;
    let current = db
        .get_store(req.store_id)?
        .ok_or_else(|| access::not_found(ContentKind::Store))?;
    check_brand(&db, req.brand_id)?;

    db.with_transaction(|tx| -> Result<(), CatalogError> {
        let locality = resolve_locality(tx, &address)?;
        let mut next = current.clone();
        next.name = name;
        next.brand_id = req.brand_id;
        next.description = description;
        next.website = website;
        next.status = req.status.unwrap_or(current.status);
        next.address.building = address.building;
        next.address.floor = address.floor;
        next.address.unit = address.unit;
        next.address.street = address.street;
        next.address.post_code = address.post_code;
        next.address.latitude = address.latitude;
        next.address.longitude = address.longitude;
        next.address.locality = locality;

        let (cur, new) = (&current.address, &next.address);
        let mut log = EditLog::new();
        log.diff(Field::Name, &current.name, &next.name);
        log.diff(Field::Brand, &current.brand_id, &next.brand_id);
        log.diff(Field::Description, &current.description, &next.description);
        log.diff(Field::Website, &current.website, &next.website);
        log.diff(Field::Status, &current.status, &next.status);
        log.diff(Field::Building, &cur.building, &new.building);
        log.diff(Field::Floor, &cur.floor, &new.floor);
        log.diff(Field::Unit, &cur.unit, &new.unit);
        log.diff(Field::Street, &cur.street, &new.street);
        log.diff(Field::PostCode, &cur.post_code, &new.post_code);
        if cur.latitude != new.latitude || cur.longitude != new.longitude {
            log.updated(
                Field::Coordinates,
                Some(coordinates_value(new.latitude, new.longitude)),
            );
        }
        log.diff(Field::Locality, &cur.locality.id, &new.locality.id);

        if !log.is_empty() {
            tx.save_store(&next)?;
        }
        content::reconcile_tags(
            tx,
            ContentKind::Store,
            next.id,
            &current.tags,
            &tags,
            actor.id,
            &mut log,
        )?;
        tx.append_history(ContentKind::Store, next.id, actor.id, log.entries())?;
        Ok(())
    })?;

    db.get_store(req.store_id)?
        .ok_or_else(|| access::not_found(ContentKind::Store))
}

pub fn remove_store(state: &AppState, actor: &Actor, store_id: i64) -> Result<ContentVisibility, CatalogError> {
    content::remove_content(state, ContentKind::Store, store_id, actor)
}

pub fn delete_store(state: &AppState, actor: &Actor, store_id: i64) -> Result<i64, CatalogError> {
    content::hard_delete(state, ContentKind::Store, store_id, actor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_helpers::{account, admin, tags};
    use crate::state::test_support::test_state;

    fn address(lat: f64, lon: f64, locality: &str) -> AddressInput {
        AddressInput {
            street: Some("Sheikh Zayed Rd".into()),
            latitude: lat,
            longitude: lon,
            alpha_2_code: "ae".into(),
            locality: locality.into(),
            ..Default::default()
        }
    }

    fn create(state: &AppState, actor: &Actor, alias: &str, lat: f64, lon: f64) -> DbStore {
        create_store(
            state,
            actor,
            CreateStore {
                alias: alias.into(),
                name: alias.to_uppercase(),
                address: address(lat, lon, "Dubai"),
                tags: tags(&["sneakers"]),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_create_resolves_locality_and_country() {
        let t = test_state();
        let owner = account(&t.state, "owner");
        let store = create_store(
            &t.state,
            &owner,
            CreateStore {
                alias: "kicks".into(),
                name: "Kicks".into(),
                address: address(25.2, 55.27, "  Dubai   Marina "),
                tags: tags(&["sneakers"]),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(store.address.locality.name, "Dubai Marina");
        assert_eq!(store.address.locality.alpha_2_code, "AE");
        assert_eq!(store.address.street.as_deref(), Some("Sheikh Zayed Rd"));
        assert_eq!(store.status, StoreStatus::Open);

        let err = create_store(
            &t.state,
            &owner,
            CreateStore {
                alias: "kicks2".into(),
                name: "Kicks".into(),
                address: AddressInput {
                    alpha_2_code: "ZZ".into(),
                    ..address(25.2, 55.27, "Nowhere")
                },
                tags: tags(&["sneakers"]),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), ResponseStatus::Alpha2CodeInvalid);
        assert!(!t.state.db().alias_exists("kicks2").unwrap());
    }

    #[test]
    fn test_nearby_search_orders_by_distance() {
        let t = test_state();
        let owner = account(&t.state, "owner");
        create(&t.state, &owner, "far", 25.2080, 55.2700);
        create(&t.state, &owner, "near", 25.2001, 55.2700);
        create(&t.state, &owner, "other-city", 24.45, 54.38);

        let query = StoreQuery::from_parts(None, Some(25.2), Some(55.27), 0).unwrap();
        let stores = get_stores(&t.state, &query).unwrap();
        let aliases: Vec<&str> = stores.iter().map(|s| s.alias.as_str()).collect();
        assert_eq!(aliases, vec!["near", "far"]);

        let text = StoreQuery::from_parts(Some("city".into()), None, None, 0).unwrap();
        assert_eq!(get_stores(&t.state, &text).unwrap().len(), 1);
    }

    #[test]
    fn test_single_coordinate_is_bad_request() {
        let err = StoreQuery::from_parts(None, Some(25.2), None, 0).unwrap_err();
        assert_eq!(err.status(), ResponseStatus::BadRequest);
        assert!(StoreQuery::from_parts(None, Some(91.0), Some(0.0), 0).is_err());
    }

    #[test]
    fn test_update_records_address_history() {
        let t = test_state();
        let owner = account(&t.state, "owner");
        let store = create(&t.state, &owner, "kicks", 25.2, 55.27);

        let req = UpdateStore {
            store_id: store.id,
            name: store.name.clone(),
            brand_id: None,
            description: None,
            website: None,
            status: Some(StoreStatus::TemporarilyClosed),
            address: AddressInput {
                floor: Some("2".into()),
                ..address(25.3, 55.3, "Dubai")
            },
            tags: tags(&["sneakers"]),
        };
        let updated = update_store(&t.state, &owner, req.clone()).unwrap();
        assert_eq!(updated.status, StoreStatus::TemporarilyClosed);
        assert_eq!(updated.address.floor.as_deref(), Some("2"));
        assert_eq!(updated.address.locality.id, store.address.locality.id);

        let fields: Vec<Field> = t
            .state
            .db()
            .history_for(ContentKind::Store, store.id)
            .unwrap()
            .into_iter()
            .map(|h| h.field)
            .collect();
        assert_eq!(fields, vec![Field::Status, Field::Floor, Field::Coordinates]);

        update_store(&t.state, &owner, req).unwrap();
        assert_eq!(
            t.state.db().history_for(ContentKind::Store, store.id).unwrap().len(),
            3
        );
    }

    #[test]
    fn test_publicly_accessible_store_rejects_strangers() {
        let t = test_state();
        let owner = account(&t.state, "owner");
        let stranger = account(&t.state, "stranger");
        let boss = admin(&t.state, "boss");
        let store = create(&t.state, &owner, "kicks", 25.2, 55.27);
        t.state
            .db()
            .conn_ref()
            .execute(
                "UPDATE store SET edit_access_level = 4 WHERE id = ?1",
                [store.id],
            )
            .unwrap();

        let req = UpdateStore {
            store_id: store.id,
            name: "Hijacked".into(),
            brand_id: None,
            description: None,
            website: None,
            status: None,
            address: address(25.2, 55.27, "Dubai"),
            tags: tags(&["sneakers"]),
        };
        let err = update_store(&t.state, &stranger, req.clone()).unwrap_err();
        assert_eq!(err.status(), ResponseStatus::Forbidden);
        assert_eq!(
            get_store(&t.state, &EntityRef::Id(store.id)).unwrap().name,
            "KICKS"
        );

        assert_eq!(update_store(&t.state, &owner, req.clone()).unwrap().name, "Hijacked");
        assert!(update_store(&t.state, &boss, req).is_ok());
    }

    #[test]
    fn test_hidden_brand_cannot_own_store() {
        let t = test_state();
        let owner = account(&t.state, "owner");
        let err = create_store(
            &t.state,
            &owner,
            CreateStore {
                alias: "kicks".into(),
                name: "Kicks".into(),
                brand_id: Some(42),
                address: address(25.2, 55.27, "Dubai"),
                tags: tags(&["sneakers"]),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), ResponseStatus::BrandNotFound);
    }

    #[test]
    fn test_remove_by_other_account_is_forbidden() {
        let t = test_state();
        let owner = account(&t.state, "owner");
        let stranger = account(&t.state, "stranger");
        let store = create(&t.state, &owner, "kicks", 25.2, 55.27);

        let err = remove_store(&t.state, &stranger, store.id).unwrap_err();
        assert_eq!(err.status(), ResponseStatus::Forbidden);
        assert_eq!(remove_store(&t.state, &owner, store.id).unwrap(), ContentVisibility::Deleted);
        let err = get_store(&t.state, &EntityRef::Alias("kicks".into())).unwrap_err();
        assert_eq!(err.code(), ResponseStatus::StoreNotFound);
    }
}
