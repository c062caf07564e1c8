// Store product service
// A product listed at a store, with a price. Edits are authorized against
// the store.

use crate::access::{self, Actor};
use crate::audit::EditLog;
use crate::db::DbStoreProduct;
use crate::entity::ContentKind;
use crate::error::CatalogError;
use crate::services::check_page;
use crate::state::AppState;
use crate::status::ResponseStatus;
use crate::types::{Field, StoreProductStatus};
use crate::validation::{normalize_price, normalize_url, validate_description};

/// Editable listing fields shared by create and update.
#[derive(Debug, Clone, Default)]
pub struct ListingFields {
    pub price: String,
    pub condition: Option<String>,
    pub description: Option<String>,
    pub status: Option<StoreProductStatus>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateStoreProduct {
    pub store_id: i64,
    pub product_id: i64,
    pub fields: ListingFields,
}

/// Full replacement of a listing's fields. `status: None` keeps the
/// current status.
#[derive(Debug, Clone, Default)]
pub struct UpdateStoreProduct {
    pub store_product_id: i64,
    pub fields: ListingFields,
}

struct CleanListing {
    price: String,
    condition: Option<String>,
    description: Option<String>,
    status: Option<StoreProductStatus>,
    url: Option<String>,
}

fn clean_listing(f: &ListingFields) -> Result<CleanListing, CatalogError> {
    Ok(CleanListing {
        price: normalize_price(&f.price)?,
        condition: validate_description(f.condition.as_deref())?,
        description: validate_description(f.description.as_deref())?,
        status: f.status,
        url: normalize_url(f.url.as_deref())?,
    })
}

fn apply_listing(sp: &mut DbStoreProduct, f: CleanListing) {
    sp.price = f.price;
    sp.condition = f.condition;
    sp.description = f.description;
    if let Some(status) = f.status {
        sp.status = status;
    }
    sp.url = f.url;
}

fn store_product_not_found() -> CatalogError {
    CatalogError::not_found(
        ResponseStatus::StoreProductNotFound,
        "No store product exists for this ID.",
    )
}

pub fn create_store_product(
    state: &AppState,
    actor: &Actor,
    req: CreateStoreProduct,
) -> Result<DbStoreProduct, CatalogError> {
    let listing = clean_listing(&req.fields)?;

    let db = state.db();
    access::visible_state(&db, ContentKind::Product, req.product_id)?;
    access::require_edit(&db, ContentKind::Store, req.store_id, actor)?;

    let sp = db.with_transaction(|tx| -> Result<DbStoreProduct, CatalogError> {
        let id = tx.insert_store_product(req.store_id, req.product_id, &listing.price, actor.id)?;
        let mut sp = tx.get_store_product(id)?.ok_or_else(store_product_not_found)?;
        apply_listing(&mut sp, listing);
        tx.save_store_product(&sp)?;
        Ok(sp)
    })?;

    log::info!(
        "Account {} listed product {} at store {} for {}",
        actor.id,
        sp.product_id,
        sp.store_id,
        sp.price
    );
    Ok(sp)
}

/// A listing whose store and product are both visible.
pub fn get_store_product(state: &AppState, store_product_id: i64) -> Result<DbStoreProduct, CatalogError> {
    let db = state.db();
    let sp = db
        .get_store_product(store_product_id)?
        .ok_or_else(store_product_not_found)?;
    access::visible_state(&db, ContentKind::Store, sp.store_id)?;
    access::visible_state(&db, ContentKind::Product, sp.product_id)
        .map_err(|_| store_product_not_found())?;
    Ok(sp)
}

pub fn get_store_products(
    state: &AppState,
    store_id: i64,
    page: i64,
) -> Result<Vec<DbStoreProduct>, CatalogError> {
    let page = check_page(page)?;
    let db = state.db();
    access::visible_state(&db, ContentKind::Store, store_id)?;
    Ok(db.store_products_for_store(store_id, page)?)
}

pub fn update_store_product(
    state: &AppState,
    actor: &Actor,
    req: UpdateStoreProduct,
) -> Result<DbStoreProduct, CatalogError> {
    let listing = clean_listing(&req.fields)?;

    let db = state.db();
    let current = db
        .get_store_product(req.store_product_id)?
        .ok_or_else(store_product_not_found)?;
    access::require_edit(&db, ContentKind::Store, current.store_id, actor)?;
    access::visible_state(&db, ContentKind::Product, current.product_id)
        .map_err(|_| store_product_not_found())?;

    let mut next = current.clone();
    apply_listing(&mut next, listing);

    let mut log = EditLog::new();
    log.diff(Field::Price, &current.price, &next.price);
    log.diff(Field::Condition, &current.condition, &next.condition);
    log.diff(Field::Description, &current.description, &next.description);
    log.diff(Field::Status, &current.status, &next.status);
    log.diff(Field::Url, &current.url, &next.url);
    if log.is_empty() {
        return Ok(current);
    }

    db.with_transaction(|tx| -> Result<(), CatalogError> {
        tx.save_store_product(&next)?;
        tx.append_store_product_history(next.id, actor.id, log.entries())?;
        Ok(())
    })?;
    Ok(next)
}

/// Admin only; removes the row and its history.
pub fn delete_store_product(state: &AppState, actor: &Actor, store_product_id: i64) -> Result<i64, CatalogError> {
    let db = state.db();
    if db.get_store_product(store_product_id)?.is_none() {
        return Err(store_product_not_found());
    }
    access::require_admin(actor)?;
    db.delete_store_product(store_product_id)?;
    log::info!("Admin {} deleted store product {}", actor.id, store_product_id);
    Ok(store_product_id)
}
