// Product service
// Products, their variant tree and their media gallery.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::access::{self, Actor};
use crate::audit::{EditLog, HistoryValue};
use crate::config::limits;
use crate::db::{CatalogDb, DbProduct, DbProductMedium};
use crate::entity::ContentKind;
use crate::error::CatalogError;
use crate::media::{self, UploadedFile};
use crate::services::brands::required_tags;
use crate::services::content;
use crate::services::{check_page, EntityRef};
use crate::state::AppState;
use crate::status::ResponseStatus;
use crate::types::{ContentVisibility, Field, MediaMode, MediaType, ProductStatus};
use crate::validation::{
    normalize_timestamp, normalize_url, validate_alias, validate_attribution,
    validate_description, validate_name, validate_tags,
};

/// Editable product fields shared by create and update.
#[derive(Debug, Clone, Default)]
pub struct ProductFields {
    pub name: String,
    pub parent_product_id: Option<i64>,
    pub description: Option<String>,
    pub display_name_override: bool,
    pub main_color_code: Option<String>,
    pub material_id: Option<i64>,
    pub preorder_timestamp: Option<String>,
    pub release_timestamp: Option<String>,
    pub status: Option<ProductStatus>,
    pub upc: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateProduct {
    pub alias: String,
    pub brand_id: i64,
    pub fields: ProductFields,
    pub tags: Vec<String>,
}

/// Full replacement of a product's editable fields. `tags: None` leaves the
/// tag set alone; `status: None` keeps the current status.
#[derive(Debug, Clone, Default)]
pub struct UpdateProduct {
    pub product_id: i64,
    pub fields: ProductFields,
    pub tags: Option<Vec<String>>,
}

/// Per-medium entry of an `update_product_media` call, keyed like the files.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediumMetadata {
    /// Set for a medium that already exists.
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub attribution: Option<String>,
    #[serde(default)]
    pub index: i64,
    #[serde(default)]
    pub media_type: Option<MediaType>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateProductMedia {
    pub product_id: i64,
    pub media_mode: Option<MediaMode>,
    pub metadata: BTreeMap<String, MediumMetadata>,
    pub files: BTreeMap<String, UploadedFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductMedia {
    pub media: Vec<DbProductMedium>,
    pub product_id: i64,
}

/// Field values after the storage-free checks.
struct CleanFields {
    name: String,
    parent_product_id: Option<i64>,
    description: Option<String>,
    display_name_override: bool,
    main_color_code: Option<String>,
    material_id: Option<i64>,
    preorder_timestamp: Option<String>,
    release_timestamp: Option<String>,
    status: Option<ProductStatus>,
    upc: Option<String>,
    url: Option<String>,
}

fn clean_fields(f: &ProductFields) -> Result<CleanFields, CatalogError> {
    if matches!(f.parent_product_id, Some(id) if id <= 0) {
        return Err(CatalogError::bad_param(
            "parent_product_id",
            "must be a positive, non-zero integer.",
        ));
    }
    Ok(CleanFields {
        name: validate_name(&f.name)?,
        parent_product_id: f.parent_product_id,
        description: validate_description(f.description.as_deref())?,
        display_name_override: f.display_name_override,
        main_color_code: f
            .main_color_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_uppercase),
        material_id: f.material_id,
        preorder_timestamp: normalize_timestamp("preorder_timestamp", f.preorder_timestamp.as_deref())?,
        release_timestamp: normalize_timestamp("release_timestamp", f.release_timestamp.as_deref())?,
        status: f.status,
        upc: f
            .upc
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string),
        url: normalize_url(f.url.as_deref())?,
    })
}

/// Reference checks that need storage: colour and material must exist.
fn check_references(db: &CatalogDb, f: &CleanFields) -> Result<(), CatalogError> {
    if let Some(code) = &f.main_color_code {
        if !db.product_color_exists(code)? {
            return Err(CatalogError::bad_param(
                "main_color_code",
                "must be a known product colour code.",
            ));
        }
    }
    if let Some(id) = f.material_id {
        if !db.product_material_exists(id)? {
            return Err(CatalogError::bad_param(
                "material_id",
                "must be a known product material ID.",
            ));
        }
    }
    Ok(())
}

/// Resolve a variant's parent and enforce the naming rule.
fn resolve_parent(db: &CatalogDb, parent_id: i64, name: &str) -> Result<DbProduct, CatalogError> {
    let parent = match db.get_product(parent_id)? {
        Some(p) if !p.visibility.is_hidden() => p,
        _ => {
            return Err(CatalogError::invalid(
                ResponseStatus::ProductNotFound,
                "Invalid parent product ID.",
            ))
        }
    };
    if parent.name.to_lowercase() == name.to_lowercase() {
        return Err(CatalogError::invalid(
            ResponseStatus::NameInvalid,
            "A variant can't have the same name as its parent product.",
        ));
    }
    Ok(parent)
}

/// True if `ancestor` appears on the parent chain starting at `start`.
fn chain_contains(db: &CatalogDb, start: i64, ancestor: i64) -> Result<bool, CatalogError> {
    let mut seen = HashSet::new();
    let mut cursor = Some(start);
    while let Some(id) = cursor {
        if id == ancestor {
            return Ok(true);
        }
        if !seen.insert(id) {
            break;
        }
        cursor = db.get_product(id)?.and_then(|p| p.parent_product_id);
    }
    Ok(false)
}

fn apply_fields(product: &mut DbProduct, f: CleanFields) {
    product.name = f.name;
    product.parent_product_id = f.parent_product_id;
    product.description = f.description;
    product.display_name_override = f.display_name_override;
    product.main_color_code = f.main_color_code;
    product.material_id = f.material_id;
    product.preorder_timestamp = f.preorder_timestamp;
    product.release_timestamp = f.release_timestamp;
    if let Some(status) = f.status {
        product.status = status;
    }
    product.upc = f.upc;
    product.url = f.url;
}

pub fn create_product(
    state: &AppState,
    actor: &Actor,
    req: CreateProduct,
) -> Result<DbProduct, CatalogError> {
    let alias = validate_alias(&req.alias)?;
    if req.brand_id <= 0 {
        return Err(CatalogError::bad_param(
            "brand_id",
            "must be a positive, non-zero integer.",
        ));
    }
    let fields = clean_fields(&req.fields)?;
    // A variant may inherit its identity from the parent; a root product
    // must be tagged.
    let tags = if fields.parent_product_id.is_some() {
        validate_tags(&req.tags)?
    } else {
        required_tags(&req.tags)?
    };

    let db = state.db();
    content::ensure_alias_free(&db, &alias)?;

    let mut brand_id = match db.content_state(ContentKind::Brand, req.brand_id)? {
        Some(brand) if !brand.visibility.is_hidden() => brand.id,
        _ => {
            return Err(CatalogError::invalid(
                ResponseStatus::BrandNotFound,
                "Invalid brand ID.",
            ))
        }
    };
    if let Some(parent_id) = fields.parent_product_id {
        brand_id = resolve_parent(&db, parent_id, &fields.name)?.brand_id;
    }
    check_references(&db, &fields)?;

    let product = db.with_transaction(|tx| -> Result<DbProduct, CatalogError> {
        let id = tx.insert_product(&alias, &fields.name, brand_id, fields.parent_product_id, actor.id)?;
        content::register_new_content(tx, ContentKind::Product, id, &alias, actor.id, &tags)?;
        let mut product = tx
            .get_product(id)?
            .ok_or_else(|| access::not_found(ContentKind::Product))?;
        apply_fields(&mut product, fields);
        tx.save_product(&product)?;
        Ok(product)
    })?;

    log::info!(
        "Account {} created product {} ({}) under brand {}",
        actor.id,
        product.id,
        product.alias,
        product.brand_id
    );
    db.get_product(product.id)?
        .ok_or_else(|| access::not_found(ContentKind::Product))
}

pub fn get_product(state: &AppState, target: &EntityRef) -> Result<DbProduct, CatalogError> {
    let db = state.db();
    let product = match target {
        EntityRef::Id(id) => db.get_product(*id)?,
        EntityRef::Alias(alias) => db.get_product_by_alias(&validate_alias(alias)?)?,
    };
    match product {
        Some(p) if !p.visibility.is_hidden() => Ok(p),
        _ => Err(access::not_found(ContentKind::Product)),
    }
}

pub fn get_products(
    state: &AppState,
    query: &str,
    brand_id: Option<i64>,
    page: i64,
) -> Result<Vec<DbProduct>, CatalogError> {
    let page = check_page(page)?;
    Ok(state.db().search_products(query.trim(), brand_id, page)?)
}

/// Visible variants of a visible product.
pub fn get_product_variants(
    state: &AppState,
    product_id: i64,
    page: i64,
) -> Result<Vec<DbProduct>, CatalogError> {
    let page = check_page(page)?;
    let db = state.db();
    access::visible_state(&db, ContentKind::Product, product_id)?;
    Ok(db.product_variants(product_id, page)?)
}

pub fn update_product(
    state: &AppState,
    actor: &Actor,
    req: UpdateProduct,
) -> Result<DbProduct, CatalogError> {
    let fields = clean_fields(&req.fields)?;
    let tags = req.tags.as_deref().map(validate_tags).transpose()?;
    if fields.parent_product_id == Some(req.product_id) {
        return Err(CatalogError::bad_param(
            "parent_product_id",
            "cannot reference the product itself.",
        ));
    }

    let db = state.db();
    access::require_edit(&db, ContentKind::Product, req.product_id, actor)?;
    let current = db
        .get_product(req.product_id)?
        .ok_or_else(|| access::not_found(ContentKind::Product))?;

    let mut brand_id = current.brand_id;
    if let Some(parent_id) = fields.parent_product_id {
        let parent = resolve_parent(&db, parent_id, &fields.name)?;
        if chain_contains(&db, parent.id, current.id)? {
            return Err(CatalogError::bad_param(
                "parent_product_id",
                "cannot be one of the product's own variants.",
            ));
        }
        brand_id = parent.brand_id;
    }
    check_references(&db, &fields)?;

    let mut next = current.clone();
    apply_fields(&mut next, fields);
    next.brand_id = brand_id;

    let mut log = EditLog::new();
    log.diff(Field::Name, &current.name, &next.name);
    log.diff(Field::Brand, &current.brand_id, &next.brand_id);
    log.diff(Field::ParentProduct, &current.parent_product_id, &next.parent_product_id);
    log.diff(Field::Description, &current.description, &next.description);
    log.diff(
        Field::DisplayNameOverride,
        &current.display_name_override,
        &next.display_name_override,
    );
    log.diff(Field::MainColor, &current.main_color_code, &next.main_color_code);
    log.diff(Field::Material, &current.material_id, &next.material_id);
    log.diff(Field::PreorderTimestamp, &current.preorder_timestamp, &next.preorder_timestamp);
    log.diff(Field::ReleaseTimestamp, &current.release_timestamp, &next.release_timestamp);
    log.diff(Field::Status, &current.status, &next.status);
    log.diff(Field::Upc, &current.upc, &next.upc);
    log.diff(Field::Url, &current.url, &next.url);
    let fields_changed = !log.is_empty();
    let brand_changed = log.touches(Field::Brand);

    db.with_transaction(|tx| -> Result<(), CatalogError> {
        if fields_changed {
            tx.save_product(&next)?;
        }
        if brand_changed {
            // Variants always follow their parent's brand.
            tx.set_variant_brand(next.id, next.brand_id)?;
        }
        if let Some(tags) = &tags {
            content::reconcile_tags(
                tx,
                ContentKind::Product,
                next.id,
                &current.tags,
                tags,
                actor.id,
                &mut log,
            )?;
        }
        tx.append_history(ContentKind::Product, next.id, actor.id, log.entries())?;
        Ok(())
    })?;

    db.get_product(next.id)?
        .ok_or_else(|| access::not_found(ContentKind::Product))
}

pub fn remove_product(state: &AppState, actor: &Actor, product_id: i64) -> Result<ContentVisibility, CatalogError> {
    content::remove_content(state, ContentKind::Product, product_id, actor)
}

pub fn delete_product(state: &AppState, actor: &Actor, product_id: i64) -> Result<i64, CatalogError> {
    content::hard_delete(state, ContentKind::Product, product_id, actor)
}

/// Reconcile a product's gallery with the submitted metadata.
///
/// Metadata keys that match an uploaded file are new media; the others name
/// existing media by id and update attribution and position. Existing media
/// not named are deleted.
pub fn update_product_media(
    state: &AppState,
    actor: &Actor,
    req: UpdateProductMedia,
) -> Result<ProductMedia, CatalogError> {
    let Some(media_mode) = req.media_mode else {
        return Err(CatalogError::bad_param(
            "media_mode",
            "must be a positive, non-zero integer.",
        ));
    };
    if req.files.len() > limits::PRODUCT_MEDIA_MAX_COUNT
        || req.metadata.len() > limits::PRODUCT_MEDIA_MAX_COUNT
    {
        return Err(CatalogError::PayloadTooLarge(format!(
            "A maximum of {} product media files is allowed.",
            limits::PRODUCT_MEDIA_MAX_COUNT
        )));
    }

    let mut uploads = Vec::new();
    let mut kept = Vec::new();
    for (key, meta) in &req.metadata {
        let attribution = validate_attribution(meta.attribution.as_deref())?;
        match req.files.get(key) {
            Some(file) => {
                content::check_image(file)?;
                uploads.push((file, attribution, meta));
            }
            None => {
                let id = meta.id.ok_or_else(|| {
                    CatalogError::bad_param("media", "entries without a file must carry an 'id'.")
                })?;
                kept.push((id, attribution, meta.index));
            }
        }
    }
    if let Some(orphan) = req.files.keys().find(|k| !req.metadata.contains_key(*k)) {
        return Err(CatalogError::bad_param(
            "media",
            &format!("has no entry for uploaded file '{}'.", orphan),
        ));
    }

    let db = state.db();
    access::require_edit(&db, ContentKind::Product, req.product_id, actor)?;
    let existing = db.media_for_product(req.product_id)?;
    for (id, _, _) in &kept {
        if !existing.iter().any(|m| m.id == *id) {
            return Err(CatalogError::bad_param(
                "media",
                &format!("references unknown medium {}.", id),
            ));
        }
    }

    let mut new_keys = Vec::with_capacity(uploads.len());
    for (file, _, _) in &uploads {
        let key = media::product_media_key(req.product_id, &file.bytes);
        state.objects.upload(&key, &file.bytes)?;
        new_keys.push(key);
    }

    let removed: Vec<DbProductMedium> = existing
        .iter()
        .filter(|m| !kept.iter().any(|(id, _, _)| *id == m.id))
        .cloned()
        .collect();

    db.with_transaction(|tx| -> Result<(), CatalogError> {
        let mut log = EditLog::new();
        for ((_, attribution, meta), key) in uploads.iter().zip(&new_keys) {
            tx.insert_product_medium(
                req.product_id,
                actor.id,
                key,
                attribution.as_deref(),
                meta.index,
                media_mode,
                meta.media_type.unwrap_or(MediaType::Image),
            )?;
            log.added(Field::ProductMedia, Some(key.clone()));
        }
        for (id, attribution, index) in &kept {
            let Some(current) = existing.iter().find(|m| m.id == *id) else {
                continue;
            };
            tx.update_product_medium(*id, attribution.as_deref(), *index)?;
            log.diff(Field::ProductMediaAttribution, &current.attribution, attribution);
            log.diff(Field::ProductMediaIndex, &current.index, index);
        }
        for medium in &removed {
            tx.delete_product_medium(medium.id)?;
            log.deleted(Field::ProductMedia, medium.file_path.history_value());
        }
        tx.append_history(ContentKind::Product, req.product_id, actor.id, log.entries())?;
        Ok(())
    })?;

    let media = db.media_for_product(req.product_id)?;
    drop(db);

    // Keys are content addressed: only drop objects nothing references.
    for medium in &removed {
        if media.iter().any(|m| m.file_path == medium.file_path) {
            continue;
        }
        if let Err(e) = state.objects.delete(&medium.file_path) {
            log::warn!("Failed to delete product medium {}: {}", medium.file_path, e);
        }
    }

    Ok(ProductMedia {
        media,
        product_id: req.product_id,
    })
}
