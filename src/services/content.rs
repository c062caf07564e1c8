// Content service: steps shared by brands, products and stores.
//
// Creation, tag reconciliation, removal, hard delete and avatar replacement
// behave identically across the three kinds; only the table set differs.

use crate::access::{self, Actor};
use crate::audit::{EditLog, HistoryValue};
use crate::db::{CatalogDb, DbTag};
use crate::entity::{ContentKind, EntityType};
use crate::error::CatalogError;
use crate::media::{self, UploadedFile};
use crate::state::AppState;
use crate::status::ResponseStatus;
use crate::types::{ContentVisibility, Field};
use crate::validation::allowed_media_extension;

/// Early ALIAS_EXISTS check. The unique constraint stays authoritative.
pub(crate) fn ensure_alias_free(db: &CatalogDb, alias: &str) -> Result<(), CatalogError> {
    if db.alias_exists(alias)? {
        return Err(CatalogError::alias_exists());
    }
    Ok(())
}

/// Claim the alias, make the creator a manager and attach the initial tags.
/// Runs inside the create transaction, right after the row insert.
pub(crate) fn register_new_content(
    tx: &CatalogDb,
    kind: ContentKind,
    id: i64,
    alias: &str,
    creator_id: i64,
    tags: &[String],
) -> Result<(), CatalogError> {
    tx.register_alias(alias, id, kind.entity_type())?;
    tx.add_manager(kind, id, creator_id)?;
    for name in tags {
        let tag = tx.get_or_create_tag(name, creator_id)?;
        tx.attach_tag(kind, id, tag.id)?;
    }
    Ok(())
}

/// Bring an entity's tags in line with `desired` (already normalized).
/// History entries carry the tag id.
pub(crate) fn reconcile_tags(
    tx: &CatalogDb,
    kind: ContentKind,
    id: i64,
    current: &[DbTag],
    desired: &[String],
    editor_id: i64,
    log: &mut EditLog,
) -> Result<(), CatalogError> {
    for name in desired {
        if current.iter().any(|t| &t.name == name) {
            continue;
        }
        let tag = tx.get_or_create_tag(name, editor_id)?;
        tx.attach_tag(kind, id, tag.id)?;
        log.added(Field::Tags, tag.id.history_value());
    }
    for tag in current {
        if !desired.contains(&tag.name) {
            tx.detach_tag(kind, id, tag.id)?;
            log.deleted(Field::Tags, tag.id.history_value());
        }
    }
    Ok(())
}

/// Soft delete. Returns the visibility left behind.
pub(crate) fn remove_content(
    state: &AppState,
    kind: ContentKind,
    id: i64,
    actor: &Actor,
) -> Result<ContentVisibility, CatalogError> {
    let db = state.db();
    let current = access::require_remove(&db, kind, id, actor)?;
    let visibility = access::removal_visibility(&current, actor);

    db.with_transaction(|tx| -> Result<(), CatalogError> {
        tx.set_visibility(kind, id, visibility)?;
        let mut log = EditLog::new();
        log.updated(Field::Visibility, visibility.history_value());
        tx.append_history(kind, id, actor.id, log.entries())?;
        Ok(())
    })?;

    log::info!(
        "Account {} removed {} {} (visibility {})",
        actor.id,
        kind.label(),
        id,
        visibility.as_i64()
    );
    Ok(visibility)
}

/// Admin-only row removal. Objects are deleted after the commit; a failed
/// object delete leaves an orphan and is only logged.
pub(crate) fn hard_delete(
    state: &AppState,
    kind: ContentKind,
    id: i64,
    actor: &Actor,
) -> Result<i64, CatalogError> {
    let db = state.db();
    access::require_admin_delete(&db, kind, id, actor)?;

    let keys = db.with_transaction(|tx| -> Result<Vec<String>, CatalogError> {
        let mut keys = Vec::new();

        // Products cascade with their brand; their aliases must go too.
        let cascaded = if kind == ContentKind::Brand {
            tx.product_ids_for_brand(id)?
        } else {
            Vec::new()
        };
        for product_id in &cascaded {
            collect_product_objects(tx, *product_id, &mut keys)?;
            tx.release_alias(*product_id, EntityType::Product)?;
        }
        if kind == ContentKind::Product {
            keys.extend(tx.media_for_product(id)?.into_iter().map(|m| m.file_path));
        }
        keys.extend(tx.avatar_path(kind, id)?);

        tx.hard_delete_content(kind, id)?;
        Ok(keys)
    })?;
    drop(db);

    for key in &keys {
        if let Err(e) = state.objects.delete(key) {
            log::warn!("Failed to delete object {} after {} delete: {}", key, kind.label(), e);
        }
    }
    log::info!(
        "Admin {} deleted {} {} ({} object(s))",
        actor.id,
        kind.label(),
        id,
        keys.len()
    );
    Ok(id)
}

fn collect_product_objects(
    tx: &CatalogDb,
    product_id: i64,
    keys: &mut Vec<String>,
) -> Result<(), CatalogError> {
    keys.extend(tx.media_for_product(product_id)?.into_iter().map(|m| m.file_path));
    keys.extend(tx.avatar_path(ContentKind::Product, product_id)?);
    Ok(())
}

/// Reject files the media pipeline cannot take, before any storage access.
pub(crate) fn check_image(file: &UploadedFile) -> Result<(), CatalogError> {
    if allowed_media_extension(&file.filename).is_none() {
        return Err(CatalogError::forbidden_with(
            ResponseStatus::MediaUnsupported,
            "Only GIF, JPEG and PNG files are supported.",
        ));
    }
    if media::sniff_image(&file.bytes).is_none() {
        return Err(CatalogError::invalid(
            ResponseStatus::MediaInvalid,
            format!("'{}' is not a valid image.", file.filename),
        ));
    }
    Ok(())
}

/// Replace an entity's avatar. Returns the stored object key.
///
/// The upload runs without the connection lock. The new object is stored
/// before the path is committed and the old one is deleted only afterwards,
/// so a failure never leaves the row pointing at a missing object.
pub(crate) fn update_avatar(
    state: &AppState,
    kind: ContentKind,
    id: i64,
    actor: &Actor,
    file: &UploadedFile,
) -> Result<String, CatalogError> {
    check_image(file)?;

    let key = media::avatar_key(kind.as_str(), id, &file.bytes);
    {
        let db = state.db();
        access::require_edit(&db, kind, id, actor)?;
        if db.avatar_path(kind, id)?.as_deref() == Some(key.as_str()) {
            return Ok(key);
        }
    }

    state.objects.upload(&key, &file.bytes)?;

    // Rights and the current path may have changed during the upload.
    let db = state.db();
    let old = match access::require_edit(&db, kind, id, actor) {
        Ok(_) => db.avatar_path(kind, id)?,
        Err(e) => {
            if db.avatar_path(kind, id).ok().flatten().as_deref() != Some(key.as_str()) {
                if let Err(err) = state.objects.delete(&key) {
                    log::warn!("Failed to delete unused avatar {}: {}", key, err);
                }
            }
            return Err(e);
        }
    };
    if old.as_deref() == Some(key.as_str()) {
        return Ok(key);
    }
    db.with_transaction(|tx| -> Result<(), CatalogError> {
        tx.set_avatar_path(kind, id, Some(&key))?;
        let mut log = EditLog::new();
        log.updated(Field::Avatar, Some(key.clone()));
        tx.append_history(kind, id, actor.id, log.entries())?;
        Ok(())
    })?;
    drop(db);

    if let Some(old) = old {
        if let Err(e) = state.objects.delete(&old) {
            log::warn!("Failed to delete replaced avatar {}: {}", old, e);
        }
    }
    Ok(key)
}
