//! Authorization predicates shared by every content entity.
//!
//! Existence is always checked before permission: a missing or hidden entity
//! reports NOT_FOUND, never FORBIDDEN.

use crate::db::{CatalogDb, ContentState, DbError};
use crate::entity::ContentKind;
use crate::error::CatalogError;
use crate::types::{ContentVisibility, EditAccessLevel};

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub is_admin: bool,
}

/// Whether `actor` may edit an entity. LOCKED and ARCHIVED are reserved:
/// only admins get through.
pub fn can_edit(state: &ContentState, actor: &Actor, is_manager: bool) -> bool {
    if actor.is_admin {
        return true;
    }
    match state.edit_access_level {
        EditAccessLevel::Open => true,
        EditAccessLevel::PubliclyAccessible => is_manager,
        EditAccessLevel::Locked | EditAccessLevel::Archived => false,
    }
}

/// Whether `actor` may soft-delete an entity.
pub fn can_remove(actor: &Actor, is_manager: bool) -> bool {
    actor.is_admin || is_manager
}

/// Visibility a removal leaves behind.
pub fn removal_visibility(state: &ContentState, actor: &Actor) -> ContentVisibility {
    if actor.id == state.creator_id {
        ContentVisibility::Deleted
    } else {
        ContentVisibility::Removed
    }
}

/// Load an entity's state, treating hidden rows as absent.
pub fn visible_state(
    db: &CatalogDb,
    kind: ContentKind,
    id: i64,
) -> Result<ContentState, CatalogError> {
    match db.content_state(kind, id)? {
        Some(state) if !state.visibility.is_hidden() => Ok(state),
        _ => Err(not_found(kind)),
    }
}

/// NOT_FOUND error for a content kind.
pub fn not_found(kind: ContentKind) -> CatalogError {
    CatalogError::not_found(
        kind.not_found_status(),
        format!("No {} exists for this ID.", kind.label()),
    )
}

/// Existence, then `can_edit`. Returns the state on success.
pub fn require_edit(
    db: &CatalogDb,
    kind: ContentKind,
    id: i64,
    actor: &Actor,
) -> Result<ContentState, CatalogError> {
    let state = visible_state(db, kind, id)?;
    let is_manager = manager_check(db, kind, id, actor)?;
    if !can_edit(&state, actor, is_manager) {
        return Err(CatalogError::forbidden(format!(
            "You do not have permission to edit this {}.",
            kind.label()
        )));
    }
    Ok(state)
}

/// Existence, then `can_remove`. Returns the state on success.
pub fn require_remove(
    db: &CatalogDb,
    kind: ContentKind,
    id: i64,
    actor: &Actor,
) -> Result<ContentState, CatalogError> {
    let state = visible_state(db, kind, id)?;
    let is_manager = manager_check(db, kind, id, actor)?;
    if !can_remove(actor, is_manager) {
        return Err(CatalogError::forbidden(format!(
            "You do not have permission to remove this {}.",
            kind.label()
        )));
    }
    Ok(state)
}

/// Hard delete needs admin and nothing else. Existence is checked in any
/// visibility state, since admins may purge soft-deleted rows.
pub fn require_admin_delete(
    db: &CatalogDb,
    kind: ContentKind,
    id: i64,
    actor: &Actor,
) -> Result<ContentState, CatalogError> {
    let state = db.content_state(kind, id)?.ok_or_else(|| not_found(kind))?;
    require_admin(actor)?;
    Ok(state)
}

pub fn require_admin(actor: &Actor) -> Result<(), CatalogError> {
    if actor.is_admin {
        Ok(())
    } else {
        Err(CatalogError::forbidden(
            "This operation is restricted to administrators.",
        ))
    }
}

fn manager_check(
    db: &CatalogDb,
    kind: ContentKind,
    id: i64,
    actor: &Actor,
) -> Result<bool, DbError> {
    if actor.is_admin {
        return Ok(false);
    }
    db.is_manager(kind, id, actor.id)
}
