// Accounts service
// Lookup, search and admin deletion of user accounts, plus alias checks.

use crate::access::{self, Actor};
use crate::db::DbUserAccount;
use crate::error::CatalogError;
use crate::services::content;
use crate::services::EntityRef;
use crate::state::AppState;
use crate::status::ResponseStatus;
use crate::validation::validate_alias;

pub(crate) fn account_not_found() -> CatalogError {
    CatalogError::not_found(
        ResponseStatus::UserAccountNotFound,
        "No user account exists for this ID.",
    )
}

/// Normalize an alias and confirm nobody holds it.
pub fn check_alias(state: &AppState, alias: &str) -> Result<String, CatalogError> {
    let alias = validate_alias(alias)?;
    content::ensure_alias_free(&state.db(), &alias)?;
    Ok(alias)
}

pub fn get_user_account(state: &AppState, target: &EntityRef) -> Result<DbUserAccount, CatalogError> {
    let db = state.db();
    let account = match target {
        EntityRef::Id(id) => db.get_user_account(*id)?,
        EntityRef::Alias(alias) => db.get_user_account_by_alias(&validate_alias(alias)?)?,
    };
    account.ok_or_else(account_not_found)
}

pub fn get_user_accounts(state: &AppState, query: &str) -> Result<Vec<DbUserAccount>, CatalogError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(CatalogError::bad_param("query", "must be a non-empty string."));
    }
    Ok(state.db().search_user_accounts(query)?)
}

/// The caller's own account.
pub fn me(state: &AppState, actor: &Actor) -> Result<DbUserAccount, CatalogError> {
    state
        .db()
        .get_user_account(actor.id)?
        .ok_or_else(account_not_found)
}

/// Admin only. Sessions, manager grants and reports cascade; the alias is
/// released.
pub fn delete_user_account(state: &AppState, actor: &Actor, account_id: i64) -> Result<i64, CatalogError> {
    let db = state.db();
    if db.get_user_account(account_id)?.is_none() {
        return Err(account_not_found());
    }
    access::require_admin(actor)?;
    db.with_transaction(|tx| -> Result<bool, CatalogError> { Ok(tx.delete_user_account(account_id)?) })?;
    log::info!("Admin {} deleted user account {}", actor.id, account_id);
    Ok(account_id)
}
