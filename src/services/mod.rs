// Service layer: business logic shared by the API adapter and tests.
//
// Every operation takes the shared `AppState`, the authenticated `Actor`
// where one is needed, and a typed request. Input is validated before the
// connection is locked, so a rejected request never touches storage.

pub mod accounts;
pub mod auth;
pub mod brands;
pub mod content;
pub mod products;
pub mod reference;
pub mod reports;
pub mod store_products;
pub mod stores;
pub mod verification;

use crate::error::CatalogError;

/// How a `get_*` call names its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRef {
    Id(i64),
    Alias(String),
}

impl EntityRef {
    /// Pick the id when present, else the alias. Neither is a BAD_REQUEST.
    pub fn from_parts(id: Option<i64>, alias: Option<String>, id_name: &str) -> Result<Self, CatalogError> {
        match (id, alias.filter(|a| !a.trim().is_empty())) {
            (Some(id), _) => Ok(EntityRef::Id(id)),
            (None, Some(alias)) => Ok(EntityRef::Alias(alias)),
            (None, None) => Err(CatalogError::bad_param(
                id_name,
                "must be a positive, non-zero integer, or 'alias' must be given.",
            )),
        }
    }
}

/// Search pages are zero-based and capped at `PAGE_MAX`.
pub(crate) fn check_page(page: i64) -> Result<i64, CatalogError> {
    if !(0..=crate::config::limits::PAGE_MAX).contains(&page) {
        return Err(CatalogError::bad_param(
            "page",
            &format!(
                "must be an integer between 0 and {}.",
                crate::config::limits::PAGE_MAX
            ),
        ));
    }
    Ok(page)
}
