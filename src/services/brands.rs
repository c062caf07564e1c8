// Brand service
// Create, read, search, update, remove and delete brands.

use crate::access::{self, Actor};
use crate::audit::EditLog;
use crate::db::DbBrand;
use crate::entity::ContentKind;
use crate::error::CatalogError;
use crate::media::UploadedFile;
use crate::services::content;
use crate::services::{check_page, EntityRef};
use crate::state::AppState;
use crate::types::{ContentVisibility, Field};
use crate::validation::{
    normalize_url, validate_alias, validate_description, validate_name, validate_tags,
};

#[derive(Debug, Clone, Default)]
pub struct CreateBrand {
    pub alias: String,
    pub name: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub tags: Vec<String>,
}

/// Full replacement of a brand's editable fields. Absent optional fields
/// are cleared.
#[derive(Debug, Clone, Default)]
pub struct UpdateBrand {
    pub brand_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub tags: Vec<String>,
}

/// Brands must carry at least one tag.
pub(crate) fn required_tags(tags: &[String]) -> Result<Vec<String>, CatalogError> {
    if tags.is_empty() {
        return Err(CatalogError::bad_param(
            "tags",
            "must be a non-empty JSON array string.",
        ));
    }
    validate_tags(tags)
}

pub fn create_brand(state: &AppState, actor: &Actor, req: CreateBrand) -> Result<DbBrand, CatalogError> {
    let alias = validate_alias(&req.alias)?;
    let name = validate_name(&req.name)?;
    let description = validate_description(req.description.as_deref())?;
    let website = normalize_url(req.website.as_deref())?;
    let tags = required_tags(&req.tags)?;

    let db = state.db();
    content::ensure_alias_free(&db, &alias)?;

    let brand = db.with_transaction(|tx| -> Result<DbBrand, CatalogError> {
        let id = tx.insert_brand(&alias, &name, actor.id)?;
        content::register_new_content(tx, ContentKind::Brand, id, &alias, actor.id, &tags)?;

        let mut brand = tx
            .get_brand(id)?
            .ok_or_else(|| access::not_found(ContentKind::Brand))?;
        if description.is_some() || website.is_some() {
            brand.description = description;
            brand.website = website;
            tx.save_brand(&brand)?;
        }
        Ok(brand)
    })?;

    log::info!("Account {} created brand {} ({})", actor.id, brand.id, brand.alias);
    Ok(brand)
}

/// Visible brand by id or alias.
pub fn get_brand(state: &AppState, target: &EntityRef) -> Result<DbBrand, CatalogError> {
    let db = state.db();
    let brand = match target {
        EntityRef::Id(id) => db.get_brand(*id)?,
        EntityRef::Alias(alias) => db.get_brand_by_alias(&validate_alias(alias)?)?,
    };
    match brand {
        Some(b) if !b.visibility.is_hidden() => Ok(b),
        _ => Err(access::not_found(ContentKind::Brand)),
    }
}

pub fn get_brands(state: &AppState, query: &str, page: i64) -> Result<Vec<DbBrand>, CatalogError> {
    let page = check_page(page)?;
    Ok(state.db().search_brands(query.trim(), page)?)
}

pub fn update_brand(state: &AppState, actor: &Actor, req: UpdateBrand) -> Result<DbBrand, CatalogError> {
    let name = validate_name(&req.name)?;
    let description = validate_description(req.description.as_deref())?;
    let website = normalize_url(req.website.as_deref())?;
    let tags = required_tags(&req.tags)?;

    let db = state.db();
    access::require_edit(&db, ContentKind::Brand, req.brand_id, actor)?;
    let current = db
        .get_brand(req.brand_id)?
        .ok_or_else(|| access::not_found(ContentKind::Brand))?;

    let mut log = EditLog::new();
    let mut next = current.clone();
    log.diff(Field::Name, &current.name, &name);
    log.diff(Field::Description, &current.description, &description);
    log.diff(Field::Website, &current.website, &website);
    next.name = name;
    next.description = description;
    next.website = website;
    let fields_changed = !log.is_empty();

    db.with_transaction(|tx| -> Result<(), CatalogError> {
        if fields_changed {
            tx.save_brand(&next)?;
        }
        content::reconcile_tags(
            tx,
            ContentKind::Brand,
            next.id,
            &current.tags,
            &tags,
            actor.id,
            &mut log,
        )?;
        tx.append_history(ContentKind::Brand, next.id, actor.id, log.entries())?;
        Ok(())
    })?;

    db.get_brand(next.id)?
        .ok_or_else(|| access::not_found(ContentKind::Brand))
}

pub fn remove_brand(state: &AppState, actor: &Actor, brand_id: i64) -> Result<ContentVisibility, CatalogError> {
    content::remove_content(state, ContentKind::Brand, brand_id, actor)
}

pub fn delete_brand(state: &AppState, actor: &Actor, brand_id: i64) -> Result<i64, CatalogError> {
    content::hard_delete(state, ContentKind::Brand, brand_id, actor)
}

pub fn update_brand_avatar(
    state: &AppState,
    actor: &Actor,
    brand_id: i64,
    file: &UploadedFile,
) -> Result<DbBrand, CatalogError> {
    content::update_avatar(state, ContentKind::Brand, brand_id, actor, file)?;
    get_brand(state, &EntityRef::Id(brand_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_helpers::{account, admin, tags};
    use crate::state::test_support::test_state;
    use crate::status::ResponseStatus;
    use crate::types::EditAccessLevel;

    fn create(state: &AppState, actor: &Actor, alias: &str) -> DbBrand {
        create_brand(
            state,
            actor,
            CreateBrand {
                alias: alias.into(),
                name: "Acme".into(),
                description: Some("Boots".into()),
                website: Some("acme.example".into()),
                tags: tags(&["boots"]),
            },
        )
        .unwrap()
    }

    fn update_req(brand: &DbBrand, tag_names: &[&str]) -> UpdateBrand {
        UpdateBrand {
            brand_id: brand.id,
            name: brand.name.clone(),
            description: brand.description.clone(),
            website: brand.website.clone(),
            tags: tags(tag_names),
        }
    }

    #[test]
    fn test_create_and_get_by_alias_case_insensitive() {
        let t = test_state();
        let owner = account(&t.state, "owner");
        let brand = create(&t.state, &owner, "Foo.Bar");
        assert_eq!(brand.alias, "foo.bar");
        assert_eq!(brand.website.as_deref(), Some("http://acme.example"));
        assert_eq!(brand.visibility, ContentVisibility::PubliclyVisible);
        assert_eq!(brand.edit_access_level, EditAccessLevel::Open);

        let found = get_brand(&t.state, &EntityRef::Alias("foo.bar".into())).unwrap();
        assert_eq!(found.id, brand.id);

        let err = get_brand(&t.state, &EntityRef::Alias(".bad".into())).unwrap_err();
        assert_eq!(err.code(), ResponseStatus::AliasInvalid);
    }

    #[test]
    fn test_alias_is_global_across_kinds() {
        let t = test_state();
        let owner = account(&t.state, "owner");
        // The account alias is already registered.
        let err = create_brand(
            &t.state,
            &owner,
            CreateBrand {
                alias: "OWNER".into(),
                name: "Owner Co".into(),
                tags: tags(&["x"]),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), ResponseStatus::AliasExists);
        assert_eq!(err.status(), ResponseStatus::BadRequest);
    }

    #[test]
    fn test_create_rejects_bad_tags_before_writing() {
        let t = test_state();
        let owner = account(&t.state, "owner");
        let err = create_brand(
            &t.state,
            &owner,
            CreateBrand {
                alias: "acme".into(),
                name: "Acme".into(),
                tags: tags(&["ok", "not ok"]),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), ResponseStatus::TagInvalid);
        assert!(!t.state.db().alias_exists("acme").unwrap());
    }

    #[test]
    fn test_update_resubmission_writes_no_history() {
        let t = test_state();
        let owner = account(&t.state, "owner");
        let brand = create(&t.state, &owner, "acme");

        let mut req = update_req(&brand, &["boots"]);
        req.name = "Acme Boots".into();
        let updated = update_brand(&t.state, &owner, req.clone()).unwrap();
        assert_eq!(updated.name, "Acme Boots");
        let rows = t.state.db().history_for(ContentKind::Brand, brand.id).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].field, Field::Name);

        update_brand(&t.state, &owner, req).unwrap();
        assert_eq!(
            t.state.db().history_for(ContentKind::Brand, brand.id).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_update_reconciles_tags() {
        let t = test_state();
        let owner = account(&t.state, "owner");
        let mut brand = create(&t.state, &owner, "acme");
        brand = update_brand(&t.state, &owner, update_req(&brand, &["a", "b"])).unwrap();
        let before = t.state.db().history_for(ContentKind::Brand, brand.id).unwrap().len();

        let brand = update_brand(&t.state, &owner, update_req(&brand, &["b", "c"])).unwrap();
        let names: Vec<&str> = brand.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
        let rows = t.state.db().history_for(ContentKind::Brand, brand.id).unwrap();
        assert_eq!(rows.len() - before, 2);
    }

    #[test]
    fn test_publicly_accessible_limits_edits_to_managers() {
        let t = test_state();
        let owner = account(&t.state, "owner");
        let stranger = account(&t.state, "stranger");
        let boss = admin(&t.state, "boss");
        let brand = create(&t.state, &owner, "acme");
        t.state
            .db()
            .conn_ref()
            .execute(
                "UPDATE brand SET edit_access_level = 4 WHERE id = ?1",
                [brand.id],
            )
            .unwrap();

        let mut req = update_req(&brand, &["boots"]);
        req.name = "Hijacked".into();
        let err = update_brand(&t.state, &stranger, req.clone()).unwrap_err();
        assert_eq!(err.status(), ResponseStatus::Forbidden);
        assert_eq!(get_brand(&t.state, &EntityRef::Id(brand.id)).unwrap().name, "Acme");

        assert!(update_brand(&t.state, &owner, req.clone()).is_ok());
        assert!(update_brand(&t.state, &boss, req).is_ok());
    }

    #[test]
    fn test_removed_brand_disappears_from_reads() {
        let t = test_state();
        let owner = account(&t.state, "owner");
        let brand = create(&t.state, &owner, "acme");
        assert_eq!(get_brands(&t.state, "acm", 0).unwrap().len(), 1);

        assert_eq!(
            remove_brand(&t.state, &owner, brand.id).unwrap(),
            ContentVisibility::Deleted
        );
        assert!(get_brands(&t.state, "acm", 0).unwrap().is_empty());
        let err = get_brand(&t.state, &EntityRef::Id(brand.id)).unwrap_err();
        assert_eq!(err.code(), ResponseStatus::BrandNotFound);

        let err = update_brand(&t.state, &owner, update_req(&brand, &["x"])).unwrap_err();
        assert_eq!(err.status(), ResponseStatus::NotFound);
    }

    #[test]
    fn test_page_past_cap_is_bad_request() {
        let t = test_state();
        let owner = account(&t.state, "owner");
        create(&t.state, &owner, "acme");

        let err = get_brands(&t.state, "acm", i64::MAX / 2).unwrap_err();
        assert_eq!(err.code(), ResponseStatus::BadRequest);
        let err = get_brands(&t.state, "acm", -1).unwrap_err();
        assert_eq!(err.code(), ResponseStatus::BadRequest);
        assert!(get_brands(&t.state, "acm", crate::config::limits::PAGE_MAX)
            .unwrap()
            .is_empty());
    }
}
