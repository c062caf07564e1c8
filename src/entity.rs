//! Entity kinds sharing the global alias namespace.
//!
//! Brands, products, stores and user accounts all claim their alias in the
//! `alias` registry table, so an alias is unique across every kind, not just
//! within one table. The three manageable content kinds additionally share
//! manager, tag and edit-history tables keyed by `ContentKind`.

use serde::Serialize;

use crate::status::ResponseStatus;
use crate::types::int_enum;

int_enum!(
    /// Owner of an alias-registry row.
    EntityType {
        Brand = 1,
        Product = 2,
        Store = 3,
        UserAccount = 4,
    }
);

impl EntityType {
    /// String label used in logs and storage keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Brand => "brand",
            EntityType::Product => "product",
            EntityType::Store => "store",
            EntityType::UserAccount => "user_account",
        }
    }
}

/// A manageable content entity: has managers, tags, edit history,
/// visibility and an edit access level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Brand,
    Product,
    Store,
}

/// Storage tables backing one content kind.
pub struct ContentTables {
    pub entity: &'static str,
    pub id_column: &'static str,
    pub manager: &'static str,
    pub tag: &'static str,
    pub history: &'static str,
}

impl ContentKind {
    pub fn entity_type(self) -> EntityType {
        match self {
            ContentKind::Brand => EntityType::Brand,
            ContentKind::Product => EntityType::Product,
            ContentKind::Store => EntityType::Store,
        }
    }

    pub fn as_str(self) -> &'static str {
        self.entity_type().as_str()
    }

    /// Table names are compile-time constants, never caller input, so they
    /// are safe to splice into SQL text.
    pub fn tables(self) -> ContentTables {
        match self {
            ContentKind::Brand => ContentTables {
                entity: "brand",
                id_column: "brand_id",
                manager: "brand_manager",
                tag: "brand_tag",
                history: "brand_edit_history",
            },
            ContentKind::Product => ContentTables {
                entity: "product",
                id_column: "product_id",
                manager: "product_manager",
                tag: "product_tag",
                history: "product_edit_history",
            },
            ContentKind::Store => ContentTables {
                entity: "store",
                id_column: "store_id",
                manager: "store_manager",
                tag: "store_tag",
                history: "store_edit_history",
            },
        }
    }

    /// Specific NOT_FOUND code for this kind.
    pub fn not_found_status(self) -> ResponseStatus {
        match self {
            ContentKind::Brand => ResponseStatus::BrandNotFound,
            ContentKind::Product => ResponseStatus::ProductNotFound,
            ContentKind::Store => ResponseStatus::StoreNotFound,
        }
    }

    /// Human label for error messages ("No brand exists for this ID.").
    pub fn label(self) -> &'static str {
        match self {
            ContentKind::Brand => "brand",
            ContentKind::Product => "product",
            ContentKind::Store => "store",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_kind_tables_are_distinct() {
        let brand = ContentKind::Brand.tables();
        let store = ContentKind::Store.tables();
        assert_eq!(brand.manager, "brand_manager");
        assert_eq!(store.history, "store_edit_history");
        assert_ne!(brand.tag, store.tag);
    }

    #[test]
    fn test_entity_type_mapping() {
        assert_eq!(ContentKind::Product.entity_type(), EntityType::Product);
        assert_eq!(EntityType::UserAccount.as_i64(), 4);
        assert_eq!(
            ContentKind::Store.not_found_status(),
            ResponseStatus::StoreNotFound
        );
    }
}
