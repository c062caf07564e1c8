//! Domain enumerations stored as integers and sent as integers on the wire.

/// Declare an integer-backed enum with SQL and serde conversions.
///
/// Unknown integers are rejected (`TryFrom` error / `FromSqlError::OutOfRange`),
/// so a corrupted row or a bogus request value never becomes a valid variant.
macro_rules! int_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $value:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant = $value),+
        }

        impl $name {
            pub fn as_i64(self) -> i64 {
                self as i64
            }

            pub fn from_i64(value: i64) -> Option<Self> {
                match value {
                    $($value => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl TryFrom<i64> for $name {
            type Error = i64;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                $name::from_i64(value).ok_or(value)
            }
        }

        impl ::rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> ::rusqlite::Result<::rusqlite::types::ToSqlOutput<'_>> {
                Ok(::rusqlite::types::ToSqlOutput::from(self.as_i64()))
            }
        }

        impl ::rusqlite::types::FromSql for $name {
            fn column_result(
                value: ::rusqlite::types::ValueRef<'_>,
            ) -> ::rusqlite::types::FromSqlResult<Self> {
                let raw = <i64 as ::rusqlite::types::FromSql>::column_result(value)?;
                $name::from_i64(raw).ok_or(::rusqlite::types::FromSqlError::OutOfRange(raw))
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_i64(self.as_i64())
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D: ::serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = <i64 as ::serde::Deserialize>::deserialize(deserializer)?;
                $name::from_i64(raw).ok_or_else(|| {
                    <D::Error as ::serde::de::Error>::custom(format!(
                        "{} is not a valid {}",
                        raw,
                        stringify!($name)
                    ))
                })
            }
        }
    };
}

pub(crate) use int_enum;

int_enum!(
    /// Soft-delete / moderation state of a content entity.
    ContentVisibility {
        PubliclyVisible = 1,
        Deleted = 2,
        Ghosted = 3,
        Removed = 4,
    }
);

impl ContentVisibility {
    /// DELETED and REMOVED rows behave as if absent on every read path.
    pub fn is_hidden(self) -> bool {
        matches!(self, ContentVisibility::Deleted | ContentVisibility::Removed)
    }
}

int_enum!(
    /// Who may mutate a content entity. LOCKED and ARCHIVED are reserved.
    EditAccessLevel {
        Open = 1,
        Archived = 2,
        Locked = 3,
        PubliclyAccessible = 4,
    }
);

int_enum!(
    /// Field identifier recorded in edit history rows.
    Field {
        Alias = 1,
        Avatar = 2,
        Brand = 3,
        Building = 4,
        Condition = 5,
        Coordinates = 6,
        Description = 7,
        EditAccessLevel = 8,
        Floor = 9,
        Locality = 10,
        MainColor = 11,
        Manager = 12,
        Material = 13,
        Name = 14,
        ParentProduct = 15,
        PostAccessLevel = 16,
        PostCode = 17,
        Price = 18,
        Product = 19,
        ReleaseTimestamp = 20,
        Status = 21,
        Store = 22,
        StoreProduct = 23,
        Street = 24,
        Tags = 25,
        Unit = 26,
        Upc = 27,
        Url = 28,
        UserAccount = 29,
        Visibility = 30,
        Website = 31,
        PreorderTimestamp = 32,
        DisplayNameOverride = 33,
        ProductMedia = 34,
        ProductMediaAttribution = 35,
        ProductMediaIndex = 36,
    }
);

int_enum!(
    /// Action recorded in edit history rows.
    UserAction {
        Added = 1,
        Banned = 2,
        Deleted = 3,
        Updated = 4,
    }
);

int_enum!(
    ProductStatus {
        Available = 1,
        ComingSoon = 2,
        Discontinued = 3,
        Preorder = 4,
        Unavailable = 5,
    }
);

int_enum!(
    StoreStatus {
        Open = 1,
        OpeningSoon = 2,
        PermanentlyClosed = 3,
        TemporarilyClosed = 4,
    }
);

int_enum!(
    StoreProductStatus {
        Available = 1,
        Discounted = 2,
        Preorder = 3,
        OutOfStock = 4,
    }
);

int_enum!(
    /// Report reasons shared by brands and products.
    CatalogReportType {
        Duplicate = 1,
        FalseInfo = 2,
        ManagerBehavior = 3,
        Nonexistent = 4,
        OwnershipClaim = 5,
    }
);

int_enum!(
    StoreReportType {
        Closed = 1,
        Duplicate = 2,
        FalseInfo = 3,
        FalsePrices = 4,
        FalseProducts = 5,
        ManagerBehavior = 6,
        Nonexistent = 7,
        OwnershipClaim = 8,
    }
);

int_enum!(
    UserAccountReportType {
        Behavior = 1,
        Spam = 2,
        Vandalism = 3,
    }
);

int_enum!(
    ClientDeviceType {
        Desktop = 1,
        Phone = 2,
        Tablet = 3,
    }
);

int_enum!(
    MediaMode {
        Dark = 1,
        Light = 2,
    }
);

int_enum!(
    MediaType {
        Image = 1,
        Video = 2,
    }
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_values() {
        assert_eq!(ContentVisibility::Removed.as_i64(), 4);
        assert_eq!(EditAccessLevel::PubliclyAccessible.as_i64(), 4);
        assert_eq!(Field::ProductMediaIndex.as_i64(), 36);
        assert_eq!(StoreReportType::OwnershipClaim.as_i64(), 8);
        assert_eq!(UserAction::try_from(4), Ok(UserAction::Updated));
        assert_eq!(UserAction::try_from(0), Err(0));
    }

    #[test]
    fn test_hidden_visibility() {
        assert!(ContentVisibility::Deleted.is_hidden());
        assert!(ContentVisibility::Removed.is_hidden());
        assert!(!ContentVisibility::Ghosted.is_hidden());
        assert!(!ContentVisibility::PubliclyVisible.is_hidden());
    }

    #[test]
    fn test_serde_rejects_unknown_values() {
        let status: ProductStatus = serde_json::from_str("2").unwrap();
        assert_eq!(status, ProductStatus::ComingSoon);
        assert!(serde_json::from_str::<ProductStatus>("9").is_err());
        assert_eq!(serde_json::to_string(&MediaMode::Light).unwrap(), "2");
    }

    #[test]
    fn test_sql_round_trip_through_sqlite() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v INTEGER)").unwrap();
        conn.execute("INSERT INTO t (v) VALUES (?1)", [StoreStatus::OpeningSoon])
            .unwrap();
        let read: StoreStatus = conn
            .query_row("SELECT v FROM t", [], |r| r.get(0))
            .unwrap();
        assert_eq!(read, StoreStatus::OpeningSoon);

        conn.execute("INSERT INTO t (v) VALUES (42)", []).unwrap();
        let bad: rusqlite::Result<StoreStatus> =
            conn.query_row("SELECT v FROM t WHERE v = 42", [], |r| r.get(0));
        assert!(bad.is_err());
    }
}
