//! Edit-history collection.
//!
//! Updates diff incoming values against the loaded row and collect one
//! entry per changed field into an `EditLog`. The log is flushed to the
//! entity's history table after the row UPDATE and tag reconciliation, in
//! the same transaction. Re-submitting unchanged values yields an empty log.

use crate::types::{
    ContentVisibility, EditAccessLevel, Field, MediaMode, ProductStatus, StoreProductStatus,
    StoreStatus, UserAction,
};

/// One pending history row.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub field: Field,
    pub action: UserAction,
    pub value: Option<String>,
}

/// Render a field value the way it is stored in `field_value`.
pub trait HistoryValue {
    fn history_value(&self) -> Option<String>;
}

impl HistoryValue for String {
    fn history_value(&self) -> Option<String> {
        Some(self.clone())
    }
}

impl HistoryValue for str {
    fn history_value(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl HistoryValue for i64 {
    fn history_value(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl HistoryValue for f64 {
    fn history_value(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl HistoryValue for bool {
    fn history_value(&self) -> Option<String> {
        Some(if *self { "1" } else { "0" }.to_string())
    }
}

impl<T: HistoryValue> HistoryValue for Option<T> {
    fn history_value(&self) -> Option<String> {
        self.as_ref().and_then(HistoryValue::history_value)
    }
}

macro_rules! enum_history_value {
    ($($ty:ty),+) => {
        $(impl HistoryValue for $ty {
            fn history_value(&self) -> Option<String> {
                Some(self.as_i64().to_string())
            }
        })+
    };
}

enum_history_value!(
    ContentVisibility,
    EditAccessLevel,
    MediaMode,
    ProductStatus,
    StoreProductStatus,
    StoreStatus
);

/// Pending history rows for one edit call.
#[derive(Debug, Default)]
pub struct EditLog {
    entries: Vec<HistoryEntry>,
}

impl EditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an UPDATED entry if `incoming` differs from `current`.
    /// Returns true when the field changed.
    pub fn diff<T>(&mut self, field: Field, current: &T, incoming: &T) -> bool
    where
        T: PartialEq + HistoryValue + ?Sized,
    {
        if current == incoming {
            return false;
        }
        self.updated(field, incoming.history_value());
        true
    }

    pub fn updated(&mut self, field: Field, value: Option<String>) {
        self.push(field, UserAction::Updated, value);
    }

    pub fn added(&mut self, field: Field, value: Option<String>) {
        self.push(field, UserAction::Added, value);
    }

    pub fn deleted(&mut self, field: Field, value: Option<String>) {
        self.push(field, UserAction::Deleted, value);
    }

    fn push(&mut self, field: Field, action: UserAction, value: Option<String>) {
        self.entries.push(HistoryEntry {
            field,
            action,
            value,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// True if any entry touches `field`.
    pub fn touches(&self, field: Field) -> bool {
        self.entries.iter().any(|e| e.field == field)
    }
}
