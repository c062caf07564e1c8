//! Typed access to request form fields.
//!
//! Every accessor reports a missing or malformed field as BAD_REQUEST naming
//! the field, so handlers never see raw strings.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;

use crate::config::limits::PAGE_MAX;
use crate::error::CatalogError;
use crate::validation::parse_tag_list;

pub struct Form<'a> {
    fields: &'a BTreeMap<String, String>,
}

const POSITIVE_INT: &str = "must be a positive, non-zero integer.";

impl<'a> Form<'a> {
    pub fn new(fields: &'a BTreeMap<String, String>) -> Self {
        Self { fields }
    }

    /// A present, non-blank value.
    pub fn opt_str(&self, name: &str) -> Option<&'a str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn opt_string(&self, name: &str) -> Option<String> {
        self.opt_str(name).map(str::to_string)
    }

    pub fn string(&self, name: &str) -> Result<String, CatalogError> {
        self.opt_string(name)
            .ok_or_else(|| CatalogError::bad_param(name, "must be a non-empty string."))
    }

    pub fn opt_id(&self, name: &str) -> Result<Option<i64>, CatalogError> {
        match self.opt_str(name) {
            None => Ok(None),
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(id) if id > 0 => Ok(Some(id)),
                _ => Err(CatalogError::bad_param(name, POSITIVE_INT)),
            },
        }
    }

    pub fn id(&self, name: &str) -> Result<i64, CatalogError> {
        self.opt_id(name)?
            .ok_or_else(|| CatalogError::bad_param(name, POSITIVE_INT))
    }

    /// Zero-based page number; absent means the first page.
    pub fn page(&self) -> Result<i64, CatalogError> {
        match self.opt_str("page") {
            None => Ok(0),
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|p| (0..=PAGE_MAX).contains(p))
                .ok_or_else(|| {
                    CatalogError::bad_param(
                        "page",
                        &format!("must be an integer between 0 and {}.", PAGE_MAX),
                    )
                }),
        }
    }

    pub fn opt_f64(&self, name: &str) -> Result<Option<f64>, CatalogError> {
        match self.opt_str(name) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Some)
                .ok_or_else(|| CatalogError::bad_param(name, "must be a number.")),
        }
    }

    pub fn f64(&self, name: &str) -> Result<f64, CatalogError> {
        self.opt_f64(name)?
            .ok_or_else(|| CatalogError::bad_param(name, "must be a number."))
    }

    pub fn opt_bool(&self, name: &str) -> Result<Option<bool>, CatalogError> {
        match self.opt_str(name).map(|v| v.trim().to_ascii_lowercase()) {
            None => Ok(None),
            Some(v) => match v.as_str() {
                "true" | "1" => Ok(Some(true)),
                "false" | "0" => Ok(Some(false)),
                _ => Err(CatalogError::bad_param(name, "must be 'true' or 'false'.")),
            },
        }
    }

    /// An integer-coded enum such as a status or report type.
    pub fn opt_enum<T>(&self, name: &str, parse: fn(i64) -> Option<T>) -> Result<Option<T>, CatalogError> {
        match self.opt_str(name) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .and_then(parse)
                .map(Some)
                .ok_or_else(|| CatalogError::bad_param(name, "must be a valid enum value.")),
        }
    }

    pub fn int(&self, name: &str) -> Result<i64, CatalogError> {
        self.opt_str(name)
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .ok_or_else(|| CatalogError::bad_param(name, "must be an integer."))
    }

    /// Tags as a JSON array string; absent means no tags.
    pub fn opt_tags(&self) -> Result<Option<Vec<String>>, CatalogError> {
        self.opt_str("tags").map(parse_tag_list).transpose()
    }

    /// A JSON-encoded field.
    pub fn json<T: DeserializeOwned>(&self, name: &str) -> Result<T, CatalogError> {
        let raw = self
            .opt_str(name)
            .ok_or_else(|| CatalogError::bad_param(name, "must be a JSON string."))?;
        serde_json::from_str(raw).map_err(|_| CatalogError::bad_param(name, "must be valid JSON."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProductStatus;

    fn form(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_ids() {
        let fields = form(&[("brand_id", "12"), ("zero", "0"), ("junk", "x"), ("blank", " ")]);
        let f = Form::new(&fields);
        assert_eq!(f.id("brand_id").unwrap(), 12);
        assert!(f.id("zero").is_err());
        assert!(f.id("junk").is_err());
        assert_eq!(f.opt_id("blank").unwrap(), None);
        let err = f.id("missing").unwrap_err();
        assert!(err.to_string().contains("'missing'"));
    }

    #[test]
    fn test_enums_bools_and_pages() {
        let fields = form(&[("status", "4"), ("bad", "9"), ("flag", "TRUE"), ("page", "-1")]);
        let f = Form::new(&fields);
        assert_eq!(
            f.opt_enum("status", ProductStatus::from_i64).unwrap(),
            Some(ProductStatus::Preorder)
        );
        assert!(f.opt_enum("bad", ProductStatus::from_i64).is_err());
        assert_eq!(f.opt_bool("flag").unwrap(), Some(true));
        assert!(f.page().is_err());
    }

    #[test]
    fn test_page_past_cap_is_rejected() {
        let fields = form(&[("page", "4611686018427387903")]);
        assert!(Form::new(&fields).page().is_err());
        let fields = form(&[("page", "10000")]);
        assert_eq!(Form::new(&fields).page().unwrap(), 10_000);
    }

    #[test]
    fn test_tags() {
        let fields = form(&[("tags", r#"["a","b"]"#)]);
        assert_eq!(
            Form::new(&fields).opt_tags().unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        let fields = form(&[("tags", "a,b")]);
        assert!(Form::new(&fields).opt_tags().is_err());
    }
}
