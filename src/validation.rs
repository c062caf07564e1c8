//! Input validation and normalization shared by every service.
//!
//! Everything here runs before storage is touched, so a rejected request
//! never leaves partial writes behind.

use std::sync::OnceLock;

use regex::Regex;

use crate::config::limits;
use crate::error::CatalogError;
use crate::status::ResponseStatus;

fn re_alias_charset() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9._-]+$").unwrap())
}

fn re_price() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,10})(?:\.(\d{1,2}))?$").unwrap())
}

fn re_whitespace_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Alias format check.
///
/// 1..=64 characters from `[a-zA-Z0-9._-]`, not starting or ending with
/// `.` or `_`. A leading or trailing `-` is allowed.
pub fn alias_valid(alias: &str) -> bool {
    let len = alias.chars().count();
    if !(limits::ALIAS_MIN_LEN..=limits::ALIAS_MAX_LEN).contains(&len) {
        return false;
    }
    if !re_alias_charset().is_match(alias) {
        return false;
    }
    let edge = |c: Option<char>| matches!(c, Some('.') | Some('_'));
    !edge(alias.chars().next()) && !edge(alias.chars().last())
}

/// Lowercase and validate an alias. Aliases are stored and looked up lowercase.
pub fn validate_alias(alias: &str) -> Result<String, CatalogError> {
    let alias = alias.trim().to_lowercase();
    if alias_valid(&alias) {
        Ok(alias)
    } else {
        Err(CatalogError::invalid(
            ResponseStatus::AliasInvalid,
            format!(
                "Alias format is invalid. An alias must be between {} and {} characters long \
                 and can only contain dots, dashes, underscores, and alphanumeric ASCII characters.",
                limits::ALIAS_MIN_LEN,
                limits::ALIAS_MAX_LEN
            ),
        ))
    }
}

pub fn validate_name(name: &str) -> Result<String, CatalogError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > limits::NAME_MAX_LEN {
        return Err(CatalogError::invalid(
            ResponseStatus::NameInvalid,
            format!(
                "Name must be a non-empty string of at most {} characters.",
                limits::NAME_MAX_LEN
            ),
        ));
    }
    Ok(name.to_string())
}

/// Empty descriptions are normalized to `None`.
pub fn validate_description(description: Option<&str>) -> Result<Option<String>, CatalogError> {
    let Some(description) = description.map(str::trim).filter(|d| !d.is_empty()) else {
        return Ok(None);
    };
    if description.chars().count() > limits::DESCRIPTION_MAX_LEN {
        return Err(CatalogError::invalid(
            ResponseStatus::DescriptionInvalid,
            format!(
                "Description cannot exceed {} characters.",
                limits::DESCRIPTION_MAX_LEN
            ),
        ));
    }
    Ok(Some(description.to_string()))
}

/// Validate a website/URL, prefixing `http://` when no scheme is given.
pub fn normalize_url(raw: Option<&str>) -> Result<Option<String>, CatalogError> {
    let Some(raw) = raw.map(str::trim).filter(|u| !u.is_empty()) else {
        return Ok(None);
    };
    let invalid = || {
        CatalogError::invalid(
            ResponseStatus::UrlInvalid,
            format!(
                "URL must be valid and at most {} characters.",
                limits::URL_MAX_LEN
            ),
        )
    };
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };
    if candidate.chars().count() > limits::URL_MAX_LEN {
        return Err(invalid());
    }
    let parsed = url::Url::parse(&candidate).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(invalid());
    }
    Ok(Some(candidate))
}

/// Validate a desired tag set and return normalized names.
///
/// Names are trimmed and lowercased, duplicates collapse. Any name that is
/// blank, too long, or contains punctuation or whitespace rejects the whole
/// set.
pub fn validate_tags(names: &[String]) -> Result<Vec<String>, CatalogError> {
    if names.len() > limits::TAG_MAX_COUNT {
        return Err(CatalogError::invalid(
            ResponseStatus::TagInvalid,
            format!("A maximum of {} tags is allowed.", limits::TAG_MAX_COUNT),
        ));
    }

    let mut normalized: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let tag = clean_tag(name);
        if tag.is_empty() {
            return Err(CatalogError::invalid(
                ResponseStatus::TagInvalid,
                "Tags cannot be blank.",
            ));
        }
        if tag.chars().count() > limits::TAG_MAX_LEN {
            return Err(CatalogError::invalid(
                ResponseStatus::TagInvalid,
                format!(
                    "Tag '{}' exceeds {} characters.",
                    tag,
                    limits::TAG_MAX_LEN
                ),
            ));
        }
        if tag
            .chars()
            .any(|c| c.is_ascii_punctuation() || c.is_whitespace() || c.is_control())
        {
            return Err(CatalogError::invalid(
                ResponseStatus::TagInvalid,
                format!(
                    "Tag '{}' cannot contain punctuation or whitespace.",
                    tag
                ),
            ));
        }
        if !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }
    Ok(normalized)
}

/// Case-fold a tag and trim surrounding whitespace. Inner characters are
/// kept so `validate_tags` can reject them.
pub fn clean_tag(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Parse a JSON array of tag names as sent by clients (`["a","b"]`).
pub fn parse_tag_list(raw: &str) -> Result<Vec<String>, CatalogError> {
    serde_json::from_str::<Vec<String>>(raw).map_err(|_| {
        CatalogError::bad_param("tags", "must be a JSON array of strings.")
    })
}

/// Canonicalize a price into `digits.dd`.
pub fn normalize_price(raw: &str) -> Result<String, CatalogError> {
    let raw = raw.trim();
    let caps = re_price()
        .captures(raw)
        .ok_or_else(|| CatalogError::bad_param("price", "must be a non-negative decimal with at most 2 fraction digits."))?;
    let whole: u64 = caps[1]
        .parse()
        .map_err(|_| CatalogError::bad_param("price", "is out of range."))?;
    let fraction = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    Ok(format!("{}.{:0<2}", whole, fraction))
}

/// Parse an RFC 3339 timestamp and re-render it in UTC. Blank is `None`.
pub fn normalize_timestamp(field: &str, raw: Option<&str>) -> Result<Option<String>, CatalogError> {
    let Some(raw) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    let parsed = chrono::DateTime::parse_from_rfc3339(raw)
        .map_err(|_| CatalogError::bad_param(field, "must be an RFC 3339 timestamp."))?;
    Ok(Some(parsed.with_timezone(&chrono::Utc).to_rfc3339()))
}

/// Trim an attribution and enforce its length limit.
pub fn validate_attribution(raw: Option<&str>) -> Result<Option<String>, CatalogError> {
    let Some(attribution) = raw.map(str::trim).filter(|a| !a.is_empty()) else {
        return Ok(None);
    };
    if attribution.chars().count() > limits::ATTRIBUTION_MAX_LEN {
        return Err(CatalogError::invalid(
            ResponseStatus::AttributionInvalid,
            format!(
                "Attribution cannot exceed {} characters.",
                limits::ATTRIBUTION_MAX_LEN
            ),
        ));
    }
    Ok(Some(attribution.to_string()))
}

/// Keep digits only and drop one leading trunk zero ("050 123" -> "50123").
pub fn normalize_phone_digits(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.strip_prefix('0') {
        Some(rest) => rest.to_string(),
        None => digits,
    }
}

/// Trim and collapse internal whitespace in a locality name.
pub fn clean_locality_name(raw: &str) -> String {
    re_whitespace_run()
        .replace_all(raw.trim(), " ")
        .into_owned()
}

/// Lowercased file extension if it is an allowed media type.
pub fn allowed_media_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    limits::ALLOWED_MEDIA_EXTENSIONS
        .contains(&ext.as_str())
        .then_some(ext)
}
