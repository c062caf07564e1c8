//! JSON envelope API.
//!
//! An `ApiRequest` names an endpoint and carries form fields, uploaded files
//! and what the transport knows about the client. `handle` authenticates,
//! dispatches to the services and maps the outcome onto an `ApiResponse`:
//! the HTTP status of the result family, a generic status, headers, and a
//! body that is either the endpoint's payload or `{"error": {...}}`.

pub mod dispatch;
pub mod endpoint;
pub mod form;

use std::collections::BTreeMap;
use std::time::Instant;

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{CatalogError, ErrorBody};
use crate::media::UploadedFile;
use crate::services::auth;
use crate::session_meta::ClientContext;
use crate::state::AppState;
use crate::status::ResponseStatus;

pub use endpoint::Endpoint;

/// Cookie carrying the session id.
pub const SESSION_COOKIE: &str = "session_id";

/// Budget above which an endpoint call is logged as slow.
const LATENCY_BUDGET_MS: u128 = 250;

/// A file as it travels in a request: base64 content plus its original name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireFile {
    pub filename: String,
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiRequest {
    pub endpoint: String,
    pub session_id: Option<String>,
    pub client: ClientContext,
    pub form: BTreeMap<String, String>,
    pub files: BTreeMap<String, WireFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub http_status: u16,
    pub status: ResponseStatus,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

/// A successful handler result.
#[derive(Debug, Default)]
pub struct Reply {
    pub body: Value,
    pub headers: BTreeMap<String, String>,
}

impl Reply {
    pub fn json(body: Value) -> Self {
        Self {
            body,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: String) -> Self {
        self.headers.insert(name.to_string(), value);
        self
    }
}

/// Decoded request handed to a handler.
pub struct Call<'a> {
    pub state: &'a AppState,
    pub endpoint: Endpoint,
    pub session_id: Option<&'a str>,
    pub client: &'a ClientContext,
    pub form: form::Form<'a>,
    pub files: BTreeMap<String, UploadedFile>,
}

fn decode_files(files: &BTreeMap<String, WireFile>) -> Result<BTreeMap<String, UploadedFile>, CatalogError> {
    files
        .iter()
        .map(|(key, file)| {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(file.data.trim())
                .map_err(|_| CatalogError::bad_param(key, "must be base64-encoded file content."))?;
            Ok((
                key.clone(),
                UploadedFile {
                    filename: file.filename.clone(),
                    bytes,
                },
            ))
        })
        .collect()
}

pub fn session_cookie(session_id: &str, secure: bool) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax{}",
        SESSION_COOKIE,
        session_id,
        if secure { "; Secure" } else { "" }
    )
}

pub fn cleared_session_cookie(secure: bool) -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0{}",
        SESSION_COOKIE,
        if secure { "; Secure" } else { "" }
    )
}

fn error_response(err: &CatalogError, headers: BTreeMap<String, String>) -> ApiResponse {
    let status = err.status();
    ApiResponse {
        http_status: status.http_code(),
        status,
        headers,
        body: json!({ "error": ErrorBody::from(err) }),
    }
}

fn log_endpoint_latency(endpoint: &str, started: Instant) {
    let elapsed_ms = started.elapsed().as_millis();
    if elapsed_ms > LATENCY_BUDGET_MS {
        log::warn!(
            "{} exceeded latency budget: {}ms > {}ms",
            endpoint,
            elapsed_ms,
            LATENCY_BUDGET_MS
        );
    } else {
        log::debug!("{} completed in {}ms", endpoint, elapsed_ms);
    }
}

/// Serve one request.
pub fn handle(state: &AppState, req: &ApiRequest) -> ApiResponse {
    let started = Instant::now();
    let Some(endpoint) = Endpoint::from_path(&req.endpoint) else {
        let err = CatalogError::not_found(
            ResponseStatus::NotFound,
            format!("Unknown endpoint '{}'.", req.endpoint),
        );
        return error_response(&err, BTreeMap::new());
    };

    if endpoint.is_stub() {
        let mut headers = BTreeMap::new();
        headers.insert("Cache-Control".to_string(), "no-store".to_string());
        return error_response(&CatalogError::NotImplemented, headers);
    }

    let result = run(state, endpoint, req);
    log_endpoint_latency(endpoint.name(), started);

    match result {
        Ok(reply) => ApiResponse {
            http_status: ResponseStatus::Ok.http_code(),
            status: ResponseStatus::Ok,
            headers: reply.headers,
            body: reply.body,
        },
        Err(err) => {
            if err.is_internal() {
                log::error!("{} failed: {}", endpoint.name(), err);
            } else {
                log::debug!("{} rejected: {}", endpoint.name(), err);
            }
            error_response(&err, BTreeMap::new())
        }
    }
}

fn run(state: &AppState, endpoint: Endpoint, req: &ApiRequest) -> Result<Reply, CatalogError> {
    let actor = if endpoint.is_public() {
        None
    } else {
        Some(auth::heartbeat(state, req.session_id.as_deref(), &req.client)?)
    };
    let call = Call {
        state,
        endpoint,
        session_id: req.session_id.as_deref(),
        client: &req.client,
        form: form::Form::new(&req.form),
        files: decode_files(&req.files)?,
    };
    dispatch::dispatch(&call, actor.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_helpers::account;
    use crate::state::test_support::test_state;

    fn request(endpoint: &str, pairs: &[(&str, &str)]) -> ApiRequest {
        ApiRequest {
            endpoint: endpoint.into(),
            form: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_unknown_endpoint_is_not_found() {
        let t = test_state();
        let resp = handle(&t.state, &request("nope", &[]));
        assert_eq!(resp.http_status, 404);
        assert_eq!(resp.body["error"]["error_code"], json!(4));
    }

    #[test]
    fn test_stub_is_not_implemented_and_uncached() {
        let t = test_state();
        let resp = handle(&t.state, &request("/api/v1/update-store-avatar", &[]));
        assert_eq!(resp.http_status, 501);
        assert_eq!(resp.status, ResponseStatus::NotImplemented);
        assert_eq!(resp.headers.get("Cache-Control").map(String::as_str), Some("no-store"));
    }

    #[test]
    fn test_private_endpoint_needs_session() {
        let t = test_state();
        account(&t.state, "someone");
        let resp = handle(&t.state, &request("me", &[]));
        assert_eq!(resp.http_status, 401);
        assert_eq!(
            resp.body["error"]["error_code"],
            json!(ResponseStatus::SessionInvalid.code())
        );
    }

    #[test]
    fn test_bad_base64_is_bad_request() {
        let t = test_state();
        let mut req = request("check-alias", &[("alias", "fresh")]);
        req.files.insert(
            "avatar".into(),
            WireFile {
                filename: "a.png".into(),
                data: "***".into(),
            },
        );
        let resp = handle(&t.state, &req);
        assert_eq!(resp.http_status, 400);
    }

    #[test]
    fn test_huge_page_is_bad_request() {
        let t = test_state();
        let resp = handle(
            &t.state,
            &request("get-brands", &[("query", "ac"), ("page", "4611686018427387903")]),
        );
        assert_eq!(resp.http_status, 400);
        assert_eq!(resp.status, ResponseStatus::BadRequest);
    }

    #[test]
    fn test_cookies() {
        assert_eq!(
            session_cookie("abc", true),
            "session_id=abc; Path=/; HttpOnly; SameSite=Lax; Secure"
        );
        assert!(cleared_session_cookie(false).contains("Max-Age=0"));
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let req: ApiRequest =
            serde_json::from_str(r#"{"endpoint":"get-brands","form":{"query":"ac"}}"#).unwrap();
        assert_eq!(req.endpoint, "get-brands");
        assert!(req.session_id.is_none());
        assert!(req.files.is_empty());
    }
}
