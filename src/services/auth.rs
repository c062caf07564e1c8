// Auth service
// Join, log in, log out and the per-request session check.
//
// A session id is the SHA-256 of a random UUID. Sessions do not expire on
// the server; they end on log-out or when the account is deleted.

use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::access::Actor;
use crate::db::{CatalogDb, DbSession, DbUserAccount};
use crate::entity::EntityType;
use crate::error::CatalogError;
use crate::services::accounts::account_not_found;
use crate::services::content;
use crate::services::verification::{check_code_format, find_phone, verify_code};
use crate::session_meta::{collect_metadata, ClientContext};
use crate::state::AppState;
use crate::status::ResponseStatus;
use crate::validation::validate_alias;

#[derive(Debug, Clone, Default)]
pub struct JoinRequest {
    pub phone_number_id: i64,
    pub verification_code: String,
    pub alias: String,
}

#[derive(Debug, Clone, Default)]
pub struct LogInRequest {
    pub phone_number_id: i64,
    pub verification_code: String,
    pub user_account_id: i64,
}

/// A freshly opened session. The adapter turns `session_id` into a cookie.
#[derive(Debug, Clone, Serialize)]
pub struct SessionGrant {
    #[serde(skip)]
    pub session_id: String,
    pub user_account: DbUserAccount,
}

fn new_session_id() -> String {
    hex::encode(Sha256::digest(Uuid::new_v4().to_string().as_bytes()))
}

/// The client id must name a supported client.
fn require_client(db: &CatalogDb, ctx: &ClientContext) -> Result<String, CatalogError> {
    let unsupported = || {
        CatalogError::invalid(
            ResponseStatus::UnsupportedClient,
            "This client is not supported.",
        )
    };
    let client_id = ctx
        .client_id
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(unsupported)?;
    if !db.client_exists(client_id)? {
        return Err(unsupported());
    }
    Ok(client_id.to_string())
}

/// Best-effort metadata refresh. Never fails the caller.
fn refresh_session(state: &AppState, session_id: &str, ctx: &ClientContext) {
    let meta = collect_metadata(ctx, state.locator.as_ref());
    if let Err(e) = state.db().update_session(session_id, &meta) {
        log::warn!("Failed to refresh session metadata: {}", e);
    }
}

/// Create an account (and, on first join, its user) and open a session.
pub fn join(state: &AppState, req: JoinRequest, ctx: &ClientContext) -> Result<SessionGrant, CatalogError> {
    let alias = validate_alias(&req.alias)?;
    let code = check_code_format(&state.config, &req.verification_code)?;

    let grant = {
        let db = state.db();
        let client_id = require_client(&db, ctx)?;
        content::ensure_alias_free(&db, &alias)?;

        let phone = find_phone(&db, req.phone_number_id)?;
        if !phone.is_verified {
            return Err(CatalogError::invalid(
                ResponseStatus::PhoneNumberUnverified,
                "Verify the phone number before joining.",
            ));
        }
        verify_code(&db, &state.config, phone.id, &code)?;
        if let Some(user_id) = phone.user_id {
            if db.count_user_accounts(user_id)? >= state.config.user_account_max_count {
                return Err(CatalogError::invalid(
                    ResponseStatus::UserAccountMaxCountReached,
                    format!(
                        "A maximum of {} user accounts is allowed.",
                        state.config.user_account_max_count
                    ),
                ));
            }
        }

        db.with_transaction(|tx| -> Result<SessionGrant, CatalogError> {
            let user_id = match phone.user_id {
                Some(id) => id,
                None => {
                    let id = tx.create_user()?;
                    tx.set_phone_user(phone.id, id)?;
                    id
                }
            };
            let account = tx.create_user_account(user_id, &alias)?;
            tx.register_alias(&alias, account.id, EntityType::UserAccount)?;
            let session = tx.create_session(&new_session_id(), account.id, &client_id)?;
            // Spent only once the session exists.
            tx.delete_verification_code(phone.id)?;
            Ok(SessionGrant {
                session_id: session.id,
                user_account: account,
            })
        })?
    };

    log::info!(
        "User account {} ({}) joined",
        grant.user_account.id,
        grant.user_account.alias
    );
    refresh_session(state, &grant.session_id, ctx);
    Ok(grant)
}

/// Open a session for an existing account owned by the verified phone.
pub fn log_in(state: &AppState, req: LogInRequest, ctx: &ClientContext) -> Result<SessionGrant, CatalogError> {
    let code = check_code_format(&state.config, &req.verification_code)?;

    let grant = {
        let db = state.db();
        let client_id = require_client(&db, ctx)?;
        let account = db
            .get_user_account(req.user_account_id)?
            .ok_or_else(account_not_found)?;

        let phone = find_phone(&db, req.phone_number_id)?;
        if !phone.is_verified {
            return Err(CatalogError::invalid(
                ResponseStatus::PhoneNumberUnverified,
                "Verify the phone number before logging in.",
            ));
        }
        verify_code(&db, &state.config, phone.id, &code)?;
        if phone.user_id != Some(account.user_id) {
            return Err(CatalogError::forbidden(
                "This phone number does not own the user account.",
            ));
        }
        if account.is_suspended {
            return Err(CatalogError::forbidden_with(
                ResponseStatus::UserAccountSuspended,
                "This user account is suspended.",
            ));
        }

        db.with_transaction(|tx| -> Result<SessionGrant, CatalogError> {
            let session = tx.create_session(&new_session_id(), account.id, &client_id)?;
            tx.delete_verification_code(phone.id)?;
            Ok(SessionGrant {
                session_id: session.id,
                user_account: account,
            })
        })?
    };

    log::info!("User account {} logged in", grant.user_account.id);
    refresh_session(state, &grant.session_id, ctx);
    Ok(grant)
}

pub fn log_out(state: &AppState, session_id: &str) -> Result<(), CatalogError> {
    if !state.db().delete_session(session_id)? {
        return Err(session_invalid());
    }
    Ok(())
}

fn session_invalid() -> CatalogError {
    CatalogError::unauthorized(ResponseStatus::SessionInvalid, "Invalid or expired session.")
}

/// Resolve a session id to the acting account.
pub fn authenticate(state: &AppState, session_id: Option<&str>) -> Result<(Actor, DbSession), CatalogError> {
    let session_id = session_id
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(session_invalid)?;
    let db = state.db();
    let session = db.get_session(session_id)?.ok_or_else(session_invalid)?;
    let account = db
        .get_user_account(session.user_account_id)?
        .ok_or_else(session_invalid)?;
    if account.is_suspended {
        return Err(CatalogError::forbidden_with(
            ResponseStatus::UserAccountSuspended,
            "This user account is suspended.",
        ));
    }
    Ok((
        Actor {
            id: account.id,
            is_admin: account.is_admin,
        },
        session,
    ))
}

/// Authenticate and refresh the session metadata. Returns the account id.
pub fn heartbeat(state: &AppState, session_id: Option<&str>, ctx: &ClientContext) -> Result<Actor, CatalogError> {
    let (actor, session) = authenticate(state, session_id)?;
    refresh_session(state, &session.id, ctx);
    Ok(actor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::verification::check_verification_code;
    use crate::services::verification::test_support::{debug_config, send_testing_code};
    use crate::sms::test_support::RecordingSender;
    use crate::state::test_support::{test_state_with, TestState};

    fn web() -> ClientContext {
        ClientContext {
            client_id: Some("town-web".into()),
            user_agent: Some(
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15".into(),
            ),
            remote_addr: Some("203.0.113.7".into()),
            ..Default::default()
        }
    }

    /// Send and verify a code; returns the phone number id.
    fn verified_phone(t: &TestState, number: &str) -> i64 {
        let phone_id = send_testing_code(&t.state, number);
        check_verification_code(&t.state, phone_id, "123456").unwrap();
        phone_id
    }

    fn join_as(t: &TestState, phone_id: i64, alias: &str) -> Result<SessionGrant, CatalogError> {
        join(
            &t.state,
            JoinRequest {
                phone_number_id: phone_id,
                verification_code: "123456".into(),
                alias: alias.into(),
            },
            &web(),
        )
    }

    #[test]
    fn test_join_creates_user_account_and_session() {
        let t = test_state_with(debug_config(), RecordingSender::default());
        let phone_id = verified_phone(&t, "501234567");

        let grant = join_as(&t, phone_id, "Newbie").unwrap();
        assert_eq!(grant.user_account.alias, "newbie");
        assert_eq!(grant.session_id.len(), 64);

        let db = t.state.db();
        let phone = db.get_phone_number(phone_id).unwrap().unwrap();
        assert_eq!(phone.user_id, Some(grant.user_account.user_id));
        assert!(db.get_verification_code(phone_id).unwrap().is_none());
        let session = db.get_session(&grant.session_id).unwrap().unwrap();
        assert_eq!(session.ip_address.as_deref(), Some("203.0.113.7"));
        drop(db);

        let (actor, _) = authenticate(&t.state, Some(&grant.session_id)).unwrap();
        assert_eq!(actor.id, grant.user_account.id);
        assert!(!actor.is_admin);
    }

    #[test]
    fn test_join_requires_verified_phone_and_supported_client() {
        let t = test_state_with(debug_config(), RecordingSender::default());
        let phone_id = send_testing_code(&t.state, "501234567");
        let err = join_as(&t, phone_id, "newbie").unwrap_err();
        assert_eq!(err.code(), ResponseStatus::PhoneNumberUnverified);
        // The code survives a rejected join.
        assert!(t.state.db().get_verification_code(phone_id).unwrap().is_some());

        check_verification_code(&t.state, phone_id, "123456").unwrap();
        let err = join(
            &t.state,
            JoinRequest {
                phone_number_id: phone_id,
                verification_code: "123456".into(),
                alias: "newbie".into(),
            },
            &ClientContext {
                client_id: Some("unknown-app".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), ResponseStatus::UnsupportedClient);
    }

    #[test]
    fn test_unverified_phone_spends_no_attempts() {
        let t = test_state_with(debug_config(), RecordingSender::default());
        let phone_id = send_testing_code(&t.state, "501234567");

        let err = join(
            &t.state,
            JoinRequest {
                phone_number_id: phone_id,
                verification_code: "000000".into(),
                alias: "newbie".into(),
            },
            &web(),
        )
        .unwrap_err();
        assert_eq!(err.code(), ResponseStatus::PhoneNumberUnverified);

        let owner = crate::db::test_utils::seed_account(&t.state.db(), "owner");
        let err = log_in(
            &t.state,
            LogInRequest {
                phone_number_id: phone_id,
                verification_code: "000000".into(),
                user_account_id: owner,
            },
            &web(),
        )
        .unwrap_err();
        assert_eq!(err.code(), ResponseStatus::PhoneNumberUnverified);

        let stored = t.state.db().get_verification_code(phone_id).unwrap().unwrap();
        assert_eq!(stored.attempts, 0);
    }

    #[test]
    fn test_join_enforces_account_cap() {
        let config = crate::config::Config {
            user_account_max_count: 1,
            ..debug_config()
        };
        let t = test_state_with(config, RecordingSender::default());
        let phone_id = verified_phone(&t, "501234567");
        join_as(&t, phone_id, "first").unwrap();

        send_testing_code(&t.state, "501234567");
        let err = join_as(&t, phone_id, "second").unwrap_err();
        assert_eq!(err.code(), ResponseStatus::UserAccountMaxCountReached);
        assert!(!t.state.db().alias_exists("second").unwrap());
    }

    #[test]
    fn test_log_in_and_log_out() {
        let t = test_state_with(debug_config(), RecordingSender::default());
        let phone_id = verified_phone(&t, "501234567");
        let joined = join_as(&t, phone_id, "newbie").unwrap();

        send_testing_code(&t.state, "501234567");
        let grant = log_in(
            &t.state,
            LogInRequest {
                phone_number_id: phone_id,
                verification_code: "123456".into(),
                user_account_id: joined.user_account.id,
            },
            &web(),
        )
        .unwrap();
        assert_ne!(grant.session_id, joined.session_id);

        let actor = heartbeat(&t.state, Some(&grant.session_id), &web()).unwrap();
        assert_eq!(actor.id, joined.user_account.id);

        log_out(&t.state, &grant.session_id).unwrap();
        let err = authenticate(&t.state, Some(&grant.session_id)).unwrap_err();
        assert_eq!(err.status(), ResponseStatus::Unauthorized);
        assert_eq!(err.code(), ResponseStatus::SessionInvalid);
        // The join session is unaffected.
        assert!(authenticate(&t.state, Some(&joined.session_id)).is_ok());
    }

    #[test]
    fn test_log_in_with_foreign_phone_is_forbidden() {
        let t = test_state_with(debug_config(), RecordingSender::default());
        let owner_phone = verified_phone(&t, "501234567");
        let joined = join_as(&t, owner_phone, "owner").unwrap();

        let other_phone = verified_phone(&t, "509999999");
        let err = log_in(
            &t.state,
            LogInRequest {
                phone_number_id: other_phone,
                verification_code: "123456".into(),
                user_account_id: joined.user_account.id,
            },
            &web(),
        )
        .unwrap_err();
        assert_eq!(err.status(), ResponseStatus::Forbidden);
    }

    #[test]
    fn test_missing_session_is_unauthorized() {
        let t = test_state_with(debug_config(), RecordingSender::default());
        assert!(authenticate(&t.state, None).is_err());
        assert!(authenticate(&t.state, Some("nope")).is_err());
        assert!(log_out(&t.state, "nope").is_err());
    }
}
