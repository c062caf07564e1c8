// Verification service
// One-time codes sent by SMS prove control of a phone number. Codes are
// stored hashed, expire after the configured TTL and survive a fixed
// number of wrong guesses.

use chrono::{DateTime, Utc};
use rand::RngExt;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::{limits, Config};
use crate::db::{CatalogDb, DbPhoneNumber, DbUserAccount};
use crate::error::CatalogError;
use crate::state::AppState;
use crate::status::ResponseStatus;
use crate::validation::normalize_phone_digits;

#[derive(Debug, Clone, Default)]
pub struct SendCode {
    pub alpha_2_code: String,
    pub dialing_code: String,
    pub phone_number: String,
}

/// What a successful check reveals about the number.
#[derive(Debug, Clone, Serialize)]
pub struct VerifiedPhone {
    pub phone_number_id: i64,
    pub user_id: Option<i64>,
    pub user_accounts: Vec<DbUserAccount>,
}

fn hash_code(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

fn random_code(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// The code to send: the fixed testing code in debug mode or for the review
/// number, a fresh random one otherwise.
fn code_for(config: &Config, national_number: &str) -> String {
    let is_testing_number = config.testing_phone_number.as_deref() == Some(national_number);
    match &config.testing_otp {
        Some(otp) if config.debug || is_testing_number => otp.clone(),
        _ => random_code(config.verification_code_len),
    }
}

/// A submitted code must be all digits of the configured length.
pub(crate) fn check_code_format(config: &Config, code: &str) -> Result<String, CatalogError> {
    let code = code.trim();
    if code.len() != config.verification_code_len || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(CatalogError::bad_param(
            "verification_code",
            &format!("must be a {}-digit number.", config.verification_code_len),
        ));
    }
    Ok(code.to_string())
}

pub fn send_verification_code(state: &AppState, req: SendCode) -> Result<i64, CatalogError> {
    let alpha_2_code = req.alpha_2_code.trim().to_ascii_uppercase();
    let dialing_code = req.dialing_code.trim().trim_start_matches('+').to_string();
    let number = normalize_phone_digits(&req.phone_number);
    if number.is_empty() {
        return Err(CatalogError::bad_param("phone_number", "must contain digits."));
    }

    let code = code_for(&state.config, &number);
    let phone = {
        let db = state.db();
        let dialing = db
            .find_dialing_code(&alpha_2_code, &dialing_code)?
            .ok_or_else(|| {
                CatalogError::invalid(
                    ResponseStatus::Alpha2CodeInvalid,
                    "Invalid country or dialing code.",
                )
            })?;
        db.with_transaction(|tx| -> Result<DbPhoneNumber, CatalogError> {
            let phone = tx.get_or_create_phone_number(dialing.id, &number)?;
            tx.replace_verification_code(phone.id, &hash_code(&code))?;
            Ok(phone)
        })?
    };

    let to = format!("+{}{}", dialing_code, number);
    let body = format!(
        "Your {} verification code is {} (valid for {} mins).",
        limits::SERVICE_NAME,
        code,
        state.config.verification_code_ttl_secs / 60
    );
    if let Err(e) = state.sms.send(&to, &body) {
        log::warn!("Verification SMS to phone number {} failed: {}", phone.id, e);
        if let Err(e) = state.db().delete_verification_code(phone.id) {
            log::warn!("Failed to drop unsent code for {}: {}", phone.id, e);
        }
        return Err(CatalogError::invalid(
            ResponseStatus::PhoneNumberInvalid,
            "Failed to send a verification code to this phone number.",
        ));
    }

    log::info!("Sent verification code to phone number {}", phone.id);
    Ok(phone.id)
}

fn code_is_expired(created: &str, ttl_secs: i64) -> bool {
    match DateTime::parse_from_rfc3339(created) {
        Ok(at) => (Utc::now() - at.with_timezone(&Utc)).num_seconds() >= ttl_secs,
        // An unreadable timestamp cannot prove the code is still live.
        Err(_) => true,
    }
}

/// The phone number row, or PHONE_NUMBER_NOT_FOUND.
pub(crate) fn find_phone(db: &CatalogDb, phone_number_id: i64) -> Result<DbPhoneNumber, CatalogError> {
    db.get_phone_number(phone_number_id)?.ok_or_else(|| {
        CatalogError::not_found(
            ResponseStatus::PhoneNumberNotFound,
            "No phone number exists for this ID.",
        )
    })
}

/// Check `code` against the stored hash for a phone number.
///
/// A wrong guess is counted; the guess that reaches the limit deletes the
/// code. A correct guess leaves the code in place so the caller can spend
/// it once a session exists.
pub(crate) fn verify_code(
    db: &CatalogDb,
    config: &Config,
    phone_number_id: i64,
    code: &str,
) -> Result<DbPhoneNumber, CatalogError> {
    let phone = find_phone(db, phone_number_id)?;
    let stored = db.get_verification_code(phone.id)?.ok_or_else(|| {
        CatalogError::not_found(
            ResponseStatus::VerificationCodeNotFound,
            "No verification code was sent to this phone number.",
        )
    })?;

    if code_is_expired(&stored.creation_timestamp, config.verification_code_ttl_secs) {
        db.delete_verification_code(phone.id)?;
        return Err(CatalogError::invalid(
            ResponseStatus::VerificationCodeExpired,
            "The verification code has expired.",
        ));
    }

    if hash_code(code) == stored.code_hash {
        return Ok(phone);
    }

    let attempts = db.increment_verification_attempts(phone.id)?;
    let remaining = config.verification_code_attempt_limit - attempts;
    if remaining <= 0 {
        db.delete_verification_code(phone.id)?;
        log::info!("Verification code for phone number {} exhausted", phone.id);
        return Err(CatalogError::RateLimited {
            code: ResponseStatus::VerificationCodeExpired,
            message: "Too many incorrect attempts. Request a new verification code.".to_string(),
        });
    }
    Err(CatalogError::invalid(
        ResponseStatus::VerificationCodeIncorrect,
        format!("{} attempt(s) remaining.", remaining),
    ))
}

pub fn check_verification_code(
    state: &AppState,
    phone_number_id: i64,
    code: &str,
) -> Result<VerifiedPhone, CatalogError> {
    let code = check_code_format(&state.config, code)?;
    let db = state.db();
    let phone = verify_code(&db, &state.config, phone_number_id, &code)?;
    if !phone.is_verified {
        db.mark_phone_verified(phone.id)?;
    }
    let user_accounts = match phone.user_id {
        Some(user_id) => db.user_accounts_for_user(user_id)?,
        None => Vec::new(),
    };
    Ok(VerifiedPhone {
        phone_number_id: phone.id,
        user_id: phone.user_id,
        user_accounts,
    })
}


#[cfg(test)]
mod tests {
    use super::test_support::{debug_config, send_testing_code};
    use super::*;
    use crate::sms::test_support::RecordingSender;
    use crate::state::test_support::{test_state, test_state_with};

    #[test]
    fn test_send_uses_testing_otp_in_debug() {
        let t = test_state_with(debug_config(), RecordingSender::default());
        let phone_id = send_testing_code(&t.state, "050 123 4567");
        assert_eq!(
            t.sms.last_body().as_deref(),
            Some("Your 971town verification code is 123456 (valid for 30 mins).")
        );
        let sent = t.sms.sent.lock();
        assert_eq!(sent[0].0, "+971501234567");
        drop(sent);

        let stored = t.state.db().get_verification_code(phone_id).unwrap().unwrap();
        assert_ne!(stored.code_hash, "123456");
        assert_eq!(stored.code_hash, hash_code("123456"));
    }

    #[test]
    fn test_send_random_code_outside_debug() {
        let t = test_state();
        send_testing_code(&t.state, "501234567");
        let body = t.sms.last_body().unwrap();
        let code: String = body.chars().filter(|c| c.is_ascii_digit()).take(6).collect();
        assert_eq!(code.len(), 6);
    }

    #[test]
    fn test_unknown_dialing_code_and_failed_send() {
        let t = test_state();
        let err = send_verification_code(
            &t.state,
            SendCode {
                alpha_2_code: "AE".into(),
                dialing_code: "44".into(),
                phone_number: "501234567".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), ResponseStatus::Alpha2CodeInvalid);

        let t = test_state_with(debug_config(), RecordingSender::failing());
        let err = send_verification_code(
            &t.state,
            SendCode {
                alpha_2_code: "AE".into(),
                dialing_code: "+971".into(),
                phone_number: "501234567".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), ResponseStatus::PhoneNumberInvalid);
    }

    #[test]
    fn test_correct_code_marks_verified_and_keeps_code() {
        let t = test_state_with(debug_config(), RecordingSender::default());
        let phone_id = send_testing_code(&t.state, "501234567");

        let result = check_verification_code(&t.state, phone_id, "123456").unwrap();
        assert_eq!(result.phone_number_id, phone_id);
        assert!(result.user_id.is_none());
        assert!(result.user_accounts.is_empty());

        let db = t.state.db();
        assert!(db.get_phone_number(phone_id).unwrap().unwrap().is_verified);
        assert!(db.get_verification_code(phone_id).unwrap().is_some());
    }

    #[test]
    fn test_wrong_guesses_exhaust_the_code() {
        let t = test_state_with(debug_config(), RecordingSender::default());
        let phone_id = send_testing_code(&t.state, "501234567");

        let err = check_verification_code(&t.state, phone_id, "000000").unwrap_err();
        assert_eq!(err.code(), ResponseStatus::VerificationCodeIncorrect);
        assert_eq!(err.to_string(), "2 attempt(s) remaining.");
        let err = check_verification_code(&t.state, phone_id, "000000").unwrap_err();
        assert_eq!(err.to_string(), "1 attempt(s) remaining.");

        let err = check_verification_code(&t.state, phone_id, "000000").unwrap_err();
        assert_eq!(err.status(), ResponseStatus::TooManyRequests);
        assert_eq!(err.code(), ResponseStatus::VerificationCodeExpired);

        // Even the right code is gone now.
        let err = check_verification_code(&t.state, phone_id, "123456").unwrap_err();
        assert_eq!(err.code(), ResponseStatus::VerificationCodeNotFound);
    }

    #[test]
    fn test_expired_code_is_deleted() {
        let t = test_state_with(debug_config(), RecordingSender::default());
        let phone_id = send_testing_code(&t.state, "501234567");
        t.state
            .db()
            .conn_ref()
            .execute(
                "UPDATE user_phone_number_verification_code
                 SET creation_timestamp = '2000-01-01T00:00:00+00:00'",
                [],
            )
            .unwrap();

        let err = check_verification_code(&t.state, phone_id, "123456").unwrap_err();
        assert_eq!(err.code(), ResponseStatus::VerificationCodeExpired);
        assert!(t.state.db().get_verification_code(phone_id).unwrap().is_none());
    }

    #[test]
    fn test_code_format_is_checked_first() {
        let t = test_state();
        let err = check_verification_code(&t.state, 1, "12ab").unwrap_err();
        assert_eq!(err.status(), ResponseStatus::BadRequest);
        assert_eq!(err.code(), ResponseStatus::BadRequest);
    }

    #[test]
    fn test_expiry_boundary() {
        let fresh = Utc::now().to_rfc3339();
        assert!(!code_is_expired(&fresh, 1800));
        assert!(code_is_expired("not a timestamp", 1800));
    }
}
