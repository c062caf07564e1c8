//! Response status codes shared by every service and the API envelope.
//!
//! Codes 0..=8 are the generic families and map 1:1 onto HTTP status codes.
//! Codes from 9 up are specific: they only ever appear as `error_code` in a
//! JSON error body, while the HTTP status comes from the generic family
//! chosen by the failing operation.

use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseStatus {
    Ok = 0,
    BadRequest = 1,
    Forbidden = 2,
    InternalServerError = 3,
    NotFound = 4,
    NotImplemented = 5,
    PayloadTooLarge = 6,
    TooManyRequests = 7,
    Unauthorized = 8,

    AliasExists = 9,
    AliasInvalid = 10,
    Alpha2CodeInvalid = 11,
    BioInvalid = 12,
    BrandNotFound = 13,
    BrandTooSimilar = 14,
    DescriptionInvalid = 15,
    MediaInvalid = 16,
    MediaUnsupported = 17,
    NameInvalid = 18,
    PasswordIncorrect = 19,
    PasswordInvalid = 20,
    PhoneNumberNotFound = 21,
    PhoneNumberInvalid = 22,
    PhoneNumberUnverified = 23,
    ProductNotFound = 24,
    ProductTooSimilar = 25,
    SessionInvalid = 26,
    StoreNotFound = 27,
    StoreProductNotFound = 28,
    StoreTooSimilar = 29,
    TagInvalid = 30,
    UnsupportedClient = 31,
    UrlInvalid = 32,
    UserAccountMaxCountReached = 33,
    UserAccountNotFound = 34,
    UserAccountSuspended = 35,
    VerificationCodeExpired = 36,
    VerificationCodeIncorrect = 37,
    VerificationCodeNotFound = 38,
    AttributionInvalid = 39,
}

impl ResponseStatus {
    /// Numeric wire value.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// True for the nine family codes that carry an HTTP mapping.
    pub fn is_generic(self) -> bool {
        self.code() <= ResponseStatus::Unauthorized.code()
    }

    /// Map a generic status onto its HTTP status code.
    ///
    /// Anything that is not a known family falls through to 500: a status
    /// that was never resolved to a family is itself a server bug.
    pub fn http_code(self) -> u16 {
        match self {
            ResponseStatus::Ok => 200,
            ResponseStatus::BadRequest => 400,
            ResponseStatus::Forbidden => 403,
            ResponseStatus::InternalServerError => 500,
            ResponseStatus::NotFound => 404,
            ResponseStatus::NotImplemented => 501,
            ResponseStatus::PayloadTooLarge => 413,
            ResponseStatus::TooManyRequests => 429,
            ResponseStatus::Unauthorized => 401,
            _ => 500,
        }
    }
}

impl Serialize for ResponseStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}
