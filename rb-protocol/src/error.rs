//! Error taxonomy for the protocol layer: transport, protocol, server
//! (typed from the JSON `code` field) and local errors. Shaped the way
//! `pmoqobuz::error::QobuzError` separates transport failures from typed
//! API errors, but with the server-code table lifted from the original
//! service's `piano.h` constants.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    // -- Transport --
    #[error("request timed out")]
    Timeout,
    #[error("connection refused")]
    ConnectRefused,
    #[error("connection forbidden")]
    Forbidden,
    #[error("resource not found")]
    NotFound,
    #[error("unexpected HTTP status {0}")]
    StatusUnknown(u16),
    #[error("TLS handshake failed")]
    TlsHandshake,
    #[error("request cancelled")]
    Cancelled,
    #[error("network error: {0}")]
    NetworkErr(String),

    // -- Protocol --
    #[error("invalid response envelope")]
    InvalidResponse,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("requested audio quality tier unavailable")]
    QualityUnavailable,
    #[error("malformed response body: {0}")]
    Decoding(String),

    // -- Server (typed from JSON `code`) --
    #[error("server error: {0:?}")]
    Server(ServerError),

    // -- Local --
    #[error("out of memory")]
    OutOfMemory,
    #[error("crypto initialization failed: {0}")]
    CryptoInit(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("precondition failed: {0}")]
    Precondition(&'static str),
    /// Internal-only signal used by the re-auth retry loop; never surfaced
    /// to a caller.
    #[error("continue request (internal)")]
    ContinueRequest,
}

impl From<rb_cipher::CipherError> for Error {
    fn from(e: rb_cipher::CipherError) -> Self {
        Error::CryptoInit(e.to_string())
    }
}

impl From<rb_http::Outcome> for Error {
    fn from(o: rb_http::Outcome) -> Self {
        match o {
            rb_http::Outcome::Ok(_) => {
                unreachable!("Outcome::Ok must be handled by the caller before conversion")
            }
            rb_http::Outcome::Timeout => Error::Timeout,
            rb_http::Outcome::ConnectRefused => Error::ConnectRefused,
            rb_http::Outcome::Forbidden => Error::Forbidden,
            rb_http::Outcome::NotFound => Error::NotFound,
            rb_http::Outcome::StatusUnknown(s) => Error::StatusUnknown(s),
            rb_http::Outcome::TlsHandshake => Error::TlsHandshake,
            rb_http::Outcome::Cancelled => Error::Cancelled,
            rb_http::Outcome::NetworkErr(s) => Error::NetworkErr(s),
        }
    }
}

/// Typed server error codes, taken from the real service's numeric fault
/// codes (offset 1000 family plus a few low, pre-offset codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerError {
    MaintenanceMode,
    LicensingRestrictions,
    ReadOnlyMode,
    InvalidAuthToken,
    InvalidPartnerLogin,
    ListenerNotAuthorized,
    UserNotAuthorized,
    MaxStationsReached,
    StationDoesNotExist,
    PartnerNotAuthorized,
    InvalidUsername,
    InvalidPassword,
    RateLimit,
    Internal(i64),
}

impl ServerError {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => ServerError::MaintenanceMode,
            12 => ServerError::LicensingRestrictions,
            1000 => ServerError::ReadOnlyMode,
            1001 => ServerError::InvalidAuthToken,
            1002 => ServerError::InvalidPartnerLogin,
            1003 => ServerError::ListenerNotAuthorized,
            1004 => ServerError::UserNotAuthorized,
            1005 => ServerError::MaxStationsReached,
            1006 => ServerError::StationDoesNotExist,
            1010 => ServerError::PartnerNotAuthorized,
            1011 => ServerError::InvalidUsername,
            1012 => ServerError::InvalidPassword,
            1039 => ServerError::RateLimit,
            other => ServerError::Internal(other),
        }
    }

    pub fn is_invalid_auth_token(&self) -> bool {
        matches!(self, ServerError::InvalidAuthToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_map_to_typed_variants() {
        assert_eq!(ServerError::from_code(1001), ServerError::InvalidAuthToken);
        assert_eq!(ServerError::from_code(1002), ServerError::InvalidPartnerLogin);
        assert_eq!(ServerError::from_code(1039), ServerError::RateLimit);
    }

    #[test]
    fn unknown_code_falls_back_to_internal() {
        assert_eq!(ServerError::from_code(9999), ServerError::Internal(9999));
    }
}
