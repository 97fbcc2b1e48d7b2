//! JSON envelope build/parse and audio-URL quality-tier selection.
//!
//! Mirrors the shape of `pmoqobuz::api::mod`'s `handle_response`: decode the
//! envelope, map `stat: "fail"` to a typed error, and hand the `result`
//! object back to the RPC layer for deserialization.

use crate::catalog::AudioFormat;
use crate::error::{Error, Result, ServerError};
use crate::session::Session;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Low,
    Medium,
    High,
}

impl Quality {
    fn key(self) -> &'static str {
        match self {
            Quality::Low => "low",
            Quality::Medium => "medium",
            Quality::High => "high",
        }
    }
}

/// Builds the query string carried on every RPC request's URL, per spec.md
/// §4.3: `method`, `partner_id`, and -- for authenticated calls --
/// `auth_token` (urlencoded) and `user_id`.
pub fn build_query(method: &str, session: &Session, authed: bool) -> String {
    let mut query = format!("method={method}&partner_id={}", session.partner.id);
    if authed {
        let encoded = urlencoding::encode(session.user.auth_token.as_str());
        query.push_str(&format!(
            "&auth_token={encoded}&user_id={}",
            session.user.listener_id
        ));
    }
    query
}

/// Every authenticated request body additionally carries `userAuthToken`
/// and the clock-corrected `syncTime`.
pub fn authed_envelope<T: Serialize>(session: &Session, mut body: Value, extra: T) -> Result<Value> {
    let extra_value = serde_json::to_value(extra).map_err(|e| Error::Decoding(e.to_string()))?;
    let obj = body.as_object_mut().ok_or(Error::InvalidResponse)?;
    if let Value::Object(extra_obj) = extra_value {
        obj.extend(extra_obj);
    }
    obj.insert(
        "userAuthToken".to_string(),
        Value::String(session.user.auth_token.as_str().to_string()),
    );
    obj.insert("syncTime".to_string(), Value::from(session.now_corrected()));
    Ok(body)
}

/// The wire envelope: `{stat, result?, code?, message?}`.
#[derive(Debug, serde::Deserialize)]
struct Envelope {
    stat: String,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

/// Parses a raw response body, translating `stat: "fail"` into a typed
/// `Error::Server`. `is_user_login_step` disambiguates the
/// `InvalidPartnerLogin` code, which the second login step re-maps to
/// `InvalidCredentials` (spec.md §4.3).
pub fn parse_envelope(body: &[u8], is_user_login_step: bool) -> Result<Value> {
    let envelope: Envelope =
        serde_json::from_slice(body).map_err(|e| Error::Decoding(e.to_string()))?;

    match envelope.stat.as_str() {
        "ok" => envelope.result.ok_or(Error::InvalidResponse),
        "fail" => {
            let code = envelope.code.unwrap_or(0);
            let server_err = ServerError::from_code(code);
            if is_user_login_step && server_err == ServerError::InvalidPartnerLogin {
                Err(Error::InvalidCredentials)
            } else {
                tracing::debug!(code, message = ?envelope.message, "server returned fail");
                Err(Error::Server(server_err))
            }
        }
        other => {
            let _ = other;
            Err(Error::InvalidResponse)
        }
    }
}

/// Selects the requested quality tier from a song's `audioUrlMap` and
/// records the chosen encoding as the song's audio format.
pub fn select_quality(audio_url_map: &Value, quality: Quality) -> Result<(String, AudioFormat)> {
    let tier = audio_url_map
        .get(quality.key())
        .ok_or(Error::QualityUnavailable)?;

    let url = tier
        .get("audioUrl")
        .and_then(Value::as_str)
        .ok_or(Error::MissingField("audioUrl"))?
        .to_string();

    let encoding = tier.get("encoding").and_then(Value::as_str).unwrap_or("");
    let format = match encoding {
        "aacplus" => AudioFormat::AacPlus,
        "mp3" => AudioFormat::Mp3,
        _ => AudioFormat::Unknown,
    };

    Ok((url, format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ok_envelope_returns_result() {
        let body = br#"{"stat":"ok","result":{"x":1}}"#;
        let result = parse_envelope(body, false).unwrap();
        assert_eq!(result, json!({"x": 1}));
    }

    #[test]
    fn fail_envelope_maps_to_typed_server_error() {
        let body = br#"{"stat":"fail","code":1001,"message":"bad token"}"#;
        let err = parse_envelope(body, false).unwrap_err();
        assert!(matches!(err, Error::Server(ServerError::InvalidAuthToken)));
    }

    #[test]
    fn invalid_partner_login_remaps_during_user_login_step() {
        let body = br#"{"stat":"fail","code":1002,"message":"bad login"}"#;
        let err = parse_envelope(body, true).unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials));
    }

    #[test]
    fn invalid_partner_login_stays_typed_outside_login_step() {
        let body = br#"{"stat":"fail","code":1002,"message":"bad login"}"#;
        let err = parse_envelope(body, false).unwrap_err();
        assert!(matches!(err, Error::Server(ServerError::InvalidPartnerLogin)));
    }

    #[test]
    fn quality_missing_tier_yields_quality_unavailable() {
        let map = json!({"low": {"encoding": "mp3", "audioUrl": "http://x"}});
        let err = select_quality(&map, Quality::High).unwrap_err();
        assert!(matches!(err, Error::QualityUnavailable));
    }

    #[test]
    fn quality_present_tier_selects_encoding() {
        let map = json!({"high": {"encoding": "aacplus", "audioUrl": "http://hi"}});
        let (url, format) = select_quality(&map, Quality::High).unwrap();
        assert_eq!(url, "http://hi");
        assert!(matches!(format, AudioFormat::AacPlus));
    }

    #[test]
    fn query_omits_auth_fields_when_not_authed() {
        let session = Session::new("example.com", "/x/", 443);
        let q = build_query("test.method", &session, false);
        assert!(!q.contains("auth_token"));
        assert!(!q.contains("user_id"));
    }

    #[test]
    fn query_includes_auth_fields_when_authed() {
        let mut session = Session::new("example.com", "/x/", 443);
        session.complete_partner_login("ptok".into(), 7);
        session.complete_user_login("utok".into(), "listener-9".into());
        let q = build_query("test.method", &session, true);
        assert!(q.contains("auth_token="));
        assert!(q.contains("user_id=listener-9"));
    }
}
