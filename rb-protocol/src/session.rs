//! Auth state machine: partner login -> user login -> operational, with
//! clock-skew correction and transparent re-auth on token expiry.

use crate::error::{Error, Result};
use rb_cipher::KeyedCipher;
use std::fmt;

/// Wraps a `String` that is zeroed on drop -- used for auth tokens and
/// passwords so credential memory doesn't linger after the session tears
/// down, per the spec's "Credentials memory is zeroed before release".
#[derive(Clone, Default)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        // SAFETY: we own the String's bytes exclusively at this point; this
        // just overwrites them before the allocation is freed.
        unsafe {
            for b in self.0.as_bytes_mut() {
                *b = 0;
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct Partner {
    pub user: String,
    pub password: Secret,
    pub device: String,
    pub in_key: String,
    pub out_key: String,
    pub id: i64,
    pub auth_token: Secret,
}

#[derive(Debug, Default)]
pub struct User {
    pub listener_id: String,
    pub auth_token: Secret,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauth,
    PartnerAuthed,
    UserAuthed,
}

pub struct Session {
    pub state: AuthState,
    pub partner: Partner,
    pub user: User,
    pub time_offset: i64,
    pub rpc_host: String,
    pub rpc_path: String,
    pub tls_port: u16,
    pub http_proxy: Option<String>,
    pub control_proxy: Option<String>,
    pub ca_bundle: Option<std::path::PathBuf>,
    pub cipher_in: Option<KeyedCipher>,
    pub cipher_out: Option<KeyedCipher>,
}

impl Session {
    pub fn new(
        rpc_host: impl Into<String>,
        rpc_path: impl Into<String>,
        tls_port: u16,
    ) -> Self {
        Self {
            state: AuthState::Unauth,
            partner: Partner::default(),
            user: User::default(),
            time_offset: 0,
            rpc_host: rpc_host.into(),
            rpc_path: rpc_path.into(),
            tls_port,
            http_proxy: None,
            control_proxy: None,
            ca_bundle: None,
            cipher_in: None,
            cipher_out: None,
        }
    }

    /// Key both cipher handles exactly once with the raw key bytes. Calling
    /// this twice is a logic error in the caller (the keys never change
    /// within a session's lifetime).
    pub fn key_ciphers(&mut self, in_key: &str, out_key: &str) {
        debug_assert!(
            self.cipher_in.is_none() && self.cipher_out.is_none(),
            "ciphers must be keyed exactly once"
        );
        self.cipher_in = Some(KeyedCipher::new(in_key.as_bytes()));
        self.cipher_out = Some(KeyedCipher::new(out_key.as_bytes()));
    }

    pub fn now_corrected(&self) -> i64 {
        let local_now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system clock before epoch")
            .as_secs() as i64;
        local_now - self.time_offset
    }

    /// Decrypts the partner-login `syncTime` field and derives `time_offset`
    /// from it: drop the 4 leading bytes, parse the remainder as ASCII
    /// decimal seconds.
    pub fn apply_sync_time(&mut self, encrypted_hex: &str) -> Result<()> {
        let cipher = self
            .cipher_in
            .as_ref()
            .ok_or(Error::Precondition("ciphers must be keyed before syncTime decode"))?;
        let decrypted = cipher.decrypt_from_hex(encrypted_hex)?;
        if decrypted.len() <= 4 {
            return Err(Error::InvalidResponse);
        }
        let digits = &decrypted[4..];
        let digits = rb_cipher::strip_nul_padding(digits.to_vec());
        let text = std::str::from_utf8(&digits).map_err(|_| Error::InvalidResponse)?;
        let server_time: i64 = text.trim().parse().map_err(|_| Error::InvalidResponse)?;

        let local_now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system clock before epoch")
            .as_secs() as i64;
        self.time_offset = local_now - server_time;
        Ok(())
    }

    pub fn complete_partner_login(&mut self, auth_token: String, partner_id: i64) {
        self.partner.auth_token = Secret::new(auth_token);
        self.partner.id = partner_id;
        self.state = AuthState::PartnerAuthed;
    }

    pub fn complete_user_login(&mut self, auth_token: String, listener_id: String) {
        self.user.auth_token = Secret::new(auth_token);
        self.user.listener_id = listener_id;
        self.state = AuthState::UserAuthed;
    }

    /// A request requiring user auth fails precondition if tokens are
    /// absent, per the spec's Session invariants.
    pub fn require_user_auth(&self) -> Result<()> {
        if self.state != AuthState::UserAuthed
            || self.user.auth_token.is_empty()
            || self.user.listener_id.is_empty()
        {
            return Err(Error::Precondition("user authentication required"));
        }
        Ok(())
    }

    pub fn require_partner_auth(&self) -> Result<()> {
        if self.partner.auth_token.is_empty() || self.partner.id <= 0 {
            return Err(Error::Precondition("partner authentication required"));
        }
        Ok(())
    }

    /// Moves the session back to `Unauth` so the engine can re-drive the
    /// partner+user login handshake transparently.
    pub fn invalidate(&mut self) {
        self.state = AuthState::Unauth;
        self.user.auth_token = Secret::default();
        self.user.listener_id.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        let mut s = Session::new("example.com", "/services/json/", 443);
        s.key_ciphers("in-key-8", "out-key8");
        s
    }

    #[test]
    fn sync_time_sets_offset() {
        let mut s = session();
        let cipher = s.cipher_out.as_ref().unwrap();
        // 4 junk leading bytes + ascii decimal server time, matching the
        // scenario in spec.md end-to-end scenario 1.
        let mut plaintext = vec![0xde, 0xad, 0xbe, 0xef];
        plaintext.extend_from_slice(b"1700000000");
        let hex = cipher.encrypt_to_hex(&plaintext).unwrap();

        // The payload was produced with the out-cipher in this test but
        // decrypted with the in-cipher; use the same key for both so the
        // round trip is well-defined.
        s.cipher_in = Some(KeyedCipher::new(b"out-key8"));
        s.apply_sync_time(&hex).unwrap();

        // local_now - server_time, with server_time fixed at 1700000000.
        let local_now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        assert_eq!(s.time_offset, local_now - 1_700_000_000);
    }

    #[test]
    fn user_auth_precondition_fails_before_login() {
        let s = session();
        assert!(s.require_user_auth().is_err());
    }

    #[test]
    fn user_auth_precondition_passes_after_login() {
        let mut s = session();
        s.complete_partner_login("ptoken".into(), 42);
        s.complete_user_login("utoken".into(), "listener-1".into());
        assert!(s.require_user_auth().is_ok());
    }

    #[test]
    fn invalidate_resets_to_unauth_but_keeps_partner_token() {
        let mut s = session();
        s.complete_partner_login("ptoken".into(), 42);
        s.complete_user_login("utoken".into(), "listener-1".into());
        s.invalidate();
        assert_eq!(s.state, AuthState::Unauth);
        assert!(!s.partner.auth_token.is_empty());
        assert!(s.user.auth_token.is_empty());
    }
}
