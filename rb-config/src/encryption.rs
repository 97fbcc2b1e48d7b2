//! Optional at-rest encryption for the `password` config line.
//!
//! The original pianobar config stores the password in plaintext; this is a
//! strict improvement that doesn't change any spec'd parsing behavior -- an
//! unprefixed plaintext value still works exactly as before. Grounded in
//! `pmoconfig::encryption`: a machine-id-derived AES-256-GCM key, with the
//! nonce itself derived from the plaintext so re-saving an unchanged
//! password doesn't rewrite the config file's ciphertext.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use sha2::{Digest, Sha256};
use thiserror::Error;

const ENCRYPTED_PREFIX: &str = "encrypted:";

#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("failed to determine a stable machine identifier")]
    NoMachineId,
    #[error("cipher setup failed: {0}")]
    CipherInit(String),
    #[error("encryption failed: {0}")]
    Encrypt(String),
    #[error("decryption failed: wrong machine or corrupted config")]
    Decrypt,
    #[error("invalid base64 in encrypted value")]
    Base64,
    #[error("encrypted value too short")]
    Truncated,
    #[error("decrypted password is not valid UTF-8")]
    NotUtf8,
}

fn machine_id() -> Result<String, EncryptionError> {
    #[cfg(target_os = "linux")]
    {
        if let Ok(id) = std::fs::read_to_string("/etc/machine-id") {
            return Ok(id.trim().to_string());
        }
        if let Ok(id) = std::fs::read_to_string("/var/lib/dbus/machine-id") {
            return Ok(id.trim().to_string());
        }
        Err(EncryptionError::NoMachineId)
    }
    #[cfg(not(target_os = "linux"))]
    {
        // Best-effort fallback for non-Linux targets: a hostname is not as
        // stable as a hardware id, but keeps the feature usable rather than
        // refusing outright.
        hostname_fallback()
    }
}

#[cfg(not(target_os = "linux"))]
fn hostname_fallback() -> Result<String, EncryptionError> {
    std::env::var("COMPUTERNAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .map_err(|_| EncryptionError::NoMachineId)
}

fn derive_key() -> Result<[u8; 32], EncryptionError> {
    let id = machine_id()?;
    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    hasher.update(b"radiobar-config-encryption-v1");
    Ok(hasher.finalize().into())
}

fn derive_nonce(password: &str) -> [u8; 12] {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(b"radiobar-nonce-v1");
    let digest = hasher.finalize();
    let mut nonce = [0u8; 12];
    nonce.copy_from_slice(&digest[..12]);
    nonce
}

pub fn is_encrypted(value: &str) -> bool {
    value.starts_with(ENCRYPTED_PREFIX)
}

pub fn encrypt_password(password: &str) -> Result<String, EncryptionError> {
    let key = derive_key()?;
    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|e| EncryptionError::CipherInit(e.to_string()))?;
    let nonce_bytes = derive_nonce(password);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, password.as_bytes())
        .map_err(|e| EncryptionError::Encrypt(e.to_string()))?;

    let mut combined = Vec::with_capacity(12 + ciphertext.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext);
    Ok(format!(
        "{ENCRYPTED_PREFIX}{}",
        base64::engine::general_purpose::STANDARD.encode(&combined)
    ))
}

pub fn decrypt_password(value: &str) -> Result<String, EncryptionError> {
    let encoded = value.strip_prefix(ENCRYPTED_PREFIX).ok_or(EncryptionError::Decrypt)?;
    let key = derive_key()?;
    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|e| EncryptionError::CipherInit(e.to_string()))?;

    let combined = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| EncryptionError::Base64)?;
    if combined.len() < 12 {
        return Err(EncryptionError::Truncated);
    }
    let (nonce_bytes, ciphertext) = combined.split_at(12);
    let nonce = Nonce::from_slice(nonce_bytes);

    let plaintext = cipher.decrypt(nonce, ciphertext).map_err(|_| EncryptionError::Decrypt)?;
    String::from_utf8(plaintext).map_err(|_| EncryptionError::NotUtf8)
}

/// Resolves a config `password` value whether it's plaintext or `encrypted:...`.
pub fn resolve_password(value: &str) -> Result<String, EncryptionError> {
    if is_encrypted(value) {
        decrypt_password(value)
    } else {
        Ok(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plaintext_passes_through() {
        assert_eq!(resolve_password("hunter2").unwrap(), "hunter2");
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let encrypted = encrypt_password("correct horse battery staple").unwrap();
        assert!(is_encrypted(&encrypted));
        assert_eq!(resolve_password(&encrypted).unwrap(), "correct horse battery staple");
    }

    #[test]
    fn same_password_encrypts_deterministically() {
        let a = encrypt_password("same").unwrap();
        let b = encrypt_password("same").unwrap();
        assert_eq!(a, b);
    }
}
