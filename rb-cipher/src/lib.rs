//! Blowfish-ECB payload encryption for the RPC wire format.
//!
//! Two independent keyed handles are used by the protocol layer: one for
//! outgoing (client -> server) payloads and one for incoming (server ->
//! client) payloads. Both operate in electronic-codebook mode over 8-byte
//! blocks, matching the server's expectations.

use blowfish::Blowfish;
use cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit};
use ecb::{Decryptor, Encryptor};
use thiserror::Error;

const BLOCK_SIZE: usize = 8;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("hex input has odd length or is not a multiple of {BLOCK_SIZE} bytes per block")]
    InvalidHex,
    #[error("hex input contains non-hex characters")]
    MalformedHex(#[from] hex::FromHexError),
    #[error("cipher key setup failed: {0}")]
    CryptoInit(String),
}

/// A single keyed Blowfish-ECB handle, good for either direction.
pub struct KeyedCipher {
    key: Vec<u8>,
}

impl KeyedCipher {
    /// Key the cipher once with the raw key bytes; cheap to construct, the
    /// key itself is validated lazily on first use so callers don't need to
    /// thread a `Result` through struct construction.
    pub fn new(key: impl AsRef<[u8]>) -> Self {
        Self {
            key: key.as_ref().to_vec(),
        }
    }

    /// Zero-pad `plaintext` up to a multiple of 8 bytes, encrypt block by
    /// block, and return the ciphertext as lowercase hex.
    pub fn encrypt_to_hex(&self, plaintext: &[u8]) -> Result<String, CipherError> {
        let mut buf = plaintext.to_vec();
        let pad = (BLOCK_SIZE - buf.len() % BLOCK_SIZE) % BLOCK_SIZE;
        buf.resize(buf.len() + pad, 0);

        let encryptor = Encryptor::<Blowfish>::new_from_slice(&self.key)
            .map_err(|e| CipherError::CryptoInit(e.to_string()))?;

        let mut encryptor = encryptor;
        for block in buf.chunks_exact_mut(BLOCK_SIZE) {
            let block = cipher::generic_array::GenericArray::from_mut_slice(block);
            encryptor.encrypt_block_mut(block);
        }

        Ok(hex::encode(buf))
    }

    /// Parse a hex string (even length, multiple of 16 hex chars), decrypt
    /// block by block, and return the raw decrypted bytes including any
    /// trailing NUL padding -- the caller is responsible for stripping it.
    pub fn decrypt_from_hex(&self, hex_str: &str) -> Result<Vec<u8>, CipherError> {
        if hex_str.len() % (BLOCK_SIZE * 2) != 0 {
            return Err(CipherError::InvalidHex);
        }
        let mut buf = hex::decode(hex_str)?;

        let decryptor = Decryptor::<Blowfish>::new_from_slice(&self.key)
            .map_err(|e| CipherError::CryptoInit(e.to_string()))?;

        let mut decryptor = decryptor;
        for block in buf.chunks_exact_mut(BLOCK_SIZE) {
            let block = cipher::generic_array::GenericArray::from_mut_slice(block);
            decryptor.decrypt_block_mut(block);
        }

        Ok(buf)
    }
}

/// Strip trailing NUL padding left over from `encrypt_to_hex`'s zero-pad.
pub fn strip_nul_padding(mut bytes: Vec<u8>) -> Vec<u8> {
    while bytes.last() == Some(&0) {
        bytes.pop();
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"R=U!LH$O2B#";

    #[test]
    fn round_trip_aligned_input() {
        let out_cipher = KeyedCipher::new(KEY);
        let in_cipher = KeyedCipher::new(KEY);

        let plaintext = b"0123456789abcdef"; // 16 bytes, already aligned
        let hex = out_cipher.encrypt_to_hex(plaintext).unwrap();
        let decrypted = in_cipher.decrypt_from_hex(&hex).unwrap();

        assert_eq!(&decrypted[..plaintext.len()], plaintext);
    }

    #[test]
    fn round_trip_unaligned_input_prefix_matches() {
        let cipher = KeyedCipher::new(KEY);
        let plaintext = b"{\"some\":\"json\"}";
        let hex = cipher.encrypt_to_hex(plaintext).unwrap();
        let decrypted = cipher.decrypt_from_hex(&hex).unwrap();
        let stripped = strip_nul_padding(decrypted);
        assert_eq!(stripped, plaintext);
    }

    #[test]
    fn decrypt_rejects_odd_length_hex() {
        let cipher = KeyedCipher::new(KEY);
        assert!(matches!(
            cipher.decrypt_from_hex("abc"),
            Err(CipherError::InvalidHex)
        ));
    }

    #[test]
    fn decrypt_rejects_non_multiple_of_block_hex() {
        let cipher = KeyedCipher::new(KEY);
        // 8 hex chars = 4 bytes, not a full 8-byte block
        assert!(matches!(
            cipher.decrypt_from_hex("0123abcd"),
            Err(CipherError::InvalidHex)
        ));
    }

    #[test]
    fn decrypt_rejects_non_hex_chars() {
        let cipher = KeyedCipher::new(KEY);
        let bad = "zz".repeat(8); // even length, multiple of 16, not hex
        assert!(matches!(
            cipher.decrypt_from_hex(&bad),
            Err(CipherError::MalformedHex(_))
        ));
    }

    #[test]
    fn hex_output_is_lowercase() {
        let cipher = KeyedCipher::new(KEY);
        let hex = cipher.encrypt_to_hex(b"ABCDEFGH").unwrap();
        assert_eq!(hex, hex.to_lowercase());
    }
}
