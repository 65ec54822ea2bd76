//! Credential cipher for the login payload.
//!
//! The Taipower app does not send the password in the clear. Instead, it
//! 3DES/ECB-encrypts the PKCS7-padded password with a random throwaway key and
//! sends `<lowercase hex ciphertext>@<key>`. The key travels right next to
//! the ciphertext, so this is obfuscation, not security, but the server
//! expects the format bit for bit.

use des::TdesEde3;
use ecb::cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit, block_padding::Pkcs7};
use rand::Rng;
use thiserror::Error;

/// Key length the vendor app uses (3 × 8 bytes for 3DES-EDE3).
const KEY_LENGTH: usize = 24;

const KEY_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789.-_abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("invalid key length")]
    KeyLength,

    #[error("invalid hexadecimal ciphertext")]
    Hex(#[from] hex::FromHexError),

    #[error("malformed padding")]
    Padding,

    #[error("decrypted text is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("missing `@` key separator")]
    MissingSeparator,
}

/// Generate a random key from the vendor's key alphabet.
pub fn random_key(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length).map(|_| char::from(KEY_CHARS[rng.gen_range(0..KEY_CHARS.len())])).collect()
}

/// Encrypt the text with a freshly generated random key.
///
/// The key is generated anew on every call, so two encryptions of the same
/// text differ.
pub fn encrypt(plain_text: &str) -> Result<String, CipherError> {
    let key = random_key(KEY_LENGTH);
    let cipher = ecb::Encryptor::<TdesEde3>::new_from_slice(key.as_bytes())
        .map_err(|_| CipherError::KeyLength)?;
    let encrypted = cipher.encrypt_padded_vec_mut::<Pkcs7>(plain_text.as_bytes());
    Ok(format!("{}@{key}", hex::encode(encrypted)))
}

/// Decrypt the `<hex>@<key>` output of [`encrypt`].
pub fn decrypt(encrypted: &str) -> Result<String, CipherError> {
    let (encrypted, key) = encrypted.rsplit_once('@').ok_or(CipherError::MissingSeparator)?;
    let cipher = ecb::Decryptor::<TdesEde3>::new_from_slice(key.as_bytes())
        .map_err(|_| CipherError::KeyLength)?;
    let decrypted = cipher
        .decrypt_padded_vec_mut::<Pkcs7>(&hex::decode(encrypted)?)
        .map_err(|_| CipherError::Padding)?;
    Ok(String::from_utf8(decrypted)?)
}

#[cfg(test)]
mod tests {
    use ecb::cipher::block_padding::NoPadding;

    use super::*;

    #[test]
    fn test_round_trip_ok() -> Result<(), CipherError> {
        for plain_text in ["Taipower", "x", "exactly-16-chars", "電力公司"] {
            assert_eq!(decrypt(&encrypt(plain_text)?)?, plain_text);
        }
        Ok(())
    }

    /// An 8-byte input pads to 16 bytes, so the separator lands at index 32.
    #[test]
    fn test_separator_position_ok() -> Result<(), CipherError> {
        let encrypted = encrypt("Taipower")?;
        assert_eq!(encrypted.as_bytes()[32], b'@');
        let (hex_text, key) = encrypted.rsplit_once('@').unwrap();
        assert_eq!(hex_text.len() % 2, 0);
        assert_eq!(key.len(), KEY_LENGTH);
        Ok(())
    }

    #[test]
    fn test_random_key_alphabet_ok() {
        let key = random_key(16);
        assert_eq!(key.len(), 16);
        assert!(key.bytes().all(|char| KEY_CHARS.contains(&char)));
    }

    #[test]
    fn test_encrypt_is_not_deterministic() -> Result<(), CipherError> {
        assert_ne!(encrypt("Taipower")?, encrypt("Taipower")?);
        Ok(())
    }

    #[test]
    fn test_missing_separator_fails() {
        assert!(matches!(decrypt("deadbeef"), Err(CipherError::MissingSeparator)));
    }

    #[test]
    fn test_malformed_padding_fails() {
        // A block of `0xFF` can never carry valid PKCS7 padding.
        let key = random_key(KEY_LENGTH);
        let cipher = ecb::Encryptor::<TdesEde3>::new_from_slice(key.as_bytes()).unwrap();
        let encrypted = cipher.encrypt_padded_vec_mut::<NoPadding>(&[0xFF; 8]);
        let encoded = format!("{}@{key}", hex::encode(encrypted));
        assert!(matches!(decrypt(&encoded), Err(CipherError::Padding)));
    }
}
